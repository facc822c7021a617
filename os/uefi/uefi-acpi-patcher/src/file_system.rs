//! Simple File System access for the patch engine.

use acpi_patcher::{DirEntry, Directory, StorageError, Volumes};
use alloc::format;
use alloc::string::ToString;
use alloc::vec::Vec;
use log::{debug, warn};
use uefi::boot::{self, OpenProtocolAttributes, OpenProtocolParams, SearchType};
use uefi::proto::media::file::{self, File, FileAttribute, FileMode};
use uefi::proto::media::fs::SimpleFileSystem;
use uefi::{CString16, Guid, Handle, Identify, Status};

static SIMPLE_FS_GUID: Guid = SimpleFileSystem::GUID;

/// An open directory on a Simple File System volume.
pub struct UefiDir {
    inner: file::Directory,
}

impl UefiDir {
    /// Open the root directory of the volume on `handle`.
    ///
    /// # Errors
    /// A [`StorageError`] if the handle has no usable file system.
    pub fn open_volume(handle: Handle) -> Result<Self, StorageError> {
        // SAFETY: the protocol is only used until the volume is open, and
        // nothing in this image uninstalls file systems.
        let mut fs = unsafe {
            boot::open_protocol::<SimpleFileSystem>(
                OpenProtocolParams {
                    handle,
                    agent: boot::image_handle(),
                    controller: None,
                },
                OpenProtocolAttributes::GetProtocol,
            )
        }
        .map_err(|e| storage_error(e.status()))?;

        let inner = fs.open_volume().map_err(|e| storage_error(e.status()))?;
        Ok(Self { inner })
    }

    /// Open the root directory of the volume this image was loaded from.
    ///
    /// # Errors
    /// A [`StorageError`] if the image did not come from a file system.
    pub fn image_volume() -> Result<Self, StorageError> {
        let mut fs = boot::get_image_file_system(boot::image_handle())
            .map_err(|e| storage_error(e.status()))?;
        let inner = fs.open_volume().map_err(|e| storage_error(e.status()))?;
        Ok(Self { inner })
    }
}

impl Directory for UefiDir {
    fn open_dir(&mut self, path: &str) -> Result<Self, StorageError> {
        let name = to_cstring(path)?;
        let handle = self
            .inner
            .open(&name, FileMode::Read, FileAttribute::empty())
            .map_err(|e| storage_error(e.status()))?;
        handle
            .into_directory()
            .map(|inner| Self { inner })
            .ok_or(StorageError::NotADirectory)
    }

    fn read_entry(&mut self) -> Result<Option<DirEntry>, StorageError> {
        let Some(info) = self
            .inner
            .read_entry_boxed()
            .map_err(|e| storage_error(e.status()))?
        else {
            return Ok(None);
        };
        Ok(Some(DirEntry {
            name: info.file_name().to_string(),
            size: info.file_size(),
            is_directory: info.is_directory(),
        }))
    }

    fn rewind(&mut self) -> Result<(), StorageError> {
        self.inner
            .reset_entry_readout()
            .map_err(|e| storage_error(e.status()))
    }

    fn read_file(&mut self, name: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let name = to_cstring(name)?;
        let handle = self
            .inner
            .open(&name, FileMode::Read, FileAttribute::empty())
            .map_err(|e| storage_error(e.status()))?;
        let Some(mut file) = handle.into_regular_file() else {
            return Err(StorageError::NotAFile);
        };

        // Some drivers return short reads.
        let mut total = 0;
        while total < buf.len() {
            let read = file
                .read(&mut buf[total..])
                .map_err(|e| storage_error(e.status()))?;
            if read == 0 {
                break;
            }
            total += read;
        }
        Ok(total)
    }
}

/// Every handle carrying the Simple File System protocol.
pub struct UefiVolumes;

impl UefiVolumes {
    /// `true` if at least one file system is mounted.
    #[cfg_attr(not(feature = "driver"), allow(dead_code))]
    #[must_use]
    pub fn available() -> bool {
        boot::locate_handle_buffer(SearchType::ByProtocol(&SIMPLE_FS_GUID))
            .is_ok_and(|handles| !handles.is_empty())
    }

    #[cfg_attr(not(feature = "driver"), allow(dead_code))]
    #[must_use]
    pub fn protocol_guid() -> &'static Guid {
        &SIMPLE_FS_GUID
    }
}

impl Volumes for UefiVolumes {
    type Dir = UefiDir;

    fn roots(&mut self) -> Result<Vec<UefiDir>, StorageError> {
        let handles = boot::locate_handle_buffer(SearchType::ByProtocol(&SIMPLE_FS_GUID))
            .map_err(|e| storage_error(e.status()))?;
        debug!("Found {} file system(s)", handles.len());

        let mut roots = Vec::with_capacity(handles.len());
        for (index, handle) in handles.iter().enumerate() {
            match UefiDir::open_volume(*handle) {
                Ok(root) => roots.push(root),
                Err(e) => warn!("Cannot open volume {index}: {e}"),
            }
        }
        Ok(roots)
    }
}

fn to_cstring(path: &str) -> Result<CString16, StorageError> {
    CString16::try_from(path).map_err(|_| StorageError::InvalidPath(path.to_string()))
}

fn storage_error(status: Status) -> StorageError {
    match status {
        Status::NOT_FOUND => StorageError::NotFound,
        other => StorageError::Device(format!("{other:?}")),
    }
}
