#![allow(dead_code)]

use acpi_patcher::storage::join_path;
use acpi_patcher::{DirEntry, Directory, StorageError, Volumes};
use acpi_tables::fadt::Fadt;
use acpi_tables::rsdp::RootPointer;
use acpi_tables::{MemoryError, PhysMemory, SdtHeader, Signature, fix_checksum};
use std::collections::BTreeMap;
use std::rc::Rc;

pub const RSDP_ADDR: u64 = 0x000E_0000;
pub const XSDT_ADDR: u64 = 0x0010_0000;
pub const FADT_ADDR: u64 = 0x0020_0000;
pub const DSDT_ADDR: u64 = 0x0030_0000;
pub const SSDT_ADDR: u64 = 0x0040_0000;

/// Sparse physical memory; allocations start at 256 MiB.
pub struct FakeMemory {
    regions: BTreeMap<u64, Vec<u8>>,
    next: u64,
    fail_at: Option<usize>,
    pub allocations: usize,
    pub released: Vec<u64>,
}

impl FakeMemory {
    pub fn new() -> Self {
        Self {
            regions: BTreeMap::new(),
            next: 0x1000_0000,
            fail_at: None,
            allocations: 0,
            released: Vec::new(),
        }
    }

    pub fn place(&mut self, paddr: u64, bytes: Vec<u8>) {
        self.regions.insert(paddr, bytes);
    }

    /// Make future allocations land above 4 GiB.
    pub fn allocate_high(&mut self) {
        self.next = 0x1_0000_0000;
    }

    /// Make the `n`th allocation from now on (1-based) run out of memory.
    pub fn fail_allocation(&mut self, n: usize) {
        self.fail_at = Some(self.allocations + n);
    }

    /// Allocations made and not released.
    pub fn live_allocations(&self) -> usize {
        self.allocations - self.released.len()
    }

    pub fn bytes(&self, paddr: u64, len: usize) -> Vec<u8> {
        self.read_vec(paddr, len).expect("mapped")
    }

    fn locate(&self, paddr: u64, len: usize) -> Option<(u64, usize)> {
        let (&base, region) = self.regions.range(..=paddr).next_back()?;
        let offset = usize::try_from(paddr - base).ok()?;
        (offset + len <= region.len()).then_some((base, offset))
    }
}

impl PhysMemory for FakeMemory {
    fn read(&self, paddr: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        let len = buf.len();
        let (base, offset) = self
            .locate(paddr, len)
            .ok_or(MemoryError::Unmapped { paddr, len })?;
        buf.copy_from_slice(&self.regions[&base][offset..offset + len]);
        Ok(())
    }

    fn write(&mut self, paddr: u64, bytes: &[u8]) -> Result<(), MemoryError> {
        let len = bytes.len();
        let (base, offset) = self
            .locate(paddr, len)
            .ok_or(MemoryError::Unmapped { paddr, len })?;
        let region = self.regions.get_mut(&base).expect("located");
        region[offset..offset + len].copy_from_slice(bytes);
        Ok(())
    }

    fn allocate(&mut self, len: usize) -> Result<u64, MemoryError> {
        if self.fail_at == Some(self.allocations + 1) {
            return Err(MemoryError::OutOfMemory { len });
        }
        let paddr = self.next;
        self.regions.insert(paddr, vec![0; len]);
        self.next += (len as u64).next_multiple_of(0x1000).max(0x1000);
        self.allocations += 1;
        Ok(paddr)
    }

    fn release(&mut self, paddr: u64, _len: usize) {
        assert!(self.regions.remove(&paddr).is_some(), "release of {paddr:#x}");
        self.released.push(paddr);
    }
}

/// A checksummed table of `len` bytes with a recognisable payload.
pub fn table(signature: Signature, len: usize) -> Vec<u8> {
    let mut header = SdtHeader::new(signature, len as u32);
    header.revision = 2;
    header.oem_id = *b"TESTOE";
    header.oem_table_id = *b"PATCHTST";
    let mut bytes = header.encode().to_vec();
    bytes.extend((0..len - SdtHeader::SIZE).map(|i| (i % 251) as u8));
    fix_checksum(&mut bytes, SdtHeader::CHECKSUM_OFFSET);
    bytes
}

pub fn xsdt(entries: &[u64]) -> Vec<u8> {
    let mut bytes = SdtHeader::new(Signature::XSDT, (SdtHeader::SIZE + entries.len() * 8) as u32)
        .encode()
        .to_vec();
    for addr in entries {
        bytes.extend_from_slice(&addr.to_le_bytes());
    }
    fix_checksum(&mut bytes, SdtHeader::CHECKSUM_OFFSET);
    bytes
}

/// An ACPI 2.0+ FADT whose DSDT fields both point at `dsdt`.
pub fn fadt(dsdt: u64) -> Vec<u8> {
    let mut bytes = table(Signature::FADT, 244);
    bytes[40..44].copy_from_slice(&(dsdt as u32).to_le_bytes());
    bytes[140..148].copy_from_slice(&dsdt.to_le_bytes());
    fix_checksum(&mut bytes, SdtHeader::CHECKSUM_OFFSET);
    bytes
}

pub fn rsdp(xsdt: u64) -> Vec<u8> {
    let mut raw = vec![0u8; 36];
    raw[0..8].copy_from_slice(b"RSD PTR ");
    raw[9..15].copy_from_slice(b"TESTOE");
    raw[15] = 2;
    raw[20..24].copy_from_slice(&36u32.to_le_bytes());
    raw[24..32].copy_from_slice(&xsdt.to_le_bytes());
    fix_checksum(&mut raw[..20], 8);
    fix_checksum(&mut raw, 32);
    raw
}

/// Firmware with an XSDT listing a FADT, a DSDT and one SSDT.
pub fn firmware() -> FakeMemory {
    firmware_with(&[FADT_ADDR, DSDT_ADDR, SSDT_ADDR], fadt(DSDT_ADDR))
}

pub fn firmware_with(entries: &[u64], fadt_bytes: Vec<u8>) -> FakeMemory {
    let mut mem = FakeMemory::new();
    mem.place(RSDP_ADDR, rsdp(XSDT_ADDR));
    mem.place(XSDT_ADDR, xsdt(entries));
    mem.place(FADT_ADDR, fadt_bytes);
    mem.place(DSDT_ADDR, table(Signature::DSDT, 64));
    mem.place(SSDT_ADDR, table(Signature::SSDT, 48));
    mem
}

pub fn root_pointer(mem: &FakeMemory) -> RootPointer {
    RootPointer::read(mem, RSDP_ADDR).expect("valid RSDP")
}

/// Raw XSDT entries as currently published through the RSDP.
pub fn xsdt_entries(mem: &FakeMemory) -> Vec<u64> {
    let xsdt = root_pointer(mem).xsdt_address();
    let header = SdtHeader::parse(&mem.bytes(xsdt, SdtHeader::SIZE)).expect("header");
    mem.bytes(xsdt, header.table_len())[SdtHeader::SIZE..]
        .chunks_exact(8)
        .map(|raw| u64::from_le_bytes(raw.try_into().expect("8 bytes")))
        .collect()
}

pub fn current_fadt(mem: &FakeMemory) -> Fadt {
    Fadt::read(mem, FADT_ADDR).expect("valid FADT")
}

pub fn signature_at(mem: &FakeMemory, paddr: u64) -> Signature {
    let mut raw = [0u8; 4];
    mem.read(paddr, &mut raw).expect("mapped");
    Signature(raw)
}

/// One in-memory FAT-like volume. Paths are case-insensitive and
/// `\`-separated; entries enumerate in insertion order.
#[derive(Debug, Default)]
pub struct Volume {
    dirs: Vec<String>,
    files: Vec<(String, Vec<u8>)>,
}

impl Volume {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dir(mut self, path: &str) -> Self {
        let path = join_path("", path).expect("valid path");
        let mut prefix = String::new();
        for part in path.split('\\').filter(|p| !p.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('\\');
            }
            prefix.push_str(part);
            if !self.dirs.iter().any(|d| d.eq_ignore_ascii_case(&prefix)) {
                self.dirs.push(prefix.clone());
            }
        }
        self
    }

    pub fn file(self, path: &str, bytes: Vec<u8>) -> Self {
        let path = join_path("", path).expect("valid path");
        let parent = path.rsplit_once('\\').map_or("", |(p, _)| p).to_string();
        let mut volume = self.dir(&parent);
        volume.files.push((path, bytes));
        volume
    }

    fn is_dir(&self, path: &str) -> bool {
        path.is_empty() || self.dirs.iter().any(|d| d.eq_ignore_ascii_case(path))
    }

    fn find_file(&self, path: &str) -> Option<&[u8]> {
        self.files
            .iter()
            .find(|(p, _)| p.eq_ignore_ascii_case(path))
            .map(|(_, bytes)| bytes.as_slice())
    }

    fn children(&self, dir: &str) -> Vec<DirEntry> {
        let parent_of = |path: &str| path.rsplit_once('\\').map_or("", |(p, _)| p).to_string();
        let name_of = |path: &str| path.rsplit('\\').next().unwrap_or(path).to_string();

        let mut entries = Vec::new();
        if !dir.is_empty() {
            for marker in [".", ".."] {
                entries.push(DirEntry {
                    name: marker.to_string(),
                    size: 0,
                    is_directory: true,
                });
            }
        }
        for d in self.dirs.iter().filter(|d| parent_of(d).eq_ignore_ascii_case(dir)) {
            entries.push(DirEntry {
                name: name_of(d),
                size: 0,
                is_directory: true,
            });
        }
        let in_dir = |path: &&(String, Vec<u8>)| parent_of(&path.0).eq_ignore_ascii_case(dir);
        for (path, bytes) in self.files.iter().filter(in_dir) {
            entries.push(DirEntry {
                name: name_of(path),
                size: bytes.len() as u64,
                is_directory: false,
            });
        }
        entries
    }
}

#[derive(Debug)]
pub struct MemDir {
    volume: Rc<Volume>,
    path: String,
    cursor: usize,
}

impl MemDir {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn root(volume: &Rc<Volume>) -> Self {
        Self {
            volume: Rc::clone(volume),
            path: String::new(),
            cursor: 0,
        }
    }
}

impl Directory for MemDir {
    fn open_dir(&mut self, path: &str) -> Result<Self, StorageError> {
        let target = join_path(&self.path, path)
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        if self.volume.is_dir(&target) {
            Ok(Self {
                volume: Rc::clone(&self.volume),
                path: target,
                cursor: 0,
            })
        } else if self.volume.find_file(&target).is_some() {
            Err(StorageError::NotADirectory)
        } else {
            Err(StorageError::NotFound)
        }
    }

    fn read_entry(&mut self) -> Result<Option<DirEntry>, StorageError> {
        let entry = self.volume.children(&self.path).into_iter().nth(self.cursor);
        if entry.is_some() {
            self.cursor += 1;
        }
        Ok(entry)
    }

    fn rewind(&mut self) -> Result<(), StorageError> {
        self.cursor = 0;
        Ok(())
    }

    fn read_file(&mut self, name: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let target = join_path(&self.path, name)
            .ok_or_else(|| StorageError::InvalidPath(name.to_string()))?;
        if self.volume.is_dir(&target) {
            return Err(StorageError::NotAFile);
        }
        let bytes = self.volume.find_file(&target).ok_or(StorageError::NotFound)?;
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(n)
    }
}

/// A set of in-memory volumes, enumerated in order.
#[derive(Debug, Default)]
pub struct MemFs {
    volumes: Vec<Rc<Volume>>,
}

impl MemFs {
    pub fn new(volumes: Vec<Volume>) -> Self {
        Self {
            volumes: volumes.into_iter().map(Rc::new).collect(),
        }
    }

    pub fn volume(&self, index: usize) -> &Rc<Volume> {
        &self.volumes[index]
    }

    pub fn open(&self, index: usize, path: &str) -> MemDir {
        MemDir::root(&self.volumes[index])
            .open_dir(path)
            .expect("directory exists")
    }
}

impl Volumes for MemFs {
    type Dir = MemDir;

    fn roots(&mut self) -> Result<Vec<MemDir>, StorageError> {
        Ok(self.volumes.iter().map(MemDir::root).collect())
    }
}

/// Installs a `log` sink once so `RUST_LOG`-free test runs still exercise
/// every formatting path.
pub fn init_logging() {
    struct Sink;
    impl log::Log for Sink {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }
        fn log(&self, record: &log::Record) {
            let _ = format!("{}", record.args());
        }
        fn flush(&self) {}
    }
    static SINK: Sink = Sink;
    if log::set_logger(&SINK).is_ok() {
        log::set_max_level(log::LevelFilter::Trace);
    }
}
