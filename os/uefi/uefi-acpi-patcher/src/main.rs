//! # UEFI ACPI Patcher
//!
//! Replaces the firmware DSDT and adds SSDTs from `.aml` files before the
//! operating system loader runs. Built as an application by default, or
//! as a boot-service driver with the `driver` feature:
//!
//! ```text
//! efi_main
//!   ├─ logger, banner
//!   ├─ application: patch() now
//!   └─ driver:      Coordinator ──storage ready──► patch()
//!
//! patch()
//!   ├─ RSDP from the configuration table (ACPI 2.0, then 1.0)
//!   ├─ image directory from LoadedImage (hint)
//!   └─ Patcher::run over every Simple File System volume
//! ```
//!
//! Override files go next to the image, into its `ACPI` sub-folder, or
//! into one of the well-known bootloader folders on any volume.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![no_main]
extern crate alloc;

#[cfg(feature = "driver")]
mod deferred;
mod file_system;
mod logger;
mod memory;
mod rsdp;
mod self_dir;

use crate::file_system::UefiVolumes;
use crate::logger::UefiLogger;
use crate::memory::BootServicesMemory;
use crate::self_dir::image_location;
use acpi_patcher::{PatchError, PatchReport, Patcher, RootError};
use acpi_tables::MemoryError;
use acpi_tables::rsdp::RsdpError;
use log::{error, info};
use uefi::prelude::*;

#[entry]
fn efi_main() -> Status {
    if uefi::helpers::init().is_err() {
        return Status::UNSUPPORTED;
    }
    if UefiLogger::init().is_err() {
        return Status::ABORTED;
    }

    info!("ACPI Patcher v{}", env!("CARGO_PKG_VERSION"));
    launch()
}

/// Patch now and report the outcome to the firmware.
#[cfg(not(feature = "driver"))]
fn launch() -> Status {
    match patch() {
        Ok(report) => {
            info!("ACPI patching complete: {report}");
            Status::SUCCESS
        }
        Err(e) => {
            error!("ACPI patching failed: {e}");
            status_of(&e)
        }
    }
}

/// Patch now or once storage appears. The driver stays resident either way.
#[cfg(feature = "driver")]
fn launch() -> Status {
    match deferred::start(patch) {
        Ok(state) => {
            info!("ACPI patching state: {state:?}");
            Status::SUCCESS
        }
        Err(e) => {
            error!("Cannot wait for storage: {e}");
            e.status()
        }
    }
}

/// One patch session against the live firmware tables.
fn patch() -> Result<PatchReport, PatchError> {
    let Some(rsdp_addr) = rsdp::find_rsdp_addr() else {
        error!("No RSDP in the UEFI configuration table");
        return Err(RootError::Rsdp(RsdpError::Null).into());
    };
    info!("RSDP found at {rsdp_addr:#x}");

    let (image_dir, hint) = match image_location() {
        Some(location) => (Some(location.path), Some(location.dir)),
        None => (None, None),
    };

    let mut memory = BootServicesMemory;
    let mut volumes = UefiVolumes;
    Patcher::new(&mut memory, &mut volumes)
        .with_image_dir(image_dir)
        .run(rsdp_addr, hint)
}

#[cfg(not(feature = "driver"))]
const fn status_of(error: &PatchError) -> Status {
    match error {
        PatchError::StorageUnavailable
        | PatchError::RootStructureMissing(_)
        | PatchError::FixedTableMissing => Status::NOT_FOUND,
        PatchError::Memory(MemoryError::OutOfMemory { .. }) => Status::OUT_OF_RESOURCES,
        PatchError::Memory(_) => Status::DEVICE_ERROR,
    }
}
