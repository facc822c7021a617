//! # Root System Description Pointer lookup

use uefi::system;
use uefi::table::cfg::{ACPI_GUID, ACPI2_GUID};

/// Returns the physical address of the RSDP, if the firmware publishes one.
pub fn find_rsdp_addr() -> Option<u64> {
    system::with_config_table(|table| {
        // Prefer ACPI 2.0 RSDP if available
        table
            .iter()
            .find(|entry| entry.guid == ACPI2_GUID)
            .or_else(|| table.iter().find(|entry| entry.guid == ACPI_GUID))
            .map(|entry| entry.address as usize as u64)
    })
}
