//! # Patch session configuration

use core::ops::RangeInclusive;

/// Tunables for one patch session.
///
/// [`PatchConfig::default`] reproduces the file-naming contract: `DSDT.aml`,
/// `SSDT-<1..=10>.aml`, `SSDT-<tag>.aml` and any other `*.aml`, looked up
/// in the current folder or its `ACPI` child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchConfig {
    /// Free XSDT slots added once per session.
    pub additional_capacity: usize,
    /// Sub-folder holding override files next to the patcher.
    pub override_folder: &'static str,
    /// Exact file name of a DSDT replacement.
    pub dsdt_file_name: &'static str,
    /// File name suffix of override tables.
    pub extension: &'static str,
    /// Prefix of supplementary tables (`SSDT-3.aml`, `SSDT-gpu.aml`).
    pub ssdt_prefix: &'static str,
    /// Numbers accepted for `SSDT-<n>.aml`.
    pub numbered_range: RangeInclusive<u32>,
    /// Prefix of platform resource-fork artifacts, always ignored.
    pub resource_fork_prefix: &'static str,
    /// Match [`PatchConfig::extension`] case-sensitively.
    pub extension_case_sensitive: bool,
    /// Install a DSDT through the FADT alone if the XSDT has no DSDT entry.
    pub dsdt_fadt_fallback: bool,
}

impl PatchConfig {
    pub const DEFAULT_ADDITIONAL_CAPACITY: usize = 16;
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            additional_capacity: Self::DEFAULT_ADDITIONAL_CAPACITY,
            override_folder: "ACPI",
            dsdt_file_name: "DSDT.aml",
            extension: ".aml",
            ssdt_prefix: "SSDT-",
            numbered_range: 1..=10,
            resource_fork_prefix: "._",
            extension_case_sensitive: true,
            dsdt_fadt_fallback: false,
        }
    }
}
