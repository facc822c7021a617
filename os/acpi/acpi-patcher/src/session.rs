//! # Patch sessions
//!
//! A [`Patcher`] runs one session: discover the firmware tables, find the
//! override directory, apply every usable override file in a fixed order
//! and commit. Problems with single files are logged and counted; only the
//! conditions in [`PatchError`] end a session early.

use crate::classify::{Classification, OverrideEntries, OverrideFile, count_override_files};
use crate::config::PatchConfig;
use crate::context::EngineContext;
use crate::directory::MutateError;
use crate::error::PatchError;
use crate::loader::{LoadError, load};
use crate::locator::Locator;
use crate::mutator::{DsdtOutcome, Mutator};
use crate::storage::{Directory, Volumes};
use acpi_tables::{PhysMemory, Signature};
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use log::{debug, error, info, trace, warn};

/// Counters reported at the end of a session.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PatchReport {
    /// Override files that were attempted.
    pub processed: u32,
    /// Entries that were ignored, duplicated, or failed to apply.
    pub skipped: u32,
    /// Tables appended to the XSDT.
    pub added: u32,
    /// DSDT replacements.
    pub replaced: u32,
}

impl fmt::Display for PatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} skipped, {} added, {} replaced",
            self.processed, self.skipped, self.added, self.replaced
        )
    }
}

/// Override files of one directory in application order.
#[derive(Debug, Default)]
struct Plan {
    dsdt: Option<OverrideFile>,
    numbered: Vec<(u32, OverrideFile)>,
    named: Vec<OverrideFile>,
    generic: Vec<OverrideFile>,
}

impl Plan {
    fn into_ordered(mut self) -> impl Iterator<Item = OverrideFile> {
        // Stable, so equal numbers keep their discovery order.
        self.numbered.sort_by_key(|(n, _)| *n);
        self.dsdt
            .into_iter()
            .chain(self.numbered.into_iter().map(|(_, file)| file))
            .chain(self.named)
            .chain(self.generic)
    }
}

pub struct Patcher<'a, M: PhysMemory, V: Volumes> {
    memory: &'a mut M,
    volumes: &'a mut V,
    config: PatchConfig,
    image_dir: Option<String>,
}

impl<'a, M: PhysMemory, V: Volumes> Patcher<'a, M, V> {
    pub fn new(memory: &'a mut M, volumes: &'a mut V) -> Self {
        Self {
            memory,
            volumes,
            config: PatchConfig::default(),
            image_dir: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: PatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Volume-relative directory of the patcher image, used to rank
    /// candidate override directories.
    #[must_use]
    pub fn with_image_dir(mut self, image_dir: Option<String>) -> Self {
        self.image_dir = image_dir;
        self
    }

    /// Run one patch session against the RSDP at `rsdp_addr`.
    ///
    /// `hint` is the directory to use if it (or its override sub-folder)
    /// holds override files; otherwise every volume is searched, and the
    /// hint is only used when that search comes up empty.
    ///
    /// # Errors
    /// A [`PatchError`] if the firmware tables are unusable, there is neither
    /// a hint nor an override directory on any volume, or the changes cannot
    /// be committed.
    pub fn run(
        &mut self,
        rsdp_addr: u64,
        hint: Option<V::Dir>,
    ) -> Result<PatchReport, PatchError> {
        info!("Starting ACPI patching process...");
        let ctx = EngineContext::discover(&*self.memory, rsdp_addr)?;

        let mut dir = self.resolve_directory(hint)?;
        let mut mutator = Mutator::new(ctx, self.config.additional_capacity);
        debug!(
            "XSDT has room for {} entries",
            mutator.context().directory.capacity()
        );
        let mut report = PatchReport::default();

        let plan = self.scan(&mut dir, &mut report)?;
        for file in plan.into_ordered() {
            self.apply(&mut dir, &mut mutator, &file, &mut report);
        }

        debug!(
            "Committing {} loaded table(s) into {} XSDT entries",
            mutator.arena().len(),
            mutator.context().directory.len()
        );
        let summary = mutator.commit(&mut *self.memory)?;
        if report.replaced > 0 && !summary.dsdt_installed {
            report.replaced -= 1;
            report.skipped += 1;
        }

        info!("ACPI patching summary:");
        info!("  Files processed: {}", report.processed);
        info!("  Files skipped: {}", report.skipped);
        info!("  Tables added: {}", report.added);
        info!("  Tables replaced: {}", report.replaced);
        info!("  Final XSDT entries: {}", summary.entries);
        debug!(
            "  XSDT at {:#x} ({})",
            summary.xsdt_address,
            if summary.repointed { "new" } else { "unchanged" }
        );

        Ok(report)
    }

    /// Pick the override directory: the hint or its override sub-folder if
    /// either holds override files, else the best volume candidate. An empty
    /// but existing hint is still used when no volume has override files,
    /// and gives a session with nothing to apply.
    fn resolve_directory(&mut self, hint: Option<V::Dir>) -> Result<V::Dir, PatchError> {
        let mut fallback = None;
        if let Some(mut dir) = hint {
            if count_override_files(&mut dir, &self.config) > 0 {
                debug!("Using the override files next to the patcher");
                return Ok(dir);
            }
            match dir.open_dir(self.config.override_folder) {
                Ok(mut sub) => {
                    if count_override_files(&mut sub, &self.config) > 0 {
                        debug!(
                            "Using the override files in the {} sub-folder",
                            self.config.override_folder
                        );
                        return Ok(sub);
                    }
                    fallback = Some(sub);
                }
                Err(_) => fallback = Some(dir),
            }
            debug!("No override files next to the patcher; searching all volumes");
        }

        let located = Locator::new(&self.config)
            .with_image_dir(self.image_dir.clone())
            .locate(&mut *self.volumes)
            .map(|candidate| candidate.dir);
        match (located, fallback) {
            (Some(dir), _) => Ok(dir),
            (None, Some(dir)) => {
                info!("No override files found; nothing to apply");
                Ok(dir)
            }
            (None, None) => Err(PatchError::StorageUnavailable),
        }
    }

    /// Classify every entry of `dir` and build the application order.
    fn scan(&self, dir: &mut V::Dir, report: &mut PatchReport) -> Result<Plan, PatchError> {
        info!("Scanning for {} files...", self.config.extension);
        let entries = OverrideEntries::new(dir, &self.config).map_err(|e| {
            error!("Cannot enumerate the override directory: {e}");
            PatchError::StorageUnavailable
        })?;

        let mut plan = Plan::default();
        let mut seen: Vec<String> = Vec::new();
        for entry in entries {
            let file = match entry {
                Ok(file) => file,
                Err(e) => {
                    warn!("Directory read error, stopping the scan: {e}");
                    break;
                }
            };

            if file.class == Classification::Ignored {
                if !file.is_directory {
                    trace!("  Skipping {}", file.name);
                    report.skipped += 1;
                }
                continue;
            }
            if seen.iter().any(|name| name.eq_ignore_ascii_case(&file.name)) {
                warn!("  Duplicate file {}, skipping", file.name);
                report.skipped += 1;
                continue;
            }
            seen.push(file.name.clone());

            match file.class {
                Classification::DsdtReplacement if plan.dsdt.is_none() => plan.dsdt = Some(file),
                Classification::DsdtReplacement => {
                    warn!("  Second DSDT replacement {}, skipping", file.name);
                    report.skipped += 1;
                }
                Classification::NumberedSupplement(n) => plan.numbered.push((n, file)),
                Classification::NamedSupplement(_) => plan.named.push(file),
                Classification::Generic => plan.generic.push(file),
                Classification::Ignored => {}
            }
        }

        debug!(
            "Found {} DSDT, {} numbered, {} named and {} other override file(s)",
            usize::from(plan.dsdt.is_some()),
            plan.numbered.len(),
            plan.named.len(),
            plan.generic.len()
        );
        Ok(plan)
    }

    fn apply(
        &self,
        dir: &mut V::Dir,
        mutator: &mut Mutator,
        file: &OverrideFile,
        report: &mut PatchReport,
    ) {
        info!("Processing file: {} ({} bytes)", file.name, file.size);
        report.processed += 1;

        let table = match load(dir, file, &self.config) {
            Ok(table) => table,
            Err(LoadError::NotFound) => {
                error!("  {} disappeared, skipping", file.name);
                report.skipped += 1;
                return;
            }
            Err(e) => {
                error!("  Failed to load {}: {e}", file.name);
                report.skipped += 1;
                return;
            }
        };

        if file.class == Classification::DsdtReplacement {
            if table.signature() != Signature::DSDT {
                warn!(
                    "  {} holds a {} table, installing it as the DSDT anyway",
                    file.name,
                    table.signature()
                );
            }
            match mutator.replace_dsdt(&*self.memory, table, self.config.dsdt_fadt_fallback) {
                Ok(DsdtOutcome::Replaced { slot }) => {
                    info!("  Replacing DSDT in XSDT entry {slot}");
                    report.replaced += 1;
                }
                Ok(DsdtOutcome::FadtOnly) => {
                    info!("  Replacing DSDT through the FADT");
                    report.replaced += 1;
                }
                Err(e) => {
                    warn!("  DSDT not replaced: {e}");
                    report.skipped += 1;
                }
            }
            return;
        }

        match mutator.append(table) {
            Ok(slot) => {
                info!("  Added {} as XSDT entry {slot}", file.name);
                report.added += 1;
            }
            Err(e @ MutateError::CapacityExceeded { .. }) => {
                warn!("  {e}, skipping {}", file.name);
                report.skipped += 1;
            }
            Err(e) => {
                warn!("  {} not added: {e}", file.name);
                report.skipped += 1;
            }
        }
    }
}
