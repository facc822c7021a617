//! # Override directory discovery
//!
//! When the patcher cannot trust its own working directory (typically when
//! it runs as a driver and storage appears later), the folder holding the
//! override files is searched for across every volume.
//!
//! ## Search order and scoring
//!
//! For each volume, a fixed list of candidate paths is checked. Each path
//! that opens and contains at least one override file becomes a candidate
//! with a score of `tier weight + file count`:
//!
//! ```text
//! Tier                 Weight  Paths
//! CoLocated              700   <image dir>, EFI\ACPIPatcher
//! CoLocatedOverride      600   <image dir>\ACPI, EFI\ACPIPatcher\ACPI
//! DriverBootloader       500   EFI\OC\Drivers\ACPI, EFI\CLOVER\drivers\UEFI\ACPI
//! BootloaderOverride     400   EFI\OC\ACPI, EFI\CLOVER\ACPI\patched
//! OtherRelative          300   <image dir>\..\ACPI, <image dir>\..\..\ACPI,
//!                              EFI\BOOT\ACPI, EFI\ACPI
//! Generic                200   ACPI
//! VolumeRoot             100   \ (only if nothing else matched on the volume)
//! ```
//!
//! The file count is capped below the tier spacing, so it only breaks ties
//! within a tier. The best candidate across all volumes wins; on equal
//! scores the one with more files is preferred, then the one found first.

use crate::classify::count_override_files;
use crate::config::PatchConfig;
use crate::storage::{Directory, Volumes, join_path};
use alloc::string::String;
use alloc::vec::Vec;
use log::{debug, info, trace, warn};

const TIER_SPACING: u32 = 100;
const MAX_COUNT_WEIGHT: usize = 99;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    VolumeRoot,
    Generic,
    OtherRelative,
    BootloaderOverride,
    DriverBootloader,
    CoLocatedOverride,
    CoLocated,
}

impl Tier {
    #[must_use]
    pub const fn weight(self) -> u32 {
        (self as u32 + 1) * TIER_SPACING
    }
}

/// Candidate score for `aml_files` override files found in a `tier` path.
#[must_use]
pub fn score(tier: Tier, aml_files: usize) -> u32 {
    let bonus = u32::try_from(aml_files.min(MAX_COUNT_WEIGHT)).unwrap_or(0);
    tier.weight() + bonus
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePath {
    pub path: String,
    pub tier: Tier,
}

/// An opened directory that holds override files.
#[derive(Debug)]
pub struct DirectoryCandidate<D> {
    pub dir: D,
    pub volume: usize,
    pub path: String,
    pub tier: Tier,
    pub score: u32,
    pub aml_files: usize,
}

const WELL_KNOWN_PATHS: &[(&str, Tier)] = &[
    ("EFI\\ACPIPatcher", Tier::CoLocated),
    ("EFI\\ACPIPatcher\\ACPI", Tier::CoLocatedOverride),
    ("EFI\\OC\\Drivers\\ACPI", Tier::DriverBootloader),
    ("EFI\\CLOVER\\drivers\\UEFI\\ACPI", Tier::DriverBootloader),
    ("EFI\\OC\\ACPI", Tier::BootloaderOverride),
    ("EFI\\CLOVER\\ACPI\\patched", Tier::BootloaderOverride),
    ("EFI\\BOOT\\ACPI", Tier::OtherRelative),
    ("EFI\\ACPI", Tier::OtherRelative),
    ("ACPI", Tier::Generic),
];

pub struct Locator<'c> {
    config: &'c PatchConfig,
    image_dir: Option<String>,
}

impl<'c> Locator<'c> {
    #[must_use]
    pub const fn new(config: &'c PatchConfig) -> Self {
        Self {
            config,
            image_dir: None,
        }
    }

    /// Also check paths relative to the directory the patcher image was
    /// loaded from (volume-relative, e.g. `EFI\OC\Drivers`).
    #[must_use]
    pub fn with_image_dir(mut self, image_dir: Option<String>) -> Self {
        self.image_dir = image_dir;
        self
    }

    /// The ordered, de-duplicated list of paths checked on every volume.
    #[must_use]
    pub fn candidate_paths(&self) -> Vec<CandidatePath> {
        let mut paths: Vec<CandidatePath> = Vec::new();
        let mut push = |path: Option<String>, tier: Tier| {
            let Some(path) = path else { return };
            if path.is_empty() || paths.iter().any(|c| c.path.eq_ignore_ascii_case(&path)) {
                return;
            }
            paths.push(CandidatePath { path, tier });
        };

        if let Some(image_dir) = self.image_dir.as_deref() {
            let folder = self.config.override_folder;
            push(join_path(image_dir, ""), Tier::CoLocated);
            push(join_path(image_dir, folder), Tier::CoLocatedOverride);
            push(join_path(image_dir, &format_up(1, folder)), Tier::OtherRelative);
            push(join_path(image_dir, &format_up(2, folder)), Tier::OtherRelative);
        }

        for &(path, tier) in WELL_KNOWN_PATHS {
            push(Some(String::from(path)), tier);
        }
        paths
    }

    /// Search all volumes and return the best candidate, if any.
    pub fn locate<V: Volumes>(&self, volumes: &mut V) -> Option<DirectoryCandidate<V::Dir>> {
        let roots = match volumes.roots() {
            Ok(roots) => roots,
            Err(e) => {
                warn!("Could not enumerate storage volumes: {e}");
                return None;
            }
        };
        info!("Searching {} volume(s) for ACPI override files...", roots.len());

        let paths = self.candidate_paths();
        let mut best: Option<DirectoryCandidate<V::Dir>> = None;

        for (volume, mut root) in roots.into_iter().enumerate() {
            let mut matched_on_volume = false;

            for candidate in &paths {
                let Ok(mut dir) = root.open_dir(&candidate.path) else {
                    trace!("  fs{volume}:\\{} does not exist", candidate.path);
                    continue;
                };
                let aml_files = count_override_files(&mut dir, self.config);
                debug!(
                    "  fs{volume}:\\{}: {aml_files} override file(s)",
                    candidate.path
                );
                if aml_files == 0 {
                    continue;
                }

                matched_on_volume = true;
                consider(
                    &mut best,
                    DirectoryCandidate {
                        dir,
                        volume,
                        path: candidate.path.clone(),
                        tier: candidate.tier,
                        score: score(candidate.tier, aml_files),
                        aml_files,
                    },
                );
            }

            if matched_on_volume {
                continue;
            }

            let aml_files = count_override_files(&mut root, self.config);
            if aml_files > 0 {
                debug!("  fs{volume}:\\: {aml_files} override file(s) in the volume root");
                consider(
                    &mut best,
                    DirectoryCandidate {
                        dir: root,
                        volume,
                        path: String::new(),
                        tier: Tier::VolumeRoot,
                        score: score(Tier::VolumeRoot, aml_files),
                        aml_files,
                    },
                );
            }
        }

        match &best {
            Some(c) => info!(
                "Selected fs{}:\\{} ({} file(s), score {})",
                c.volume, c.path, c.aml_files, c.score
            ),
            None => warn!("No ACPI override files found on any volume"),
        }
        best
    }
}

fn format_up(levels: usize, folder: &str) -> String {
    let mut path = String::new();
    for _ in 0..levels {
        path.push_str("..\\");
    }
    path.push_str(folder);
    path
}

/// Keep the better of `best` and `candidate`; the loser is dropped, which
/// closes its directory handle.
fn consider<D>(best: &mut Option<DirectoryCandidate<D>>, candidate: DirectoryCandidate<D>) {
    let replace = best.as_ref().is_none_or(|current| {
        candidate.score > current.score
            || (candidate.score == current.score && candidate.aml_files > current.aml_files)
    });
    if replace {
        if let Some(previous) = best.as_ref() {
            trace!(
                "  fs{}:\\{} (score {}) replaces fs{}:\\{} (score {})",
                candidate.volume,
                candidate.path,
                candidate.score,
                previous.volume,
                previous.path,
                previous.score
            );
        }
        *best = Some(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_never_overlap() {
        assert!(score(Tier::CoLocatedOverride, 1) > score(Tier::DriverBootloader, 500));
        assert!(score(Tier::Generic, 1) > score(Tier::VolumeRoot, 99));
        assert!(score(Tier::CoLocated, 3) > score(Tier::CoLocated, 2));
        assert_eq!(score(Tier::VolumeRoot, 1000), score(Tier::VolumeRoot, 99));
    }

    #[test]
    fn relative_paths_come_first_and_are_deduplicated() {
        let config = PatchConfig::default();
        let locator =
            Locator::new(&config).with_image_dir(Some(String::from("EFI\\ACPIPatcher")));
        let paths = locator.candidate_paths();

        assert_eq!(paths[0].path, "EFI\\ACPIPatcher");
        assert_eq!(paths[0].tier, Tier::CoLocated);
        assert_eq!(paths[1].path, "EFI\\ACPIPatcher\\ACPI");
        assert_eq!(paths[2].path, "EFI\\ACPI");
        assert_eq!(paths[2].tier, Tier::OtherRelative);
        // Two levels up from EFI\ACPIPatcher is the volume root.
        assert!(paths.iter().filter(|p| p.path == "ACPI").count() == 1);
        assert_eq!(
            paths
                .iter()
                .filter(|p| p.path.eq_ignore_ascii_case("EFI\\ACPIPatcher"))
                .count(),
            1
        );
    }

    #[test]
    fn without_image_dir_only_well_known_paths() {
        let config = PatchConfig::default();
        let paths = Locator::new(&config).candidate_paths();
        assert_eq!(paths.len(), WELL_KNOWN_PATHS.len());
        assert!(paths.windows(2).all(|w| w[0].tier >= w[1].tier));
    }
}
