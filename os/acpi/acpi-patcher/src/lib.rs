//! # ACPI Table Patching Engine
//!
//! Replaces the platform DSDT and adds supplementary tables from `.aml`
//! files on a boot volume, before the operating system takes over.
//!
//! ## Session Flow
//!
//! ```text
//! EngineContext::discover      RSDP → XSDT → FADT, copied into owned buffers
//!     ↓
//! resolve directory            hint, hint\ACPI, or Locator over all volumes
//!     ↓
//! Mutator::new                 XSDT capacity grown once (16 free slots)
//!     ↓
//! OverrideEntries + classify   DSDT, SSDT-1..10, SSDT-<tag>, other *.aml
//!     ↓
//! load + replace/append        per-file failures are logged and skipped
//!     ↓
//! Mutator::commit              tables → FADT → new XSDT → RSDP (last)
//! ```
//!
//! ## Key Components
//!
//! ### Storage ([`storage`], [`classify`], [`loader`], [`locator`])
//! * **Traits**: [`Volumes`] and [`Directory`] stand in for the firmware's
//!   file protocols
//! * **Classification**: File names decide what an override is for
//! * **Loading**: Files are read whole and validated strictly
//! * **Discovery**: Scored search for the override directory across volumes
//!
//! ### Table Set ([`arena`], [`directory`], [`mutator`], [`context`])
//! * **Arena**: Loaded tables are owned until commit and referenced by handle
//! * **Directory**: The XSDT as a list of firmware addresses and handles
//! * **Mutator**: Capacity-checked replace and append, ordered commit
//!
//! ### Orchestration ([`session`], [`deferred`])
//! * **Patcher**: One session from discovery to commit, with a report
//! * **Coordinator**: Run now, or once storage becomes available
//!
//! ## Error Handling
//!
//! Only [`PatchError`] ends a session. Unreadable or invalid files and a
//! full XSDT are logged and counted in [`PatchReport::skipped`].

#![cfg_attr(not(any(test, doctest)), no_std)]
extern crate alloc;

pub mod arena;
pub mod classify;
pub mod config;
pub mod context;
pub mod deferred;
pub mod directory;
mod dump;
pub mod error;
pub mod loader;
pub mod locator;
pub mod mutator;
pub mod session;
pub mod storage;

pub use crate::config::PatchConfig;
pub use crate::context::EngineContext;
pub use crate::deferred::{Coordinator, CoordinatorState};
pub use crate::error::{PatchError, RootError};
pub use crate::session::{PatchReport, Patcher};
pub use crate::storage::{DirEntry, Directory, StorageError, Volumes};
