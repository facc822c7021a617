//! # Deferred execution
//!
//! A patcher loaded as a driver may start before any file system is
//! mounted. The [`Coordinator`] then parks the session until the
//! environment reports storage, runs it exactly once, and stays done:
//!
//! ```text
//!              storage ready at start
//!   start ─────────────────────────────┐
//!     │                                ▼
//!     └──► AwaitingStorage ──notify──► Running ──► Done
//!                 ▲    (single-shot)
//!                 └── no notification: stays here for this boot
//! ```

use crate::error::PatchError;
use crate::session::PatchReport;
use log::{debug, error, info, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CoordinatorState {
    AwaitingStorage,
    Running,
    Done,
}

/// Runs a patch session now or once storage becomes available.
pub struct Coordinator<F>
where
    F: FnOnce() -> Result<PatchReport, PatchError>,
{
    state: CoordinatorState,
    continuation: Option<F>,
    outcome: Option<Result<PatchReport, PatchError>>,
}

impl<F> Coordinator<F>
where
    F: FnOnce() -> Result<PatchReport, PatchError>,
{
    /// A coordinator that will run `session`.
    pub const fn new(session: F) -> Self {
        Self {
            state: CoordinatorState::AwaitingStorage,
            continuation: Some(session),
            outcome: None,
        }
    }

    /// Run the session if `storage_ready`, otherwise call `arm` once to
    /// register the storage-ready notification.
    ///
    /// # Errors
    /// Propagates the error of `arm`; the coordinator stays in
    /// [`CoordinatorState::AwaitingStorage`] in that case.
    pub fn start<E>(
        &mut self,
        storage_ready: bool,
        arm: impl FnOnce() -> Result<(), E>,
    ) -> Result<CoordinatorState, E> {
        if self.state != CoordinatorState::AwaitingStorage || self.continuation.is_none() {
            warn!("Patch session already started");
            return Ok(self.state);
        }

        if storage_ready {
            debug!("Storage is available, patching now");
            self.run();
        } else {
            info!("No storage available yet, waiting for a file system to appear");
            arm()?;
        }
        Ok(self.state)
    }

    /// Handle the storage-ready notification.
    ///
    /// Returns `true` if this call ran the session. Later calls do nothing.
    pub fn on_storage_ready(&mut self) -> bool {
        if self.state != CoordinatorState::AwaitingStorage {
            debug!("Storage notification ignored in state {:?}", self.state);
            return false;
        }
        info!("Storage is now available, resuming");
        self.run()
    }

    #[must_use]
    pub const fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Result of the session once it has run.
    #[must_use]
    pub const fn outcome(&self) -> Option<&Result<PatchReport, PatchError>> {
        self.outcome.as_ref()
    }

    fn run(&mut self) -> bool {
        let Some(session) = self.continuation.take() else {
            return false;
        };
        self.state = CoordinatorState::Running;
        let outcome = session();
        match &outcome {
            Ok(report) => info!("Deferred ACPI patching finished: {report}"),
            Err(e) => error!("Deferred ACPI patching failed: {e}"),
        }
        self.outcome = Some(outcome);
        self.state = CoordinatorState::Done;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn report() -> PatchReport {
        PatchReport {
            processed: 2,
            added: 2,
            ..PatchReport::default()
        }
    }

    #[test]
    fn runs_immediately_when_storage_is_ready() {
        let runs = Cell::new(0);
        let mut c = Coordinator::new(|| {
            runs.set(runs.get() + 1);
            Ok(report())
        });
        let state = c.start(true, || -> Result<(), ()> { panic!("must not arm") });
        assert_eq!(state, Ok(CoordinatorState::Done));
        assert_eq!(runs.get(), 1);
        assert_eq!(c.outcome(), Some(&Ok(report())));
        assert!(!c.on_storage_ready());
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn waits_for_exactly_one_notification() {
        let runs = Cell::new(0);
        let armed = Cell::new(0);
        let mut c = Coordinator::new(|| {
            runs.set(runs.get() + 1);
            Err(PatchError::StorageUnavailable)
        });

        let state = c.start(false, || -> Result<(), ()> {
            armed.set(armed.get() + 1);
            Ok(())
        });
        assert_eq!(state, Ok(CoordinatorState::AwaitingStorage));
        assert_eq!((armed.get(), runs.get()), (1, 0));
        assert!(c.outcome().is_none());

        assert!(c.on_storage_ready());
        assert_eq!(c.state(), CoordinatorState::Done);
        assert_eq!(c.outcome(), Some(&Err(PatchError::StorageUnavailable)));

        assert!(!c.on_storage_ready());
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn arming_failure_keeps_waiting() {
        let mut c = Coordinator::new(|| Ok(report()));
        assert_eq!(c.start(false, || Err("no events")), Err("no events"));
        assert_eq!(c.state(), CoordinatorState::AwaitingStorage);
    }
}
