//! Storage-ready notification for the driver build.
//!
//! The coordinator is leaked and handed to the firmware as the event
//! context; it lives for the rest of the boot. Only the raw pointer made
//! from the leak is used to reach it.

#![allow(unsafe_code)]

use crate::file_system::UefiVolumes;
use acpi_patcher::{Coordinator, CoordinatorState, PatchError, PatchReport};
use alloc::boxed::Box;
use core::ffi::c_void;
use core::ptr::NonNull;
use log::{debug, warn};
use uefi::boot::{self, EventType, Tpl};
use uefi::Event;

type Session = fn() -> Result<PatchReport, PatchError>;

/// Run `session` now if a file system is mounted, otherwise once the first
/// one appears.
///
/// # Errors
/// A firmware error if the notification cannot be registered.
pub fn start(session: Session) -> uefi::Result<CoordinatorState> {
    let coordinator = NonNull::from(Box::leak(Box::new(Coordinator::new(session))));
    let context = coordinator.cast::<c_void>();
    // SAFETY: the coordinator is leaked, so the pointer stays valid, and
    // every access goes through it. At `TPL_CALLBACK` the notification
    // cannot run until `start` has returned and the guard is dropped.
    unsafe {
        let _tpl = boot::raise_tpl(Tpl::CALLBACK);
        (*coordinator.as_ptr()).start(UefiVolumes::available(), || arm(context))
    }
}

fn arm(context: NonNull<c_void>) -> uefi::Result<()> {
    // SAFETY: `on_file_system` only dereferences `context`, which points to
    // a leaked coordinator.
    let event = unsafe {
        boot::create_event(
            EventType::NOTIFY_SIGNAL,
            Tpl::CALLBACK,
            Some(on_file_system),
            Some(context),
        )?
    };
    if let Err(e) = boot::register_protocol_notify(UefiVolumes::protocol_guid(), &event) {
        let _ = boot::close_event(event);
        return Err(e);
    }
    debug!("Waiting for a Simple File System protocol instance");
    Ok(())
}

unsafe extern "efiapi" fn on_file_system(event: Event, context: Option<NonNull<c_void>>) {
    if let Some(context) = context {
        // SAFETY: set in `arm` to the leaked coordinator. The event is
        // closed below, so this runs at most once per arming.
        let coordinator = unsafe { context.cast::<Coordinator<Session>>().as_mut() };
        coordinator.on_storage_ready();
    }
    if let Err(e) = boot::close_event(event) {
        warn!("Cannot close the storage notification: {e}");
    }
}
