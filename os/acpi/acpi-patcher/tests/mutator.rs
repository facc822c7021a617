mod common;

use acpi_patcher::{EngineContext, PatchError};
use acpi_patcher::directory::{Entry, MutateError};
use acpi_patcher::mutator::{DsdtOutcome, Mutator};
use acpi_tables::{AcpiTable, MemoryError, Signature, ValidationMode};
use common::*;

fn loaded(signature: Signature, len: usize) -> AcpiTable {
    AcpiTable::parse(table(signature, len), ValidationMode::Strict).expect("valid table")
}

fn mutator(mem: &FakeMemory) -> Mutator {
    let ctx = EngineContext::discover(mem, RSDP_ADDR).expect("firmware tables");
    Mutator::new(ctx, 16)
}

#[test]
fn commit_without_changes_keeps_the_rsdp() {
    let mut mem = firmware();
    let before = root_pointer(&mem);

    let m = mutator(&mem);
    assert!(!m.is_dirty());
    let summary = m.commit(&mut mem).expect("commit");

    assert!(!summary.repointed);
    assert!(!summary.dsdt_installed);
    assert_eq!(summary.xsdt_address, XSDT_ADDR);
    assert_eq!(summary.entries, 3);
    assert_eq!(root_pointer(&mem), before);
    assert_eq!(mem.allocations, 0);
    assert!(current_fadt(&mem).table().checksum_valid());
}

#[test]
fn grown_directory_takes_exactly_sixteen_appends() {
    let mem = firmware();
    let mut m = mutator(&mem);
    assert_eq!(m.context().directory.capacity(), 3 + 16);

    for i in 0..16 {
        assert_eq!(m.append(loaded(Signature::SSDT, 40)), Ok(3 + i));
    }
    assert_eq!(
        m.append(loaded(Signature::SSDT, 40)),
        Err(MutateError::CapacityExceeded { capacity: 19 })
    );
    // The rejected table was not kept.
    assert_eq!(m.arena().len(), 16);
}

#[test]
fn dsdt_replacement_only_touches_its_slot() {
    let mut mem = firmware();
    let mut m = mutator(&mem);

    let outcome = m
        .replace_dsdt(&mem, loaded(Signature::DSDT, 72), false)
        .expect("DSDT entry exists");
    assert_eq!(outcome, DsdtOutcome::Replaced { slot: 1 });
    assert_eq!(m.context().directory.len(), 3);
    assert!(matches!(m.context().directory.entries()[1], Entry::Loaded(_)));

    let summary = m.commit(&mut mem).expect("commit");
    assert!(summary.repointed && summary.dsdt_installed);

    let entries = xsdt_entries(&mem);
    assert_eq!(entries[0], FADT_ADDR);
    assert_eq!(entries[2], SSDT_ADDR);
    assert_eq!(signature_at(&mem, entries[1]), Signature::DSDT);
    assert_eq!(current_fadt(&mem).x_dsdt(), Some(entries[1]));
}

#[test]
fn missing_dsdt_entry_is_reported() {
    let mem = firmware_with(&[FADT_ADDR, SSDT_ADDR], fadt(DSDT_ADDR));
    let mut m = mutator(&mem);

    assert_eq!(
        m.replace_dsdt(&mem, loaded(Signature::DSDT, 72), false),
        Err(MutateError::NotFound(Signature::DSDT))
    );
    assert!(!m.is_dirty());
    assert!(m.arena().is_empty());

    assert_eq!(
        m.replace_dsdt(&mem, loaded(Signature::DSDT, 72), true),
        Ok(DsdtOutcome::FadtOnly)
    );
    assert!(m.is_dirty());
}

#[test]
fn a_second_dsdt_supersedes_the_first() {
    let mut mem = firmware();
    let mut m = mutator(&mem);

    m.replace_dsdt(&mem, loaded(Signature::DSDT, 72), false)
        .expect("first");
    m.replace_dsdt(&mem, loaded(Signature::DSDT, 88), false)
        .expect("second");
    assert_eq!(m.arena().len(), 2);

    m.commit(&mut mem).expect("commit");
    let entries = xsdt_entries(&mem);
    assert_eq!(entries.len(), 3);
    let dsdt = current_fadt(&mem).x_dsdt().expect("ACPI 2.0 FADT");
    assert_eq!(entries[1], dsdt);
    assert_eq!(mem.bytes(dsdt, 8)[4..8], 88u32.to_le_bytes());
    // Only the tables still referenced were installed, plus the XSDT.
    assert_eq!(mem.allocations, 2);
}

#[test]
fn failed_allocations_leave_the_firmware_tables_alone() {
    // Allocation order: DSDT, SSDT, then the new XSDT.
    for (n, len) in [(1, 72), (2, 40), (3, 36 + 19 * 8)] {
        let mut mem = firmware();
        let rsdp = root_pointer(&mem);
        let fadt_bytes = mem.bytes(FADT_ADDR, 244);

        let mut m = mutator(&mem);
        m.replace_dsdt(&mem, loaded(Signature::DSDT, 72), false)
            .expect("DSDT entry exists");
        m.append(loaded(Signature::SSDT, 40)).expect("room");

        mem.fail_allocation(n);
        assert_eq!(
            m.commit(&mut mem),
            Err(PatchError::Memory(MemoryError::OutOfMemory { len }))
        );

        assert_eq!(root_pointer(&mem), rsdp);
        assert_eq!(mem.bytes(FADT_ADDR, 244), fadt_bytes);
        assert_eq!(xsdt_entries(&mem), vec![FADT_ADDR, DSDT_ADDR, SSDT_ADDR]);
        assert_eq!(mem.live_allocations(), 0, "allocation {n} failed");
    }
}
