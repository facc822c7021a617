//! # ACPI byte checksums
//!
//! Every ACPI structure carries one checksum byte chosen so that all bytes
//! of the structure add up to zero (mod 256).

/// Wrapping 8-bit sum of `bytes`.
#[must_use]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |a, &b| a.wrapping_add(b))
}

/// The value the byte at `offset` must hold for `bytes` to sum to zero.
///
/// The current content of the checksum byte is ignored, i.e. the sum is
/// taken as if that byte were zero. An out-of-range `offset` is treated the
/// same way.
#[must_use]
pub fn correction_byte(bytes: &[u8], offset: usize) -> u8 {
    let current = bytes.get(offset).copied().unwrap_or(0);
    0u8.wrapping_sub(checksum(bytes).wrapping_sub(current))
}

/// Rewrite the checksum byte at `offset` so that `bytes` sums to zero.
///
/// Returns the previous value of the checksum byte.
pub fn fix_checksum(bytes: &mut [u8], offset: usize) -> u8 {
    let Some(&old) = bytes.get(offset) else {
        return 0;
    };
    bytes[offset] = correction_byte(bytes, offset);
    old
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_wraps() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0xff, 0x02]), 0x01);
        assert_eq!(checksum(&[0x80; 4]), 0x00);
    }

    #[test]
    fn correction_ignores_current_checksum_byte() {
        let a = [1u8, 2, 0x00, 4];
        let b = [1u8, 2, 0x77, 4];
        assert_eq!(correction_byte(&a, 2), correction_byte(&b, 2));
        assert_eq!(correction_byte(&a, 2), 0xF9);
    }

    #[test]
    fn fixed_region_sums_to_zero() {
        let mut bytes = *b"XSDT\x24\x00\x00\x00\x01\x55OEMID TABLEID_";
        let old = fix_checksum(&mut bytes, 9);
        assert_eq!(old, 0x55);
        assert_eq!(checksum(&bytes), 0);

        // Idempotent once fixed.
        let before = bytes;
        fix_checksum(&mut bytes, 9);
        assert_eq!(bytes, before);
    }

    #[test]
    fn out_of_range_offset_is_a_no_op() {
        let mut bytes = [1u8, 2, 3];
        assert_eq!(fix_checksum(&mut bytes, 7), 0);
        assert_eq!(bytes, [1, 2, 3]);
    }
}
