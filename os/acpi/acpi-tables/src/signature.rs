//! # Table signatures

use core::fmt;

/// A four-character ACPI table signature such as `DSDT` or `FACP`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Signature(pub [u8; 4]);

impl Signature {
    pub const DSDT: Self = Self(*b"DSDT");
    pub const SSDT: Self = Self(*b"SSDT");
    pub const FADT: Self = Self(*b"FACP");
    pub const XSDT: Self = Self(*b"XSDT");
    pub const RSDT: Self = Self(*b"RSDT");

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// A zero signature never identifies a real table.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.as_u32() == 0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Ascii(&self.0), f)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(\"{self}\")")
    }
}

/// Displays a fixed-width ASCII field (OEM IDs, signatures), replacing
/// non-printable bytes with `.` and dropping trailing NULs and spaces.
pub struct Ascii<'a>(pub &'a [u8]);

impl fmt::Display for Ascii<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self
            .0
            .iter()
            .rposition(|&b| b != 0 && b != b' ')
            .map_or(0, |i| i + 1);
        for &b in &self.0[..end] {
            let c = if b.is_ascii_graphic() || b == b' ' {
                char::from(b)
            } else {
                '.'
            };
            fmt::Write::write_char(f, c)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_view_is_little_endian() {
        assert_eq!(Signature::FADT.as_u32(), 0x5043_4146);
        assert!(Signature([0; 4]).is_zero());
    }

    #[test]
    fn display_masks_garbage() {
        assert_eq!(Signature(*b"SS\x01T").to_string(), "SS.T");
        assert_eq!(Ascii(b"ALASKA\0\0").to_string(), "ALASKA");
        assert_eq!(Ascii(b"A M I   ").to_string(), "A M I");
    }
}
