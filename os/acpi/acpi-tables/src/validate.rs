//! # Table validation
//!
//! Structural and checksum checks for a candidate table blob. Override
//! files coming from storage are always checked [`ValidationMode::Strict`];
//! [`ValidationMode::Lenient`] exists for firmware tables that get
//! re-checksummed before anyone looks at them again.

use crate::checksum::checksum;
use crate::header::SdtHeader;
use crate::signature::Signature;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValidationMode {
    /// A checksum residual is an error.
    Strict,
    /// A checksum residual is reported through [`Validated::residual`].
    Lenient,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("table too small: {required} bytes required, {available} available")]
    TooSmall { required: usize, available: usize },
    #[error("invalid table: zero signature")]
    InvalidTable,
    #[error("checksum mismatch in {signature} table (residual {residual:#04x})")]
    ChecksumMismatch { signature: Signature, residual: u8 },
    #[error("expected a {expected} table, found {found}")]
    UnexpectedSignature {
        expected: Signature,
        found: Signature,
    },
}

/// Outcome of a successful validation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Validated {
    pub header: SdtHeader,
    /// Byte sum over the declared length; zero for a well-formed table.
    pub residual: u8,
}

/// Validate the table at the start of `blob`, of which `declared_size`
/// bytes are known to be valid (e.g. the number of bytes read from a file).
///
/// # Errors
/// * [`TableError::TooSmall`] if fewer than 36 bytes are available, if the
///   header length does not cover the header, or if the header claims more
///   bytes than are available.
/// * [`TableError::InvalidTable`] if the signature is zero.
/// * [`TableError::ChecksumMismatch`] in strict mode if the bytes do not
///   sum to zero.
pub fn validate(
    blob: &[u8],
    declared_size: usize,
    mode: ValidationMode,
) -> Result<Validated, TableError> {
    let available = declared_size.min(blob.len());
    let Some(header) = SdtHeader::parse(&blob[..available]) else {
        return Err(TableError::TooSmall {
            required: SdtHeader::SIZE,
            available,
        });
    };

    let length = header.table_len();
    if length > available {
        return Err(TableError::TooSmall {
            required: length,
            available,
        });
    }

    if length < SdtHeader::SIZE {
        return Err(TableError::TooSmall {
            required: SdtHeader::SIZE,
            available: length,
        });
    }

    if header.signature.is_zero() {
        return Err(TableError::InvalidTable);
    }

    let residual = checksum(&blob[..length]);
    if residual != 0 && mode == ValidationMode::Strict {
        return Err(TableError::ChecksumMismatch {
            signature: header.signature,
            residual,
        });
    }

    Ok(Validated { header, residual })
}
