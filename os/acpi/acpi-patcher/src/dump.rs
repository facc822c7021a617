//! # Hex dumps for trace logging

use core::fmt;
use log::{Level, log_enabled, trace};

/// Bytes shown per dump.
pub const DUMP_LIMIT: usize = 64;

/// One 16-byte row: `00000000: 53 53 44 54 ...  |SSDT....|`.
struct Row<'a> {
    address: u64,
    bytes: &'a [u8],
}

impl fmt::Display for Row<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}: ", self.address)?;
        for i in 0..16 {
            match self.bytes.get(i) {
                Some(b) => write!(f, "{b:02x} ")?,
                None => f.write_str("   ")?,
            }
        }
        f.write_str(" |")?;
        for &b in self.bytes {
            let c = if b.is_ascii_graphic() || b == b' ' {
                char::from(b)
            } else {
                '.'
            };
            fmt::Write::write_char(f, c)?;
        }
        f.write_str("|")
    }
}

/// Trace-log the first [`DUMP_LIMIT`] bytes of `bytes`, labelled with
/// `base` as the address of the first byte.
pub fn trace_hex_dump(bytes: &[u8], base: u64) {
    if !log_enabled!(Level::Trace) {
        return;
    }
    let shown = &bytes[..bytes.len().min(DUMP_LIMIT)];
    trace!("Memory dump at {base:#x} ({} bytes):", shown.len());
    let mut address = base;
    for chunk in shown.chunks(16) {
        trace!("{}", Row { address, bytes: chunk });
        address += 16;
    }
}
