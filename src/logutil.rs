//! Helpers for logging raw modem traffic on a single line.
//!
//! Modem replies are full of CR/LF pairs, the occasional 0x1A terminator and
//! line noise from the UART. Logging them verbatim splits one exchange across
//! many log lines, so everything goes through [`escape_response`] first.

use std::fmt::Write;

const MAX_PREVIEW: usize = 300;

/// Escape modem bytes for single-line logging:
/// - `\r` => `\\r`, `\n` => `\\n`, `\t` => `\\t`
/// - backslash => `\\\\`
/// - other control and non-ASCII bytes => `\\xNN`
///
/// Output is capped at 300 rendered characters with a trailing ellipsis.
pub fn escape_response(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().min(MAX_PREVIEW) + 8);
    for (count, &b) in data.iter().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7E => out.push(b as char),
            _ => {
                let _ = write!(&mut out, "\\x{:02X}", b);
            }
        }
    }
    out
}

/// Same as [`escape_response`] for already-decoded text.
pub fn escape_log(s: &str) -> String {
    escape_response(s.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_line_endings_and_terminator() {
        assert_eq!(
            escape_response(b"\r\nSEND OK\r\n\x1a"),
            "\\r\\nSEND OK\\r\\n\\x1A"
        );
    }

    #[test]
    fn truncates_long_output() {
        let long = vec![b'A'; 400];
        let esc = escape_response(&long);
        assert!(esc.ends_with('…'));
        assert_eq!(esc.chars().count(), MAX_PREVIEW + 1);
    }
}
