//! Character encoding detection for XML members of an archive.
//!
//! OCF manifests are almost always UTF-8, but the XML rules allow any
//! encoding announced by a byte order mark or by the `encoding`
//! pseudo-attribute of the XML declaration. This module picks the encoding
//! and transcodes the raw member bytes to UTF-8 with `encoding_rs`.
//!
//! Precedence: byte order mark, then the XML declaration, then the encoding
//! declared by the caller, then UTF-8.

use crate::common::{Error, Result};
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use memchr::memmem;
use std::borrow::Cow;

/// Only this many leading bytes are searched for the XML declaration.
const DECLARATION_SCAN_LIMIT: usize = 1024;

/// Resolve an encoding label (`"utf-8"`, `"latin1"`, `"Shift_JIS"`, ...).
///
/// # Examples
/// ```
/// use ocf_reader::common::encoding::encoding_for_label;
///
/// assert_eq!(encoding_for_label("UTF-8").unwrap().name(), "UTF-8");
/// assert!(encoding_for_label("no-such-charset").is_none());
/// ```
#[inline]
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Detect the encoding of an XML byte stream.
///
/// Returns the encoding and the number of leading BOM bytes to skip.
pub fn detect_encoding(bytes: &[u8], declared: &str) -> (&'static Encoding, usize) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return (encoding, bom_len);
    }

    // UTF-16 without a BOM still starts with "<?" in one of the two byte orders
    if bytes.starts_with(b"<\0?\0") {
        return (UTF_16LE, 0);
    }
    if bytes.starts_with(b"\0<\0?") {
        return (UTF_16BE, 0);
    }

    if let Some(encoding) = declaration_encoding(bytes) {
        // A readable declaration means the stream is ASCII-compatible, so a
        // UTF-16 label here is wrong and gets ignored.
        if encoding != UTF_16LE && encoding != UTF_16BE {
            return (encoding, 0);
        }
    }

    (encoding_for_label(declared).unwrap_or(UTF_8), 0)
}

/// Read the `encoding` pseudo-attribute of a leading `<?xml ...?>` declaration.
fn declaration_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    if !bytes.starts_with(b"<?xml") {
        return None;
    }
    let head = &bytes[..bytes.len().min(DECLARATION_SCAN_LIMIT)];
    let end = memmem::find(head, b"?>")?;
    let decl = &head[..end];

    let pos = memmem::find(decl, b"encoding")?;
    let rest = &decl[pos + b"encoding".len()..];
    let rest = trim_ascii_start(rest).strip_prefix(b"=")?;
    let rest = trim_ascii_start(rest);

    let quote = *rest.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value = &rest[1..];
    let close = memchr::memchr(quote, value)?;
    Encoding::for_label(&value[..close])
}

#[inline]
fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// Transcode raw XML bytes to UTF-8.
///
/// Returns the text together with the encoding it was decoded from. With
/// `lossy` set, malformed sequences become U+FFFD; otherwise they are an
/// [`Error::Encoding`].
pub fn decode_xml<'a>(
    bytes: &'a [u8],
    declared: &str,
    lossy: bool,
) -> Result<(Cow<'a, str>, &'static Encoding)> {
    let (encoding, bom_len) = detect_encoding(bytes, declared);
    tracing::trace!(encoding = encoding.name(), bom_len, "decoding XML member");

    let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
    if had_errors && !lossy {
        return Err(Error::Encoding(format!(
            "malformed {} byte sequence",
            encoding.name()
        )));
    }
    Ok((text, encoding))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bom_wins_over_declaration() {
        let bytes = b"\xEF\xBB\xBF<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a/>";
        let (encoding, bom_len) = detect_encoding(bytes, "windows-1252");
        assert_eq!(encoding, UTF_8);
        assert_eq!(bom_len, 3);
    }

    #[test]
    fn test_declaration_encoding() {
        let bytes = b"<?xml version='1.0' encoding = 'ISO-8859-1' ?><a>\xE9</a>";
        let (text, _) = decode_xml(bytes, "utf-8", false).unwrap();
        assert!(text.contains("<a>\u{e9}</a>"));
    }

    #[test]
    fn test_declared_encoding_used_without_declaration() {
        let bytes = b"<a>\xE9</a>";
        let (text, encoding) = decode_xml(bytes, "windows-1252", false).unwrap();
        assert_eq!(text, "<a>\u{e9}</a>");
        assert_eq!(encoding.name(), "windows-1252");
    }

    #[test]
    fn test_bogus_utf16_declaration_ignored() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"UTF-16\"?><a/>";
        let (encoding, _) = detect_encoding(bytes, "utf-8");
        assert_eq!(encoding, UTF_8);
    }

    #[test]
    fn test_utf16le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<a/>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_xml(&bytes, "utf-8", false).unwrap().0, "<a/>");
    }

    #[test]
    fn test_malformed_utf8() {
        let bytes = b"<a>\xFF</a>";
        assert!(matches!(
            decode_xml(bytes, "utf-8", false),
            Err(Error::Encoding(_))
        ));
        assert_eq!(decode_xml(bytes, "utf-8", true).unwrap().0, "<a>\u{fffd}</a>");
    }
}
