use std::fmt::Write;

use percent_encoding::AsciiSet;

use crate::config::Charset;

/// Everything except the RFC 3986 unreserved characters: ASCII
/// alphanumerics, `-`, `.`, `_` and `~`.
const UNRESERVED_SET: &AsciiSet = &percent_encoding::NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes a key segment or value for the given charset.
///
/// ## utf-8
/// Unreserved characters are kept, everything else is written as its utf-8
/// bytes, each as an uppercase `%XX`.
///
/// ## iso-8859-1
/// Follows the legacy browser escaping: ASCII alphanumerics and `@*_+-./`
/// are kept, characters below U+0100 become a single `%XX`, and anything
/// else cannot be represented, so each of its utf-16 code units is written
/// as the numeric entity `&#NNNN;` (itself percent-encoded as
/// `%26%23NNNN%3B`).
///
/// ```
/// use nested_qs::{Charset, encode};
///
/// assert_eq!(encode("a b&ä", Charset::Utf8), "a%20b%26%C3%A4");
/// assert_eq!(encode("a b&ä", Charset::Iso88591), "a%20b%26%E4");
/// assert_eq!(encode("☺", Charset::Iso88591), "%26%239786%3B");
/// ```
pub fn encode(input: &str, charset: Charset) -> String {
    if input.is_empty() {
        return String::new();
    }
    match charset {
        Charset::Utf8 => encode_utf8(input.as_bytes()),
        Charset::Iso88591 => encode_latin1(input),
    }
}

/// Encodes raw bytes. In utf-8 the bytes are escaped as they are, so
/// invalid utf-8 survives; in iso-8859-1 they are read as (lossy) text.
pub(crate) fn encode_bytes(input: &[u8], charset: Charset) -> String {
    match charset {
        Charset::Utf8 => encode_utf8(input),
        Charset::Iso88591 => encode_latin1(&String::from_utf8_lossy(input)),
    }
}

fn encode_utf8(input: &[u8]) -> String {
    percent_encoding::percent_encode(input, UNRESERVED_SET).to_string()
}

fn encode_latin1(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '@' | '*' | '_' | '+' | '-' | '.' | '/') {
            encoded.push(c);
            continue;
        }
        let mut units = [0u16; 2];
        for unit in c.encode_utf16(&mut units) {
            // writing into a String cannot fail
            let _ = if *unit < 0x100 {
                write!(encoded, "%{:02X}", unit)
            } else {
                write!(encoded, "%26%23{}%3B", unit)
            };
        }
    }
    encoded
}
