use std::borrow::Cow;
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::config::Charset;

static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(\d+);").expect("numeric entity pattern is valid"));

#[inline(always)]
fn char_to_digit(c: u8) -> Option<u8> {
    char::from(c).to_digit(16).map(|d| d as u8)
}

/// Decodes a raw key or value, applying the following:
/// - Replaces `+` with a space
/// - Decodes percent-encoded characters for the given charset
///
/// Decoding never fails. In iso-8859-1 every well formed `%XX` becomes the
/// latin-1 character `XX` and anything else is kept as is. In utf-8 the
/// escapes must all be well formed and spell valid utf-8, otherwise the
/// input is returned with only the `+` replacement applied.
pub fn decode(input: &str, charset: Charset) -> String {
    let spaced = if input.contains('+') {
        Cow::Owned(input.replace('+', " "))
    } else {
        Cow::Borrowed(input)
    };

    if !spaced.contains('%') {
        return spaced.into_owned();
    }

    match charset {
        Charset::Iso88591 => decode_latin1(&spaced),
        Charset::Utf8 => match decode_utf8(&spaced) {
            Some(decoded) => decoded,
            None => {
                tracing::trace!(input = %spaced, "malformed utf-8 escape, keeping raw text");
                spaced.into_owned()
            }
        },
    }
}

fn decode_utf8(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            // a lone or truncated `%` makes the whole string undecodable
            if idx + 2 >= bytes.len()
                || char_to_digit(bytes[idx + 1]).is_none()
                || char_to_digit(bytes[idx + 2]).is_none()
            {
                return None;
            }
            idx += 3;
        } else {
            idx += 1;
        }
    }
    percent_decode_str(input)
        .decode_utf8()
        .ok()
        .map(Cow::into_owned)
}

fn decode_latin1(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = String::with_capacity(input.len());
    let mut last_segment = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        if bytes[idx] == b'%' && idx + 2 < bytes.len() {
            if let (Some(h), Some(l)) = (
                char_to_digit(bytes[idx + 1]),
                char_to_digit(bytes[idx + 2]),
            ) {
                decoded.push_str(&input[last_segment..idx]);
                decoded.push(char::from(h * 0x10 + l));
                idx += 3;
                last_segment = idx;
                continue;
            }
        }
        idx += 1;
    }

    decoded.push_str(&input[last_segment..]);
    decoded
}

/// Replaces `&#NNNN;` with the character it names. A high surrogate entity
/// directly followed by a low surrogate entity names one character. Entities
/// that do not name a valid unicode scalar are left alone.
pub fn interpret_numeric_entities(input: &str) -> Cow<'_, str> {
    if !input.contains("&#") {
        return Cow::Borrowed(input);
    }

    let mut output = String::with_capacity(input.len());
    let mut last = 0;
    // a high surrogate waiting for its low half, and where its text ends
    let mut pending: Option<(u16, usize)> = None;

    for caps in NUMERIC_ENTITY.captures_iter(input) {
        let Some(entity) = caps.get(0) else {
            continue;
        };
        let unit = caps[1].parse::<u32>().ok();

        if let Some((high, end)) = pending.take() {
            let low = unit
                .filter(|_| entity.start() == end)
                .and_then(|unit| u16::try_from(unit).ok())
                .filter(|unit| (0xDC00..=0xDFFF).contains(unit));
            if let Some(low) = low {
                if let Some(Ok(c)) = char::decode_utf16([high, low]).next() {
                    output.push(c);
                    last = entity.end();
                    continue;
                }
            }
            output.push_str(&input[last..end]);
            last = end;
        }

        output.push_str(&input[last..entity.start()]);
        last = entity.start();
        match unit {
            Some(unit @ 0xD800..=0xDBFF) => {
                pending = Some((unit as u16, entity.end()));
            }
            Some(unit) => match char::from_u32(unit) {
                Some(c) => {
                    output.push(c);
                    last = entity.end();
                }
                None => tracing::trace!(entity = entity.as_str(), "keeping invalid entity"),
            },
            None => {}
        }
    }

    if let Some((_, end)) = pending {
        output.push_str(&input[last..end]);
        last = end;
    }
    output.push_str(&input[last..]);
    Cow::Owned(output)
}

#[cfg(test)]
mod test {
    use super::{decode, interpret_numeric_entities};
    use crate::config::Charset;

    #[test]
    fn decodes_plus_and_escapes() {
        assert_eq!(decode("a+b%20c", Charset::Utf8), "a b c");
        assert_eq!(decode("%C3%A4", Charset::Utf8), "ä");
        assert_eq!(decode("%e2%9c%93", Charset::Utf8), "✓");
    }

    #[test]
    fn malformed_utf8_passes_through() {
        assert_eq!(decode("100%", Charset::Utf8), "100%");
        assert_eq!(decode("%zz+%41", Charset::Utf8), "%zz %41");
        assert_eq!(decode("%FF", Charset::Utf8), "%FF");
        assert_eq!(decode("%E2%9C", Charset::Utf8), "%E2%9C");
    }

    #[test]
    fn latin1_decodes_each_escape() {
        assert_eq!(decode("%E4", Charset::Iso88591), "ä");
        assert_eq!(decode("%C3%A4", Charset::Iso88591), "Ã¤");
        assert_eq!(decode("%zz%41%", Charset::Iso88591), "%zzA%");
        assert_eq!(decode("caf%E9+au+lait", Charset::Iso88591), "café au lait");
    }

    #[test]
    fn numeric_entities() {
        assert_eq!(interpret_numeric_entities("&#9786;"), "☺");
        assert_eq!(interpret_numeric_entities("a &#128512; b"), "a 😀 b");
        assert_eq!(interpret_numeric_entities("&#55296;"), "&#55296;");
        assert_eq!(interpret_numeric_entities("&#1114112;"), "&#1114112;");
        assert_eq!(interpret_numeric_entities("&#x41;"), "&#x41;");
        assert_eq!(interpret_numeric_entities("plain"), "plain");
    }

    #[test]
    fn surrogate_entity_pairs() {
        assert_eq!(interpret_numeric_entities("&#55357;&#56832;"), "😀");
        assert_eq!(interpret_numeric_entities("a&#55357;&#56832;b&#9786;"), "a😀b☺");
        assert_eq!(interpret_numeric_entities("&#65;&#55357;&#56832;"), "A😀");
        // lone or separated halves stay as text
        assert_eq!(interpret_numeric_entities("&#55357;x&#56832;"), "&#55357;x&#56832;");
        assert_eq!(interpret_numeric_entities("&#56832;&#55357;"), "&#56832;&#55357;");
        assert_eq!(
            interpret_numeric_entities("&#55357;&#55357;&#56832;"),
            "&#55357;😀"
        );
        assert_eq!(interpret_numeric_entities("x&#55357;"), "x&#55357;");
    }
}
