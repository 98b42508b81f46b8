use crate::config::Charset;

/// `utf8=✓` with the checkmark percent-encoded as utf-8.
pub const UTF8_SENTINEL: &str = "utf8=%E2%9C%93";

/// `utf8=&#10003;` percent-encoded: what browsers send for the checkmark
/// when the form is submitted as iso-8859-1.
pub const ISO_SENTINEL: &str = "utf8=%26%2310003%3B";

pub(crate) const SENTINEL_KEY: &str = "utf8=";

/// Member names a prototype-carrying map would already answer to. Pairs
/// whose key path names one of these are dropped unless explicitly allowed.
const RESERVED_NAMES: &[&str] = &[
    "__defineGetter__",
    "__defineSetter__",
    "__lookupGetter__",
    "__lookupSetter__",
    "__proto__",
    "constructor",
    "hasOwnProperty",
    "isPrototypeOf",
    "propertyIsEnumerable",
    "toLocaleString",
    "toString",
    "valueOf",
];

pub(crate) fn is_reserved_name(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

pub(crate) fn sentinel_for(charset: Charset) -> &'static str {
    match charset {
        Charset::Utf8 => UTF8_SENTINEL,
        Charset::Iso88591 => ISO_SENTINEL,
    }
}

/// Parses `s` as an array index only if it is written canonically:
/// ascii digits, no sign, and no leading zeros (`"0"` itself is fine).
pub(crate) fn canonical_index(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod test {
    use super::{canonical_index, is_reserved_name};

    #[test]
    fn canonical_indices() {
        assert_eq!(canonical_index("0"), Some(0));
        assert_eq!(canonical_index("17"), Some(17));
        assert_eq!(canonical_index("007"), None);
        assert_eq!(canonical_index("-1"), None);
        assert_eq!(canonical_index("+1"), None);
        assert_eq!(canonical_index("1e3"), None);
        assert_eq!(canonical_index(""), None);
        assert_eq!(canonical_index("99999999999999999999999"), None);
    }

    #[test]
    fn reserved_names() {
        assert!(is_reserved_name("__proto__"));
        assert!(is_reserved_name("hasOwnProperty"));
        assert!(!is_reserved_name("proto"));
    }
}
