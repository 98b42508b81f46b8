//! Parsing support for querystrings.
//!
//! ### An overview of the design
//!
//! Parsing runs in two passes. The `parse` module first splits the input into
//! flat `(key, value)` pairs: it applies the delimiter and parameter limit,
//! handles the charset sentinel, and decodes keys and values. Repeated keys
//! are collected into sequences at this stage, so `a=b&a=c` is a single pair
//! `a => [b, c]`.
//!
//! Each pair's key is then split into a path (`a[b][0]` is `a`, `[b]`, `[0]`)
//! and folded into a small nested value around the decoded value. The
//! `merge` module deep-merges these into the result one pair at a time.
//!
//! While merging, sequences are sparse: `a[2]=x` is a sequence holding only
//! index 2, so a large index costs nothing. Sequences are renumbered from
//! zero before the result is converted into the public
//! [`Value`](crate::Value) model.

mod decode;
mod merge;
mod parse;

pub use decode::{decode, interpret_numeric_entities};

use merge::{ParsedMap, ParsedValue, compact, into_map, merge_into_map};
use parse::{build_nested, parse_values, split_key};

use crate::config::ParseConfig;
use crate::value::Map;

/// Parses a querystring into a nested map.
pub(crate) fn parse_str(input: &str, config: &ParseConfig) -> Map {
    if input.is_empty() {
        return Map::new();
    }
    let pairs = parse_values(input, config);
    build(pairs, config)
}

/// Builds nested values from pairs that are already split and decoded.
pub(crate) fn parse_pairs(input: Map, config: &ParseConfig) -> Map {
    if input.is_empty() {
        return Map::new();
    }
    let pairs = input
        .into_iter()
        .map(|(key, value)| (key, ParsedValue::from(value)))
        .collect();
    build(pairs, config)
}

fn build(pairs: ParsedMap, config: &ParseConfig) -> Map {
    let mut result = ParsedMap::default();
    for (key, value) in pairs {
        let Some(segments) = split_key(&key, config) else {
            continue;
        };
        let nested = build_nested(&segments, value, config);
        result = merge_into_map(result, nested, config);
    }

    let mut result = ParsedValue::Map(result);
    compact(&mut result);
    match result {
        ParsedValue::Map(map) => into_map(map),
        _ => Map::new(),
    }
}

#[cfg(test)]
mod test {
    use super::{parse_pairs, parse_str};
    use crate::config::{Charset, ParseConfig};
    use crate::value::{Map, Value};
    use pretty_assertions::assert_eq;

    fn object<const N: usize>(entries: [(&str, Value); N]) -> Map {
        entries.into_iter().map(|(k, v)| (k.to_owned(), v)).collect()
    }

    #[test]
    fn parse_empty() {
        let config = ParseConfig::new().strict_null_handling(true).allow_dots(true);
        assert!(parse_str("", &config).is_empty());
        assert!(parse_pairs(Map::new(), &config).is_empty());
    }

    #[test]
    fn nested_paths_merge() {
        let config = ParseConfig::new();
        let parsed = parse_str("a[b][c]=1&a[b][d]=2&a[e]=3", &config);
        assert_eq!(
            parsed,
            object([(
                "a",
                Value::Object(object([
                    ("b", Value::Object(object([("c", "1".into()), ("d", "2".into())]))),
                    ("e", "3".into()),
                ])),
            )])
        );
    }

    #[test]
    fn sparse_indices_compact() {
        let config = ParseConfig::new();
        let parsed = parse_str("a[1]=b&a[15]=c", &config);
        assert_eq!(parsed, object([("a", vec!["b", "c"].into())]));

        let config = ParseConfig::new().array_limit(usize::MAX);
        let parsed = parse_str("a[18446744073709551615]=x&a[3]=y&a[]=z", &config);
        assert_eq!(parsed, object([("a", vec!["z", "y", "x"].into())]));
    }

    #[test]
    fn parse_map_input_is_not_decoded() {
        let config = ParseConfig::new().comma(true);
        let input = object([("a[b]", "c%20d,e".into()), ("f[]", "g".into())]);
        assert_eq!(
            parse_pairs(input, &config),
            object([
                ("a", Value::Object(object([("b", "c%20d,e".into())]))),
                ("f", vec!["g"].into()),
            ])
        );
    }

    #[test]
    fn sentinel_overrides_charset() {
        let config = ParseConfig::new()
            .charset(Charset::Iso88591)
            .charset_sentinel(true);
        let parsed = parse_str("utf8=%E2%9C%93&a=%C3%A4", &config);
        assert_eq!(parsed, object([("a", "ä".into())]));
    }
}
