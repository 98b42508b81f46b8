use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{Charset, Component, Delimiter, ParseConfig};
use crate::utils::{
    ISO_SENTINEL, SENTINEL_KEY, UTF8_SENTINEL, canonical_index, is_reserved_name,
};
use crate::value::Value;

use super::decode::{decode, interpret_numeric_entities};
use super::merge::{ParsedMap, ParsedSeq, ParsedValue, push};

/// A bracket group with no nested brackets inside, e.g. `[b]` or `[]`.
static BRACKET_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\[\]]*\]").expect("bracket pattern is valid"));

/// A dot followed by a name, e.g. `.b` in `a.b[c]`.
static DOT_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.([^.\[]+)").expect("dot pattern is valid"));

/// Splits the raw querystring into decoded `(key, value)` pairs.
///
/// Repeated keys are combined into sequences in the order they appear, so
/// `a=b&a=c` yields a single `a` entry holding `[b, c]`.
pub(crate) fn parse_values(input: &str, config: &ParseConfig) -> ParsedMap {
    let mut pairs = ParsedMap::default();

    let input = if config.ignore_query_prefix {
        input.strip_prefix('?').unwrap_or(input)
    } else {
        input
    };

    let parts = split_pairs(input, config);

    let mut charset = config.charset;
    let mut skip_index = None;
    if config.charset_sentinel {
        if let Some(idx) = parts.iter().position(|part| part.starts_with(SENTINEL_KEY)) {
            match parts[idx] {
                UTF8_SENTINEL => charset = Charset::Utf8,
                ISO_SENTINEL => charset = Charset::Iso88591,
                _ => {}
            }
            tracing::debug!(?charset, "charset sentinel found");
            skip_index = Some(idx);
        }
    }

    for (idx, part) in parts.iter().enumerate() {
        if skip_index == Some(idx) {
            continue;
        }

        let (key, mut value) = match split_point(part) {
            None => {
                let key = decode_with(config, part, charset, Component::Key);
                let value = if config.strict_null_handling {
                    ParsedValue::Leaf(Value::Null)
                } else {
                    ParsedValue::string("")
                };
                (key, value)
            }
            Some(pos) => {
                let key = decode_with(config, &part[..pos], charset, Component::Key);
                let value = parse_raw_value(&part[pos + 1..], config, charset);
                (key, value)
            }
        };

        if config.interpret_numeric_entities && charset == Charset::Iso88591 {
            value = map_strings(value, |s| interpret_numeric_entities(&s).into_owned());
        }

        if part.contains("[]=") && !matches!(value, ParsedValue::Sequence(_)) {
            value = ParsedValue::sequence([value]);
        }

        match pairs.get_mut(&key) {
            Some(existing) => {
                let current = std::mem::replace(existing, ParsedValue::Sequence(ParsedSeq::new()));
                *existing = combine(current, value);
            }
            None => {
                pairs.insert(key, value);
            }
        }
    }

    pairs
}

fn split_pairs<'a>(input: &'a str, config: &ParseConfig) -> Vec<&'a str> {
    let limit = config.parameter_limit.unwrap_or(usize::MAX);
    let (parts, truncated) = match &config.delimiter {
        Delimiter::Literal(delimiter) => take_limited(input.split(delimiter.as_str()), limit),
        Delimiter::Pattern(re) => take_limited(re.split(input), limit),
    };
    if truncated {
        tracing::debug!(limit, "parameter limit reached, ignoring remaining pairs");
    }
    parts
}

/// Takes up to `limit` parts; the flag is set when any were left over.
fn take_limited<'a>(
    mut parts: impl Iterator<Item = &'a str>,
    limit: usize,
) -> (Vec<&'a str>, bool) {
    let taken = parts.by_ref().take(limit).collect();
    (taken, parts.next().is_some())
}

/// Position of the `=` separating key and value. A `]=` wins over an
/// earlier bare `=`, so `a[b=c]=d` splits after the bracket.
fn split_point(part: &str) -> Option<usize> {
    match part.find("]=") {
        Some(pos) => Some(pos + 1),
        None => part.find('='),
    }
}

fn decode_with(
    config: &ParseConfig,
    input: &str,
    charset: Charset,
    component: Component,
) -> String {
    match &config.decoder {
        Some(decoder) => decoder.decode(input, charset, component),
        None => decode(input, charset),
    }
}

fn parse_raw_value(raw: &str, config: &ParseConfig, charset: Charset) -> ParsedValue {
    if config.comma && raw.contains(',') {
        ParsedValue::sequence(raw.split(',').map(|item| {
            ParsedValue::string(decode_with(config, item, charset, Component::Value))
        }))
    } else {
        ParsedValue::string(decode_with(config, raw, charset, Component::Value))
    }
}

/// Applies `f` to a string leaf, or to each string leaf of a sequence.
fn map_strings(value: ParsedValue, f: impl Fn(String) -> String) -> ParsedValue {
    match value {
        ParsedValue::Leaf(Value::String(s)) => ParsedValue::string(f(s)),
        ParsedValue::Sequence(items) => ParsedValue::Sequence(
            items
                .into_iter()
                .map(|(idx, item)| match item {
                    ParsedValue::Leaf(Value::String(s)) => (idx, ParsedValue::string(f(s))),
                    other => (idx, other),
                })
                .collect(),
        ),
        other => other,
    }
}

/// Concatenates two values, flattening sequences by one level.
fn combine(existing: ParsedValue, value: ParsedValue) -> ParsedValue {
    let mut items = match existing {
        ParsedValue::Sequence(items) => items,
        other => ParsedSeq::from([(0, other)]),
    };
    match value {
        ParsedValue::Sequence(more) => {
            for item in more.into_values() {
                push(&mut items, item);
            }
        }
        other => push(&mut items, other),
    }
    ParsedValue::Sequence(items)
}

/// Splits a key into its path segments.
///
/// The text before the first bracket group is the parent; each following
/// bracket group is one segment, up to `depth` of them. Whatever follows
/// is kept as a single literal segment, wrapped in brackets. Returns `None`
/// when the key is empty or names a reserved member.
pub(crate) fn split_key(given_key: &str, config: &ParseConfig) -> Option<Vec<String>> {
    if given_key.is_empty() {
        return None;
    }

    let key: Cow<'_, str> = if config.allow_dots {
        DOT_SEGMENT.replace_all(given_key, "[${1}]")
    } else {
        Cow::Borrowed(given_key)
    };

    let guarded = |name: &str| {
        let rejected =
            !config.plain_objects && !config.allow_prototypes && is_reserved_name(name);
        if rejected {
            tracing::debug!(key = %given_key, name, "dropping pair with reserved key");
        }
        rejected
    };

    let first = if config.depth > 0 {
        BRACKET_SEGMENT.find(&key)
    } else {
        None
    };
    let parent = match first {
        Some(m) => &key[..m.start()],
        None => &key[..],
    };

    let mut segments = Vec::new();
    if !parent.is_empty() {
        if guarded(parent) {
            return None;
        }
        segments.push(parent.to_owned());
    }

    if config.depth > 0 {
        let mut remainder = None;
        for (count, segment) in BRACKET_SEGMENT.find_iter(&key).enumerate() {
            if count >= config.depth {
                remainder = Some(segment.start());
                break;
            }
            let text = segment.as_str();
            if guarded(&text[1..text.len() - 1]) {
                return None;
            }
            segments.push(text.to_owned());
        }
        if let Some(start) = remainder {
            segments.push(format!("[{}]", &key[start..]));
        }
    }

    Some(segments)
}

/// Folds a key path around its value, innermost segment first.
pub(crate) fn build_nested(
    segments: &[String],
    value: ParsedValue,
    config: &ParseConfig,
) -> ParsedValue {
    let mut leaf = value;
    for segment in segments.iter().rev() {
        leaf = if segment == "[]" && config.parse_arrays {
            match leaf {
                seq @ ParsedValue::Sequence(_) => seq,
                other => ParsedValue::sequence([other]),
            }
        } else {
            let bracketed =
                segment.len() >= 2 && segment.starts_with('[') && segment.ends_with(']');
            let name = if bracketed {
                &segment[1..segment.len() - 1]
            } else {
                segment.as_str()
            };

            if !config.parse_arrays && name.is_empty() {
                ParsedValue::Map(ParsedMap::from_iter([("0".to_owned(), leaf)]))
            } else {
                let index = canonical_index(name).filter(|_| bracketed && config.parse_arrays);
                match index {
                    Some(index) if index <= config.array_limit => {
                        ParsedValue::Sequence(ParsedSeq::from([(index, leaf)]))
                    }
                    index => {
                        if let Some(index) = index {
                            tracing::trace!(
                                index,
                                limit = config.array_limit,
                                "index above array limit, using a map key"
                            );
                        }
                        ParsedValue::Map(ParsedMap::from_iter([(name.to_owned(), leaf)]))
                    }
                }
            }
        };
    }
    leaf
}

#[cfg(test)]
mod test {
    use super::{
        ParsedSeq, ParsedValue, build_nested, parse_values, split_key, split_point, take_limited,
    };
    use crate::config::{Delimiter, ParseConfig};
    use pretty_assertions::assert_eq;

    fn segments(key: &str, config: &ParseConfig) -> Option<Vec<String>> {
        split_key(key, config)
    }

    #[test]
    fn split_point_prefers_bracket_equals() {
        assert_eq!(split_point("a=b"), Some(1));
        assert_eq!(split_point("a[b=c]=d"), Some(6));
        assert_eq!(split_point("a=b]=c"), Some(4));
        assert_eq!(split_point("ab"), None);
    }

    #[test]
    fn split_key_into_segments() {
        let config = ParseConfig::new();
        assert_eq!(
            segments("a[b][c]", &config),
            Some(vec!["a".into(), "[b]".into(), "[c]".into()])
        );
        assert_eq!(segments("[a]", &config), Some(vec!["[a]".into()]));
        assert_eq!(segments("a[]", &config), Some(vec!["a".into(), "[]".into()]));
        assert_eq!(segments("", &config), None);
    }

    #[test]
    fn split_key_folds_remainder_past_depth() {
        let config = ParseConfig::new().depth(1);
        assert_eq!(
            segments("a[b][c][d]", &config),
            Some(vec!["a".into(), "[b]".into(), "[[c][d]]".into()])
        );
        let config = ParseConfig::new().depth(0);
        assert_eq!(segments("a[b][c]", &config), Some(vec!["a[b][c]".into()]));
    }

    #[test]
    fn split_key_with_dots() {
        let config = ParseConfig::new().allow_dots(true);
        assert_eq!(
            segments("a.b.c", &config),
            Some(vec!["a".into(), "[b]".into(), "[c]".into()])
        );
        assert_eq!(
            segments("a.b[c]", &config),
            Some(vec!["a".into(), "[b]".into(), "[c]".into()])
        );
        assert_eq!(segments("a.b", &ParseConfig::new()), Some(vec!["a.b".into()]));
    }

    #[test]
    fn split_key_guards_reserved_names() {
        let config = ParseConfig::new();
        assert_eq!(segments("hasOwnProperty", &config), None);
        assert_eq!(segments("a[__proto__][b]", &config), None);
        assert!(segments("a[__proto__]", &config.clone().allow_prototypes(true)).is_some());
        assert!(segments("a[constructor]", &config.clone().plain_objects(true)).is_some());
        // the literal remainder is not inspected
        assert!(segments("a[b][__proto__]", &ParseConfig::new().depth(1)).is_some());
    }

    #[test]
    fn build_nested_sequences_and_maps() {
        let config = ParseConfig::new();
        let built = build_nested(
            &["a".into(), "[2]".into()],
            ParsedValue::string("x"),
            &config,
        );
        let expected = ParsedValue::Map(
            [(
                "a".to_owned(),
                ParsedValue::Sequence(ParsedSeq::from([(2, ParsedValue::string("x"))])),
            )]
            .into_iter()
            .collect(),
        );
        assert_eq!(built, expected);

        let built = build_nested(
            &["a".into(), "[21]".into()],
            ParsedValue::string("x"),
            &config,
        );
        let expected = ParsedValue::Map(
            [(
                "a".to_owned(),
                ParsedValue::Map(
                    [("21".to_owned(), ParsedValue::string("x"))]
                        .into_iter()
                        .collect(),
                ),
            )]
            .into_iter()
            .collect(),
        );
        assert_eq!(built, expected);
    }

    #[test]
    fn build_nested_stores_sparse_indices() {
        let config = ParseConfig::new().array_limit(usize::MAX);
        let built = build_nested(
            &["[18446744073709551615]".into()],
            ParsedValue::string("x"),
            &config,
        );
        assert_eq!(
            built,
            ParsedValue::Sequence(ParsedSeq::from([(usize::MAX, ParsedValue::string("x"))]))
        );
    }

    #[test]
    fn parse_values_combines_repeats() {
        let pairs = parse_values("a=b&a=c&d", &ParseConfig::new());
        assert_eq!(
            pairs["a"],
            ParsedValue::sequence([ParsedValue::string("b"), ParsedValue::string("c")])
        );
        assert_eq!(pairs["d"], ParsedValue::string(""));
    }

    #[test]
    fn parse_values_respects_limit_and_pattern_delimiter() {
        let config = ParseConfig::new()
            .parameter_limit(Some(2))
            .delimiter(Delimiter::pattern("[;,]").unwrap());
        let pairs = parse_values("a=1;b=2,c=3", &config);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.get("c").is_none());
    }

    #[test]
    fn limit_is_only_reported_when_parts_are_dropped() {
        assert_eq!(take_limited("a=1&b=2".split('&'), 2), (vec!["a=1", "b=2"], false));
        assert_eq!(take_limited("a=1&b=2&c=3".split('&'), 2), (vec!["a=1", "b=2"], true));
        assert_eq!(take_limited("a=1".split('&'), usize::MAX), (vec!["a=1"], false));
    }
}
