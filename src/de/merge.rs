//! Deep merging of partially built values.
//!
//! Every pair in a querystring builds its own small tree (`a[b][0]=c`
//! becomes `{a: {b: [c]}}`); these trees are then merged one by one into
//! the result. Sequences are sparse while merging (`a[3]=x` is a sequence
//! whose only element sits at index 3); [`compact`] renumbers them from zero
//! at the end.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::config::ParseConfig;
use crate::utils::is_reserved_name;
use crate::value::{Map, Number, Value};

pub(crate) type ParsedMap = IndexMap<String, ParsedValue>;

/// Sequence elements keyed by index. Missing indices are holes.
pub(crate) type ParsedSeq = BTreeMap<usize, ParsedValue>;

/// An intermediate representation of the parsed query string.
///
/// - `Leaf`: a scalar (string, null, or a caller supplied scalar)
/// - `Sequence`: an array, possibly with holes
/// - `Map`: a nested object
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ParsedValue {
    Leaf(Value),
    Sequence(ParsedSeq),
    Map(ParsedMap),
}

impl From<Value> for ParsedValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => ParsedValue::sequence(items.into_iter().map(Self::from)),
            Value::Object(map) => {
                ParsedValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            leaf => ParsedValue::Leaf(leaf),
        }
    }
}

impl ParsedValue {
    pub(crate) fn string(s: impl Into<String>) -> Self {
        ParsedValue::Leaf(Value::String(s.into()))
    }

    /// A sequence without holes, indexed from zero.
    pub(crate) fn sequence(items: impl IntoIterator<Item = ParsedValue>) -> Self {
        ParsedValue::Sequence(items.into_iter().enumerate().collect())
    }

    /// Empty and null values never overwrite what is already there.
    fn is_blank(&self) -> bool {
        match self {
            ParsedValue::Leaf(value) => is_blank(value),
            _ => false,
        }
    }

    fn is_composite(&self) -> bool {
        matches!(self, ParsedValue::Sequence(_) | ParsedValue::Map(_))
    }

    /// Converts into the public model, closing any remaining holes.
    pub(crate) fn into_value(self) -> Value {
        match self {
            ParsedValue::Leaf(v) => v,
            ParsedValue::Sequence(items) => {
                Value::Array(items.into_values().map(Self::into_value).collect())
            }
            ParsedValue::Map(map) => Value::Object(into_map(map)),
        }
    }
}

pub(crate) fn into_map(map: ParsedMap) -> Map {
    map.into_iter().map(|(k, v)| (k, v.into_value())).collect()
}

/// Appends `item` after the highest occupied index.
pub(crate) fn push(items: &mut ParsedSeq, item: ParsedValue) {
    let next = match items.last_key_value() {
        Some((&last, _)) => last.checked_add(1),
        None => Some(0),
    };
    match next {
        Some(idx) => {
            items.insert(idx, item);
        }
        None => tracing::debug!("no index left after the last element, dropping value"),
    }
}

fn leaf_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_query_string(),
        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        Value::Date(d) => crate::ser::value::iso_timestamp(d),
        // only leaves reach here
        Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// Merges `source` into `target`, following these rules:
///
/// | target   | source   | result                                      |
/// |----------|----------|---------------------------------------------|
/// | any      | blank    | target unchanged                            |
/// | sequence | scalar   | scalar appended                             |
/// | map      | scalar   | `map[scalar] = true`                        |
/// | scalar   | scalar   | `[target, source]`                          |
/// | scalar   | sequence | `[target, ...source]`                       |
/// | scalar   | map      | `[target, source]`                          |
/// | sequence | sequence | merged index by index                       |
/// | sequence | map      | sequence turned into an index map, merged   |
/// | map      | any      | merged key by key                           |
pub(crate) fn merge(target: ParsedValue, source: ParsedValue, config: &ParseConfig) -> ParsedValue {
    if source.is_blank() {
        return target;
    }

    match (target, source) {
        (ParsedValue::Map(map), source) => ParsedValue::Map(merge_into_map(map, source, config)),
        (ParsedValue::Sequence(mut items), source @ ParsedValue::Leaf(_)) => {
            push(&mut items, source);
            ParsedValue::Sequence(items)
        }
        (target @ ParsedValue::Leaf(_), ParsedValue::Sequence(items)) => {
            let mut combined = ParsedSeq::from([(0, target)]);
            for (idx, item) in items {
                match idx.checked_add(1) {
                    Some(idx) => {
                        combined.insert(idx, item);
                    }
                    None => push(&mut combined, item),
                }
            }
            ParsedValue::Sequence(combined)
        }
        (target @ ParsedValue::Leaf(_), source) => ParsedValue::sequence([target, source]),
        (ParsedValue::Sequence(items), source @ ParsedValue::Map(_)) => {
            ParsedValue::Map(merge_into_map(sequence_to_map(items), source, config))
        }
        (ParsedValue::Sequence(mut items), ParsedValue::Sequence(source)) => {
            for (idx, item) in source {
                match items.get(&idx).map(ParsedValue::is_composite) {
                    Some(true) if item.is_composite() => {
                        if let Some(existing) = items.remove(&idx) {
                            items.insert(idx, merge(existing, item, config));
                        }
                    }
                    Some(_) => push(&mut items, item),
                    None => {
                        items.insert(idx, item);
                    }
                }
            }
            ParsedValue::Sequence(items)
        }
    }
}

/// Merges `source` into a map target. This is the only shape the top-level
/// result ever takes.
pub(crate) fn merge_into_map(
    mut map: ParsedMap,
    source: ParsedValue,
    config: &ParseConfig,
) -> ParsedMap {
    match source {
        ParsedValue::Leaf(value) => {
            if is_blank(&value) {
                return map;
            }
            let key = leaf_key(&value);
            if config.plain_objects || config.allow_prototypes || !is_reserved_name(&key) {
                map.insert(key, ParsedValue::Leaf(Value::Bool(true)));
            }
            map
        }
        ParsedValue::Sequence(items) => {
            for (idx, item) in items {
                insert_merged(&mut map, idx.to_string(), item, config);
            }
            map
        }
        ParsedValue::Map(source) => {
            for (key, item) in source {
                insert_merged(&mut map, key, item, config);
            }
            map
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) | Value::Number(Number::Integer(0)) => true,
        Value::Number(Number::Float(f)) => *f == 0.0 || f.is_nan(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn insert_merged(map: &mut ParsedMap, key: String, item: ParsedValue, config: &ParseConfig) {
    match map.get_mut(&key) {
        Some(existing) => {
            let current = std::mem::replace(existing, ParsedValue::Leaf(Value::Null));
            *existing = merge(current, item, config);
        }
        None => {
            map.insert(key, item);
        }
    }
}

fn sequence_to_map(items: ParsedSeq) -> ParsedMap {
    items
        .into_iter()
        .map(|(idx, item)| (idx.to_string(), item))
        .collect()
}

/// Renumbers every sequence in the tree from zero, keeping the defined
/// elements in index order.
pub(crate) fn compact(value: &mut ParsedValue) {
    match value {
        ParsedValue::Leaf(_) => {}
        ParsedValue::Sequence(items) => {
            *items = std::mem::take(items)
                .into_values()
                .enumerate()
                .map(|(idx, mut item)| {
                    compact(&mut item);
                    (idx, item)
                })
                .collect();
        }
        ParsedValue::Map(map) => {
            for item in map.values_mut() {
                compact(item);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{ParsedMap, ParsedSeq, ParsedValue, compact, merge};
    use crate::config::ParseConfig;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn s(v: &str) -> ParsedValue {
        ParsedValue::string(v)
    }

    fn map<const N: usize>(entries: [(&str, ParsedValue); N]) -> ParsedValue {
        ParsedValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v))
                .collect::<ParsedMap>(),
        )
    }

    fn seq<const N: usize>(items: [Option<ParsedValue>; N]) -> ParsedValue {
        ParsedValue::Sequence(
            items
                .into_iter()
                .enumerate()
                .filter_map(|(idx, item)| Some((idx, item?)))
                .collect(),
        )
    }

    #[test]
    fn scalars_combine_into_sequence() {
        let config = ParseConfig::new();
        assert_eq!(merge(s("a"), s("b"), &config), seq([Some(s("a")), Some(s("b"))]));
    }

    #[test]
    fn blank_source_keeps_target() {
        let config = ParseConfig::new();
        let target = map([("b", s("c"))]);
        assert_eq!(merge(target.clone(), s(""), &config), target);
        assert_eq!(
            merge(target.clone(), ParsedValue::Leaf(Value::Null), &config),
            target
        );
    }

    #[test]
    fn scalar_into_map_sets_flag() {
        let config = ParseConfig::new();
        assert_eq!(
            merge(map([("b", s("c"))]), s("d"), &config),
            map([("b", s("c")), ("d", ParsedValue::Leaf(Value::Bool(true)))])
        );
        // reserved names are not set unless allowed
        assert_eq!(
            merge(map([]), s("toString"), &config),
            map([])
        );
        assert_eq!(
            merge(map([]), s("toString"), &ParseConfig::new().allow_prototypes(true)),
            map([("toString", ParsedValue::Leaf(Value::Bool(true)))])
        );
    }

    #[test]
    fn sequences_merge_by_index() {
        let config = ParseConfig::new();
        let merged = merge(
            seq([Some(s("a")), None]),
            seq([None, Some(s("b"))]),
            &config,
        );
        assert_eq!(merged, seq([Some(s("a")), Some(s("b"))]));

        // occupied scalar slots append instead of overwriting
        let merged = merge(seq([Some(s("a"))]), seq([Some(s("b"))]), &config);
        assert_eq!(merged, seq([Some(s("a")), Some(s("b"))]));

        // occupied composite slots merge recursively
        let merged = merge(
            seq([Some(map([("x", s("1"))]))]),
            seq([Some(map([("y", s("2"))]))]),
            &config,
        );
        assert_eq!(merged, seq([Some(map([("x", s("1")), ("y", s("2"))]))]));
    }

    #[test]
    fn free_index_leaves_holes() {
        let config = ParseConfig::new();
        let merged = merge(seq([Some(s("a"))]), seq([None, None, Some(s("c"))]), &config);
        assert_eq!(merged, seq([Some(s("a")), None, Some(s("c"))]));
    }

    #[test]
    fn last_index_takes_no_more_elements() {
        let config = ParseConfig::new();
        let full = ParsedValue::Sequence(ParsedSeq::from([(usize::MAX, s("a"))]));
        assert_eq!(merge(full.clone(), s("b"), &config), full);

        let source = ParsedValue::Sequence(ParsedSeq::from([(0, s("b"))]));
        let merged = merge(full.clone(), source, &config);
        assert_eq!(
            merged,
            ParsedValue::Sequence(ParsedSeq::from([(0, s("b")), (usize::MAX, s("a"))]))
        );

        // prepending shifts indices, the last one falls back to an append
        assert_eq!(merge(s("z"), full, &config), seq([Some(s("z")), Some(s("a"))]));
    }

    #[test]
    fn sequence_and_map_become_map() {
        let config = ParseConfig::new();
        let merged = merge(seq([Some(s("a")), None, Some(s("c"))]), map([("x", s("y"))]), &config);
        assert_eq!(merged, map([("0", s("a")), ("2", s("c")), ("x", s("y"))]));

        let merged = merge(map([("x", s("y"))]), seq([None, Some(s("b"))]), &config);
        assert_eq!(merged, map([("x", s("y")), ("1", s("b"))]));
    }

    #[test]
    fn scalar_target_prepends() {
        let config = ParseConfig::new();
        assert_eq!(
            merge(s("a"), seq([Some(s("b")), Some(s("c"))]), &config),
            seq([Some(s("a")), Some(s("b")), Some(s("c"))])
        );
        assert_eq!(
            merge(s("a"), map([("b", s("c"))]), &config),
            seq([Some(s("a")), Some(map([("b", s("c"))]))])
        );
    }

    #[test]
    fn compact_removes_holes() {
        let mut value = map([(
            "a",
            seq([None, Some(s("b")), None, Some(seq([None, Some(s("c"))]))]),
        )]);
        compact(&mut value);
        let once = value.clone();
        assert_eq!(
            once,
            map([("a", seq([Some(s("b")), Some(seq([Some(s("c"))]))]))])
        );
        compact(&mut value);
        assert_eq!(value, once);
    }
}
