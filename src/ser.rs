//! Stringify support for querystrings.
//!
//! The stringifier walks a [`Value`] depth first and writes one `key=value`
//! pair per scalar it reaches. Each composite extends the key prefix of its
//! children: object members as `prefix[key]` (or `prefix.key` with
//! `allow_dots`), array elements according to the configured
//! [`ArrayFormat`]. The pairs are then joined with the delimiter.

mod encode;
mod key;
pub(crate) mod value;

pub use encode::encode;

use std::borrow::Cow;

use encode::encode_bytes;
use key::KeyPath;

use crate::config::{ArrayFormat, Component, Filter, StringifyConfig};
use crate::error::{Error, Result};
use crate::utils::{canonical_index, sentinel_for};
use crate::value::Value;

/// Stringifies `value` as a querystring.
///
/// Only objects and arrays produce output; any other top-level value
/// (after the filter function, if any) stringifies to the empty string.
pub(crate) fn stringify_value(value: &Value, config: &StringifyConfig) -> Result<String> {
    let filtered;
    let root = match &config.filter {
        Some(Filter::Function(f)) => match f("", value) {
            Some(value) => {
                filtered = value;
                &filtered
            }
            None => return Ok(String::new()),
        },
        _ => value,
    };

    if !matches!(root, Value::Array(_) | Value::Object(_)) {
        return Ok(String::new());
    }

    let key_list = match &config.filter {
        Some(Filter::Keys(keys)) => Some(sorted(keys.clone(), config)),
        _ => None,
    };

    let mut serializer = QsSerializer {
        config,
        key_list: key_list.as_deref(),
        pairs: Vec::new(),
    };

    let keys = match &serializer.key_list {
        Some(keys) => keys.to_vec(),
        None => sorted(own_keys(root), config),
    };
    for key in keys {
        let Some(child) = lookup(root, &key) else {
            continue;
        };
        if config.skip_nulls && child.is_null() {
            continue;
        }
        serializer.visit(child, &KeyPath::root(&key, config), 1)?;
    }

    let joined = serializer.pairs.join(&config.delimiter);
    if joined.is_empty() {
        return Ok(joined);
    }

    let mut output = String::with_capacity(joined.len() + 32);
    if config.add_query_prefix {
        output.push('?');
    }
    if config.charset_sentinel {
        output.push_str(sentinel_for(config.charset));
        output.push_str(&config.delimiter);
    }
    output.push_str(&joined);
    Ok(output)
}

/// Collects the flat `key=value` pairs of a single stringify call.
struct QsSerializer<'a> {
    config: &'a StringifyConfig,
    /// Keys visited at every level when a key-list filter is set.
    key_list: Option<&'a [String]>,
    pairs: Vec<String>,
}

impl QsSerializer<'_> {
    fn visit(&mut self, value: &Value, path: &KeyPath, depth: usize) -> Result<()> {
        let config = self.config;
        if depth > config.max_depth {
            tracing::debug!(
                key = %path.raw,
                max_depth = config.max_depth,
                "stringify depth exceeded"
            );
            return Err(Error::DepthExceeded(config.max_depth));
        }

        let filtered;
        let value = match &config.filter {
            Some(Filter::Function(f)) => match f(&path.raw, value) {
                Some(value) => {
                    filtered = value;
                    &filtered
                }
                None => return Ok(()),
            },
            _ => value,
        };

        match value {
            Value::Array(items) if config.array_format == ArrayFormat::Comma => {
                if items.is_empty() {
                    return Ok(());
                }
                let joined = self.join_comma(items);
                if joined.is_empty() {
                    // an empty join counts as null
                    if config.skip_nulls {
                        return Ok(());
                    }
                    self.write_null(path);
                } else {
                    self.write_pair(path, joined);
                }
            }
            Value::Null => self.write_null(path),
            Value::Array(items) => {
                let indices: Vec<usize> = match self.key_list {
                    Some(keys) => keys.iter().filter_map(|k| canonical_index(k)).collect(),
                    None => (0..items.len()).collect(),
                };
                for index in indices {
                    let Some(child) = items.get(index) else {
                        continue;
                    };
                    if config.skip_nulls && child.is_null() {
                        continue;
                    }
                    self.visit(child, &path.element(index, config), depth + 1)?;
                }
            }
            Value::Object(map) => {
                let keys = match self.key_list {
                    Some(keys) => keys.to_vec(),
                    None => sorted(map.keys().cloned().collect(), config),
                };
                for key in keys {
                    let Some(child) = map.get(&key) else {
                        continue;
                    };
                    if config.skip_nulls && child.is_null() {
                        continue;
                    }
                    self.visit(child, &path.member(&key, config), depth + 1)?;
                }
            }
            scalar => {
                let encoded = self.encode_scalar(scalar);
                self.write_pair(path, encoded);
            }
        }
        Ok(())
    }

    fn write_null(&mut self, path: &KeyPath) {
        if self.config.strict_null_handling {
            self.pairs.push(path.encoded.clone());
        } else {
            self.write_pair(path, String::new());
        }
    }

    fn write_pair(&mut self, path: &KeyPath, encoded_value: String) {
        let format = self.config.format;
        let key = format.apply(path.encoded.clone());
        let value = format.apply(encoded_value);
        self.pairs.push(format!("{key}={value}"));
    }

    /// Encodes each element on its own and joins them with a literal `,`.
    /// Nested arrays are flattened into the same list and objects render
    /// as nothing.
    fn join_comma(&self, items: &[Value]) -> String {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Array(nested) => parts.push(self.join_comma(nested)),
                Value::Object(_) | Value::Null => parts.push(String::new()),
                scalar => parts.push(self.encode_scalar(scalar)),
            }
        }
        parts.join(",")
    }

    fn encode_scalar(&self, value: &Value) -> String {
        let config = self.config;
        let text: Cow<'_, str> = match value {
            Value::String(s) => Cow::Borrowed(s),
            Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Value::Number(n) => Cow::Owned(n.to_query_string()),
            Value::Date(d) => Cow::Owned(config.date_to_string(d)),
            Value::Bytes(bytes) => {
                return match (&config.encoder, config.encode) {
                    (None, true) => encode_bytes(bytes, config.charset),
                    _ => self.encode_text(&String::from_utf8_lossy(bytes)),
                };
            }
            Value::Null | Value::Array(_) | Value::Object(_) => Cow::Borrowed(""),
        };
        self.encode_text(&text)
    }

    fn encode_text(&self, text: &str) -> String {
        let config = self.config;
        if !config.encode {
            return text.to_owned();
        }
        match &config.encoder {
            Some(encoder) => encoder.encode(text, config.charset, Component::Value),
            None => encode(text, config.charset),
        }
    }
}

fn own_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn lookup<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => canonical_index(key).and_then(|i| items.get(i)),
        _ => None,
    }
}

fn sorted(mut keys: Vec<String>, config: &StringifyConfig) -> Vec<String> {
    if let Some(compare) = &config.sort {
        keys.sort_by(|a, b| compare(a.as_str(), b.as_str()));
    }
    keys
}

#[cfg(test)]
mod test {
    use super::stringify_value;
    use crate::config::{ArrayFormat, Charset, Filter, Format, StringifyConfig};
    use crate::error::Error;
    use crate::value::{Map, Value};
    use pretty_assertions::assert_eq;

    fn stringify(value: &Value, config: &StringifyConfig) -> String {
        stringify_value(value, config).unwrap()
    }

    fn object<const N: usize>(entries: [(&str, Value); N]) -> Value {
        entries.into_iter().collect()
    }

    #[test]
    fn array_formats() {
        let value = object([("a", vec!["b", "c"].into())]);
        let config = StringifyConfig::new();
        assert_eq!(stringify(&value, &config), "a[0]=b&a[1]=c");
        let config = config.array_format(ArrayFormat::Brackets);
        assert_eq!(stringify(&value, &config), "a[]=b&a[]=c");
        let config = config.array_format(ArrayFormat::Repeat);
        assert_eq!(stringify(&value, &config), "a=b&a=c");
        let config = config.array_format(ArrayFormat::Comma);
        assert_eq!(stringify(&value, &config), "a=b,c");
    }

    #[test]
    fn comma_encodes_elements_individually() {
        let config = StringifyConfig::new().array_format(ArrayFormat::Comma);
        let value = object([("a", vec!["b,c", "d e"].into())]);
        assert_eq!(stringify(&value, &config), "a=b%2Cc,d%20e");

        let value = object([("a", Value::Array(vec![])), ("b", vec![""].into())]);
        assert_eq!(stringify(&value, &config), "b=");
        let config = config.strict_null_handling(true);
        assert_eq!(stringify(&value, &config), "b");
    }

    #[test]
    fn comma_empty_join_is_skipped_with_nulls() {
        let config = StringifyConfig::new()
            .array_format(ArrayFormat::Comma)
            .skip_nulls(true);
        assert_eq!(stringify(&object([("a", vec![""].into())]), &config), "");
        let value = object([("a", vec!["", ""].into()), ("b", vec!["c"].into())]);
        assert_eq!(stringify(&value, &config), "a=,&b=c");
    }

    #[test]
    fn nulls() {
        let value = object([("a", Value::Null), ("b", "".into())]);
        assert_eq!(stringify(&value, &StringifyConfig::new()), "a=&b=");
        assert_eq!(
            stringify(&value, &StringifyConfig::new().strict_null_handling(true)),
            "a&b="
        );
        assert_eq!(stringify(&value, &StringifyConfig::new().skip_nulls(true)), "b=");
    }

    #[test]
    fn scalars_at_the_top_are_empty() {
        let config = StringifyConfig::new();
        assert_eq!(stringify(&Value::from("a"), &config), "");
        assert_eq!(stringify(&Value::Null, &config), "");
        assert_eq!(stringify(&Value::Object(Map::new()), &config.add_query_prefix(true)), "");
    }

    #[test]
    fn top_level_arrays_use_indices_as_keys() {
        let value: Value = vec!["a", "b"].into();
        assert_eq!(stringify(&value, &StringifyConfig::new()), "0=a&1=b");
    }

    #[test]
    fn prefix_and_sentinel() {
        let value = object([("a", "✓".into())]);
        let config = StringifyConfig::new().add_query_prefix(true).charset_sentinel(true);
        assert_eq!(stringify(&value, &config), "?utf8=%E2%9C%93&a=%E2%9C%93");

        let config = StringifyConfig::new()
            .charset(Charset::Iso88591)
            .charset_sentinel(true)
            .delimiter(";");
        assert_eq!(
            stringify(&value, &config),
            "utf8=%26%2310003%3B;a=%26%2310003%3B"
        );
    }

    #[test]
    fn filter_function_sees_raw_prefix() {
        let config = StringifyConfig::new().filter(Filter::function(|prefix: &str, value: &Value| {
            match prefix {
                "b" => None,
                "a[c]" => Some(Value::from(1)),
                _ => Some(value.clone()),
            }
        }));
        let value = object([
            ("a", object([("c", "x".into()), ("d", "y".into())])),
            ("b", "z".into()),
        ]);
        assert_eq!(stringify(&value, &config), "a[c]=1&a[d]=y");
    }

    #[test]
    fn key_list_filter_applies_at_every_level() {
        let config = StringifyConfig::new().filter(Filter::keys(["a", "0", "2"]));
        let value = object([
            ("a", vec!["b", "c", "d"].into()),
            ("e", "f".into()),
        ]);
        assert_eq!(stringify(&value, &config), "a[0]=b&a[2]=d");
    }

    #[test]
    fn sort_and_dots() {
        let config = StringifyConfig::new()
            .sort(|a: &str, b: &str| a.cmp(b))
            .allow_dots(true);
        let value = object([
            ("b", object([("z", "1".into()), ("y", "2".into())])),
            ("a", "3".into()),
        ]);
        assert_eq!(stringify(&value, &config), "a=3&b.y=2&b.z=1");
    }

    #[test]
    fn format_and_encoding_switches() {
        let value = object([("a b", "c d".into())]);
        assert_eq!(
            stringify(&value, &StringifyConfig::new().format(Format::Rfc1738)),
            "a+b=c+d"
        );
        assert_eq!(
            stringify(&value, &StringifyConfig::new().encode_values_only(true)),
            "a b=c%20d"
        );
        assert_eq!(stringify(&value, &StringifyConfig::new().encode(false)), "a b=c d");
    }

    #[test]
    fn depth_is_capped() {
        let mut value = Value::from("leaf");
        for _ in 0..5 {
            value = object([("a", value)]);
        }
        let config = StringifyConfig::new().max_depth(3);
        assert_eq!(stringify_value(&value, &config), Err(Error::DepthExceeded(3)));
        let config = StringifyConfig::new().max_depth(5);
        assert_eq!(stringify(&value, &config), "a[a][a][a][a]=leaf");
    }
}
