use crate::config::{ArrayFormat, Component, StringifyConfig};

use super::encode::encode;

/// The key prefix of the value currently being visited.
///
/// Two renderings are tracked side by side: `raw` is the plain path handed
/// to a filter function (`a[b][0]`), while `encoded` is what ends up in the
/// output. Only the segment names are encoded; brackets and dots stay
/// literal, so `a[b c]` is written as `a[b%20c]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct KeyPath {
    pub(crate) raw: String,
    pub(crate) encoded: String,
}

impl KeyPath {
    pub(crate) fn root(key: &str, config: &StringifyConfig) -> Self {
        Self {
            raw: key.to_owned(),
            encoded: encode_segment(key, config),
        }
    }

    /// Path of an object member: `prefix[key]`, or `prefix.key` with
    /// `allow_dots`.
    pub(crate) fn member(&self, key: &str, config: &StringifyConfig) -> Self {
        let segment = encode_segment(key, config);
        if config.allow_dots {
            Self {
                raw: format!("{}.{}", self.raw, key),
                encoded: format!("{}.{}", self.encoded, segment),
            }
        } else {
            self.bracketed(key, &segment)
        }
    }

    /// Path of an array element, following the configured array format.
    pub(crate) fn element(&self, index: usize, config: &StringifyConfig) -> Self {
        match config.array_format {
            ArrayFormat::Indices => {
                let index = itoa::Buffer::new().format(index).to_owned();
                let segment = encode_segment(&index, config);
                self.bracketed(&index, &segment)
            }
            ArrayFormat::Brackets => self.bracketed("", ""),
            ArrayFormat::Repeat | ArrayFormat::Comma => self.clone(),
        }
    }

    fn bracketed(&self, raw: &str, encoded: &str) -> Self {
        Self {
            raw: format!("{}[{}]", self.raw, raw),
            encoded: format!("{}[{}]", self.encoded, encoded),
        }
    }
}

fn encode_segment(segment: &str, config: &StringifyConfig) -> String {
    if !config.encode || config.encode_values_only {
        return segment.to_owned();
    }
    match &config.encoder {
        Some(encoder) => encoder.encode(segment, config.charset, Component::Key),
        None => encode(segment, config.charset),
    }
}
