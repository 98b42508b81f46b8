//! Nested querystrings, parsed and stringified
//!
//! Querystrings are not formally defined and loosely take the form of
//! _nested_ urlencoded queries: `a[b][0]=c&a[b][1]=d` describes an object
//! `a` holding an object `b` holding the array `[c, d]`.
//!
//! This library implements the syntax of [qs](https://github.com/ljharb/qs):
//! bracket and dot notation for nested keys, the `indices`, `brackets`,
//! `repeat` and `comma` array formats, utf-8 and iso-8859-1 percent-encoding,
//! and the `utf8=✓` charset sentinel that browsers send with forms.
//!
//! Parsed values are dynamically typed [`Value`]s. They implement `serde`'s
//! `Serialize` and `Deserialize`, so they can be handed to any serde format.
//!
//! ## Usage
//!
//! ```
//! use nested_qs::{ArrayFormat, ParseConfig, StringifyConfig, Value};
//!
//! let map = nested_qs::parse("user[name]=Acme&user[ids][]=1&user[ids][]=2").unwrap();
//! assert_eq!(map["user"]["name"], "Acme");
//! assert_eq!(map["user"]["ids"][1], "2");
//!
//! let value = Value::Object(map);
//! assert_eq!(
//!     nested_qs::stringify(&value).unwrap(),
//!     "user[name]=Acme&user[ids][0]=1&user[ids][1]=2"
//! );
//!
//! let config = StringifyConfig::new().array_format(ArrayFormat::Comma);
//! assert_eq!(config.stringify(&value).unwrap(), "user[name]=Acme&user[ids]=1,2");
//!
//! let config = ParseConfig::new().comma(true);
//! assert_eq!(config.parse("ids=1,2").unwrap()["ids"][0], "1");
//! ```
//!
//! ## Malformed input
//!
//! Parsing never fails on malformed input. Escapes that do not decode are
//! kept as they are, keys naming reserved members (`__proto__`,
//! `constructor`, ...) are dropped, and array indices above
//! [`ParseConfig::array_limit`] become object keys. These cases are
//! reported through [`tracing`] at `debug` and `trace` level.

mod config;
mod de;
mod error;
mod ser;
mod utils;
mod value;

#[doc(inline)]
pub use config::{
    ArrayFormat, Charset, Component, Decoder, Delimiter, Encoder, Filter, Format, ParseConfig,
    StringifyConfig,
};
#[doc(inline)]
pub use de::{decode, interpret_numeric_entities};
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use ser::encode;
pub use utils::{ISO_SENTINEL, UTF8_SENTINEL};
#[doc(inline)]
pub use value::{Map, Number, Value};

/// Parses a querystring with the default [`ParseConfig`].
///
/// ```
/// let map = nested_qs::parse("a[b]=c&a[d][]=e").unwrap();
/// assert_eq!(map["a"]["b"], "c");
/// assert_eq!(map["a"]["d"][0], "e");
/// ```
pub fn parse(input: &str) -> Result<Map> {
    ParseConfig::default().parse(input)
}

/// Stringifies a value with the default [`StringifyConfig`].
///
/// ```
/// use nested_qs::Value;
///
/// let value: Value = [("a", vec!["b", "c"])].into_iter().collect();
/// assert_eq!(nested_qs::stringify(&value).unwrap(), "a[0]=b&a[1]=c");
/// ```
pub fn stringify(value: &Value) -> Result<String> {
    StringifyConfig::default().stringify(value)
}
