use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::value::{Map, Value};

/// Character set used to percent-encode and decode keys and values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Charset {
    #[default]
    Utf8,
    /// Latin-1. Characters outside the charset travel as numeric
    /// entities (`&#10003;`), the way browsers submit them.
    Iso88591,
}

impl FromStr for Charset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "utf-8" => Ok(Charset::Utf8),
            "iso-8859-1" => Ok(Charset::Iso88591),
            other => Err(Error::InvalidCharset(other.to_owned())),
        }
    }
}

/// How encoded spaces are written out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// Spaces become `+`.
    Rfc1738,
    /// Spaces stay `%20`.
    #[default]
    Rfc3986,
}

impl Format {
    /// Post-processes already percent-encoded output.
    pub fn apply(self, encoded: String) -> String {
        match self {
            Format::Rfc1738 if encoded.contains("%20") => encoded.replace("%20", "+"),
            _ => encoded,
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RFC1738" => Ok(Format::Rfc1738),
            "RFC3986" => Ok(Format::Rfc3986),
            other => Err(Error::UnknownFormat(other.to_owned())),
        }
    }
}

/// How sequences are written as repeated flat pairs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ArrayFormat {
    /// `a[0]=b&a[1]=c`
    #[default]
    Indices,
    /// `a[]=b&a[]=c`
    Brackets,
    /// `a=b&a=c`
    Repeat,
    /// `a=b,c`
    Comma,
}

impl FromStr for ArrayFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "indices" => Ok(ArrayFormat::Indices),
            "brackets" => Ok(ArrayFormat::Brackets),
            "repeat" => Ok(ArrayFormat::Repeat),
            "comma" => Ok(ArrayFormat::Comma),
            other => Err(Error::UnknownArrayFormat(other.to_owned())),
        }
    }
}

/// Separator between `key=value` pairs.
#[derive(Clone, Debug)]
pub enum Delimiter {
    Literal(String),
    /// A regular expression, e.g. `[;,]` to split on either character.
    Pattern(regex::Regex),
}

impl Default for Delimiter {
    fn default() -> Self {
        Delimiter::Literal("&".to_owned())
    }
}

impl Delimiter {
    /// Builds a delimiter from a regular expression, e.g. `[;,]`.
    pub fn pattern(re: &str) -> std::result::Result<Self, regex::Error> {
        regex::Regex::new(re).map(Delimiter::Pattern)
    }

    fn validate(&self) -> Result<()> {
        match self {
            Delimiter::Literal(s) if s.is_empty() => Err(Error::EmptyDelimiter),
            _ => Ok(()),
        }
    }
}

impl From<&str> for Delimiter {
    fn from(s: &str) -> Self {
        Delimiter::Literal(s.to_owned())
    }
}

impl From<char> for Delimiter {
    fn from(c: char) -> Self {
        Delimiter::Literal(c.to_string())
    }
}

/// Which half of a pair a hook is looking at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Component {
    Key,
    Value,
}

/// Custom decoding of raw keys and values.
///
/// Implemented for any `Fn(&str, Charset, Component) -> String`, so a
/// closure can delegate back to [`crate::decode`] for the cases it does
/// not care about.
pub trait Decoder: Send + Sync {
    fn decode(&self, input: &str, charset: Charset, component: Component) -> String;
}

impl<F> Decoder for F
where
    F: Fn(&str, Charset, Component) -> String + Send + Sync,
{
    fn decode(&self, input: &str, charset: Charset, component: Component) -> String {
        self(input, charset, component)
    }
}

/// Custom encoding of key segments and values.
pub trait Encoder: Send + Sync {
    fn encode(&self, input: &str, charset: Charset, component: Component) -> String;
}

impl<F> Encoder for F
where
    F: Fn(&str, Charset, Component) -> String + Send + Sync,
{
    fn encode(&self, input: &str, charset: Charset, component: Component) -> String {
        self(input, charset, component)
    }
}

type FilterFn = dyn Fn(&str, &Value) -> Option<Value> + Send + Sync;
type SortFn = dyn Fn(&str, &str) -> Ordering + Send + Sync;
type DateFn = dyn Fn(&DateTime<Utc>) -> String + Send + Sync;

/// Restricts or rewrites what gets stringified.
#[derive(Clone)]
pub enum Filter {
    /// Called with the raw key prefix (`""` for the root) and the value
    /// found there. Returning `None` omits the entry.
    Function(Arc<FilterFn>),
    /// Only these keys (and array indices, written as decimal strings)
    /// are visited, at every level, in this order.
    Keys(Vec<String>),
}

impl Filter {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&str, &Value) -> Option<Value> + Send + Sync + 'static,
    {
        Filter::Function(Arc::new(f))
    }

    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::Keys(keys.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Function(_) => f.write_str("Filter::Function(..)"),
            Filter::Keys(keys) => f.debug_tuple("Filter::Keys").field(keys).finish(),
        }
    }
}

/// Configuration for parsing a querystring.
///
/// ```
/// use nested_qs::ParseConfig;
///
/// let config = ParseConfig::new().depth(1);
/// let map = config.parse("a[b][c]=d").unwrap();
/// assert_eq!(map["a"]["b"]["[c]"], "d");
/// ```
#[derive(Clone)]
pub struct ParseConfig {
    pub(crate) allow_dots: bool,
    pub(crate) allow_prototypes: bool,
    pub(crate) array_limit: usize,
    pub(crate) charset: Charset,
    pub(crate) charset_sentinel: bool,
    pub(crate) comma: bool,
    pub(crate) decoder: Option<Arc<dyn Decoder>>,
    pub(crate) delimiter: Delimiter,
    pub(crate) depth: usize,
    pub(crate) ignore_query_prefix: bool,
    pub(crate) interpret_numeric_entities: bool,
    pub(crate) parameter_limit: Option<usize>,
    pub(crate) parse_arrays: bool,
    pub(crate) plain_objects: bool,
    pub(crate) strict_null_handling: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ParseConfig {
    pub fn new() -> Self {
        Self {
            allow_dots: false,
            allow_prototypes: false,
            array_limit: 20,
            charset: Charset::Utf8,
            charset_sentinel: false,
            comma: false,
            decoder: None,
            delimiter: Delimiter::default(),
            depth: 5,
            ignore_query_prefix: false,
            interpret_numeric_entities: false,
            parameter_limit: Some(1000),
            parse_arrays: true,
            plain_objects: false,
            strict_null_handling: false,
        }
    }

    /// Treats `a.b=c` as `a[b]=c`.
    pub fn allow_dots(mut self, allow_dots: bool) -> Self {
        self.allow_dots = allow_dots;
        self
    }

    /// Keeps keys such as `constructor` or `__proto__` instead of dropping
    /// the pairs that contain them.
    pub fn allow_prototypes(mut self, allow_prototypes: bool) -> Self {
        self.allow_prototypes = allow_prototypes;
        self
    }

    /// Highest index that still builds an array. Larger indices become
    /// map keys. Default is 20.
    pub fn array_limit(mut self, array_limit: usize) -> Self {
        self.array_limit = array_limit;
        self
    }

    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Lets a leading `utf8=✓` pair override the configured charset.
    pub fn charset_sentinel(mut self, charset_sentinel: bool) -> Self {
        self.charset_sentinel = charset_sentinel;
        self
    }

    /// Splits values containing `,` into arrays.
    pub fn comma(mut self, comma: bool) -> Self {
        self.comma = comma;
        self
    }

    pub fn decoder<D: Decoder + 'static>(mut self, decoder: D) -> Self {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<Delimiter>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Number of bracket segments decomposed into nested values. The rest
    /// of the key is kept as one literal segment. `0` keeps every key flat.
    /// Default is 5.
    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn ignore_query_prefix(mut self, ignore_query_prefix: bool) -> Self {
        self.ignore_query_prefix = ignore_query_prefix;
        self
    }

    /// Decodes `&#NNNN;` in values when the charset is iso-8859-1.
    pub fn interpret_numeric_entities(mut self, interpret_numeric_entities: bool) -> Self {
        self.interpret_numeric_entities = interpret_numeric_entities;
        self
    }

    /// Maximum number of pairs read; the rest are ignored. `None` reads
    /// everything. Default is 1000.
    pub fn parameter_limit(mut self, parameter_limit: Option<usize>) -> Self {
        self.parameter_limit = parameter_limit;
        self
    }

    pub fn parse_arrays(mut self, parse_arrays: bool) -> Self {
        self.parse_arrays = parse_arrays;
        self
    }

    /// Uses a mapping with no reserved member names.
    pub fn plain_objects(mut self, plain_objects: bool) -> Self {
        self.plain_objects = plain_objects;
        self
    }

    /// Parses `a` (no `=`) as null rather than the empty string.
    pub fn strict_null_handling(mut self, strict_null_handling: bool) -> Self {
        self.strict_null_handling = strict_null_handling;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.delimiter.validate()
    }

    /// Parses a querystring using this `ParseConfig`.
    pub fn parse(&self, input: &str) -> Result<Map> {
        self.validate()?;
        Ok(crate::de::parse_str(input, self))
    }

    /// Builds nested values from already split and decoded pairs, e.g.
    /// `{"a[b]": "c"}` becomes `{"a": {"b": "c"}}`.
    pub fn parse_map(&self, input: Map) -> Result<Map> {
        self.validate()?;
        Ok(crate::de::parse_pairs(input, self))
    }
}

impl fmt::Debug for ParseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseConfig")
            .field("allow_dots", &self.allow_dots)
            .field("allow_prototypes", &self.allow_prototypes)
            .field("array_limit", &self.array_limit)
            .field("charset", &self.charset)
            .field("charset_sentinel", &self.charset_sentinel)
            .field("comma", &self.comma)
            .field("decoder", &self.decoder.as_ref().map(|_| ".."))
            .field("delimiter", &self.delimiter)
            .field("depth", &self.depth)
            .field("ignore_query_prefix", &self.ignore_query_prefix)
            .field("interpret_numeric_entities", &self.interpret_numeric_entities)
            .field("parameter_limit", &self.parameter_limit)
            .field("parse_arrays", &self.parse_arrays)
            .field("plain_objects", &self.plain_objects)
            .field("strict_null_handling", &self.strict_null_handling)
            .finish()
    }
}

/// Configuration for stringifying a value.
///
/// ```
/// use nested_qs::{ArrayFormat, StringifyConfig, Value};
///
/// let value: Value = [("a", vec!["b", "c"])].into_iter().collect();
/// let config = StringifyConfig::new().array_format(ArrayFormat::Brackets);
/// assert_eq!(config.stringify(&value).unwrap(), "a[]=b&a[]=c");
/// ```
#[derive(Clone)]
pub struct StringifyConfig {
    pub(crate) add_query_prefix: bool,
    pub(crate) allow_dots: bool,
    pub(crate) array_format: ArrayFormat,
    pub(crate) charset: Charset,
    pub(crate) charset_sentinel: bool,
    pub(crate) delimiter: String,
    pub(crate) encode: bool,
    pub(crate) encoder: Option<Arc<dyn Encoder>>,
    pub(crate) encode_values_only: bool,
    pub(crate) filter: Option<Filter>,
    pub(crate) format: Format,
    pub(crate) max_depth: usize,
    pub(crate) serialize_date: Option<Arc<DateFn>>,
    pub(crate) skip_nulls: bool,
    pub(crate) sort: Option<Arc<SortFn>>,
    pub(crate) strict_null_handling: bool,
}

impl Default for StringifyConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StringifyConfig {
    pub fn new() -> Self {
        Self {
            add_query_prefix: false,
            allow_dots: false,
            array_format: ArrayFormat::Indices,
            charset: Charset::Utf8,
            charset_sentinel: false,
            delimiter: "&".to_owned(),
            encode: true,
            encoder: None,
            encode_values_only: false,
            filter: None,
            format: Format::Rfc3986,
            max_depth: 128,
            serialize_date: None,
            skip_nulls: false,
            sort: None,
            strict_null_handling: false,
        }
    }

    pub fn add_query_prefix(mut self, add_query_prefix: bool) -> Self {
        self.add_query_prefix = add_query_prefix;
        self
    }

    /// Writes nested object keys as `a.b` instead of `a[b]`.
    pub fn allow_dots(mut self, allow_dots: bool) -> Self {
        self.allow_dots = allow_dots;
        self
    }

    pub fn array_format(mut self, array_format: ArrayFormat) -> Self {
        self.array_format = array_format;
        self
    }

    /// Legacy switch: `true` is [`ArrayFormat::Indices`], `false` is
    /// [`ArrayFormat::Repeat`].
    pub fn indices(self, indices: bool) -> Self {
        self.array_format(if indices {
            ArrayFormat::Indices
        } else {
            ArrayFormat::Repeat
        })
    }

    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Prepends `utf8=✓` (encoded for the configured charset).
    pub fn charset_sentinel(mut self, charset_sentinel: bool) -> Self {
        self.charset_sentinel = charset_sentinel;
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn encode(mut self, encode: bool) -> Self {
        self.encode = encode;
        self
    }

    pub fn encoder<E: Encoder + 'static>(mut self, encoder: E) -> Self {
        self.encoder = Some(Arc::new(encoder));
        self
    }

    /// Leaves keys as they are and only percent-encodes values.
    pub fn encode_values_only(mut self, encode_values_only: bool) -> Self {
        self.encode_values_only = encode_values_only;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Nesting depth at which stringify gives up with
    /// [`Error::DepthExceeded`]. Default is 128.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Overrides how dates are written. The default is an ISO 8601
    /// timestamp with milliseconds, e.g. `2024-01-02T03:04:05.000Z`.
    pub fn serialize_date<F>(mut self, serialize_date: F) -> Self
    where
        F: Fn(&DateTime<Utc>) -> String + Send + Sync + 'static,
    {
        self.serialize_date = Some(Arc::new(serialize_date));
        self
    }

    pub fn skip_nulls(mut self, skip_nulls: bool) -> Self {
        self.skip_nulls = skip_nulls;
        self
    }

    /// Orders object keys (and the top-level key list) with `compare`.
    pub fn sort<F>(mut self, compare: F) -> Self
    where
        F: Fn(&str, &str) -> Ordering + Send + Sync + 'static,
    {
        self.sort = Some(Arc::new(compare));
        self
    }

    /// Writes null as a bare key (`a`) rather than `a=`.
    pub fn strict_null_handling(mut self, strict_null_handling: bool) -> Self {
        self.strict_null_handling = strict_null_handling;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.delimiter.is_empty() {
            return Err(Error::EmptyDelimiter);
        }
        Ok(())
    }

    /// Stringifies a value using this `StringifyConfig`.
    pub fn stringify(&self, value: &Value) -> Result<String> {
        self.validate()?;
        crate::ser::stringify_value(value, self)
    }

    pub(crate) fn date_to_string(&self, date: &DateTime<Utc>) -> String {
        match &self.serialize_date {
            Some(f) => f(date),
            None => crate::ser::value::iso_timestamp(date),
        }
    }
}

impl fmt::Debug for StringifyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringifyConfig")
            .field("add_query_prefix", &self.add_query_prefix)
            .field("allow_dots", &self.allow_dots)
            .field("array_format", &self.array_format)
            .field("charset", &self.charset)
            .field("charset_sentinel", &self.charset_sentinel)
            .field("delimiter", &self.delimiter)
            .field("encode", &self.encode)
            .field("encoder", &self.encoder.as_ref().map(|_| ".."))
            .field("encode_values_only", &self.encode_values_only)
            .field("filter", &self.filter)
            .field("format", &self.format)
            .field("max_depth", &self.max_depth)
            .field("serialize_date", &self.serialize_date.as_ref().map(|_| ".."))
            .field("skip_nulls", &self.skip_nulls)
            .field("sort", &self.sort.as_ref().map(|_| ".."))
            .field("strict_null_handling", &self.strict_null_handling)
            .finish()
    }
}
