#![deny(missing_docs)]

//! # Parameter Attribute Types
//!
//! Small value types shared by every parameter node: where a parameter lives,
//! its declared type and format, and the OpenAPI serialization style.

use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The location of a parameter inside an HTTP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterLocation {
    /// Templated path segment.
    Path,
    /// Query string entry.
    Query,
    /// Request header.
    Header,
    /// Cookie.
    Cookie,
    /// Part of the request body.
    RequestBody,
    /// Part of a response body.
    ResponseBody,
    /// Not yet attached anywhere.
    Unknown,
}

impl ParameterLocation {
    /// Parses the OpenAPI `in` keyword.
    pub fn from_in(value: &str) -> Self {
        match value {
            "path" => ParameterLocation::Path,
            "query" => ParameterLocation::Query,
            "header" => ParameterLocation::Header,
            "cookie" => ParameterLocation::Cookie,
            "body" | "formData" => ParameterLocation::RequestBody,
            _ => ParameterLocation::Unknown,
        }
    }

    /// Segment used in request-scoped REST paths (`$["request"]["query"]`).
    pub fn rest_segment(&self) -> Option<&'static str> {
        match self {
            ParameterLocation::Path => Some("path"),
            ParameterLocation::Query => Some("query"),
            ParameterLocation::Header => Some("header"),
            ParameterLocation::Cookie => Some("cookie"),
            ParameterLocation::RequestBody => Some("body"),
            ParameterLocation::ResponseBody | ParameterLocation::Unknown => None,
        }
    }

    /// Inverse of [`ParameterLocation::rest_segment`].
    pub fn from_rest_segment(segment: &str) -> Option<Self> {
        match segment {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "cookie" => Some(ParameterLocation::Cookie),
            "body" => Some(ParameterLocation::RequestBody),
            _ => None,
        }
    }

    /// True for the locations that hold named root parameters.
    pub fn is_parameter_location(&self) -> bool {
        matches!(
            self,
            ParameterLocation::Path
                | ParameterLocation::Query
                | ParameterLocation::Header
                | ParameterLocation::Cookie
        )
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
            ParameterLocation::RequestBody => "request_body",
            ParameterLocation::ResponseBody => "response_body",
            ParameterLocation::Unknown => "unknown",
        };
        write!(f, "{}", text)
    }
}

/// The declared schema type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterType {
    /// `null`
    Null,
    /// `boolean`
    Boolean,
    /// `integer`
    Integer,
    /// `number`
    Number,
    /// `string`
    String,
    /// `array`
    Array,
    /// `object`
    Object,
    /// `allOf` combined schema.
    AllOf,
    /// `anyOf` combined schema.
    AnyOf,
    /// `oneOf` combined schema.
    OneOf,
    /// Missing or unrecognized type.
    Unknown,
}

impl ParameterType {
    /// True for `integer` and `number`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ParameterType::Integer | ParameterType::Number)
    }

    /// True for the types represented by leaf nodes.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            ParameterType::Null
                | ParameterType::Boolean
                | ParameterType::Integer
                | ParameterType::Number
                | ParameterType::String
                | ParameterType::Unknown
        )
    }
}

impl FromStr for ParameterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "null" => Ok(ParameterType::Null),
            "boolean" | "bool" => Ok(ParameterType::Boolean),
            "integer" | "int" => Ok(ParameterType::Integer),
            "number" => Ok(ParameterType::Number),
            "string" => Ok(ParameterType::String),
            "array" => Ok(ParameterType::Array),
            "object" => Ok(ParameterType::Object),
            "allof" => Ok(ParameterType::AllOf),
            "anyof" => Ok(ParameterType::AnyOf),
            "oneof" => Ok(ParameterType::OneOf),
            other => Err(format!("unknown parameter type '{}'", other)),
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ParameterType::Null => "null",
            ParameterType::Boolean => "boolean",
            ParameterType::Integer => "integer",
            ParameterType::Number => "number",
            ParameterType::String => "string",
            ParameterType::Array => "array",
            ParameterType::Object => "object",
            ParameterType::AllOf => "allOf",
            ParameterType::AnyOf => "anyOf",
            ParameterType::OneOf => "oneOf",
            ParameterType::Unknown => "unknown",
        };
        write!(f, "{}", text)
    }
}

/// The declared `format` of a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ParameterFormat {
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `byte` (base64)
    Byte,
    /// `binary`
    Binary,
    /// `date`
    Date,
    /// `date-time`
    DateTime,
    /// `password`
    Password,
    /// `email`
    Email,
    /// `uuid`
    Uuid,
    /// `uri`
    Uri,
    /// `hostname`
    Hostname,
    /// `ipv4`
    Ipv4,
    /// `ipv6`
    Ipv6,
    /// Any other declared format.
    Other(String),
    /// No format declared.
    #[default]
    Missing,
}

impl ParameterFormat {
    /// Parses the OpenAPI `format` keyword; never fails.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "int32" => ParameterFormat::Int32,
            "int64" => ParameterFormat::Int64,
            "float" => ParameterFormat::Float,
            "double" => ParameterFormat::Double,
            "byte" => ParameterFormat::Byte,
            "binary" => ParameterFormat::Binary,
            "date" => ParameterFormat::Date,
            "date-time" => ParameterFormat::DateTime,
            "password" => ParameterFormat::Password,
            "email" => ParameterFormat::Email,
            "uuid" => ParameterFormat::Uuid,
            "uri" | "url" => ParameterFormat::Uri,
            "hostname" => ParameterFormat::Hostname,
            "ipv4" => ParameterFormat::Ipv4,
            "ipv6" => ParameterFormat::Ipv6,
            "" => ParameterFormat::Missing,
            other => ParameterFormat::Other(other.to_string()),
        }
    }

    /// True when a format was declared.
    pub fn is_declared(&self) -> bool {
        !matches!(self, ParameterFormat::Missing)
    }
}

impl fmt::Display for ParameterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ParameterFormat::Int32 => "int32",
            ParameterFormat::Int64 => "int64",
            ParameterFormat::Float => "float",
            ParameterFormat::Double => "double",
            ParameterFormat::Byte => "byte",
            ParameterFormat::Binary => "binary",
            ParameterFormat::Date => "date",
            ParameterFormat::DateTime => "date-time",
            ParameterFormat::Password => "password",
            ParameterFormat::Email => "email",
            ParameterFormat::Uuid => "uuid",
            ParameterFormat::Uri => "uri",
            ParameterFormat::Hostname => "hostname",
            ParameterFormat::Ipv4 => "ipv4",
            ParameterFormat::Ipv6 => "ipv6",
            ParameterFormat::Other(s) => s.as_str(),
            ParameterFormat::Missing => "",
        };
        write!(f, "{}", text)
    }
}

/// Parameter serialization style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParameterStyle {
    /// `matrix`
    Matrix,
    /// `label`
    Label,
    /// `form`
    Form,
    /// `simple`
    #[default]
    Simple,
    /// `spaceDelimited`
    SpaceDelimited,
    /// `pipeDelimited`
    PipeDelimited,
    /// `deepObject`
    DeepObject,
}

impl ParameterStyle {
    /// Parses the OpenAPI `style` keyword.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "matrix" => Some(ParameterStyle::Matrix),
            "label" => Some(ParameterStyle::Label),
            "form" => Some(ParameterStyle::Form),
            "simple" => Some(ParameterStyle::Simple),
            "spaceDelimited" => Some(ParameterStyle::SpaceDelimited),
            "pipeDelimited" => Some(ParameterStyle::PipeDelimited),
            "deepObject" => Some(ParameterStyle::DeepObject),
            _ => None,
        }
    }

    /// Default style for a location (OAS 3 defaults).
    ///
    /// `query` and `cookie` default to `form`, `path` and `header` to `simple`.
    /// Form-encoded request bodies are rendered like query strings.
    pub fn default_for(location: ParameterLocation) -> Self {
        match location {
            ParameterLocation::Query | ParameterLocation::Cookie => ParameterStyle::Form,
            ParameterLocation::RequestBody => ParameterStyle::Form,
            _ => ParameterStyle::Simple,
        }
    }

    /// Default explode modifier: `true` for `form`, `false` otherwise.
    pub fn default_explode(&self) -> bool {
        matches!(self, ParameterStyle::Form)
    }
}

impl fmt::Display for ParameterStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ParameterStyle::Matrix => "matrix",
            ParameterStyle::Label => "label",
            ParameterStyle::Form => "form",
            ParameterStyle::Simple => "simple",
            ParameterStyle::SpaceDelimited => "spaceDelimited",
            ParameterStyle::PipeDelimited => "pipeDelimited",
            ParameterStyle::DeepObject => "deepObject",
        };
        write!(f, "{}", text)
    }
}

/// Swagger 2.0 `collectionFormat` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionFormat {
    /// Comma separated.
    Csv,
    /// Space separated.
    Ssv,
    /// Tab separated.
    Tsv,
    /// Pipe separated.
    Pipes,
    /// Repeated `name=value` pairs.
    Multi,
}

impl CollectionFormat {
    /// Parses a `collectionFormat` keyword.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "csv" => Some(CollectionFormat::Csv),
            "ssv" => Some(CollectionFormat::Ssv),
            "tsv" => Some(CollectionFormat::Tsv),
            "pipes" => Some(CollectionFormat::Pipes),
            "multi" => Some(CollectionFormat::Multi),
            _ => None,
        }
    }

    /// Maps the collection format to an OAS 3 style and explode pair.
    pub fn style_for(&self, location: ParameterLocation) -> (ParameterStyle, bool) {
        match self {
            CollectionFormat::Csv => match location {
                ParameterLocation::Path | ParameterLocation::Header => {
                    (ParameterStyle::Simple, false)
                }
                _ => (ParameterStyle::Form, false),
            },
            // Tab separation has no OAS 3 counterpart.
            CollectionFormat::Ssv | CollectionFormat::Tsv => (ParameterStyle::SpaceDelimited, false),
            CollectionFormat::Pipes => (ParameterStyle::PipeDelimited, false),
            CollectionFormat::Multi => (ParameterStyle::Form, true),
        }
    }
}

impl fmt::Display for CollectionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CollectionFormat::Csv => "csv",
            CollectionFormat::Ssv => "ssv",
            CollectionFormat::Tsv => "tsv",
            CollectionFormat::Pipes => "pipes",
            CollectionFormat::Multi => "multi",
        };
        write!(f, "{}", text)
    }
}

/// A parameter name together with its normalized form.
///
/// The normalized form is computed once from the raw name and never changes,
/// so renaming-insensitive lookups stay stable while values are mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterName {
    raw: String,
    normalized: String,
}

impl ParameterName {
    /// Creates a name and derives its normalized form.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = normalize_name(&raw);
        Self { raw, normalized }
    }

    /// The name as declared.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The normalized name (lowercase, separators removed).
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// True for the empty name carried by body roots.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Matches a query against the raw name first, then the normalized name.
    pub fn matches(&self, query: &str) -> bool {
        self.raw == query || (!self.normalized.is_empty() && self.normalized == normalize_name(query))
    }
}

impl fmt::Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl From<&str> for ParameterName {
    fn from(value: &str) -> Self {
        ParameterName::new(value)
    }
}

/// Normalizes a parameter name: `userId`, `user_id`, `User-ID` all become `userid`.
pub fn normalize_name(raw: &str) -> String {
    raw.to_snake_case()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name_variants() {
        assert_eq!(normalize_name("userId"), "userid");
        assert_eq!(normalize_name("user_id"), "userid");
        assert_eq!(normalize_name("User-ID"), "userid");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_parameter_name_matches() {
        let name = ParameterName::new("petId");
        assert!(name.matches("petId"));
        assert!(name.matches("pet_id"));
        assert!(!name.matches("pet"));
    }

    #[test]
    fn test_style_defaults() {
        assert_eq!(
            ParameterStyle::default_for(ParameterLocation::Query),
            ParameterStyle::Form
        );
        assert_eq!(
            ParameterStyle::default_for(ParameterLocation::Path),
            ParameterStyle::Simple
        );
        assert!(ParameterStyle::Form.default_explode());
        assert!(!ParameterStyle::Simple.default_explode());
    }

    #[test]
    fn test_collection_format_mapping() {
        assert_eq!(
            CollectionFormat::Csv.style_for(ParameterLocation::Query),
            (ParameterStyle::Form, false)
        );
        assert_eq!(
            CollectionFormat::Csv.style_for(ParameterLocation::Path),
            (ParameterStyle::Simple, false)
        );
        assert_eq!(
            CollectionFormat::Multi.style_for(ParameterLocation::Query),
            (ParameterStyle::Form, true)
        );
    }

    #[test]
    fn test_format_parse_roundtrip() {
        assert_eq!(ParameterFormat::parse("date-time"), ParameterFormat::DateTime);
        assert_eq!(
            ParameterFormat::parse("zip"),
            ParameterFormat::Other("zip".into())
        );
        assert!(!ParameterFormat::parse("").is_declared());
    }
}
