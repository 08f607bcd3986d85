//! Plugin options
//!
//! Options arrive as an arbitrary JSON value at registration and are
//! validated against a fixed shape. Anything unexpected aborts registration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Options forwarded to the nested parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase", default)]
pub struct ParserOptions {
    /// Maximum bracket nesting depth. Deeper segments stay in the key.
    pub depth: usize,
    /// Only raw brackets are structural (`%5B`/`%5D` stay literal) and
    /// unbalanced keys are rejected
    pub strict: bool,
    /// Build arrays from indexed keys. When false, indices become object keys.
    pub parse_arrays: bool,
    /// Highest explicit index turned into an array position
    pub array_limit: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            depth: 5,
            strict: false,
            parse_arrays: true,
            array_limit: 20,
        }
    }
}

impl ParserOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn parse_arrays(mut self, parse_arrays: bool) -> Self {
        self.parse_arrays = parse_arrays;
        self
    }

    pub fn array_limit(mut self, array_limit: usize) -> Self {
        self.array_limit = array_limit;
        self
    }
}

/// Plugin configuration
///
/// ```json
/// { "parserOptions": { "parseArrays": false }, "queryString": true, "payload": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase", default)]
pub struct QsOptions {
    /// Parser options. `qsOptions` is accepted as an alias.
    #[serde(alias = "qsOptions")]
    pub parser_options: ParserOptions,
    /// Rewrite the query string on `OnRequest`
    pub query_string: bool,
    /// Rewrite form payloads on `OnPostAuth`
    pub payload: bool,
}

impl Default for QsOptions {
    fn default() -> Self {
        Self {
            parser_options: ParserOptions::default(),
            query_string: true,
            payload: true,
        }
    }
}

impl QsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parser_options(mut self, options: ParserOptions) -> Self {
        self.parser_options = options;
        self
    }

    pub fn query_string(mut self, enabled: bool) -> Self {
        self.query_string = enabled;
        self
    }

    pub fn payload(mut self, enabled: bool) -> Self {
        self.payload = enabled;
        self
    }

    /// Validate raw registration options. `null` means all defaults.
    pub fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => {
                for key in ["parserOptions", "qsOptions"] {
                    if let Some(parser) = map.get(key) {
                        if !parser.is_object() {
                            return Err(Error::Configuration(format!("\"{key}\" must be an object")));
                        }
                    }
                }
            }
            _ => return Err(Error::Configuration("options must be an object".to_string())),
        }

        serde_json::from_value(value).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Raw form, suitable for `Server::register`
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
