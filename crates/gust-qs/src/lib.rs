//! gust-qs: Nested query-string and form payload parsing for gust-host
//!
//! Replaces the host's flat query and form decoding with a nested parse,
//! so `a[0][b]=c` arrives as `{"a": [{"b": "c"}]}`.
//!
//! Two extensions are registered:
//! - [`QueryRewrite`] on `OnRequest`, before routing
//! - [`PayloadRewrite`] on `OnPostAuth`, after the body is buffered
//!
//! ## Options
//! - `parserOptions` - forwarded to the parser (`depth`, `strict`, `parseArrays`, `arrayLimit`)
//! - `queryString` - rewrite the query (default `true`)
//! - `payload` - rewrite form payloads (default `true`)

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod options;
pub mod parser;
pub mod query;
pub mod payload;
pub mod plugin;

// Re-exports
pub use error::{Error, Result};
pub use options::{ParserOptions, QsOptions};
pub use parser::{NestedParser, QsParser};
pub use query::QueryRewrite;
pub use payload::{is_form_encoded, PayloadRewrite};
pub use plugin::{NestedQuery, PLUGIN_NAME};
