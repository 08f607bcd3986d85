//! Form payload rewrite, run on `OnPostAuth`

use crate::parser::NestedParser;
use gust_host::{Extension, Payload, Request, Response};
use serde_json::Value;
use std::sync::Arc;

const FORM_CONTENT_TYPES: [&str; 2] = ["x-www-form-urlencoded", "multipart/form-data"];

/// Whether a content-type header names a form encoding.
///
/// Substring match, case-sensitive, so parameters such as `; charset=utf-8`
/// or a `boundary` do not matter.
pub fn is_form_encoded(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| FORM_CONTENT_TYPES.iter().any(|form| ct.contains(form)))
}

/// Replaces flat form fields with their nested parse.
///
/// Only structured mappings are touched. Buffers and streams pass through
/// unread.
pub struct PayloadRewrite {
    parser: Arc<dyn NestedParser>,
}

impl PayloadRewrite {
    pub fn new(parser: Arc<dyn NestedParser>) -> Self {
        Self { parser }
    }
}

impl Extension for PayloadRewrite {
    fn run(&self, req: &mut Request) -> Option<Response> {
        if !is_form_encoded(req.content_type()) {
            return None;
        }

        let Payload::Structured(Value::Object(fields)) = &req.payload else {
            tracing::debug!(path = %req.path, kind = req.payload.kind(), "payload passed through");
            return None;
        };

        match self.parser.parse_fields(fields) {
            Ok(parsed) => {
                tracing::debug!(path = %req.path, keys = parsed.len(), "payload rewritten");
                req.payload = Payload::Structured(Value::Object(parsed));
                None
            }
            Err(err) => {
                tracing::warn!(path = %req.path, error = %err, "payload rejected");
                Some(err.to_response("payload"))
            }
        }
    }
}
