//! Query string rewrite, run on `OnRequest`

use crate::parser::NestedParser;
use gust_host::request::split_url;
use gust_host::{Extension, Request, Response};
use std::sync::Arc;

/// Replaces the host's flat query with the nested parse of the raw URL query
pub struct QueryRewrite {
    parser: Arc<dyn NestedParser>,
}

impl QueryRewrite {
    pub fn new(parser: Arc<dyn NestedParser>) -> Self {
        Self { parser }
    }
}

impl Extension for QueryRewrite {
    fn run(&self, req: &mut Request) -> Option<Response> {
        let (_, query) = split_url(&req.url);
        match self.parser.parse_query(query.unwrap_or("")) {
            Ok(parsed) => {
                tracing::debug!(path = %req.path, keys = parsed.len(), "query rewritten");
                req.set_query(parsed);
                None
            }
            Err(err) => {
                tracing::warn!(path = %req.path, error = %err, "query string rejected");
                Some(err.to_response("query string"))
            }
        }
    }
}
