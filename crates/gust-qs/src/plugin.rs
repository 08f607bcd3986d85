//! Plugin registration

use crate::options::QsOptions;
use crate::parser::{NestedParser, QsParser};
use crate::payload::PayloadRewrite;
use crate::query::QueryRewrite;
use gust_host::{ExtPoint, Plugin, Registration};
use serde_json::Value;
use std::sync::Arc;

/// Registered plugin name
pub const PLUGIN_NAME: &str = "gust-qs";

/// Nested query-string and form payload parsing plugin
///
/// ```ignore
/// let server = Server::default();
/// server.register(&NestedQuery::new(), json!({ "payload": false }))?;
/// ```
#[derive(Clone, Default)]
pub struct NestedQuery {
    parser: Option<Arc<dyn NestedParser>>,
}

impl NestedQuery {
    /// Parse with [`QsParser`](crate::QsParser), configured from `parserOptions`
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse with a custom parser. `parserOptions` are still validated but
    /// not forwarded.
    pub fn with_parser(parser: Arc<dyn NestedParser>) -> Self {
        Self {
            parser: Some(parser),
        }
    }

    /// Stage the hooks `options` enable
    pub fn install(&self, registration: &mut Registration, options: &QsOptions) {
        let parser = match &self.parser {
            Some(parser) => parser.clone(),
            None => Arc::new(QsParser::new(options.parser_options.clone())),
        };

        if options.query_string {
            registration.ext(ExtPoint::OnRequest, QueryRewrite::new(parser.clone()));
        }
        if options.payload {
            registration.ext(ExtPoint::OnPostAuth, PayloadRewrite::new(parser));
        }
    }
}

impl Plugin for NestedQuery {
    fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn register(&self, registration: &mut Registration, options: Value) -> gust_host::Result<()> {
        let options = QsOptions::from_value(options)?;
        self.install(registration, &options);
        tracing::debug!(
            query_string = options.query_string,
            payload = options.payload,
            "nested query hooks staged"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use gust_host::{Method, Request, Server};
    use serde_json::{json, Map};

    struct Upper;

    impl NestedParser for Upper {
        fn parse_query(&self, query: &str) -> Result<Map<String, Value>> {
            let mut map = Map::new();
            map.insert("raw".to_string(), Value::String(query.to_uppercase()));
            Ok(map)
        }

        fn parse_fields(&self, fields: &Map<String, Value>) -> Result<Map<String, Value>> {
            Ok(fields.clone())
        }
    }

    #[test]
    fn test_registers_both_hooks_by_default() {
        let server = Server::default();
        server.register(&NestedQuery::new(), Value::Null).unwrap();

        assert_eq!(server.plugins(), vec![PLUGIN_NAME]);
        assert_eq!(server.ext_count(ExtPoint::OnRequest), 1);
        assert_eq!(server.ext_count(ExtPoint::OnPostAuth), 1);
    }

    #[test]
    fn test_disabled_hooks_not_registered() {
        let server = Server::default();
        server
            .register(&NestedQuery::new(), json!({"queryString": false, "payload": false}))
            .unwrap();

        assert_eq!(server.ext_count(ExtPoint::OnRequest), 0);
        assert_eq!(server.ext_count(ExtPoint::OnPostAuth), 0);
    }

    #[test]
    fn test_invalid_options_abort_registration() {
        let server = Server::default();
        let err = server
            .register(&NestedQuery::new(), json!({"unknown": 1}))
            .unwrap_err();

        assert!(matches!(err, gust_host::Error::Plugin { ref name, .. } if name == PLUGIN_NAME));
        assert!(server.plugins().is_empty());
        assert_eq!(server.ext_count(ExtPoint::OnRequest), 0);
    }

    #[test]
    fn test_custom_parser() {
        let server = Server::default();
        server
            .register(&NestedQuery::with_parser(Arc::new(Upper)), json!({"payload": false}))
            .unwrap();
        server
            .route(Method::Get, "/", Default::default(), |req| {
                gust_host::Response::json_value(&Value::Object(req.query.clone()))
            })
            .unwrap();

        let res = server.inject(Request::new(Method::Get, "/?a=b"));
        assert_eq!(res.body_json().unwrap(), json!({"raw": "A=B"}));
    }
}
