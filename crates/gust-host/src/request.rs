//! HTTP Request types

use crate::payload::{decode_form, Payload};
use crate::{Error, Result};
use serde_json::{Map, Value};
use smallvec::SmallVec;

/// HTTP Methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl std::str::FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Split a raw request URL into its path and query components.
///
/// The query component excludes the leading `?`. A fragment, if a client
/// sent one, is dropped.
pub fn split_url(url: &str) -> (&str, Option<&str>) {
    let url = url.split_once('#').map_or(url, |(before, _)| before);
    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

/// HTTP Request
///
/// Extensions mutate the request in place while it moves through the
/// lifecycle; handlers see the final state.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Raw URL as received (path and query)
    pub url: String,
    /// Request path (without query string)
    pub path: String,
    /// Query string (without leading ?)
    pub query_string: Option<String>,
    /// Decoded query. Flat `key -> string` until an extension rewrites it.
    pub query: Map<String, Value>,
    /// Request headers (stack-allocated for small header counts)
    pub headers: SmallVec<[(String, String); 16]>,
    /// Raw request body
    pub body: bytes::Bytes,
    /// Buffered payload, populated before `OnPostAuth`
    pub payload: Payload,
}

impl Request {
    /// Create a new request from a method and raw URL
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let mut request = Self {
            method,
            url: String::new(),
            path: String::new(),
            query_string: None,
            query: Map::new(),
            headers: SmallVec::new(),
            body: bytes::Bytes::new(),
            payload: Payload::Empty,
        };
        request.set_url(url);
        request
    }

    /// Replace the URL, re-deriving path, query string and the flat query
    pub fn set_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        let (path, query) = split_url(&url);
        self.path = path.to_string();
        self.query_string = query.map(str::to_string);
        self.query = query
            .map(|q| decode_form(q.as_bytes()))
            .unwrap_or_default();
        self.url = url;
    }

    /// Replace the decoded query
    pub fn set_query(&mut self, query: Map<String, Value>) {
        self.query = query;
    }

    /// Get a header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get content-type header
    pub fn content_type(&self) -> Option<&str> {
        self.header(http::header::CONTENT_TYPE.as_str())
    }
}

/// Builder for constructing requests
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Create a new builder
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            request: Request::new(method, url),
        }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.push((name.into(), value.into()));
        self
    }

    /// Set raw body
    pub fn body(mut self, body: impl Into<bytes::Bytes>) -> Self {
        self.request.body = body.into();
        self
    }

    /// Set an already buffered payload (e.g. multipart fields decoded upstream)
    pub fn payload(mut self, payload: Payload) -> Self {
        self.request.payload = payload;
        self
    }

    /// Build the request
    pub fn build(self) -> Request {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parse() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("patch".parse::<Method>().unwrap(), Method::Patch);
        assert!("INVALID".parse::<Method>().is_err());
    }

    #[test]
    fn test_split_url() {
        assert_eq!(split_url("/test?a=1"), ("/test", Some("a=1")));
        assert_eq!(split_url("/test"), ("/test", None));
        assert_eq!(split_url("/test?"), ("/test", Some("")));
        assert_eq!(split_url("/test?a=1#frag"), ("/test", Some("a=1")));
    }

    #[test]
    fn test_request_header() {
        let req = RequestBuilder::new(Method::Get, "/")
            .header("Content-Type", "application/json")
            .build();

        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(req.content_type(), Some("application/json"));
    }

    #[test]
    fn test_flat_query() {
        let req = Request::new(Method::Get, "/?hello=world&unicorns%5B0%5D%5Bcolor%5D=blue");

        assert_eq!(req.path, "/");
        assert_eq!(req.query.get("hello"), Some(&json!("world")));
        assert_eq!(req.query.get("unicorns[0][color]"), Some(&json!("blue")));
    }

    #[test]
    fn test_set_url() {
        let mut req = Request::new(Method::Get, "/a?x=1");
        req.set_url("/b");

        assert_eq!(req.path, "/b");
        assert!(req.query_string.is_none());
        assert!(req.query.is_empty());
    }
}
