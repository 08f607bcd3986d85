//! Request payload buffering
//!
//! Turns the raw body into a [`Payload`] according to the route's payload
//! settings, before the `OnPostAuth` extensions run.

use crate::{Error, Request, Result};
use bytes::Bytes;
use serde_json::{Map, Value};
use std::collections::VecDeque;

const STREAM_CHUNK_SIZE: usize = 16 * 1024;

/// Buffered request payload
#[derive(Debug, Clone, Default)]
pub enum Payload {
    /// No body
    #[default]
    Empty,
    /// Decoded JSON or flat form fields
    Structured(Value),
    /// Decoded `text/*` body
    Text(String),
    /// Raw bytes, left unparsed
    Buffer(Bytes),
    /// Unread body handed to the handler as a stream
    Stream(PayloadStream),
}

impl Payload {
    /// Structured value, if any
    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Payload::Structured(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Empty => "empty",
            Payload::Structured(_) => "structured",
            Payload::Text(_) => "text",
            Payload::Buffer(_) => "buffer",
            Payload::Stream(_) => "stream",
        }
    }
}

/// Chunked body handle for stream-mode routes
#[derive(Debug, Clone, Default)]
pub struct PayloadStream {
    chunks: VecDeque<Bytes>,
    consumed: usize,
}

impl PayloadStream {
    pub fn new(body: Bytes) -> Self {
        let mut chunks = VecDeque::new();
        let mut rest = body;
        while !rest.is_empty() {
            let at = rest.len().min(STREAM_CHUNK_SIZE);
            chunks.push_back(rest.split_to(at));
        }
        Self { chunks, consumed: 0 }
    }

    /// Number of chunks already read
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Bytes not yet read
    pub fn remaining(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// Drain the rest of the stream into one buffer
    pub fn read_to_end(&mut self) -> Bytes {
        let mut buf = Vec::with_capacity(self.remaining());
        for chunk in self.by_ref() {
            buf.extend_from_slice(&chunk);
        }
        Bytes::from(buf)
    }
}

impl Iterator for PayloadStream {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        let chunk = self.chunks.pop_front()?;
        self.consumed += 1;
        Some(chunk)
    }
}

/// How the route wants its payload delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadOutput {
    #[default]
    Data,
    Stream,
}

/// Per-route payload settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePayload {
    /// Decode the body by content type
    pub parse: bool,
    /// Deliver as data or as a stream
    pub output: PayloadOutput,
}

impl Default for RoutePayload {
    fn default() -> Self {
        Self {
            parse: true,
            output: PayloadOutput::Data,
        }
    }
}

impl RoutePayload {
    /// Parse the body by content type (default)
    pub fn parse() -> Self {
        Self::default()
    }

    /// Keep the body as raw bytes
    pub fn raw() -> Self {
        Self {
            parse: false,
            output: PayloadOutput::Data,
        }
    }

    /// Hand the body over unread
    pub fn stream() -> Self {
        Self {
            parse: false,
            output: PayloadOutput::Stream,
        }
    }
}

/// Decode `application/x-www-form-urlencoded` input into a flat mapping.
///
/// Keys are kept literally (`a[0][b]` stays one key). Repeated keys collect
/// their values into an array.
pub fn decode_form(input: &[u8]) -> Map<String, Value> {
    let mut fields = Map::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        let value = Value::String(value.into_owned());
        match fields.get_mut(&*key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                fields.insert(key.into_owned(), value);
            }
        }
    }
    fields
}

fn mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Buffer the request body into `req.payload`.
///
/// Payloads that were already populated upstream are left as they are.
/// Multipart bodies are not decoded here and end up as [`Payload::Buffer`].
pub fn buffer(req: &mut Request, route: &RoutePayload) -> Result<()> {
    if !req.payload.is_empty() || req.body.is_empty() {
        return Ok(());
    }

    let body = req.body.clone();
    if route.output == PayloadOutput::Stream {
        req.payload = Payload::Stream(PayloadStream::new(body));
        return Ok(());
    }
    if !route.parse {
        req.payload = Payload::Buffer(body);
        return Ok(());
    }

    let mime = mime_type(req.content_type().unwrap_or("application/octet-stream"));
    req.payload = if mime == "application/json" || mime.ends_with("+json") {
        let value = serde_json::from_slice(&body)
            .map_err(|e| Error::Parse(format!("Invalid request payload JSON format: {e}")))?;
        Payload::Structured(value)
    } else if mime == "application/x-www-form-urlencoded" {
        Payload::Structured(Value::Object(decode_form(&body)))
    } else if mime.starts_with("text/") {
        let text = String::from_utf8(body.to_vec())
            .map_err(|_| Error::Parse("Invalid request payload text encoding".to_string()))?;
        Payload::Text(text)
    } else {
        Payload::Buffer(body)
    };
    Ok(())
}
