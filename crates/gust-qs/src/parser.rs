//! Nested query parsing
//!
//! Keys are split into a root and bracket segments (`a[0][b]` -> `a`, `0`, `b`)
//! and merged into one tree per request:
//!
//! - `[]` appends; `a[][b]=1&a[][c]=2` fills one element, a repeated `b` starts the next
//! - numeric segments up to `array_limit` become array positions, sparse indices compact
//! - a mapping that mixes indices and names stays a mapping (`{"0": .., "b": ..}`)
//! - segments past `depth` stay in the key as one literal segment (`[c]`)
//! - a plain key repeated several times collects its values into an array
//!
//! Without `strict`, `%5B`/`%5D` act as brackets and keys with unbalanced
//! brackets are kept literally. With `strict`, only raw brackets are
//! structural and unbalanced keys are rejected.

use crate::options::ParserOptions;
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;
use url::form_urlencoded;

/// Turns bracketed keys into nested structures
pub trait NestedParser: Send + Sync {
    /// Parse a raw (still percent-encoded) query string
    fn parse_query(&self, query: &str) -> Result<Map<String, Value>>;

    /// Parse already decoded flat fields (`key -> string` or `key -> [string]`)
    fn parse_fields(&self, fields: &Map<String, Value>) -> Result<Map<String, Value>>;
}

/// Default [`NestedParser`], configured from `parserOptions`
#[derive(Debug, Clone, Default)]
pub struct QsParser {
    options: ParserOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Append,
}

/// Intermediate tree. Array-ness is decided once everything is merged.
#[derive(Debug)]
enum Node {
    Values(Vec<String>),
    Fields(Fields),
}

#[derive(Debug, Default)]
struct Fields {
    entries: BTreeMap<String, Node>,
    /// Some entry was addressed by name or explicit index rather than `[]`
    explicit: bool,
}

impl QsParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Split a key into its root and segments.
    ///
    /// `key` is scanned as given; `decode` maps each piece to its final text.
    fn split_key(&self, key: &str, decode: impl Fn(&str) -> String) -> Result<(String, Vec<Segment>)> {
        let literal = |key: &str| -> Result<(String, Vec<Segment>)> { Ok((decode(key), Vec::new())) };
        if self.options.depth == 0 {
            return literal(key);
        }

        let Some((root, spans)) = bracket_spans(key) else {
            if self.options.strict && (key.contains('[') || key.contains(']')) {
                return Err(Error::Parse(format!("malformed key {key:?}")));
            }
            return literal(key);
        };
        if spans.is_empty() {
            return literal(key);
        }

        let mut root = decode(root);
        let mut spans = spans.as_slice();
        if root.is_empty() {
            // `[a][b]` is rooted at `a`
            let (start, end) = spans[0];
            root = decode(&key[start + 1..end]);
            spans = &spans[1..];
            if root.is_empty() {
                return literal(key);
            }
        }

        let structural = spans.len().min(self.options.depth);
        let mut segments: Vec<Segment> = spans[..structural]
            .iter()
            .map(|&(start, end)| match decode(&key[start + 1..end]) {
                inner if inner.is_empty() => Segment::Append,
                inner => Segment::Key(inner),
            })
            .collect();
        if let Some(&(rest, _)) = spans.get(structural) {
            segments.push(Segment::Key(decode(&key[rest..])));
        }
        Ok((root, segments))
    }

    fn parse_pairs<'a>(&self, pairs: impl IntoIterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Result<Map<String, Value>> {
        let mut root = Fields::default();
        for (key, value) in pairs {
            if key.is_empty() {
                continue;
            }
            let (name, segments) = self.split_key(&key, str::to_string)?;
            root.insert(name, &segments, value.into_owned())?;
        }
        Ok(self.finish_fields(root))
    }

    fn finish(&self, node: Node) -> Value {
        match node {
            Node::Values(mut values) if values.len() == 1 => Value::String(values.remove(0)),
            Node::Values(values) => {
                let items = values.into_iter().map(Value::String);
                if self.options.parse_arrays {
                    Value::Array(items.collect())
                } else {
                    Value::Object(items.enumerate().map(|(i, v)| (i.to_string(), v)).collect())
                }
            }
            Node::Fields(fields) => {
                if self.options.parse_arrays && self.is_array(&fields) {
                    let mut indexed: Vec<(usize, Node)> = fields
                        .entries
                        .into_iter()
                        .filter_map(|(k, v)| index_of(&k).map(|i| (i, v)))
                        .collect();
                    indexed.sort_by_key(|(i, _)| *i);
                    Value::Array(indexed.into_iter().map(|(_, v)| self.finish(v)).collect())
                } else {
                    Value::Object(self.finish_fields(fields))
                }
            }
        }
    }

    fn finish_fields(&self, fields: Fields) -> Map<String, Value> {
        fields
            .entries
            .into_iter()
            .map(|(k, v)| (k, self.finish(v)))
            .collect()
    }

    fn is_array(&self, fields: &Fields) -> bool {
        let limit = if fields.explicit {
            self.options.array_limit
        } else {
            usize::MAX
        };
        !fields.entries.is_empty()
            && fields
                .entries
                .keys()
                .all(|k| index_of(k).is_some_and(|i| i <= limit))
    }
}

impl NestedParser for QsParser {
    fn parse_query(&self, query: &str) -> Result<Map<String, Value>> {
        let query = query.strip_prefix('?').unwrap_or(query);
        if !self.options.strict {
            return self.parse_pairs(form_urlencoded::parse(query.as_bytes()));
        }

        // Split on the raw key so encoded brackets stay literal
        let mut root = Fields::default();
        for part in query.split('&').filter(|part| !part.is_empty()) {
            let raw_key = part.split_once('=').map_or(part, |(key, _)| key);
            let Some((key, value)) = form_urlencoded::parse(part.as_bytes()).next() else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            let (name, segments) = self.split_key(raw_key, decode_component)?;
            root.insert(name, &segments, value.into_owned())?;
        }
        Ok(self.finish_fields(root))
    }

    fn parse_fields(&self, fields: &Map<String, Value>) -> Result<Map<String, Value>> {
        let mut pairs = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            flatten_field(Cow::Borrowed(key.as_str()), value, &mut pairs)?;
        }
        self.parse_pairs(pairs)
    }
}

impl Fields {
    fn insert(&mut self, key: String, rest: &[Segment], value: String) -> Result<()> {
        let Some(node) = self.entries.get_mut(&key) else {
            let node = if rest.is_empty() {
                Node::Values(vec![value])
            } else {
                let mut fields = Fields::default();
                fields.descend(rest, value)?;
                Node::Fields(fields)
            };
            self.entries.insert(key, node);
            return Ok(());
        };

        match (node, rest) {
            (Node::Values(values), []) | (Node::Values(values), [Segment::Append]) => {
                values.push(value);
                Ok(())
            }
            (Node::Fields(fields), [_, ..]) => fields.descend(rest, value),
            _ => Err(Error::Parse(format!("key {key:?} is both a value and a mapping"))),
        }
    }

    fn descend(&mut self, path: &[Segment], value: String) -> Result<()> {
        let (head, rest) = match path.split_first() {
            Some(split) => split,
            None => return Ok(()),
        };
        match head {
            Segment::Key(key) => {
                self.explicit = true;
                self.insert(key.clone(), rest, value)
            }
            Segment::Append => {
                // Fill the last element unless it already holds this path
                let reuse = self
                    .entries
                    .iter()
                    .filter_map(|(k, v)| index_of(k).map(|i| (i, k, v)))
                    .max_by_key(|(i, _, _)| *i)
                    .and_then(|(_, k, v)| match v {
                        Node::Fields(fields) if !rest.is_empty() && !fields.has_path(rest) => Some(k.clone()),
                        _ => None,
                    });
                let key = reuse.unwrap_or_else(|| self.next_index().to_string());
                self.insert(key, rest, value)
            }
        }
    }

    fn has_path(&self, path: &[Segment]) -> bool {
        match path.split_first() {
            Some((Segment::Key(key), rest)) => match self.entries.get(key) {
                None => false,
                Some(Node::Fields(fields)) if !rest.is_empty() => fields.has_path(rest),
                Some(_) => true,
            },
            _ => false,
        }
    }

    fn next_index(&self) -> usize {
        self.entries
            .keys()
            .filter_map(|k| index_of(k))
            .max()
            .map_or(0, |i| i + 1)
    }
}

/// Locate the bracket groups of `key`.
///
/// Returns the root and the `(open, close)` byte offsets of each group, or
/// `None` when the brackets are not a clean `root[a][b]` sequence.
fn bracket_spans(key: &str) -> Option<(&str, Vec<(usize, usize)>)> {
    let Some(open) = key.find('[') else {
        return if key.contains(']') { None } else { Some((key, Vec::new())) };
    };
    let root = &key[..open];
    if root.contains(']') {
        return None;
    }

    let bytes = key.as_bytes();
    let mut spans = Vec::new();
    let mut cursor = open;
    while cursor < bytes.len() {
        if bytes[cursor] != b'[' {
            return None;
        }
        let close = cursor + 1 + key[cursor + 1..].find(']')?;
        if key[cursor + 1..close].contains('[') {
            return None;
        }
        spans.push((cursor, close));
        cursor = close + 1;
    }
    Some((root, spans))
}

/// Percent-decode one raw key piece, `+` as space
fn decode_component(raw: &str) -> String {
    form_urlencoded::parse(raw.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_default()
}

fn flatten_field<'a>(
    key: Cow<'a, str>,
    value: &'a Value,
    pairs: &mut Vec<(Cow<'a, str>, Cow<'a, str>)>,
) -> Result<()> {
    match value {
        Value::String(s) => pairs.push((key, Cow::Borrowed(s.as_str()))),
        Value::Null => pairs.push((key, Cow::Borrowed(""))),
        Value::Bool(_) | Value::Number(_) => pairs.push((key, Cow::Owned(value.to_string()))),
        Value::Array(items) => {
            for item in items {
                if item.is_array() || item.is_object() {
                    return Err(Error::Parse(format!("field {key} is nested too deeply")));
                }
                flatten_field(key.clone(), item, pairs)?;
            }
        }
        Value::Object(map) => {
            for (sub, item) in map {
                flatten_field(Cow::Owned(format!("{key}[{sub}]")), item, pairs)?;
            }
        }
    }
    Ok(())
}

fn index_of(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}
