//! URL components consumed and produced by formats.
//!
//! # Responsibilities
//! - Split a request target into path segments and query items
//! - Render components back into an origin-form target
//! - Provide a borrowed cursor so parsers never copy the input
//!
//! # Design Decisions
//! - Exactly one leading `/` is stripped; `""` and `"/"` have no segments
//! - No trailing-slash normalization: `/a/` is `["a", ""]`
//! - A query piece without `=` is kept as a malformed item, not dropped

use std::fmt;

use hyper::Uri;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const QUERY: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>');

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// A single `name=value` query pair.
///
/// `value` is `None` for a malformed piece that carried no `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryItem {
    name: String,
    value: Option<String>,
}

impl QueryItem {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn malformed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// Decoded path segments plus query items of a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlComponents {
    segments: Vec<String>,
    query: Vec<QueryItem>,
}

impl UrlComponents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a raw path and optional raw query string.
    pub fn from_parts(path: &str, query: Option<&str>) -> Self {
        let path = path.strip_prefix('/').unwrap_or(path);
        let segments = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/').map(decode).collect()
        };

        let query = query
            .unwrap_or_default()
            .split('&')
            .filter(|piece| !piece.is_empty())
            .map(|piece| match piece.split_once('=') {
                Some((name, value)) => QueryItem::new(decode(name), decode(value)),
                None => QueryItem::malformed(decode(piece)),
            })
            .collect();

        Self { segments, query }
    }

    pub fn from_uri(uri: &Uri) -> Self {
        Self::from_parts(uri.path(), uri.query())
    }

    /// Parse an origin-form target such as `/users/42?page=2`.
    pub fn parse(target: &str) -> Self {
        match target.split_once('?') {
            Some((path, query)) => Self::from_parts(path, Some(query)),
            None => Self::from_parts(target, None),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn query(&self) -> &[QueryItem] {
        &self.query
    }

    /// True when no path segments remain. Query items are ignored.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push(QueryItem::new(name, value));
        self
    }

    /// Concatenate: segments of `other` follow ours, and so do its query items.
    pub fn append(mut self, other: UrlComponents) -> Self {
        self.segments.extend(other.segments);
        self.query.extend(other.query);
        self
    }

    pub fn as_slice(&self) -> UrlSlice<'_> {
        UrlSlice {
            segments: &self.segments,
            query: &self.query,
        }
    }

    /// Render as an origin-form target, percent-encoding as needed.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for UrlComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            f.write_str("/")?;
        }
        for segment in &self.segments {
            write!(f, "/{}", utf8_percent_encode(segment, SEGMENT))?;
        }
        for (i, item) in self.query.iter().enumerate() {
            f.write_str(if i == 0 { "?" } else { "&" })?;
            write!(f, "{}", utf8_percent_encode(&item.name, QUERY))?;
            if let Some(value) = &item.value {
                write!(f, "={}", utf8_percent_encode(value, QUERY))?;
            }
        }
        Ok(())
    }
}

/// Borrowed view of the components still to be consumed by a parser.
#[derive(Debug, Clone, Copy)]
pub struct UrlSlice<'a> {
    segments: &'a [String],
    query: &'a [QueryItem],
}

impl<'a> UrlSlice<'a> {
    /// Take the next path segment.
    pub fn split_first(self) -> Option<(&'a str, UrlSlice<'a>)> {
        let (head, rest) = self.segments.split_first()?;
        Some((
            head.as_str(),
            UrlSlice {
                segments: rest,
                query: self.query,
            },
        ))
    }

    /// Value of the first query item named `name`.
    ///
    /// `Some(None)` means the item exists but is malformed.
    pub fn query_value(&self, name: &str) -> Option<Option<&'a str>> {
        self.query
            .iter()
            .find(|item| item.name == name)
            .map(|item| item.value.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &'a [String] {
        self.segments
    }

    pub fn to_components(self) -> UrlComponents {
        UrlComponents {
            segments: self.segments.to_vec(),
            query: self.query.to_vec(),
        }
    }
}
