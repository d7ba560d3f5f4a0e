//! Compile textual templates back into formats.
//!
//! The accepted syntax is what [`Format::template_string`](super::Format::template_string)
//! renders: literal segments, `:Int` / `:String` placeholders, and query items whose value is
//! a placeholder or a literal. `/users/:Int/posts?sort=:String&kind=draft` compiles to a
//! `Format<Vec<Param>>` capturing `[Int, String]`.

use serde::Serialize;
use thiserror::Error;

use super::{end, path, query, segment, Format, PartialIso, UrlComponents};

/// A value captured by a compiled template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Param {
    Int(i64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template must start with '/': {0:?}")]
    MissingLeadingSlash(String),
    #[error("unknown placeholder {placeholder:?} in {template:?}")]
    UnknownPlaceholder { template: String, placeholder: String },
    #[error("query item {item:?} in {template:?} has no '='")]
    MalformedQuery { template: String, item: String },
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Int,
    String,
}

impl Kind {
    fn from_placeholder(raw: &str) -> Option<Option<Kind>> {
        match raw.strip_prefix(':') {
            None => Some(None),
            Some("Int") => Some(Some(Kind::Int)),
            Some("String") => Some(Some(Kind::String)),
            Some(_) => None,
        }
    }

    fn iso(self) -> PartialIso<Param> {
        match self {
            Kind::Int => PartialIso::new(
                "Int",
                |raw| raw.parse().ok().map(Param::Int),
                |param| match param {
                    Param::Int(value) => Some(value.to_string()),
                    Param::String(_) => None,
                },
            ),
            Kind::String => PartialIso::new(
                "String",
                |raw| (!raw.is_empty()).then(|| Param::String(raw.to_string())),
                |param| match param {
                    Param::String(value) if !value.is_empty() => Some(value.clone()),
                    _ => None,
                },
            ),
        }
    }
}

/// Compile `template` into a format capturing placeholders in order.
///
/// With `exact` the path must be fully consumed; otherwise the template is a prefix.
pub fn compile(template: &str, exact: bool) -> Result<Format<Vec<Param>>, TemplateError> {
    if !template.starts_with('/') {
        return Err(TemplateError::MissingLeadingSlash(template.to_string()));
    }

    let unknown = |placeholder: &str| TemplateError::UnknownPlaceholder {
        template: template.to_string(),
        placeholder: placeholder.to_string(),
    };

    let (path_part, query_part) = match template.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (template, None),
    };
    let parsed = UrlComponents::from_parts(path_part, None);

    let mut format = Format::<Vec<Param>>::list();
    for raw in parsed.segments() {
        format = match Kind::from_placeholder(raw).ok_or_else(|| unknown(raw))? {
            Some(kind) => format.push(segment(kind.iso())),
            None => format.skip(path(raw.as_str())),
        };
    }

    for item in query_part.unwrap_or_default().split('&').filter(|item| !item.is_empty()) {
        let (name, value) = item.split_once('=').ok_or_else(|| TemplateError::MalformedQuery {
            template: template.to_string(),
            item: item.to_string(),
        })?;
        format = match Kind::from_placeholder(value).ok_or_else(|| unknown(value))? {
            Some(kind) => format.push(query(name, kind.iso())),
            None => format.skip(query(name, PartialIso::exactly(value))),
        };
    }

    Ok(if exact { format.skip(end()) } else { format })
}
