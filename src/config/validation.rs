//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check methods, status codes, path templates and upstream URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function over the parsed config

use hyper::StatusCode;
use thiserror::Error;
use url::Url;

use crate::config::schema::MockConfig;
use crate::format::{compile, TemplateError};

/// Methods the route shorthands cover.
pub const SUPPORTED_METHODS: [&str; 5] = ["GET", "PUT", "POST", "PATCH", "DELETE"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("stub {stub:?}: unsupported method {method:?}")]
    UnsupportedMethod { stub: String, method: String },
    #[error("stub {stub:?}: invalid status {status}")]
    InvalidStatus { stub: String, status: u16 },
    #[error("stub {stub:?}: `body` and `json` are mutually exclusive")]
    BodyConflict { stub: String },
    #[error("{entry:?}: {source}")]
    Template {
        entry: String,
        #[source]
        source: TemplateError,
    },
    #[error("redirect {redirect:?}: invalid upstream {upstream:?}")]
    InvalidUpstream { redirect: String, upstream: String },
    #[error("server.max_connections must be greater than zero")]
    ZeroMaxConnections,
}

pub fn validate_config(config: &MockConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    for stub in &config.stubs {
        check_method(&stub.name, &stub.method, &mut errors);
        if StatusCode::from_u16(stub.status).is_err() {
            errors.push(ValidationError::InvalidStatus {
                stub: stub.name.clone(),
                status: stub.status,
            });
        }
        if stub.body.is_some() && stub.json.is_some() {
            errors.push(ValidationError::BodyConflict {
                stub: stub.name.clone(),
            });
        }
        check_template(&stub.name, &stub.path, &mut errors);
    }

    for redirect in &config.redirects {
        if let Some(method) = &redirect.method {
            check_method(&redirect.name, method, &mut errors);
        }
        check_template(&redirect.name, &redirect.path, &mut errors);
        let valid_upstream = Url::parse(&redirect.upstream)
            .map(|url| url.has_host() && matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid_upstream {
            errors.push(ValidationError::InvalidUpstream {
                redirect: redirect.name.clone(),
                upstream: redirect.upstream.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_method(entry: &str, method: &str, errors: &mut Vec<ValidationError>) {
    if !SUPPORTED_METHODS.contains(&method.to_ascii_uppercase().as_str()) {
        errors.push(ValidationError::UnsupportedMethod {
            stub: entry.to_string(),
            method: method.to_string(),
        });
    }
}

fn check_template(entry: &str, template: &str, errors: &mut Vec<ValidationError>) {
    if let Err(source) = compile(template, false) {
        errors.push(ValidationError::Template {
            entry: entry.to_string(),
            source,
        });
    }
}
