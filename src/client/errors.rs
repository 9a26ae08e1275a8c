use std::{sync::Arc, time::Duration};

use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::domain::models::{ErrorResponse, Operation};
use crate::tls::TlsError;
use crate::transport::TransportError;

/// Errors returned by the order operations.
///
/// No variant is retried internally. A [`Error::Timeout`] means the outcome of the
/// remote call is unknown: the order may have been created, cancelled or completed
/// despite the local deadline firing. Callers must collect again rather than assume
/// failure.
#[derive(Error, Debug)]
pub enum Error {
    /// The payload was rejected before any network access.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to initialize the transport session: {0}")]
    Init(#[from] InitError),

    #[error("{operation} did not complete within {timeout:?}, the remote outcome is unknown")]
    Timeout {
        operation: Operation,
        timeout: Duration,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The endpoint answered with a structured failure, e.g. a terminated order.
    #[error(
        "{operation} rejected with status {status}: {} {}",
        .error.error_code,
        .error.details
    )]
    Remote {
        operation: Operation,
        status: u16,
        error: ErrorResponse,
    },
}

/// First constraint violated by an outgoing payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid payload: `{field}` violates `{constraint}`")]
pub struct ValidationError {
    pub field: String,
    pub constraint: String,
}

impl From<ValidationErrors> for ValidationError {
    fn from(errors: ValidationErrors) -> Self {
        let mut found = Vec::new();
        collect_violations(&errors, "", &mut found);
        // HashMap order is arbitrary
        found.sort();

        let (field, constraint) = found
            .into_iter()
            .next()
            .unwrap_or_else(|| (String::new(), "invalid".to_string()));
        Self { field, constraint }
    }
}

fn collect_violations(errors: &ValidationErrors, prefix: &str, found: &mut Vec<(String, String)>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errors) => {
                found.extend(errors.iter().map(|e| (path.clone(), e.code.to_string())));
            }
            ValidationErrorsKind::Struct(inner) => collect_violations(inner, &path, found),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_violations(inner, &format!("{path}[{index}]"), found);
                }
            }
        }
    }
}

/// Failure to set up the transport session.
///
/// The session stays uninitialized and the next call attempts it again.
#[derive(Error, Debug, Clone)]
pub enum InitError {
    #[error(transparent)]
    Tls(Arc<TlsError>),

    #[error("invalid endpoint address {url:?}: {reason}")]
    Endpoint { url: String, reason: String },

    #[error("initialization task did not finish: {0}")]
    Interrupted(String),
}

impl From<TlsError> for InitError {
    fn from(error: TlsError) -> Self {
        InitError::Tls(Arc::new(error))
    }
}

/// The endpoint answered, but not in the shape the operation defines.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("failed to encode {operation} request: {source}")]
    Encode {
        operation: Operation,
        source: serde_json::Error,
    },

    #[error("malformed {operation} response body: {source}")]
    MalformedBody {
        operation: Operation,
        source: serde_json::Error,
    },

    #[error("expected a {expected} response, got {actual}")]
    UnexpectedResponse {
        expected: Operation,
        actual: Operation,
    },

    #[error("incomplete {operation} response: {reason}")]
    Incomplete {
        operation: Operation,
        reason: &'static str,
    },

    #[error("unexpected status {status} from {operation}: {body}")]
    UnexpectedStatus {
        operation: Operation,
        status: u16,
        body: String,
    },
}
