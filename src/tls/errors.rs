use openssl::error::ErrorStack;
use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors that can occur while loading credential material.
#[derive(Error, Debug)]
pub enum TlsError {
    #[error("failed to read {kind} from {}: {source}", .path.display())]
    Read {
        kind: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("invalid {kind}: {source}")]
    OpenSSL {
        kind: &'static str,
        source: ErrorStack,
    },

    #[error("no certificate found in {0}")]
    NoCertificate(&'static str),

    #[error("PKCS#12 bundle does not contain a {0}")]
    IncompleteBundle(&'static str),

    #[error("private key does not match the client certificate")]
    KeyMismatch,

    #[error(
        "no client identity configured, provide a PKCS#12 bundle or a PEM certificate and private key"
    )]
    MissingIdentity,

    #[error(transparent)]
    Client(#[from] reqwest::Error),
}

impl TlsError {
    pub(crate) fn openssl(kind: &'static str) -> impl FnOnce(ErrorStack) -> Self {
        move |source| TlsError::OpenSSL { kind, source }
    }
}
