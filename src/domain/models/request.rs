use serde::de::DeserializeOwned;
use std::fmt;
use validator::{Validate, ValidationErrors};

use super::{
    AuthenticateResponse, AuthenticationPayload, CancelPayload, CancelResponse, CollectPayload,
    CollectResponse, CollectStatus, SignPayload, SignResponse,
};
use crate::client::ProtocolError;

/// Tag identifying one of the four remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Authenticate,
    Sign,
    Collect,
    Cancel,
}

impl Operation {
    /// Path of the operation relative to the endpoint base address.
    pub fn path(&self) -> &'static str {
        match self {
            Operation::Authenticate => "auth",
            Operation::Sign => "sign",
            Operation::Collect => "collect",
            Operation::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// An outgoing call, carrying exactly one payload.
#[derive(Debug, Clone, Copy)]
pub enum Request<'a> {
    Authenticate(&'a AuthenticationPayload),
    Sign(&'a SignPayload),
    Collect(&'a CollectPayload),
    Cancel(&'a CancelPayload),
}

impl Request<'_> {
    pub fn operation(&self) -> Operation {
        match self {
            Request::Authenticate(_) => Operation::Authenticate,
            Request::Sign(_) => Operation::Sign,
            Request::Collect(_) => Operation::Collect,
            Request::Cancel(_) => Operation::Cancel,
        }
    }

    /// Checks the payload against its declared constraints.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            Request::Authenticate(payload) => payload.validate(),
            Request::Sign(payload) => payload.validate(),
            Request::Collect(payload) => payload.validate(),
            Request::Cancel(payload) => payload.validate(),
        }
    }

    /// Serializes the payload into the JSON wire body.
    pub fn to_body(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            Request::Authenticate(payload) => serde_json::to_vec(payload),
            Request::Sign(payload) => serde_json::to_vec(payload),
            Request::Collect(payload) => serde_json::to_vec(payload),
            Request::Cancel(payload) => serde_json::to_vec(payload),
        }
    }
}

/// A decoded response, tagged like the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Authenticate(AuthenticateResponse),
    Sign(SignResponse),
    Collect(CollectResponse),
    Cancel(CancelResponse),
}

impl Response {
    pub fn operation(&self) -> Operation {
        match self {
            Response::Authenticate(_) => Operation::Authenticate,
            Response::Sign(_) => Operation::Sign,
            Response::Collect(_) => Operation::Collect,
            Response::Cancel(_) => Operation::Cancel,
        }
    }

    /// Decodes a success body as the response of `operation`.
    pub fn decode(operation: Operation, body: &[u8]) -> Result<Self, ProtocolError> {
        let response = match operation {
            Operation::Authenticate => Response::Authenticate(parse(operation, body)?),
            Operation::Sign => Response::Sign(parse(operation, body)?),
            Operation::Collect => {
                let collect: CollectResponse = parse(operation, body)?;
                if collect.status == CollectStatus::Complete && collect.completion_data.is_none() {
                    return Err(ProtocolError::Incomplete {
                        operation,
                        reason: "complete order without completion data",
                    });
                }
                Response::Collect(collect)
            }
            Operation::Cancel => Response::Cancel(parse(operation, body)?),
        };
        Ok(response)
    }

    pub fn into_authenticate(self) -> Result<AuthenticateResponse, ProtocolError> {
        match self {
            Response::Authenticate(response) => Ok(response),
            other => Err(mismatch(Operation::Authenticate, &other)),
        }
    }

    pub fn into_sign(self) -> Result<SignResponse, ProtocolError> {
        match self {
            Response::Sign(response) => Ok(response),
            other => Err(mismatch(Operation::Sign, &other)),
        }
    }

    pub fn into_collect(self) -> Result<CollectResponse, ProtocolError> {
        match self {
            Response::Collect(response) => Ok(response),
            other => Err(mismatch(Operation::Collect, &other)),
        }
    }

    pub fn into_cancel(self) -> Result<CancelResponse, ProtocolError> {
        match self {
            Response::Cancel(response) => Ok(response),
            other => Err(mismatch(Operation::Cancel, &other)),
        }
    }
}

fn parse<T: DeserializeOwned>(operation: Operation, body: &[u8]) -> Result<T, ProtocolError> {
    serde_json::from_slice(body).map_err(|source| ProtocolError::MalformedBody { operation, source })
}

fn mismatch(expected: Operation, actual: &Response) -> ProtocolError {
    ProtocolError::UnexpectedResponse {
        expected,
        actual: actual.operation(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tags_select_paths() {
        let auth = AuthenticationPayload::new("127.0.0.1");
        let sign = SignPayload::new("127.0.0.1", "hello");
        let collect = CollectPayload::new("abc123");
        let cancel = CancelPayload::new("abc123");

        let paths: Vec<_> = [
            Request::Authenticate(&auth),
            Request::Sign(&sign),
            Request::Collect(&collect),
            Request::Cancel(&cancel),
        ]
        .iter()
        .map(|r| r.operation().path())
        .collect();

        assert_eq!(paths, vec!["auth", "sign", "collect", "cancel"]);
    }

    #[test]
    fn test_decode_keeps_request_tag() {
        let body = br#"{"orderRef":"abc123","autoStartToken":"token"}"#;
        let auth = Response::decode(Operation::Authenticate, body).unwrap();
        let sign = Response::decode(Operation::Sign, body).unwrap();

        assert_eq!(auth.operation(), Operation::Authenticate);
        assert_eq!(sign.operation(), Operation::Sign);
        assert_eq!(auth.into_authenticate().unwrap().order_ref, "abc123");
    }

    #[test]
    fn test_mismatched_variant_is_a_protocol_error() {
        let response = Response::Cancel(CancelResponse {});
        let err = response.into_collect().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnexpectedResponse {
                expected: Operation::Collect,
                actual: Operation::Cancel
            }
        ));
    }

    #[test]
    fn test_collect_body_decoded_as_cancel_fails() {
        let err = Response::decode(Operation::Cancel, br#"{"status":"pending"}"#).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedBody {
                operation: Operation::Cancel,
                ..
            }
        ));
    }

    #[test]
    fn test_complete_without_completion_data_is_rejected() {
        let err = Response::decode(Operation::Collect, br#"{"status":"complete"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Incomplete { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let err = Response::decode(Operation::Collect, b"<html>").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedBody { .. }));
    }
}
