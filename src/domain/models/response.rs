use serde::{Deserialize, Serialize};
use std::fmt;

/// Response of an authentication order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateResponse {
    pub order_ref: String,
    /// Used to start the BankID app from the same device.
    pub auto_start_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_start_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_start_secret: Option<String>,
}

/// Response of a sign order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignResponse {
    pub order_ref: String,
    pub auto_start_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_start_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_start_secret: Option<String>,
}

/// State of an order as reported by collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectStatus {
    Pending,
    Complete,
    Failed,
}

impl CollectStatus {
    /// Whether the order has left the pending state.
    pub fn is_final(&self) -> bool {
        !matches!(self, CollectStatus::Pending)
    }
}

/// Detail about a pending or failed order, meant to drive user messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HintCode {
    // pending
    OutstandingTransaction,
    NoClient,
    Started,
    UserSign,
    // failed
    ExpiredTransaction,
    CertificateErr,
    UserCancel,
    Cancelled,
    StartFailed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub personal_number: String,
    pub name: String,
    pub given_name: String,
    pub surname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub ip_address: String,
}

/// Validity of the user certificate, as unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cert {
    pub not_before: String,
    pub not_after: String,
}

/// Result of a completed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionData {
    pub user: User,
    pub device: Device,
    pub cert: Cert,
    /// XML signature, base64 encoded.
    pub signature: String,
    /// OCSP response, base64 encoded.
    pub ocsp_response: String,
}

/// Response of a collect call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_ref: Option<String>,
    pub status: CollectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint_code: Option<HintCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_data: Option<CompletionData>,
}

/// Response of a cancel call. The endpoint answers with an empty object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelResponse {}

/// Error codes returned by the endpoint together with a non-success status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    AlreadyInProgress,
    InvalidParameters,
    Unauthorized,
    NotFound,
    MethodNotAllowed,
    RequestTimeout,
    UnsupportedMediaType,
    InternalError,
    Maintenance,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ErrorCode::AlreadyInProgress => "alreadyInProgress",
            ErrorCode::InvalidParameters => "invalidParameters",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::NotFound => "notFound",
            ErrorCode::MethodNotAllowed => "methodNotAllowed",
            ErrorCode::RequestTimeout => "requestTimeout",
            ErrorCode::UnsupportedMediaType => "unsupportedMediaType",
            ErrorCode::InternalError => "internalError",
            ErrorCode::Maintenance => "maintenance",
            ErrorCode::Unknown => "unknown",
        };
        f.write_str(code)
    }
}

/// Structured failure returned by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    #[serde(default)]
    pub details: String,
}
