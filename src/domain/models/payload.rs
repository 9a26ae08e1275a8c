use base64::{Engine as _, engine::general_purpose::STANDARD};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Swedish personal identity number, `YYYYMMDDNNNN`.
static PERSONAL_NUMBER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{12}$").unwrap());

/// Dotted decimal object identifier, e.g. `1.2.752.78.1.5`.
static OID_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-2](\.[0-9]+)+$").unwrap());

fn must_be_oids(policies: &[String]) -> Result<(), ValidationError> {
    if policies.iter().any(|policy| !OID_REGEX.is_match(policy)) {
        return Err(ValidationError::new("oid"));
    }
    Ok(())
}

// Both data fields travel base64 encoded and the endpoint rejects anything else
fn must_be_base64(val: &str) -> Result<(), ValidationError> {
    if STANDARD.decode(val).is_err() {
        return Err(ValidationError::new("base64"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardReader {
    Class1,
    Class2,
}

/// Requirements on how the order must be performed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_reader: Option<CardReader>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "must_be_oids"))]
    pub certificate_policies: Option<Vec<String>>,
    #[serde(rename = "issuerCn")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_cn: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_start_token_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_fingerprint: Option<bool>,
}

/// Payload of an authentication order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(regex(path = *PERSONAL_NUMBER_REGEX))]
    pub personal_number: Option<String>,
    /// IP address of the user agent as seen by the relying party.
    #[validate(ip)]
    pub end_user_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub requirement: Option<Requirement>,
}

impl AuthenticationPayload {
    pub fn new(end_user_ip: impl Into<String>) -> Self {
        Self {
            personal_number: None,
            end_user_ip: end_user_ip.into(),
            requirement: None,
        }
    }

    /// Restricts the order to the given personal number.
    pub fn with_personal_number(mut self, personal_number: impl Into<String>) -> Self {
        self.personal_number = Some(personal_number.into());
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirement = Some(requirement);
        self
    }
}

/// Payload of a sign order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(regex(path = *PERSONAL_NUMBER_REGEX))]
    pub personal_number: Option<String>,
    #[validate(ip)]
    pub end_user_ip: String,
    /// Text displayed to the user, base64 encoded.
    #[validate(length(min = 1, max = 40000), custom(function = "must_be_base64"))]
    pub user_visible_data: String,
    /// Data not displayed to the user, base64 encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 200000), custom(function = "must_be_base64"))]
    pub user_non_visible_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub requirement: Option<Requirement>,
}

impl SignPayload {
    /// Creates a sign payload, encoding `user_visible_text` as base64.
    pub fn new(end_user_ip: impl Into<String>, user_visible_text: impl AsRef<[u8]>) -> Self {
        Self {
            personal_number: None,
            end_user_ip: end_user_ip.into(),
            user_visible_data: STANDARD.encode(user_visible_text),
            user_non_visible_data: None,
            requirement: None,
        }
    }

    pub fn with_personal_number(mut self, personal_number: impl Into<String>) -> Self {
        self.personal_number = Some(personal_number.into());
        self
    }

    /// Attaches data that is signed but not shown to the user, encoding it as base64.
    pub fn with_user_non_visible_data(mut self, data: impl AsRef<[u8]>) -> Self {
        self.user_non_visible_data = Some(STANDARD.encode(data));
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirement = Some(requirement);
        self
    }
}

/// Payload of a collect call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CollectPayload {
    /// The orderRef returned by authenticate or sign.
    #[validate(length(min = 1))]
    pub order_ref: String,
}

impl CollectPayload {
    pub fn new(order_ref: impl Into<String>) -> Self {
        Self {
            order_ref: order_ref.into(),
        }
    }
}

/// Payload of a cancel call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelPayload {
    /// The orderRef returned by authenticate or sign.
    #[validate(length(min = 1))]
    pub order_ref: String,
}

impl CancelPayload {
    pub fn new(order_ref: impl Into<String>) -> Self {
        Self {
            order_ref: order_ref.into(),
        }
    }
}
