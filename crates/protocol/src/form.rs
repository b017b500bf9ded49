//! Control-plane upload form descriptor.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Storage-endpoint protocol variant.
///
/// A closed set: the control plane only ever issues these two, and endpoint
/// dispatch matches on it exhaustively. The wire encoding is the endpoint
/// number (`"cdn": 2` or `"cdn": 3`); any other value fails form parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ProtocolVariant {
    /// Byte-range resumable flow (`PUT` + `Content-Range`).
    V2,
    /// Forms-based POST flow (`POST`/`PATCH` + `Upload-Offset`).
    V3,
}

impl ProtocolVariant {
    /// Short name used in logs and persisted transit metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVariant::V2 => "V2",
            ProtocolVariant::V3 => "V3",
        }
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an endpoint number outside the closed variant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown protocol variant: cdn {0}")]
pub struct UnknownVariant(pub u32);

impl TryFrom<u32> for ProtocolVariant {
    type Error = UnknownVariant;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(ProtocolVariant::V2),
            3 => Ok(ProtocolVariant::V3),
            other => Err(UnknownVariant(other)),
        }
    }
}

impl From<ProtocolVariant> for u32 {
    fn from(variant: ProtocolVariant) -> Self {
        match variant {
            ProtocolVariant::V2 => 2,
            ProtocolVariant::V3 => 3,
        }
    }
}

/// One-time-use upload authorization issued by the control plane.
///
/// Time-limited and single-use: the coordinator re-fetches a fresh form for
/// every restart and never persists one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadForm {
    /// Which endpoint variant this form authorizes.
    #[serde(rename = "cdn")]
    pub variant: ProtocolVariant,
    /// Opaque session identifier; becomes the transit-tier key on success.
    #[serde(rename = "key")]
    pub session_key: String,
    /// Signed URL the endpoint flow starts from.
    pub signed_upload_location: String,
    /// Variant-specific auth headers to attach to endpoint requests.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl UploadForm {
    /// Parses and validates a control-plane allocation response body.
    pub fn from_response_body(body: &[u8]) -> Result<Self, FormError> {
        let form: UploadForm = serde_json::from_slice(body)?;
        if form.session_key.is_empty() {
            return Err(FormError::MissingField("key"));
        }
        if form.signed_upload_location.is_empty() {
            return Err(FormError::MissingField("signedUploadLocation"));
        }
        Ok(form)
    }
}

/// Errors from decoding an allocation response.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("undecodable form response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("form response missing required field: {0}")]
    MissingField(&'static str),
}
