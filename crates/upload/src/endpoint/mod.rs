//! Storage-endpoint protocol variants.
//!
//! A closed set of two wire protocols behind one capability surface:
//! obtain a resumable session location, ask how many bytes the server has
//! durably accepted, and push bytes from an arbitrary offset. Dispatch is
//! an exhaustive match on the form's [`ProtocolVariant`]; there is
//! deliberately no open extension point.

mod v2;
mod v3;

use std::fmt;
use std::sync::Arc;

use courier_protocol::form::{ProtocolVariant, UploadForm};

use crate::error::UploadError;
use crate::net::BlobClient;
use crate::progress::ProgressFn;
use crate::types::{ResumeProgress, StagedAttachment};

pub use v2::EndpointV2;
pub use v3::EndpointV3;

/// A protocol-variant endpoint bound to one attempt's upload form.
///
/// Instances are built fresh for every attempt and never shared across
/// attempts, so a stale session can never leak into a rebuilt one.
pub enum Endpoint {
    V2(EndpointV2),
    V3(EndpointV3),
}

impl Endpoint {
    /// Builds the endpoint matching the form's protocol variant.
    pub fn for_form(form: &UploadForm, blob: Arc<dyn BlobClient>) -> Self {
        match form.variant {
            ProtocolVariant::V2 => Endpoint::V2(EndpointV2::new(form.clone(), blob)),
            ProtocolVariant::V3 => Endpoint::V3(EndpointV3::new(form.clone(), blob)),
        }
    }

    /// Obtains the resumable session location. Called once per attempt,
    /// right after the form is fetched.
    pub async fn fetch_resumable_location(&self) -> Result<String, UploadError> {
        match self {
            Endpoint::V2(endpoint) => endpoint.fetch_resumable_location().await,
            Endpoint::V3(endpoint) => Ok(endpoint.resumable_location()),
        }
    }

    /// Asks the server how many bytes it has durably accepted for this
    /// session.
    pub async fn query_progress(
        &self,
        location: &str,
        staged: &StagedAttachment,
    ) -> Result<ResumeProgress, UploadError> {
        match self {
            Endpoint::V2(endpoint) => endpoint.query_progress(location, staged).await,
            Endpoint::V3(endpoint) => endpoint.query_progress(location, staged).await,
        }
    }

    /// Streams ciphertext from `start_offset` through the end of the staged
    /// file. `on_progress` observes this call's counts only; rebasing onto
    /// the whole upload is the coordinator's job.
    pub async fn perform_transfer(
        &self,
        location: &str,
        start_offset: u64,
        staged: &StagedAttachment,
        on_progress: &ProgressFn<'_>,
    ) -> Result<(), UploadError> {
        match self {
            Endpoint::V2(endpoint) => {
                endpoint
                    .perform_transfer(location, start_offset, staged, on_progress)
                    .await
            }
            Endpoint::V3(endpoint) => {
                endpoint
                    .perform_transfer(location, start_offset, staged, on_progress)
                    .await
            }
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::V2(_) => f.write_str("Endpoint::V2"),
            Endpoint::V3(_) => f.write_str("Endpoint::V3"),
        }
    }
}

/// Maps a transfer-time HTTP status to the error taxonomy: statuses that
/// mean "this session is gone" invalidate the attempt, everything else is
/// an unexpected status left for classification.
pub(crate) fn transfer_status_error(status: u16) -> UploadError {
    match status {
        403 | 404 | 410 => {
            UploadError::SessionInvalidated(format!("storage endpoint returned {status}"))
        }
        other => UploadError::UnexpectedStatus(other),
    }
}
