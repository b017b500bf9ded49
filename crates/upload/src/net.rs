//! Network collaborator traits.
//!
//! The embedding app implements these on top of its real HTTP stack. Using
//! traits keeps the pipeline decoupled from transport and testable with
//! mocks. Transport failures come back as [`NetworkError`]; HTTP responses
//! of *any* status come back as plain [`HttpResponse`] values, and the
//! endpoints decide what a 308 or a 410 means.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use courier_protocol::http::{HttpRequest, HttpResponse};

use crate::progress::ProgressFn;

/// Boxed future used by collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Transport-level failure. Always transient from the pipeline's point of
/// view; the coordinator decides how often to retry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),
}

/// Authenticated client for the control plane.
pub trait ControlPlaneClient: Send + Sync {
    /// Requests a one-time upload authorization.
    ///
    /// Returns the raw response body; decoding is the form fetcher's job.
    fn request_upload_form(&self) -> BoxFuture<'_, Result<Vec<u8>, NetworkError>>;
}

/// Plain HTTP client for storage endpoints.
pub trait BlobClient: Send + Sync {
    /// Performs a header-only request (no body).
    fn perform(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, NetworkError>>;

    /// Streams `file[offset..]` as the request body.
    ///
    /// `on_progress` observes `(bytes_sent, bytes_to_send)` for *this call*,
    /// both starting from zero regardless of `offset`.
    fn upload<'a>(
        &'a self,
        request: HttpRequest,
        file: &'a Path,
        offset: u64,
        on_progress: &'a ProgressFn<'a>,
    ) -> BoxFuture<'a, Result<HttpResponse, NetworkError>>;
}
