//! Resumable encrypted attachment uploads.
//!
//! This crate implements the **business logic** for pushing large encrypted
//! attachment payloads to remote blob-storage endpoints. It is a library
//! crate with no transport or crypto dependencies of its own: the embedding
//! app supplies an encrypter, a temp-file store, and HTTP clients through
//! the traits in [`stage`] and [`net`].
//!
//! # Pipeline
//!
//! 1. **Stage** — encrypt the source into an exclusively-owned temp file
//! 2. **Authorize** — fetch a one-time upload form from the control plane
//! 3. **Locate** — obtain a resumable session on the storage endpoint
//! 4. **Transfer** — stream ciphertext, resuming from the server's
//!    acknowledged offset after interruptions
//! 5. **Hand off** — return transit-tier metadata for the caller to persist
//!
//! Transient failures resume the same session with capped exponential
//! backoff; session-loss failures rebuild the whole attempt; the staged
//! ciphertext is deleted on every exit path, cancellation included.

pub mod coordinator;
pub mod endpoint;
pub mod error;
pub mod form;
pub mod net;
pub mod progress;
pub mod stage;
pub mod types;

#[cfg(test)]
mod testutil;

// Re-export primary types for convenience.
pub use coordinator::{AttachmentUploader, UploadAttempt};
pub use endpoint::{Endpoint, EndpointV2, EndpointV3};
pub use error::{Delay, FailureMode, UploadError, classify_failure};
pub use form::fetch_upload_form;
pub use net::{BlobClient, BoxFuture, ControlPlaneClient, NetworkError};
pub use progress::{ProgressAdapter, ProgressCallback, ProgressFn};
pub use stage::{AttachmentEncrypter, EncryptError, FileStore, StagedFileGuard};
pub use types::{
    BackoffConfig, EncryptedFileMetadata, ResumeProgress, StagedAttachment, UploadResult,
    UploaderConfig,
};

/// Ceiling on consecutive resume-class retries inside one attempt.
pub const MAX_RESUME_RETRIES: u32 = 8;

/// Immediate retries for a single progress query's transport errors.
pub const MAX_PROGRESS_QUERY_RETRIES: u32 = 2;
