//! Data model for the upload pipeline.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_protocol::form::ProtocolVariant;

/// Key material and lengths reported by the encrypter collaborator for one
/// staged file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedFileMetadata {
    /// Random fixed-size encryption key.
    pub key: Vec<u8>,
    /// Hash over the exact ciphertext bytes.
    pub digest: Vec<u8>,
    pub plaintext_length: u64,
    pub encrypted_length: u64,
}

/// A staged ciphertext file plus everything needed to upload it and later
/// let a receiver verify and decrypt it.
///
/// The file at `cipher_file` is exclusively owned and never mutated after
/// staging, so `digest` stays valid for its whole lifetime. Deletion is the
/// job of the guard returned alongside this value.
#[derive(Debug, Clone)]
pub struct StagedAttachment {
    pub cipher_file: PathBuf,
    pub encryption_key: Vec<u8>,
    pub digest: Vec<u8>,
    pub plaintext_length: u64,
    pub encrypted_length: u64,
}

/// Server-reported progress for a resumable session, queried before every
/// resumed sub-attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeProgress {
    /// Every byte has been durably accepted; nothing left to send.
    Complete,
    /// The server has durably accepted this many bytes; resume from here.
    Uploaded(u64),
    /// The session state is unusable; rebuild the attempt from scratch.
    RequiresRestart,
}

/// Successful upload, handed to the caller for durable persistence as
/// transit-tier metadata. The pipeline itself never writes durable storage.
#[derive(Debug, Clone)]
pub struct UploadResult {
    /// Opaque session key the ciphertext is addressed by remotely.
    pub session_key: String,
    pub variant: ProtocolVariant,
    pub attachment: StagedAttachment,
    /// When the successful attempt was built.
    pub begun_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Capped exponential backoff.
///
/// Deliberately jitter-free: the retry taxonomy requires the delay to be
/// monotonically non-decreasing in the attempt number.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the delay.
    pub max_delay: Duration,
    /// Multiplier per attempt.
    pub factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Delay before attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.factor.powi(exp);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Tunables for [`AttachmentUploader`](crate::coordinator::AttachmentUploader).
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    pub backoff: BackoffConfig,
    /// Resume-retry ceiling inside one attempt.
    pub max_resume_retries: u32,
    /// Immediate retries for a single progress query's transport errors.
    pub max_progress_query_retries: u32,
    /// Ceiling on restart-class rebuilds of the whole attempt. The observed
    /// upstream behavior is unbounded; this bound exists so a permanently
    /// broken control plane cannot spin forever.
    pub max_restart_attempts: u32,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            max_resume_retries: crate::MAX_RESUME_RETRIES,
            max_progress_query_retries: crate::MAX_PROGRESS_QUERY_RETRIES,
            max_restart_attempts: 8,
        }
    }
}
