//! Attempt coordinator.
//!
//! Sequences staging, attempt building, and the resumable transfer loop,
//! and owns every retry/backoff/restart decision. One call to
//! [`AttachmentUploader::start`] is one sequential, cooperatively-suspending
//! task; concurrent uploads each get their own staged file and their own
//! session, so there is no shared mutable state to lock.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use courier_protocol::form::UploadForm;

use crate::endpoint::Endpoint;
use crate::error::{Delay, FailureMode, UploadError, classify_failure};
use crate::form::fetch_upload_form;
use crate::net::{BlobClient, ControlPlaneClient};
use crate::progress::{ProgressAdapter, ProgressFn};
use crate::stage::{AttachmentEncrypter, FileStore, stage};
use crate::types::{ResumeProgress, StagedAttachment, UploadResult, UploaderConfig};

/// One fully-built upload attempt: a fresh form, the endpoint it selects,
/// and the resumable session location. Rebuilt from scratch on every
/// restart and never shared across attempts.
#[derive(Debug)]
pub struct UploadAttempt {
    pub form: UploadForm,
    pub endpoint: Endpoint,
    pub location: String,
    pub begun_at: DateTime<Utc>,
}

/// Inner-loop outcome that needs outer-loop handling.
enum AttemptError {
    /// Rebuild form + endpoint + location after the delay.
    Restart(Delay),
    /// Surface to the caller.
    Fatal(UploadError),
}

/// Uploads one attachment end to end.
///
/// All collaborators are constructor-injected; there are no process-wide
/// singletons. A single instance can run any number of sequential uploads,
/// and independent instances upload concurrently without interference.
pub struct AttachmentUploader {
    encrypter: Arc<dyn AttachmentEncrypter>,
    files: Arc<dyn FileStore>,
    control: Arc<dyn ControlPlaneClient>,
    blob: Arc<dyn BlobClient>,
    config: UploaderConfig,
    cancel: CancellationToken,
}

impl AttachmentUploader {
    /// Creates an uploader with default tunables.
    pub fn new(
        encrypter: Arc<dyn AttachmentEncrypter>,
        files: Arc<dyn FileStore>,
        control: Arc<dyn ControlPlaneClient>,
        blob: Arc<dyn BlobClient>,
    ) -> Self {
        Self::with_config(encrypter, files, control, blob, UploaderConfig::default())
    }

    /// Creates an uploader with explicit tunables.
    pub fn with_config(
        encrypter: Arc<dyn AttachmentEncrypter>,
        files: Arc<dyn FileStore>,
        control: Arc<dyn ControlPlaneClient>,
        blob: Arc<dyn BlobClient>,
        config: UploaderConfig,
    ) -> Self {
        Self {
            encrypter,
            files,
            control,
            blob,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Returns a token that cancels any in-flight [`start`](Self::start).
    ///
    /// Cancellation is cooperative: it is honored before heavy work and at
    /// every suspension point, and the staged ciphertext is still deleted.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the full pipeline for `source`.
    ///
    /// `on_progress` observes `(bytes_done, bytes_total)` over the encrypted
    /// length; `done` never runs backwards across resumptions and never
    /// exceeds the total. The staged ciphertext is deleted before this
    /// returns, on every path.
    pub async fn start(
        &self,
        source: &Path,
        on_progress: &ProgressFn<'_>,
    ) -> Result<UploadResult, UploadError> {
        self.ensure_active()?;

        let upload_id = Uuid::new_v4();
        let (staged, _cipher_guard) = stage(self.encrypter.as_ref(), &self.files, source).await?;
        info!(
            upload_id = %upload_id,
            plaintext_length = staged.plaintext_length,
            encrypted_length = staged.encrypted_length,
            "staged attachment"
        );

        // `_cipher_guard` deletes the temp file when this frame unwinds,
        // whatever the outcome below.
        self.run_attempts(upload_id, &staged, on_progress).await
    }

    /// Outer restart loop: build a fresh attempt, run the inner transfer
    /// loop, rebuild on restart-class failures.
    async fn run_attempts(
        &self,
        upload_id: Uuid,
        staged: &StagedAttachment,
        on_progress: &ProgressFn<'_>,
    ) -> Result<UploadResult, UploadError> {
        let mut restart_count: u32 = 0;
        loop {
            self.ensure_active()?;

            let attempt = match self.build_attempt().await {
                Ok(attempt) => attempt,
                // Transport trouble while building gets the restart loop's
                // backoff; anything else (bad form, cancellation) is final.
                Err(UploadError::Network(error)) => {
                    restart_count += 1;
                    if restart_count >= self.config.max_restart_attempts {
                        return Err(UploadError::RetriesExhausted(restart_count));
                    }
                    let delay = self.config.backoff.delay_for_attempt(restart_count);
                    warn!(
                        upload_id = %upload_id,
                        restart_count,
                        error = %error,
                        "building upload attempt failed, retrying"
                    );
                    self.wait(Delay::After(delay)).await?;
                    continue;
                }
                Err(error) => return Err(error),
            };

            debug!(
                upload_id = %upload_id,
                variant = %attempt.form.variant,
                location = %attempt.location,
                "upload attempt built"
            );

            match self.transfer_with_retry(&attempt, staged, on_progress).await {
                Ok(()) => {
                    let result = UploadResult {
                        session_key: attempt.form.session_key.clone(),
                        variant: attempt.form.variant,
                        attachment: staged.clone(),
                        begun_at: attempt.begun_at,
                        finished_at: Utc::now(),
                    };
                    info!(
                        upload_id = %upload_id,
                        session_key = %result.session_key,
                        variant = %result.variant,
                        digest = %hex::encode(&staged.digest),
                        "upload complete"
                    );
                    return Ok(result);
                }
                Err(AttemptError::Restart(delay)) => {
                    restart_count += 1;
                    if restart_count >= self.config.max_restart_attempts {
                        return Err(UploadError::RetriesExhausted(restart_count));
                    }
                    warn!(upload_id = %upload_id, restart_count, "rebuilding upload attempt");
                    self.wait(delay).await?;
                }
                Err(AttemptError::Fatal(error)) => return Err(error),
            }
        }
    }

    /// Builds a fresh attempt: one form fetch, then the variant endpoint
    /// and its resumable session location.
    async fn build_attempt(&self) -> Result<UploadAttempt, UploadError> {
        self.ensure_active()?;
        let form = fetch_upload_form(self.control.as_ref()).await?;
        let endpoint = Endpoint::for_form(&form, Arc::clone(&self.blob));

        self.ensure_active()?;
        let location = endpoint.fetch_resumable_location().await?;

        Ok(UploadAttempt {
            form,
            endpoint,
            location,
            begun_at: Utc::now(),
        })
    }

    /// Inner transfer loop, bounded by `max_resume_retries` consecutive
    /// resume-class failures.
    async fn transfer_with_retry(
        &self,
        attempt: &UploadAttempt,
        staged: &StagedAttachment,
        on_progress: &ProgressFn<'_>,
    ) -> Result<(), AttemptError> {
        let mut retry_count: u32 = 0;
        loop {
            self.ensure_active().map_err(AttemptError::Fatal)?;

            match self
                .run_sub_attempt(retry_count, attempt, staged, on_progress)
                .await
            {
                Ok(()) => return Ok(()),
                // Cancellation is not a failure: no classification, no
                // backoff.
                Err(UploadError::Cancelled) => {
                    return Err(AttemptError::Fatal(UploadError::Cancelled));
                }
                Err(error) => {
                    match classify_failure(&error, retry_count + 1, &self.config.backoff) {
                        FailureMode::NoMoreRetries => return Err(AttemptError::Fatal(error)),
                        // Restart does not consume a resume-retry slot.
                        FailureMode::Restart(delay) => return Err(AttemptError::Restart(delay)),
                        FailureMode::Resume(delay) => {
                            warn!(retry_count, error = %error, "transfer interrupted, resuming");
                            self.wait(delay).await.map_err(AttemptError::Fatal)?;
                            retry_count += 1;
                            if retry_count >= self.config.max_resume_retries {
                                return Err(AttemptError::Fatal(UploadError::RetriesExhausted(
                                    retry_count,
                                )));
                            }
                        }
                    }
                }
            }
        }
    }

    /// One sub-attempt: on resumptions, ask the server where to pick up,
    /// then stream the remainder.
    async fn run_sub_attempt(
        &self,
        retry_count: u32,
        attempt: &UploadAttempt,
        staged: &StagedAttachment,
        on_progress: &ProgressFn<'_>,
    ) -> Result<(), UploadError> {
        let start_offset = if retry_count == 0 {
            0
        } else {
            match self.query_progress_with_retry(attempt, staged).await? {
                // A server ack can land after a local timeout; nothing left
                // to send.
                ResumeProgress::Complete => {
                    debug!("server already holds every byte");
                    return Ok(());
                }
                ResumeProgress::Uploaded(offset) => offset,
                ResumeProgress::RequiresRestart => {
                    return Err(UploadError::SessionInvalidated(
                        "server reports no usable session state".into(),
                    ));
                }
            }
        };

        debug!(retry_count, start_offset, "starting transfer");
        let adapter = ProgressAdapter::new(start_offset, staged.encrypted_length, on_progress);
        let report = move |completed: u64, _total: u64| adapter.report(completed);
        attempt
            .endpoint
            .perform_transfer(&attempt.location, start_offset, staged, &report)
            .await
    }

    /// Progress query with a small immediate-retry budget for transport
    /// errors. Restart-class errors never burn a retry here; they propagate
    /// at once.
    async fn query_progress_with_retry(
        &self,
        attempt: &UploadAttempt,
        staged: &StagedAttachment,
    ) -> Result<ResumeProgress, UploadError> {
        let mut attempts: u32 = 0;
        loop {
            self.ensure_active()?;
            match attempt
                .endpoint
                .query_progress(&attempt.location, staged)
                .await
            {
                Ok(progress) => return Ok(progress),
                Err(UploadError::Network(error))
                    if attempts < self.config.max_progress_query_retries =>
                {
                    attempts += 1;
                    debug!(attempts, error = %error, "progress query failed, retrying");
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn ensure_active(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Cancellable backoff wait.
    async fn wait(&self, delay: Delay) -> Result<(), UploadError> {
        let duration = match delay {
            Delay::Immediate => return Ok(()),
            Delay::After(duration) => duration,
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(UploadError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
