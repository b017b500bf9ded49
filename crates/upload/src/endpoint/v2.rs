//! Byte-range resumable endpoint.
//!
//! The signed location is POSTed once to open a server-tracked session
//! (returned in the `Location` header); progress is queried with a
//! zero-length `PUT` carrying `Content-Range: bytes */{len}`, answered by
//! `308 Resume Incomplete` plus a `Range` header; bytes are pushed with
//! `PUT`, adding a `Content-Range` when resuming mid-stream.

use std::sync::Arc;

use courier_protocol::form::UploadForm;
use courier_protocol::headers;
use courier_protocol::http::{HttpMethod, HttpRequest};

use crate::endpoint::transfer_status_error;
use crate::error::UploadError;
use crate::net::BlobClient;
use crate::progress::ProgressFn;
use crate::types::{ResumeProgress, StagedAttachment};

/// Byte-range variant of the endpoint contract.
pub struct EndpointV2 {
    form: UploadForm,
    blob: Arc<dyn BlobClient>,
}

impl EndpointV2 {
    pub fn new(form: UploadForm, blob: Arc<dyn BlobClient>) -> Self {
        Self { form, blob }
    }

    /// Opens a resumable session: `POST` to the signed location, expect
    /// `201` with the session URL in `Location`.
    pub async fn fetch_resumable_location(&self) -> Result<String, UploadError> {
        let request = HttpRequest::new(HttpMethod::Post, &self.form.signed_upload_location)
            .with_headers(&self.form.headers)
            .header(headers::CONTENT_LENGTH, "0")
            .header(headers::CONTENT_TYPE, headers::OCTET_STREAM);

        let response = self.blob.perform(request).await?;
        if response.status != 201 {
            return Err(transfer_status_error(response.status));
        }
        response
            .header_value(headers::LOCATION)
            .map(str::to_owned)
            .ok_or_else(|| {
                UploadError::SessionInvalidated("201 response without a Location header".into())
            })
    }

    /// Asks the session how many bytes it has durably accepted.
    pub async fn query_progress(
        &self,
        location: &str,
        staged: &StagedAttachment,
    ) -> Result<ResumeProgress, UploadError> {
        let request = HttpRequest::new(HttpMethod::Put, location)
            .header(headers::CONTENT_LENGTH, "0")
            .header(
                headers::CONTENT_RANGE,
                headers::format_query_range(staged.encrypted_length),
            );

        let response = self.blob.perform(request).await?;
        match response.status {
            200 | 201 => Ok(ResumeProgress::Complete),
            308 => match response.header_value(headers::RANGE) {
                // Bytes can reach the server without being persisted yet; no
                // Range header means none are durable, so resend from zero
                // on the same session.
                None => Ok(ResumeProgress::Uploaded(0)),
                Some(range) => match headers::parse_accepted_range(range) {
                    Some(accepted) if accepted >= staged.encrypted_length => {
                        Ok(ResumeProgress::Complete)
                    }
                    Some(accepted) => Ok(ResumeProgress::Uploaded(accepted)),
                    None => Ok(ResumeProgress::RequiresRestart),
                },
            },
            403 | 404 | 410 => Ok(ResumeProgress::RequiresRestart),
            other => Err(UploadError::UnexpectedStatus(other)),
        }
    }

    /// Streams ciphertext from `start_offset` through the end of the file.
    pub async fn perform_transfer(
        &self,
        location: &str,
        start_offset: u64,
        staged: &StagedAttachment,
        on_progress: &ProgressFn<'_>,
    ) -> Result<(), UploadError> {
        let mut request = HttpRequest::new(HttpMethod::Put, location).header(
            headers::CONTENT_LENGTH,
            (staged.encrypted_length - start_offset).to_string(),
        );
        if start_offset > 0 {
            request = request.header(
                headers::CONTENT_RANGE,
                headers::format_content_range(start_offset, staged.encrypted_length),
            );
        }

        let response = self
            .blob
            .upload(request, &staged.cipher_file, start_offset, on_progress)
            .await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(transfer_status_error(response.status))
        }
    }
}
