//! Forms-based POST endpoint.
//!
//! The signed upload location doubles as the resumable session URL. The
//! first transfer is a `POST` (creation-with-upload) declaring the final
//! length and a checksum; resumed transfers are `PATCH` requests addressed
//! by `Upload-Offset`. Progress is a `HEAD` read of the same header.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use courier_protocol::form::UploadForm;
use courier_protocol::headers;
use courier_protocol::http::{HttpMethod, HttpRequest};

use crate::endpoint::transfer_status_error;
use crate::error::UploadError;
use crate::net::BlobClient;
use crate::progress::ProgressFn;
use crate::types::{ResumeProgress, StagedAttachment};

/// Forms-based variant of the endpoint contract.
pub struct EndpointV3 {
    form: UploadForm,
    blob: Arc<dyn BlobClient>,
}

impl EndpointV3 {
    pub fn new(form: UploadForm, blob: Arc<dyn BlobClient>) -> Self {
        Self { form, blob }
    }

    /// The signed location is already the resumable session URL, so no
    /// allocation round-trip is made for this variant.
    pub fn resumable_location(&self) -> String {
        self.form.signed_upload_location.clone()
    }

    /// Reads the server's accepted offset with a `HEAD` request.
    pub async fn query_progress(
        &self,
        location: &str,
        staged: &StagedAttachment,
    ) -> Result<ResumeProgress, UploadError> {
        let request = HttpRequest::new(HttpMethod::Head, location)
            .with_headers(&self.form.headers)
            .header(headers::TUS_RESUMABLE, headers::TUS_VERSION);

        let response = self.blob.perform(request).await?;
        match response.status {
            status if (200..300).contains(&status) => {
                let offset = response
                    .header_value(headers::UPLOAD_OFFSET)
                    .and_then(|value| value.trim().parse::<u64>().ok());
                match offset {
                    Some(offset) if offset == staged.encrypted_length => {
                        Ok(ResumeProgress::Complete)
                    }
                    Some(offset) if offset < staged.encrypted_length => {
                        Ok(ResumeProgress::Uploaded(offset))
                    }
                    // Offset beyond our length or unreadable: the session
                    // state cannot be trusted.
                    _ => Ok(ResumeProgress::RequiresRestart),
                }
            }
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
        let request = if start_offset == 0 {
            // Creation-with-upload: declare the final length and checksum
            // up front.
            HttpRequest::new(HttpMethod::Post, location)
                .with_headers(&self.form.headers)
                .header(headers::TUS_RESUMABLE, headers::TUS_VERSION)
                .header(
                    headers::UPLOAD_LENGTH,
                    staged.encrypted_length.to_string(),
                )
                .header(
                    headers::UPLOAD_CHECKSUM,
                    format!("sha256 {}", STANDARD.encode(&staged.digest)),
                )
                .header(headers::CONTENT_TYPE, headers::OFFSET_OCTET_STREAM)
        } else {
            HttpRequest::new(HttpMethod::Patch, location)
                .with_headers(&self.form.headers)
                .header(headers::TUS_RESUMABLE, headers::TUS_VERSION)
                .header(headers::UPLOAD_OFFSET, start_offset.to_string())
                .header(headers::CONTENT_TYPE, headers::OFFSET_OCTET_STREAM)
        };

        let response = self
            .blob
            .upload(request, &staged.cipher_file, start_offset, on_progress)
            .await?;
        match response.status {
            status if (200..300).contains(&status) => Ok(()),
            // The server's offset moved under us.
            409 => Err(UploadError::SessionInvalidated(
                "upload offset conflict".into(),
            )),
            other => Err(transfer_status_error(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use courier_protocol::http::HttpResponse;

    use super::*;
    use crate::testutil::{MockBlob, UploadScript, form_for, staged_fixture};

    fn endpoint(blob: &Arc<MockBlob>) -> EndpointV3 {
        EndpointV3::new(form_for(3), Arc::clone(blob) as Arc<dyn BlobClient>)
    }

    #[test]
    fn location_is_the_signed_url() {
        let blob = Arc::new(MockBlob::new());
        let endpoint = endpoint(&blob);
        assert_eq!(endpoint.resumable_location(), "https://cdn.example/signed");
        // No network call was made.
        assert!(blob.performed().is_empty());
    }

    #[tokio::test]
    async fn query_reads_upload_offset() {
        let dir = tempfile::tempdir().unwrap();
        let staged = staged_fixture(dir.path(), 1_000_016);

        let blob = Arc::new(MockBlob::new());
        blob.script_perform(Ok(
            HttpResponse::new(200).header("Upload-Offset", "500000")
        ));

        let progress = endpoint(&blob)
            .query_progress("https://cdn.example/signed", &staged)
            .await
            .unwrap();
        assert_eq!(progress, ResumeProgress::Uploaded(500_000));

        let performed = blob.performed();
        assert_eq!(performed[0].method, HttpMethod::Head);
        assert_eq!(performed[0].headers.get("Tus-Resumable").unwrap(), "1.0.0");
    }

    #[tokio::test]
    async fn query_offset_at_length_means_complete() {
        let dir = tempfile::tempdir().unwrap();
        let staged = staged_fixture(dir.path(), 100);

        let blob = Arc::new(MockBlob::new());
        blob.script_perform(Ok(HttpResponse::new(200).header("Upload-Offset", "100")));

        let progress = endpoint(&blob)
            .query_progress("https://cdn.example/signed", &staged)
            .await
            .unwrap();
        assert_eq!(progress, ResumeProgress::Complete);
    }

    #[tokio::test]
    async fn query_missing_offset_requires_restart() {
        let dir = tempfile::tempdir().unwrap();
        let staged = staged_fixture(dir.path(), 100);

        let blob = Arc::new(MockBlob::new());
        blob.script_perform(Ok(HttpResponse::new(200)));

        let progress = endpoint(&blob)
            .query_progress("https://cdn.example/signed", &staged)
            .await
            .unwrap();
        assert_eq!(progress, ResumeProgress::RequiresRestart);
    }

    #[tokio::test]
    async fn query_oversized_offset_requires_restart() {
        let dir = tempfile::tempdir().unwrap();
        let staged = staged_fixture(dir.path(), 100);

        let blob = Arc::new(MockBlob::new());
        blob.script_perform(Ok(HttpResponse::new(200).header("Upload-Offset", "101")));

        let progress = endpoint(&blob)
            .query_progress("https://cdn.example/signed", &staged)
            .await
            .unwrap();
        assert_eq!(progress, ResumeProgress::RequiresRestart);
    }

    #[tokio::test]
    async fn query_gone_session_requires_restart() {
        let dir = tempfile::tempdir().unwrap();
        let staged = staged_fixture(dir.path(), 100);

        let blob = Arc::new(MockBlob::new());
        blob.script_perform(Ok(HttpResponse::new(404)));

        let progress = endpoint(&blob)
            .query_progress("https://cdn.example/signed", &staged)
            .await
            .unwrap();
        assert_eq!(progress, ResumeProgress::RequiresRestart);
    }

    #[tokio::test]
    async fn first_transfer_posts_with_length_and_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let staged = staged_fixture(dir.path(), 1_000);

        let blob = Arc::new(MockBlob::new());
        blob.script_upload(UploadScript::ok());

        endpoint(&blob)
            .perform_transfer("https://cdn.example/signed", 0, &staged, &|_, _| {})
            .await
            .unwrap();

        let uploads = blob.uploads();
        let (request, _, offset) = &uploads[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.headers.get("Upload-Length").unwrap(), "1000");
        assert_eq!(
            request.headers.get("Upload-Checksum").unwrap(),
            &format!("sha256 {}", STANDARD.encode(&staged.digest))
        );
        assert!(!request.headers.contains_key("Upload-Offset"));
        assert_eq!(*offset, 0);
    }

    #[tokio::test]
    async fn resumed_transfer_patches_with_offset_only() {
        let dir = tempfile::tempdir().unwrap();
        let staged = staged_fixture(dir.path(), 1_000_016);

        let blob = Arc::new(MockBlob::new());
        blob.script_upload(UploadScript::ok());

        endpoint(&blob)
            .perform_transfer("https://cdn.example/signed", 500_000, &staged, &|_, _| {})
            .await
            .unwrap();

        let uploads = blob.uploads();
        let (request, _, offset) = &uploads[0];
        assert_eq!(request.method, HttpMethod::Patch);
        assert_eq!(request.headers.get("Upload-Offset").unwrap(), "500000");
        assert!(!request.headers.contains_key("Upload-Length"));
        assert!(!request.headers.contains_key("Upload-Checksum"));
        assert_eq!(*offset, 500_000);
    }

    #[tokio::test]
    async fn offset_conflict_invalidates_session() {
        let dir = tempfile::tempdir().unwrap();
        let staged = staged_fixture(dir.path(), 1_000);

        let blob = Arc::new(MockBlob::new());
        blob.script_upload(UploadScript::status(409));

        let result = endpoint(&blob)
            .perform_transfer("https://cdn.example/signed", 0, &staged, &|_, _| {})
            .await;
        assert!(matches!(result, Err(UploadError::SessionInvalidated(_))));
    }
}
