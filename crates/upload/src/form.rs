//! Upload-form fetching from the control plane.

use tracing::debug;

use courier_protocol::form::UploadForm;

use crate::error::UploadError;
use crate::net::ControlPlaneClient;

/// Fetches a one-time upload authorization.
///
/// Invoked exactly once per full attempt: at the start, and again on every
/// restart. Transport errors bubble up to the restart loop's backoff; an
/// undecodable body is a protocol bug and is never retried.
pub async fn fetch_upload_form(
    control: &dyn ControlPlaneClient,
) -> Result<UploadForm, UploadError> {
    let body = control.request_upload_form().await?;
    let form = UploadForm::from_response_body(&body)
        .map_err(|e| UploadError::InvalidForm(e.to_string()))?;
    debug!(variant = %form.variant, session_key = %form.session_key, "fetched upload form");
    Ok(form)
}
