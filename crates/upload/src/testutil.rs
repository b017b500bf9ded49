//! Shared mock collaborators for this crate's tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use courier_protocol::form::UploadForm;
use courier_protocol::http::{HttpRequest, HttpResponse};

use crate::net::{BlobClient, BoxFuture, ControlPlaneClient, NetworkError};
use crate::progress::ProgressFn;
use crate::stage::{AttachmentEncrypter, EncryptError, FileStore};
use crate::types::{EncryptedFileMetadata, StagedAttachment};

/// Builds a control-plane allocation response body.
pub(crate) fn form_body(cdn: u32, session_key: &str) -> Vec<u8> {
    serde_json::json!({
        "cdn": cdn,
        "key": session_key,
        "signedUploadLocation": "https://cdn.example/signed",
        "headers": {"x-auth": "token"},
    })
    .to_string()
    .into_bytes()
}

/// Builds a parsed upload form for the given endpoint number.
pub(crate) fn form_for(cdn: u32) -> UploadForm {
    UploadForm::from_response_body(&form_body(cdn, "attachments/key-1")).unwrap()
}

/// Writes a ciphertext file of `encrypted_length` bytes and wraps it in
/// staged-attachment metadata with a matching digest.
pub(crate) fn staged_fixture(dir: &Path, encrypted_length: u64) -> StagedAttachment {
    let cipher_file = dir.join("staged.bin");
    let bytes = vec![0x5Au8; encrypted_length as usize];
    std::fs::write(&cipher_file, &bytes).unwrap();
    StagedAttachment {
        cipher_file,
        encryption_key: vec![7u8; 32],
        digest: Sha256::digest(&bytes).to_vec(),
        plaintext_length: encrypted_length.saturating_sub(16),
        encrypted_length,
    }
}

// ---------------------------------------------------------------------------
// MockControl
// ---------------------------------------------------------------------------

/// Control-plane client with scripted responses.
pub(crate) struct MockControl {
    responses: Mutex<Vec<Result<Vec<u8>, NetworkError>>>,
    requests: AtomicU32,
}

impl MockControl {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            requests: AtomicU32::new(0),
        }
    }

    pub fn script(&self, response: Result<Vec<u8>, NetworkError>) {
        self.responses.lock().unwrap().push(response);
    }

    pub fn request_count(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}

impl ControlPlaneClient for MockControl {
    fn request_upload_form(&self) -> BoxFuture<'_, Result<Vec<u8>, NetworkError>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err(NetworkError::Connection("no scripted form response".into()))
            } else {
                responses.remove(0)
            }
        })
    }
}

// ---------------------------------------------------------------------------
// MockBlob
// ---------------------------------------------------------------------------

/// Scripted behavior for one `upload` call.
pub(crate) struct UploadScript {
    /// `(completed, total)` progress reports emitted before resolving.
    pub progress: Vec<(u64, u64)>,
    pub result: Result<HttpResponse, NetworkError>,
}

impl UploadScript {
    /// Succeeds with a 200 and no progress reports.
    pub fn ok() -> Self {
        Self {
            progress: Vec::new(),
            result: Ok(HttpResponse::new(200)),
        }
    }

    /// Succeeds with a 200 after the given progress reports.
    pub fn ok_with_progress(progress: Vec<(u64, u64)>) -> Self {
        Self {
            progress,
            result: Ok(HttpResponse::new(200)),
        }
    }

    /// Resolves with the given HTTP status and no progress reports.
    pub fn status(status: u16) -> Self {
        Self {
            progress: Vec::new(),
            result: Ok(HttpResponse::new(status)),
        }
    }

    /// Fails at the transport level.
    pub fn err(error: NetworkError) -> Self {
        Self {
            progress: Vec::new(),
            result: Err(error),
        }
    }

    /// Fails at the transport level after the given progress reports.
    pub fn err_with_progress(progress: Vec<(u64, u64)>, error: NetworkError) -> Self {
        Self {
            progress,
            result: Err(error),
        }
    }
}

/// Blob client with scripted responses and captured requests.
pub(crate) struct MockBlob {
    perform_scripts: Mutex<Vec<Result<HttpResponse, NetworkError>>>,
    upload_scripts: Mutex<Vec<UploadScript>>,
    performed: Mutex<Vec<HttpRequest>>,
    uploaded: Mutex<Vec<(HttpRequest, PathBuf, u64)>>,
    /// Token to cancel when the next `upload` call arrives; simulates the
    /// user aborting mid-transfer.
    cancel_on_upload: Mutex<Option<CancellationToken>>,
}

impl MockBlob {
    pub fn new() -> Self {
        Self {
            perform_scripts: Mutex::new(Vec::new()),
            upload_scripts: Mutex::new(Vec::new()),
            performed: Mutex::new(Vec::new()),
            uploaded: Mutex::new(Vec::new()),
            cancel_on_upload: Mutex::new(None),
        }
    }

    pub fn script_perform(&self, response: Result<HttpResponse, NetworkError>) {
        self.perform_scripts.lock().unwrap().push(response);
    }

    pub fn script_upload(&self, script: UploadScript) {
        self.upload_scripts.lock().unwrap().push(script);
    }

    pub fn cancel_on_next_upload(&self, token: CancellationToken) {
        *self.cancel_on_upload.lock().unwrap() = Some(token);
    }

    /// Captured header-only requests, in order.
    pub fn performed(&self) -> Vec<HttpRequest> {
        self.performed.lock().unwrap().clone()
    }

    /// Captured upload calls as `(request, file, offset)`, in order.
    pub fn uploads(&self) -> Vec<(HttpRequest, PathBuf, u64)> {
        self.uploaded.lock().unwrap().clone()
    }
}

impl BlobClient for MockBlob {
    fn perform(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, NetworkError>> {
        self.performed.lock().unwrap().push(request);
        Box::pin(async move {
            let mut scripts = self.perform_scripts.lock().unwrap();
            if scripts.is_empty() {
                Err(NetworkError::Connection("no scripted response".into()))
            } else {
                scripts.remove(0)
            }
        })
    }

    fn upload<'a>(
        &'a self,
        request: HttpRequest,
        file: &'a Path,
        offset: u64,
        on_progress: &'a ProgressFn<'a>,
    ) -> BoxFuture<'a, Result<HttpResponse, NetworkError>> {
        self.uploaded
            .lock()
            .unwrap()
            .push((request, file.to_path_buf(), offset));
        if let Some(token) = self.cancel_on_upload.lock().unwrap().take() {
            token.cancel();
        }
        Box::pin(async move {
            let script = {
                let mut scripts = self.upload_scripts.lock().unwrap();
                if scripts.is_empty() {
                    return Err(NetworkError::Connection("no scripted upload".into()));
                }
                scripts.remove(0)
            };
            for (completed, total) in &script.progress {
                on_progress(*completed, *total);
            }
            script.result
        })
    }
}

// ---------------------------------------------------------------------------
// MockEncrypter
// ---------------------------------------------------------------------------

/// Encrypter that pads the plaintext by 16 bytes and hashes the result.
pub(crate) struct MockEncrypter {
    fail: bool,
}

impl MockEncrypter {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl AttachmentEncrypter for MockEncrypter {
    fn encrypt_attachment<'a>(
        &'a self,
        source: &'a Path,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<EncryptedFileMetadata, EncryptError>> {
        Box::pin(async move {
            if self.fail {
                return Err(EncryptError("simulated encrypter failure".into()));
            }
            let plaintext = tokio::fs::read(source).await.map_err(EncryptError::from)?;
            let mut cipher = plaintext.clone();
            cipher.extend_from_slice(&[0u8; 16]);
            tokio::fs::write(dest, &cipher)
                .await
                .map_err(EncryptError::from)?;
            Ok(EncryptedFileMetadata {
                key: vec![7u8; 32],
                digest: Sha256::digest(&cipher).to_vec(),
                plaintext_length: plaintext.len() as u64,
                encrypted_length: cipher.len() as u64,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// MockFileStore
// ---------------------------------------------------------------------------

/// File store backed by a real temp directory, recording deletions.
pub(crate) struct MockFileStore {
    dir: tempfile::TempDir,
    counter: AtomicU32,
    deleted: Mutex<Vec<PathBuf>>,
}

impl MockFileStore {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            counter: AtomicU32::new(0),
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Paths passed to `delete_file`, in order.
    pub fn deleted(&self) -> Vec<PathBuf> {
        self.deleted.lock().unwrap().clone()
    }
}

impl FileStore for MockFileStore {
    fn temp_file_path(&self) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        self.dir.path().join(format!("staged-{n}.bin"))
    }

    fn delete_file(&self, path: &Path) {
        self.deleted.lock().unwrap().push(path.to_path_buf());
        let _ = std::fs::remove_file(path);
    }
}
