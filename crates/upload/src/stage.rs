//! Encryption staging: plaintext source file to guarded temporary ciphertext.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::UploadError;
use crate::net::BoxFuture;
use crate::types::{EncryptedFileMetadata, StagedAttachment};

/// Encrypts attachment payloads. The scheme itself (padding, IV derivation)
/// belongs to the implementor.
pub trait AttachmentEncrypter: Send + Sync {
    /// Encrypts `source` into `dest` and reports key material and lengths.
    ///
    /// `dest` does not exist when called; the implementation creates it and
    /// must not touch it again afterwards.
    fn encrypt_attachment<'a>(
        &'a self,
        source: &'a Path,
        dest: &'a Path,
    ) -> BoxFuture<'a, Result<EncryptedFileMetadata, EncryptError>>;
}

/// Error reported by an [`AttachmentEncrypter`] implementation.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct EncryptError(pub String);

impl From<std::io::Error> for EncryptError {
    fn from(error: std::io::Error) -> Self {
        Self(error.to_string())
    }
}

/// Temp-file allocation and deletion, owned by the embedding app.
pub trait FileStore: Send + Sync {
    /// Returns a fresh path for an exclusively-owned temporary file.
    fn temp_file_path(&self) -> PathBuf;

    /// Deletes `path`. Best-effort; implementations log failures rather
    /// than propagate them.
    fn delete_file(&self, path: &Path);
}

/// Deletes the staged ciphertext when dropped.
///
/// Every exit path out of the pipeline (success, terminal failure,
/// cancellation) runs this guard.
pub struct StagedFileGuard {
    path: PathBuf,
    files: Arc<dyn FileStore>,
}

impl StagedFileGuard {
    pub(crate) fn new(path: PathBuf, files: Arc<dyn FileStore>) -> Self {
        Self { path, files }
    }

    /// Path of the guarded file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFileGuard {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "deleting staged ciphertext");
        self.files.delete_file(&self.path);
    }
}

/// Stages `source`: allocates exactly one temporary file, encrypts into it,
/// and returns the metadata plus the deletion guard that now owns the file.
///
/// The guard is armed before encryption runs, so a partially written file
/// is deleted on failure too. Any encrypter failure is fatal to the whole
/// upload; this layer never retries.
pub(crate) async fn stage(
    encrypter: &dyn AttachmentEncrypter,
    files: &Arc<dyn FileStore>,
    source: &Path,
) -> Result<(StagedAttachment, StagedFileGuard), UploadError> {
    let dest = files.temp_file_path();
    let guard = StagedFileGuard::new(dest.clone(), Arc::clone(files));

    let metadata = encrypter
        .encrypt_attachment(source, &dest)
        .await
        .map_err(|e| UploadError::Encryption(e.to_string()))?;

    let staged = StagedAttachment {
        cipher_file: dest,
        encryption_key: metadata.key,
        digest: metadata.digest,
        plaintext_length: metadata.plaintext_length,
        encrypted_length: metadata.encrypted_length,
    };
    Ok((staged, guard))
}
