//! Wire-level types for the attachment upload pipeline.
//!
//! This crate holds everything both storage-endpoint variants and the
//! control plane agree on: the upload-form descriptor with its closed
//! protocol-variant discriminator, transport-neutral HTTP value types, and
//! the header encoding/decoding helpers the resumable flows are built from.
//! It has no networking of its own.

pub mod form;
pub mod headers;
pub mod http;

pub use form::{FormError, ProtocolVariant, UnknownVariant, UploadForm};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
