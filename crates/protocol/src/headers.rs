//! Header names and encoding helpers shared by the endpoint variants.

/// `Content-Length` header name.
pub const CONTENT_LENGTH: &str = "Content-Length";
/// `Content-Type` header name.
pub const CONTENT_TYPE: &str = "Content-Type";
/// `Content-Range` header name (byte-range variant).
pub const CONTENT_RANGE: &str = "Content-Range";
/// `Location` header name, carrying the resumable session URL.
pub const LOCATION: &str = "Location";
/// `Range` header name in a 308 progress response.
pub const RANGE: &str = "Range";
/// `Tus-Resumable` protocol-version header (forms-based variant).
pub const TUS_RESUMABLE: &str = "Tus-Resumable";
/// `Upload-Offset` header name (forms-based variant).
pub const UPLOAD_OFFSET: &str = "Upload-Offset";
/// `Upload-Length` header name (forms-based variant).
pub const UPLOAD_LENGTH: &str = "Upload-Length";
/// `Upload-Checksum` header name (forms-based variant).
pub const UPLOAD_CHECKSUM: &str = "Upload-Checksum";

/// Protocol version sent in [`TUS_RESUMABLE`].
pub const TUS_VERSION: &str = "1.0.0";

/// Content type for raw ciphertext bodies.
pub const OCTET_STREAM: &str = "application/octet-stream";
/// Content type for offset-addressed upload bodies (forms-based variant).
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

/// Parses the `Range` header of a 308 progress response into the number of
/// bytes the server has accepted.
///
/// The server reports an inclusive index range from zero: `bytes=0-0` means
/// one byte accepted, `bytes=0-N` means `N + 1`. Anything else (a range not
/// anchored at zero, an empty end, garbage) is `None`.
pub fn parse_accepted_range(value: &str) -> Option<u64> {
    let end = value.strip_prefix("bytes=0-")?;
    if end.is_empty() {
        return None;
    }
    let last_index: u64 = end.parse().ok()?;
    last_index.checked_add(1)
}

/// Formats the `Content-Range` header for resuming a byte-range upload at
/// `start` out of `total` bytes, e.g. `bytes 500000-1000015/1000016`.
pub fn format_content_range(start: u64, total: u64) -> String {
    format!("bytes {}-{}/{}", start, total.saturating_sub(1), total)
}

/// Formats the zero-length `Content-Range` used to query progress,
/// e.g. `bytes */1000016`.
pub fn format_query_range(total: u64) -> String {
    format!("bytes */{total}")
}
