//! Media catalog domain: object naming, MIME detection and record codes.

use crate::digest::ContentDigest;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

/// File type code for images. Default for direct uploads.
pub const FILE_TYPE_IMAGE: &str = "001001";

/// File type code for video. Default for chunked uploads.
pub const FILE_TYPE_VIDEO: &str = "001002";

/// File type code for anything else.
pub const FILE_TYPE_OTHER: &str = "001003";

/// Record status for an active file.
pub const STATUS_ACTIVE: &str = "1";

/// Audit status assigned to newly committed files.
pub const AUDIT_APPROVED: &str = "002003";

/// MIME type used when the extension is unknown.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Maximum accepted length of an original file name.
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Extension of a file name, including the leading dot.
///
/// Returns an empty string when the name has no dot.
pub fn extension(filename: &str) -> &str {
    filename.rfind('.').map(|i| &filename[i..]).unwrap_or("")
}

/// Derive the object-store key for a committed file.
///
/// Layout: `yyyy/MM/dd/<digest><ext>`, keyed by the upload date.
pub fn object_path(date: Date, digest: &ContentDigest, filename: &str) -> String {
    format!(
        "{:04}/{:02}/{:02}/{}{}",
        date.year(),
        u8::from(date.month()),
        date.day(),
        digest,
        extension(filename)
    )
}

/// Guess the MIME type of a file from its name.
pub fn mime_for_filename(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
}

/// Validate an original file name supplied by a client.
///
/// The name is only stored and used for its extension, but an empty name or
/// one carrying path separators is rejected so it cannot be confused with a key.
pub fn validate_file_name(filename: &str) -> crate::Result<()> {
    if filename.trim().is_empty() {
        return Err(crate::Error::InvalidFileName("file name is empty".into()));
    }
    if filename.len() > MAX_FILE_NAME_LEN {
        return Err(crate::Error::InvalidFileName(format!(
            "file name exceeds {MAX_FILE_NAME_LEN} bytes"
        )));
    }
    if filename.contains('/') || filename.contains('\\') || filename.contains('\0') {
        return Err(crate::Error::InvalidFileName(format!(
            "file name contains a path separator: {filename}"
        )));
    }
    Ok(())
}

/// A committed media file as returned to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Content digest; the record's identity.
    pub id: ContentDigest,
    pub owner_id: i64,
    pub owner_name: String,
    pub filename: String,
    pub file_type: String,
    pub mime_type: String,
    pub tags: Option<String>,
    pub bucket: String,
    /// Object-store key of the committed bytes.
    pub storage_path: String,
    pub url: String,
    pub byte_size: u64,
    pub status: String,
    pub audit_status: String,
    pub remark: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
