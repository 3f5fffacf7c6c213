use serde::{Deserialize, Serialize};

use crate::analytics::FileAnalytics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    File,
}

impl FileKind {
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            FileKind::Image
        } else {
            FileKind::File
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::File => "file",
        }
    }
}

/// Metadata for one uploaded file. The binary payload is stored alongside but
/// never carried on this struct; the delivery path fetches it separately after
/// the access gates have passed.
///
/// `password` is stored and compared as plaintext. `max_downloads` is
/// advisory only and never checked against the live counter (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub slug: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub kind: FileKind,
    pub etag: String,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub max_downloads: Option<i64>,
    pub downloads: i64,
    pub views: i64,
    pub analytics: FileAnalytics,
}

impl StoredFile {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now_ms)
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

/// Input to file creation; produced by the upload handler.
#[derive(Debug)]
pub struct NewFile {
    pub original_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
    pub slug: Option<String>,
    pub expires_in: Option<crate::models::ExpiresIn>,
    pub password: Option<String>,
    pub max_downloads: Option<i64>,
}
