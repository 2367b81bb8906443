use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

use super::reference::Identifiable;
use crate::constants::FILE_NAME_UNSAFE_CHARS;
use crate::error::{MediaError, MediaResult};

/// Media record
///
/// The physical file lives at `<directory(id)>/<file_name>` on `disk`; the directory is
/// derived from the id and is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct Media {
    pub id: i64,
    pub disk: String,
    /// Display name, not necessarily unique
    pub name: String,
    pub file_name: String,
    pub mime_type: String,
    pub size: i64,
    pub data: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Media {
    /// Lowercased extension of `file_name`, if any
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Mime prefix before `/` (e.g. "image")
    pub fn kind(&self) -> &str {
        self.mime_type
            .split('/')
            .next()
            .unwrap_or(self.mime_type.as_str())
    }

    pub fn is_of_kind(&self, kind: &str) -> bool {
        self.kind().eq_ignore_ascii_case(kind)
    }
}

impl Identifiable for Media {
    fn id(&self) -> i64 {
        self.id
    }
}

/// Values for a media row about to be inserted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMedia {
    pub disk: String,
    pub name: String,
    pub file_name: String,
    pub mime_type: String,
    pub size: i64,
    pub data: Option<JsonValue>,
}

/// Partial update of a media record; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaUpdate {
    pub name: Option<String>,
    pub file_name: Option<String>,
    pub disk: Option<String>,
    pub data: Option<JsonValue>,
}

impl MediaUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.file_name.is_none() && self.disk.is_none() && self.data.is_none()
    }

    /// Compute the record as it will look after the update. The new file name is sanitized.
    pub fn apply(&self, media: &Media) -> Media {
        let mut updated = media.clone();
        if let Some(name) = &self.name {
            updated.name = name.clone();
        }
        if let Some(file_name) = &self.file_name {
            updated.file_name = sanitize_file_name(file_name);
        }
        if let Some(disk) = &self.disk {
            updated.disk = disk.clone();
        }
        if let Some(data) = &self.data {
            updated.data = Some(data.clone());
        }
        updated
    }
}

/// Replace `#`, `/`, `\` and spaces with `-`.
pub fn sanitize_file_name(file_name: &str) -> String {
    file_name.replace(FILE_NAME_UNSAFE_CHARS, "-")
}

/// Reject stored file names that would not name a file inside the media directory
pub fn validate_file_name(file_name: &str) -> MediaResult<()> {
    match file_name.trim() {
        "" => Err(MediaError::InvalidInput(
            "File name must not be empty".to_string(),
        )),
        "." | ".." => Err(MediaError::InvalidInput(format!(
            "Invalid file name: {}",
            file_name
        ))),
        _ => Ok(()),
    }
}

/// File name without its final extension
pub fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(file_name: &str, mime_type: &str) -> Media {
        let now = Utc::now();
        Media {
            id: 1,
            disk: "local".to_string(),
            name: "photo".to_string(),
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            size: 10,
            data: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("my photo#1.jpg"), "my-photo-1.jpg");
        assert_eq!(sanitize_file_name("a/b\\c.png"), "a-b-c.png");
        assert_eq!(sanitize_file_name("clean.gif"), "clean.gif");
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("photo.png").is_ok());
        assert!(validate_file_name("..hidden").is_ok());
        for bad in ["", "   ", ".", "..", " .. "] {
            assert!(
                matches!(validate_file_name(bad), Err(MediaError::InvalidInput(_))),
                "{:?} was accepted",
                bad
            );
        }
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("holiday.photo.jpg"), "holiday.photo");
        assert_eq!(file_stem("README"), "README");
    }

    #[test]
    fn test_accessors() {
        let m = media("Cat.JPG", "image/jpeg");
        assert_eq!(m.extension().as_deref(), Some("jpg"));
        assert_eq!(m.kind(), "image");
        assert!(m.is_of_kind("image"));
        assert!(!m.is_of_kind("video"));

        let m = media("notes", "text/plain");
        assert_eq!(m.extension(), None);
        assert!(!m.is_of_kind("image"));
    }

    #[test]
    fn test_update_apply_sanitizes_file_name() {
        let m = media("a.jpg", "image/jpeg");
        let update = MediaUpdate {
            file_name: Some("new name.jpg".to_string()),
            disk: Some("s3".to_string()),
            ..Default::default()
        };
        let updated = update.apply(&m);
        assert_eq!(updated.file_name, "new-name.jpg");
        assert_eq!(updated.disk, "s3");
        assert_eq!(updated.name, m.name);
        assert!(MediaUpdate::default().is_empty());
    }
}
