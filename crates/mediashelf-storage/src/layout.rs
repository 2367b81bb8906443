//! Shared path generation for every disk.
//!
//! Directory format: `{id}-{hex(sha256(id + secret))}`. The hash is recomputed from the
//! configured secret on every call and never stored, so rotating the secret orphans
//! existing directories.

use mediashelf_core::constants::CONVERSIONS_DIR;
use mediashelf_core::models::Media;
use sha2::{Digest, Sha256};

/// Derives media directories and file paths from identity plus a secret salt
#[derive(Clone)]
pub struct PathLayout {
    secret: String,
}

impl std::fmt::Debug for PathLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathLayout").finish_non_exhaustive()
    }
}

impl PathLayout {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Directory owned by media `id`
    pub fn directory(&self, id: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(id.to_string().as_bytes());
        hasher.update(self.secret.as_bytes());
        format!("{}-{}", id, hex::encode(hasher.finalize()))
    }

    /// Path of the original file for a given file name
    pub fn file_path(&self, id: i64, file_name: &str) -> String {
        format!("{}/{}", self.directory(id), file_name)
    }

    /// Path of the original file, or of a derived artifact when `conversion` is given
    pub fn path(&self, media: &Media, conversion: Option<&str>) -> String {
        match conversion {
            Some(name) if !name.is_empty() => self.conversion_path(media, name),
            _ => self.file_path(media.id, &media.file_name),
        }
    }

    /// Directory holding every derived artifact of media `id`
    pub fn conversions_directory(&self, id: i64) -> String {
        format!("{}/{}", self.directory(id), CONVERSIONS_DIR)
    }

    /// `{directory}/conversions/{conversion}/{file_name}`
    pub fn conversion_path(&self, media: &Media, conversion: &str) -> String {
        format!(
            "{}/{}/{}",
            self.conversions_directory(media.id),
            conversion,
            media.file_name
        )
    }
}
