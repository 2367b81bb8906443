//! Shared constants

/// Channel used when an owner attaches media without naming one
pub const DEFAULT_CHANNEL: &str = "default";

/// Disk used when neither the upload nor the config names one
pub const DEFAULT_DISK: &str = "local";

/// Name of the collection seeded at schema initialization
pub const DEFAULT_COLLECTION: &str = "Default";

/// Directory (inside a media directory) that holds derived artifacts
pub const CONVERSIONS_DIR: &str = "conversions";

/// Characters replaced with `-` when sanitizing a file name
pub const FILE_NAME_UNSAFE_CHARS: [char; 4] = ['#', '/', '\\', ' '];

/// Minimum length of the directory salt
pub const MIN_APP_SECRET_LEN: usize = 16;

/// Mime type recorded when none is given and the extension is unknown
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";
