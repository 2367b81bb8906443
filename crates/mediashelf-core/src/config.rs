//! Configuration module
//!
//! Settings are read from the process environment (after loading `.env` with dotenvy)
//! into a plain [`MediaConfig`] that is passed into every component constructor.

use std::env;

use crate::constants::{DEFAULT_COLLECTION, DEFAULT_DISK, MIN_APP_SECRET_LEN};
use crate::storage_types::DiskDriver;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const QUEUE_MAX_WORKERS: usize = 4;
const QUEUE_MAX_RETRIES: u32 = 3;

/// Table names used by the persistence layer and the published migration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableNames {
    pub media: String,
    pub collections: String,
    pub collection_media: String,
    pub mediables: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            media: "media".to_string(),
            collections: "collections".to_string(),
            collection_media: "collection_media".to_string(),
            mediables: "mediables".to_string(),
        }
    }
}

impl TableNames {
    fn all(&self) -> [&str; 4] {
        [
            &self.media,
            &self.collections,
            &self.collection_media,
            &self.mediables,
        ]
    }
}

/// One named disk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiskConfig {
    pub name: String,
    pub driver: DiskDriver,
    /// Root directory (local driver) or key prefix (s3 driver)
    pub root: Option<String>,
    /// Public base URL used to build media URLs
    pub url: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

impl DiskConfig {
    pub fn local(name: impl Into<String>, root: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            url: Some(format!("/storage/{}", name)),
            name,
            driver: DiskDriver::Local,
            root: Some(root.into()),
            bucket: None,
            region: None,
            endpoint: None,
        }
    }

    pub fn memory(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            url: Some(format!("/storage/{}", name)),
            name,
            driver: DiskDriver::Memory,
            root: None,
            bucket: None,
            region: None,
            endpoint: None,
        }
    }

    fn from_vars(name: &str, var: &impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let prefix = format!("MEDIA_DISK_{}", name.to_uppercase());
        let get = |suffix: &str| {
            var(&format!("{}_{}", prefix, suffix)).filter(|s| !s.trim().is_empty())
        };

        let driver = match get("DRIVER") {
            Some(raw) => raw.parse::<DiskDriver>()?,
            None => DiskDriver::Local,
        };

        let (root, url) = match driver {
            DiskDriver::Local => (
                Some(get("ROOT").unwrap_or_else(|| format!("./storage/{}", name))),
                Some(get("URL").unwrap_or_else(|| format!("/storage/{}", name))),
            ),
            _ => (get("ROOT"), get("URL")),
        };

        Ok(Self {
            name: name.to_string(),
            driver,
            root,
            url,
            bucket: get("BUCKET"),
            region: get("REGION"),
            endpoint: get("ENDPOINT"),
        })
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.driver == DiskDriver::S3 {
            if self.bucket.is_none() {
                return Err(anyhow::anyhow!(
                    "MEDIA_DISK_{}_BUCKET must be set when using the s3 driver",
                    self.name.to_uppercase()
                ));
            }
            if self.region.is_none() && self.endpoint.is_none() {
                return Err(anyhow::anyhow!(
                    "MEDIA_DISK_{}_REGION or MEDIA_DISK_{}_ENDPOINT must be set when using the s3 driver",
                    self.name.to_uppercase(),
                    self.name.to_uppercase()
                ));
            }
        }
        Ok(())
    }
}

/// Postgres pool settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_seconds: u64,
}

/// In-process worker pool settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    pub max_workers: usize,
    pub max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: QUEUE_MAX_WORKERS,
            max_retries: QUEUE_MAX_RETRIES,
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct MediaConfig {
    pub default_disk: String,
    pub default_collection: String,
    /// Queue name for conversion jobs; `None` uses the default queue
    pub conversion_queue: Option<String>,
    pub tables: TableNames,
    /// Probe a new disk with a write/delete before moving media onto it
    pub check_disk_writable: bool,
    /// Salt for media directory names
    pub app_secret: String,
    pub disks: Vec<DiskConfig>,
    /// Unset when the binary does not need a database (e.g. publishing templates)
    pub database: Option<DatabaseConfig>,
    pub queue: QueueConfig,
}

impl MediaConfig {
    /// Defaults with a single local disk; mostly useful for embedding and tests.
    pub fn new(app_secret: impl Into<String>) -> Self {
        Self {
            default_disk: DEFAULT_DISK.to_string(),
            default_collection: DEFAULT_COLLECTION.to_string(),
            conversion_queue: None,
            tables: TableNames::default(),
            check_disk_writable: true,
            app_secret: app_secret.into(),
            disks: vec![DiskConfig::local(
                DEFAULT_DISK,
                format!("./storage/{}", DEFAULT_DISK),
            )],
            database: None,
            queue: QueueConfig::default(),
        }
    }

    /// Replace the configured disks
    pub fn with_disks(mut self, disks: Vec<DiskConfig>) -> Self {
        self.disks = disks;
        self
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let non_empty = |key: &str| var(key).filter(|s| !s.trim().is_empty());

        let app_secret = non_empty("MEDIA_APP_SECRET")
            .or_else(|| non_empty("APP_KEY"))
            .ok_or_else(|| {
                anyhow::anyhow!("MEDIA_APP_SECRET or APP_KEY must be set for directory hashing")
            })?;

        let defaults = TableNames::default();
        let tables = TableNames {
            media: non_empty("MEDIA_TABLE_MEDIA").unwrap_or(defaults.media),
            collections: non_empty("MEDIA_TABLE_COLLECTIONS").unwrap_or(defaults.collections),
            collection_media: non_empty("MEDIA_TABLE_COLLECTION_MEDIA")
                .unwrap_or(defaults.collection_media),
            mediables: non_empty("MEDIA_TABLE_MEDIABLES").unwrap_or(defaults.mediables),
        };

        let disk_names: Vec<String> = non_empty("MEDIA_DISKS")
            .unwrap_or_else(|| DEFAULT_DISK.to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        let disks = disk_names
            .iter()
            .map(|name| DiskConfig::from_vars(name, &var))
            .collect::<Result<Vec<_>, _>>()?;

        let database = non_empty("DATABASE_URL").map(|url| DatabaseConfig {
            url,
            max_connections: var("DB_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            timeout_seconds: var("DB_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
        });

        let config = MediaConfig {
            default_disk: non_empty("MEDIA_DEFAULT_DISK")
                .map(|s| s.trim().to_lowercase())
                .unwrap_or_else(|| DEFAULT_DISK.to_string()),
            default_collection: non_empty("MEDIA_DEFAULT_COLLECTION")
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            conversion_queue: non_empty("MEDIA_CONVERSION_QUEUE"),
            tables,
            check_disk_writable: var("MEDIA_CHECK_DISK_WRITABLE")
                .unwrap_or_else(|| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
            app_secret,
            disks,
            database,
            queue: QueueConfig {
                max_workers: var("MEDIA_QUEUE_MAX_WORKERS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(QUEUE_MAX_WORKERS),
                max_retries: var("MEDIA_QUEUE_MAX_RETRIES")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(QUEUE_MAX_RETRIES),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.app_secret.len() < MIN_APP_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "MEDIA_APP_SECRET must be at least {} characters long",
                MIN_APP_SECRET_LEN
            ));
        }

        if self.disk(&self.default_disk).is_none() {
            return Err(anyhow::anyhow!(
                "MEDIA_DEFAULT_DISK '{}' is not listed in MEDIA_DISKS",
                self.default_disk
            ));
        }

        for disk in &self.disks {
            disk.validate()?;
        }

        if self.default_collection.trim().is_empty() {
            return Err(anyhow::anyhow!("MEDIA_DEFAULT_COLLECTION must not be empty"));
        }

        // Table names are interpolated into SQL
        for table in self.tables.all() {
            let valid = !table.is_empty()
                && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !table.starts_with(|c: char| c.is_ascii_digit());
            if !valid {
                return Err(anyhow::anyhow!("Invalid table name: '{}'", table));
            }
        }

        if let Some(db) = &self.database {
            if !db.url.starts_with("postgres://") && !db.url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if self.queue.max_workers == 0 {
            return Err(anyhow::anyhow!("MEDIA_QUEUE_MAX_WORKERS must be at least 1"));
        }

        Ok(())
    }

    /// Look up a configured disk by name
    pub fn disk(&self, name: &str) -> Option<&DiskConfig> {
        self.disks.iter().find(|d| d.name == name)
    }

    pub fn database(&self) -> Result<&DatabaseConfig, anyhow::Error> {
        self.database
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))
    }
}
