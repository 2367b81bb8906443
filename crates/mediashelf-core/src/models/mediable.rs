use serde::{Deserialize, Serialize};

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

/// Polymorphic link between a media item and an owning entity, tagged by channel.
///
/// Unique on `(media_id, mediable_id, mediable_type, channel)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct Mediable {
    pub id: i64,
    pub media_id: i64,
    pub mediable_id: i64,
    pub mediable_type: String,
    pub channel: String,
}
