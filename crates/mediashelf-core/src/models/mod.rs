//! Data models
//!
//! Persisted records (media, collections, mediables) plus the reference and association
//! types the resolver and reconciler operate on.

mod association;
mod collection;
mod media;
mod mediable;
mod reference;

pub use association::*;
pub use collection::*;
pub use media::*;
pub use mediable::*;
pub use reference::*;
