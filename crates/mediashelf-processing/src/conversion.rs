//! Named image conversions
//!
//! A conversion is an opaque `DynamicImage -> DynamicImage` function registered under a
//! name. Channels and callers refer to conversions by name only.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use image::imageops::FilterType;
use image::DynamicImage;
use mediashelf_core::{MediaError, MediaResult};

pub type ConversionFn = Arc<dyn Fn(DynamicImage) -> DynamicImage + Send + Sync>;

#[derive(Clone, Default)]
pub struct ConversionRegistry {
    conversions: BTreeMap<String, ConversionFn>,
}

impl fmt::Debug for ConversionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRegistry")
            .field("conversions", &self.names())
            .finish()
    }
}

impl ConversionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` under `name`, replacing any previous registration
    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(DynamicImage) -> DynamicImage + Send + Sync + 'static,
    {
        let name = name.into();
        if self.conversions.insert(name.clone(), Arc::new(f)).is_some() {
            tracing::debug!(conversion = %name, "Conversion re-registered");
        }
        self
    }

    pub fn get(&self, name: &str) -> MediaResult<ConversionFn> {
        self.conversions
            .get(name)
            .cloned()
            .ok_or_else(|| MediaError::InvalidConversion(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.conversions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.conversions.keys().map(String::as_str).collect()
    }
}

/// Fit inside `width` x `height`, keeping the aspect ratio
pub fn thumbnail(width: u32, height: u32) -> impl Fn(DynamicImage) -> DynamicImage + Send + Sync {
    move |img| img.thumbnail(width, height)
}

/// Resize and crop to exactly `width` x `height`
pub fn fill(width: u32, height: u32) -> impl Fn(DynamicImage) -> DynamicImage + Send + Sync {
    move |img| img.resize_to_fill(width, height, FilterType::Lanczos3)
}

pub fn grayscale() -> impl Fn(DynamicImage) -> DynamicImage + Send + Sync {
    |img| img.grayscale()
}
