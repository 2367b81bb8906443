//! Media channels
//!
//! An owner type declares named channels; a channel may list conversions that run whenever
//! media is attached to it. The registry is built once at startup from every [`HasMedia`]
//! implementor and shared read-only afterwards.

use std::collections::HashMap;

/// A named attachment channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaChannel {
    name: String,
    conversions: Vec<String>,
}

impl MediaChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conversions: Vec::new(),
        }
    }

    /// Declare conversions to run on attach. Duplicates are ignored.
    pub fn perform_conversions<I, S>(&mut self, conversions: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for conversion in conversions {
            let conversion = conversion.into();
            if !self.conversions.contains(&conversion) {
                self.conversions.push(conversion);
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_conversions(&self) -> bool {
        !self.conversions.is_empty()
    }

    pub fn conversions(&self) -> &[String] {
        &self.conversions
    }
}

/// Channels declared by one owner type
#[derive(Debug, Clone, Default)]
pub struct ChannelSet {
    channels: Vec<MediaChannel>,
}

impl ChannelSet {
    /// Declare a channel, or return the existing one with that name
    pub fn add_media_channel(&mut self, name: impl Into<String>) -> &mut MediaChannel {
        let name = name.into();
        match self.channels.iter().position(|c| c.name == name) {
            Some(index) => &mut self.channels[index],
            None => {
                self.channels.push(MediaChannel::new(name));
                let last = self.channels.len() - 1;
                &mut self.channels[last]
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&MediaChannel> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaChannel> {
        self.channels.iter()
    }
}

/// An entity that media can be attached to
pub trait HasMedia {
    /// Value stored in `mediable_type`
    const MEDIA_OWNER_TYPE: &'static str;

    /// Value stored in `mediable_id`
    fn media_owner_id(&self) -> i64;

    /// Declare this owner type's channels
    fn register_media_channels(_channels: &mut ChannelSet) {}
}

/// Channel declarations keyed by owner type
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    owners: HashMap<String, ChannelSet>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the channel declarations of `O`
    pub fn register<O: HasMedia>(&mut self) -> &mut Self {
        let set = self
            .owners
            .entry(O::MEDIA_OWNER_TYPE.to_string())
            .or_default();
        O::register_media_channels(set);
        self
    }

    pub fn channel(&self, owner_type: &str, channel: &str) -> Option<&MediaChannel> {
        self.owners.get(owner_type).and_then(|set| set.get(channel))
    }

    /// Conversions declared for a channel; empty when the channel is undeclared
    pub fn conversions_for(&self, owner_type: &str, channel: &str) -> Vec<String> {
        self.channel(owner_type, channel)
            .map(|c| c.conversions().to_vec())
            .unwrap_or_default()
    }
}
