mod collection;
mod media;
mod owner;

pub use collection::CollectionService;
pub use media::MediaService;
pub use owner::OwnerMediaService;
