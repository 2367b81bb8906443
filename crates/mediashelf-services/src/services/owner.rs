use std::sync::Arc;

use mediashelf_core::models::{AssociationScope, EntityRef, Media, Resolution, SyncResult};
use mediashelf_core::{ChannelRegistry, HasMedia, MediaResult};

use crate::conversions::{merge_conversions, ConversionDispatcher};
use crate::lifecycle::StorageLifecycle;
use crate::reconciler::{non_empty_count, Reconciler};
use crate::resolver::resolve;
use crate::stores::Stores;

/// Media attached to owning entities through named channels
#[derive(Clone)]
pub struct OwnerMediaService {
    stores: Stores,
    reconciler: Reconciler,
    lifecycle: StorageLifecycle,
    channels: Arc<ChannelRegistry>,
    dispatcher: ConversionDispatcher,
}

fn scope<O: HasMedia>(owner: &O, channel: &str) -> AssociationScope {
    AssociationScope::channel(O::MEDIA_OWNER_TYPE, owner.media_owner_id(), channel)
}

impl OwnerMediaService {
    pub fn new(
        stores: Stores,
        lifecycle: StorageLifecycle,
        channels: Arc<ChannelRegistry>,
        dispatcher: ConversionDispatcher,
    ) -> Self {
        let reconciler = Reconciler::new(stores.associations.clone());
        Self {
            stores,
            reconciler,
            lifecycle,
            channels,
            dispatcher,
        }
    }

    /// Attach media to `channel` of `owner`.
    ///
    /// Newly attached images get one conversion job covering `conversions` plus the
    /// channel's declared conversions.
    #[tracing::instrument(skip(self, owner, media, conversions), fields(owner_type = O::MEDIA_OWNER_TYPE, owner_id = owner.media_owner_id()))]
    pub async fn attach_media<O: HasMedia>(
        &self,
        owner: &O,
        media: impl Into<EntityRef<Media>>,
        channel: &str,
        conversions: &[String],
    ) -> MediaResult<Option<usize>> {
        let resolution = resolve(&media.into(), self.stores.media.as_ref()).await?;
        let attached = self
            .reconciler
            .attach(&scope(owner, channel), resolution)
            .await?;

        self.dispatch_conversions::<O>(&attached, channel, conversions)
            .await?;
        Ok(non_empty_count(&attached))
    }

    /// Detach media from `channel` of `owner`; a null or empty reference empties the channel
    pub async fn detach_media<O: HasMedia>(
        &self,
        owner: &O,
        media: impl Into<EntityRef<Media>>,
        channel: &str,
    ) -> MediaResult<Option<usize>> {
        let resolution = resolve(&media.into(), self.stores.media.as_ref()).await?;
        self.reconciler
            .detach(&scope(owner, channel), resolution)
            .await
    }

    /// Make `channel` of `owner` hold exactly the referenced media.
    ///
    /// Newly attached images are converted like with [`attach_media`](Self::attach_media).
    pub async fn sync_media<O: HasMedia>(
        &self,
        owner: &O,
        media: impl Into<EntityRef<Media>>,
        channel: &str,
        detaching: bool,
        conversions: &[String],
    ) -> MediaResult<Option<SyncResult>> {
        let resolution = resolve(&media.into(), self.stores.media.as_ref()).await?;
        let result = self
            .reconciler
            .sync(&scope(owner, channel), resolution, detaching)
            .await?;

        if let Some(result) = &result {
            self.dispatch_conversions::<O>(&result.attached, channel, conversions)
                .await?;
        }
        Ok(result)
    }

    /// Detach everything in `channel`; returns how many links were removed
    pub async fn clear_channel<O: HasMedia>(&self, owner: &O, channel: &str) -> MediaResult<usize> {
        let removed = self
            .reconciler
            .detach(&scope(owner, channel), Resolution::DetachAll)
            .await?;
        Ok(removed.unwrap_or(0))
    }

    /// Media in `channel`, in attach order
    pub async fn get_media<O: HasMedia>(&self, owner: &O, channel: &str) -> MediaResult<Vec<Media>> {
        let ids = self.reconciler.current(&scope(owner, channel)).await?;
        self.stores.media.find_many(&ids).await
    }

    pub async fn has_media<O: HasMedia>(&self, owner: &O, channel: &str) -> MediaResult<bool> {
        Ok(!self.reconciler.current(&scope(owner, channel)).await?.is_empty())
    }

    pub async fn first_media<O: HasMedia>(&self, owner: &O, channel: &str) -> MediaResult<Option<Media>> {
        Ok(self.get_media(owner, channel).await?.into_iter().next())
    }

    /// URL of the first media in `channel`, or an empty string when there is none
    pub async fn first_media_url<O: HasMedia>(
        &self,
        owner: &O,
        channel: &str,
        conversion: Option<&str>,
    ) -> MediaResult<String> {
        match self.first_media(owner, channel).await? {
            Some(media) => self.lifecycle.url(&media, conversion),
            None => Ok(String::new()),
        }
    }

    async fn dispatch_conversions<O: HasMedia>(
        &self,
        attached: &[i64],
        channel: &str,
        requested: &[String],
    ) -> MediaResult<()> {
        if attached.is_empty() {
            return Ok(());
        }

        let declared = self.channels.conversions_for(O::MEDIA_OWNER_TYPE, channel);
        let conversions = merge_conversions(requested, &declared);
        if conversions.is_empty() {
            return Ok(());
        }

        // links are already committed; a failed enqueue must not undo them
        for media in self.stores.media.find_many(attached).await? {
            if let Err(e) = self.dispatcher.dispatch(&media, &conversions).await {
                tracing::warn!(media_id = %media.id, error = %e, "Failed to dispatch conversions");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{png_bytes, Post, TestShelf};
    use bytes::Bytes;
    use mediashelf_core::constants::DEFAULT_CHANNEL;
    use mediashelf_worker::{ConversionJob, JobKind};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn job_of(kind: &JobKind) -> &ConversionJob {
        match kind {
            JobKind::PerformConversions(job) => job,
        }
    }

    #[tokio::test]
    async fn test_attach_dispatches_merged_conversions_for_new_images() {
        let t = TestShelf::new();
        let owners = t.shelf.owners();
        let post = Post { id: 1 };
        let photo = t.upload("photo.png", png_bytes(8, 8)).await;
        let doc = t.upload("doc.pdf", Bytes::from_static(b"%PDF")).await;

        let attached = owners
            .attach_media(&post, vec![photo.id, doc.id], "gallery", &names(&["large", "thumb"]))
            .await
            .unwrap();
        assert_eq!(attached, Some(2));

        let jobs = t.queue.take();
        assert_eq!(jobs.len(), 1);
        let job = job_of(&jobs[0].kind);
        assert_eq!(job.media_id, photo.id);
        assert_eq!(job.conversions, names(&["large", "thumb"]));

        // already attached: nothing new, no job
        let again = owners
            .attach_media(&post, photo.id, "gallery", &[])
            .await
            .unwrap();
        assert_eq!(again, None);
        assert!(t.queue.take().is_empty());
    }

    #[tokio::test]
    async fn test_undeclared_channel_without_conversions_dispatches_nothing() {
        let t = TestShelf::new();
        let owners = t.shelf.owners();
        let post = Post { id: 1 };
        let photo = t.upload("photo.png", png_bytes(8, 8)).await;

        owners
            .attach_media(&post, &photo, DEFAULT_CHANNEL, &[])
            .await
            .unwrap();
        assert!(t.queue.take().is_empty());
        assert!(owners.has_media(&post, DEFAULT_CHANNEL).await.unwrap());
        assert!(!owners.has_media(&post, "gallery").await.unwrap());
    }

    #[tokio::test]
    async fn test_channels_are_isolated_per_owner() {
        let t = TestShelf::new();
        let owners = t.shelf.owners();
        let first = Post { id: 1 };
        let second = Post { id: 2 };
        let a = t.upload("a.png", png_bytes(2, 2)).await;
        let b = t.upload("b.png", png_bytes(2, 2)).await;

        owners.attach_media(&first, vec![b.id, a.id], "gallery", &[]).await.unwrap();
        owners.attach_media(&second, a.id, "gallery", &[]).await.unwrap();

        let ids: Vec<i64> = owners
            .get_media(&first, "gallery")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![b.id, a.id]);
        assert_eq!(owners.first_media(&first, "gallery").await.unwrap(), Some(b.clone()));

        assert_eq!(owners.detach_media(&first, a.id, "gallery").await.unwrap(), Some(1));
        assert_eq!(owners.clear_channel(&first, "gallery").await.unwrap(), 1);
        assert_eq!(owners.clear_channel(&first, "gallery").await.unwrap(), 0);
        assert!(owners.has_media(&second, "gallery").await.unwrap());

        let links = t.shelf.media().owners_of(&a).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].mediable_id, 2);
    }

    #[tokio::test]
    async fn test_sync_dispatches_for_attached_only() {
        let t = TestShelf::new();
        let owners = t.shelf.owners();
        let post = Post { id: 5 };
        let a = t.upload("a.png", png_bytes(2, 2)).await;
        let b = t.upload("b.png", png_bytes(2, 2)).await;

        owners.attach_media(&post, a.id, "gallery", &[]).await.unwrap();
        t.queue.take();

        let result = owners
            .sync_media(&post, vec![a.id, b.id], "gallery", true, &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.attached, vec![b.id]);
        assert_eq!(result.updated, vec![a.id]);

        let jobs = t.queue.take();
        assert_eq!(jobs.len(), 1);
        assert_eq!(job_of(&jobs[0].kind).media_id, b.id);
        assert_eq!(job_of(&jobs[0].kind).conversions, names(&["thumb"]));
    }

    #[tokio::test]
    async fn test_first_media_url() {
        let t = TestShelf::new();
        let owners = t.shelf.owners();
        let post = Post { id: 9 };

        assert_eq!(
            owners.first_media_url(&post, "gallery", None).await.unwrap(),
            ""
        );

        let photo = t.upload("photo.png", png_bytes(2, 2)).await;
        owners.attach_media(&post, &photo, "gallery", &[]).await.unwrap();

        let url = owners
            .first_media_url(&post, "gallery", Some("thumb"))
            .await
            .unwrap();
        assert_eq!(
            url,
            format!(
                "/storage/local/{}",
                t.shelf.media().path(&photo, Some("thumb"))
            )
        );
    }

    #[tokio::test]
    async fn test_deleting_media_removes_channel_links() {
        let t = TestShelf::new();
        let owners = t.shelf.owners();
        let post = Post { id: 3 };
        let photo = t.upload("photo.png", png_bytes(2, 2)).await;
        owners.attach_media(&post, &photo, "gallery", &[]).await.unwrap();

        t.shelf.media().delete(photo.id).await.unwrap();
        assert!(!owners.has_media(&post, "gallery").await.unwrap());
    }
}
