use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info};

use crate::ai::{Summarizer, Tagger};
use crate::error::Result;
use crate::models::{EnrichmentOutcome, RecordId};
use crate::services::{Archiver, LinkSaver};

use super::spawner::TaskSpawner;

struct Inner {
    spawner: Arc<dyn TaskSpawner>,
    archiver: Arc<dyn Archiver>,
    summarizer: Arc<dyn Summarizer>,
    tagger: Arc<dyn Tagger>,
    saver: Arc<LinkSaver>,
}

/// Fans new records out to background jobs. Every call returns immediately;
/// the jobs log their own failures.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(
        spawner: Arc<dyn TaskSpawner>,
        archiver: Arc<dyn Archiver>,
        summarizer: Arc<dyn Summarizer>,
        tagger: Arc<dyn Tagger>,
        saver: Arc<LinkSaver>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                spawner,
                archiver,
                summarizer,
                tagger,
                saver,
            }),
        }
    }

    /// Archive, summarize and tag a new link. The three jobs are independent.
    pub fn link_created(&self, link_id: RecordId) {
        let archiver = self.inner.archiver.clone();
        self.spawn_enrichment("archive", link_id, async move {
            archiver.maybe_archive(link_id).await
        });

        let summarizer = self.inner.summarizer.clone();
        self.spawn_enrichment("summarize", link_id, async move {
            summarizer.maybe_summarize(link_id).await
        });

        let tagger = self.inner.tagger.clone();
        self.spawn_enrichment("suggest_tags", link_id, async move {
            tagger.maybe_suggest_tags(link_id).await
        });
    }

    /// Archive one link on request.
    pub fn archive(&self, link_id: RecordId) {
        let archiver = self.inner.archiver.clone();
        self.spawn_enrichment("archive", link_id, async move {
            archiver.maybe_archive(link_id).await
        });
    }

    /// Check whether a new feed item should be saved to the library, and
    /// enrich the resulting link if it is.
    pub fn feed_item_created(&self, item_id: RecordId) {
        let dispatcher = self.clone();
        self.inner.spawner.spawn(
            "promote_feed_item",
            async move {
                match dispatcher.inner.saver.maybe_promote_feed_item(item_id).await {
                    Ok(Some(link)) => dispatcher.link_created(link.id),
                    Ok(None) => {}
                    Err(e) => {
                        error!(feed_item_id = item_id, error = %e, "Failed to add feed item to library")
                    }
                }
            }
            .boxed(),
        );
    }

    fn spawn_enrichment<F>(&self, action: &'static str, link_id: RecordId, job: F)
    where
        F: Future<Output = Result<EnrichmentOutcome>> + Send + 'static,
    {
        self.inner.spawner.spawn(
            action,
            async move {
                match job.await {
                    Ok(EnrichmentOutcome::Completed) => {
                        info!(action, link_id, "Enrichment completed")
                    }
                    Ok(EnrichmentOutcome::Skipped(reason)) => {
                        debug!(action, link_id, ?reason, "Enrichment skipped")
                    }
                    Err(e) => error!(action, link_id, error = %e, "Enrichment failed"),
                }
            }
            .boxed(),
        );
    }
}
