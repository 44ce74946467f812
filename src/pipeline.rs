//! The poll loop and the per-item state machine.
//!
//! ```text
//! Discovered ─ seen? ─> Skipped
//!      │
//!      └─> ArticleFetched ─> ImageGated ─> ContentGenerated ─> Published
//!                │               │                │               │
//!                └───────────────┴────── Failed ──┴───────────────┘
//! ```
//!
//! Items run strictly one after another. Only `Published` touches the seen
//! set, and the store is saved right after each insert, so a crash loses at
//! most the item in flight. Every failure is item-scoped and logged here.

use crate::api::AskAsync;
use crate::config::WordPressConfig;
use crate::error::{ExtractError, ItemFailure};
use crate::generator::ContentGenerator;
use crate::http::Fetch;
use crate::models::{CycleReport, ItemOutcome, ListingCandidate, PostDraft, PublishResult};
use crate::publish::{Publisher, Transport};
use crate::scrapers::SourceExtractor;
use crate::store::{SeenSet, SeenStore, item_id};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Owns every stage and the process-wide seen set.
pub struct Pipeline<F, A, P, R> {
    extractor: SourceExtractor<F>,
    generator: ContentGenerator<A>,
    publisher: Publisher<P, R>,
    store: SeenStore,
    seen: SeenSet,
    listing_url: String,
    post_status: String,
    category_id: Option<u64>,
}

impl<F, A, P, R> Pipeline<F, A, P, R>
where
    F: Fetch,
    A: AskAsync,
    P: Transport,
    R: Transport,
{
    /// Build the pipeline and load the seen set from `store`.
    pub async fn new(
        extractor: SourceExtractor<F>,
        generator: ContentGenerator<A>,
        publisher: Publisher<P, R>,
        store: SeenStore,
        listing_url: impl Into<String>,
        wordpress: &WordPressConfig,
    ) -> Self {
        let seen = store.load().await;
        debug!(path = %store.path().display(), count = seen.len(), "Seen set ready");
        Self {
            extractor,
            generator,
            publisher,
            store,
            seen,
            listing_url: listing_url.into(),
            post_status: wordpress.status.clone(),
            category_id: wordpress.category_id,
        }
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Drive one candidate to a terminal state.
    ///
    /// # Arguments
    ///
    /// * `candidate` - Listing card to process.
    ///
    /// # Returns
    ///
    /// `Skipped` for a seen item, `Published` once a post id exists (the item
    /// is then marked seen and the store saved), otherwise `Failed` with the
    /// stage that stopped it. Failed items stay unseen and are retried next
    /// cycle.
    #[instrument(level = "info", skip_all, fields(url = %candidate.url))]
    pub async fn process_item(&mut self, candidate: &ListingCandidate) -> ItemOutcome {
        let id = item_id(&candidate.url);
        if self.seen.contains(&id) {
            return ItemOutcome::Skipped;
        }

        match self.publish_new(candidate).await {
            Ok(result) => {
                self.seen.insert(id);
                self.store.save(&self.seen).await;
                ItemOutcome::Published(result)
            }
            Err(failure) => ItemOutcome::Failed(failure),
        }
    }

    async fn publish_new(&self, candidate: &ListingCandidate) -> Result<PublishResult, ItemFailure> {
        let article = self
            .extractor
            .fetch_article(&candidate.url, &candidate.title)
            .await?;
        // Page titles can carry site branding; the card title is the headline.
        let title = match candidate.title.trim() {
            "" => article.title,
            listed => listed.to_string(),
        };
        let generated = self.generator.generate(&title, &article.raw_text).await?;

        let draft = PostDraft {
            title,
            body_html: generated.body_html,
            tags: generated.tags,
            status: self.post_status.clone(),
            category_id: self.category_id,
        };
        self.publisher
            .publish(&article.main_image_url, &draft)
            .await
            .ok_or(ItemFailure::Publish)
    }

    /// One poll: list, then process candidates in page order until done or
    /// shutdown is requested.
    ///
    /// # Returns
    ///
    /// Counters for the cycle, or the listing error when no candidates could
    /// be read.
    #[instrument(level = "info", skip_all, fields(listing = %self.listing_url))]
    pub async fn run_cycle(
        &mut self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<CycleReport, ExtractError> {
        let candidates = self.extractor.list_items(&self.listing_url).await?;
        let mut report = CycleReport {
            discovered: candidates.len(),
            ..Default::default()
        };

        for candidate in &candidates {
            if *shutdown.borrow() {
                info!("Shutdown requested; leaving the rest of the listing for later");
                break;
            }
            let outcome = self.process_item(candidate).await;
            log_outcome(candidate, &outcome);
            report.record(&outcome);
        }

        if report.published == 0 {
            info!("No new item");
        }
        info!(
            discovered = report.discovered,
            published = report.published,
            skipped = report.skipped,
            failed = report.failed,
            "Cycle finished"
        );
        Ok(report)
    }

    /// Poll until shutdown, sleeping `interval` after every cycle.
    ///
    /// Errors and panics inside a cycle are logged and never end the loop.
    pub async fn run_forever(&mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        loop {
            match AssertUnwindSafe(self.run_cycle(&shutdown))
                .catch_unwind()
                .await
            {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!(error = %e, "Cycle failed"),
                Err(panic) => error!(panic = %panic_message(&*panic), "Cycle panicked"),
            }

            if *shutdown.borrow() {
                break;
            }
            debug!(secs = interval.as_secs(), "Sleeping until next poll");
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                Ok(()) = shutdown.changed() => {}
            }
            if *shutdown.borrow() {
                break;
            }
        }
        info!("Poll loop stopped");
    }
}

fn log_outcome(candidate: &ListingCandidate, outcome: &ItemOutcome) {
    match outcome {
        ItemOutcome::Published(result) => info!(
            url = %candidate.url,
            post_id = %result.post_id,
            media_id = ?result.media_id.as_ref().map(|m| m.0.as_str()),
            "Published"
        ),
        ItemOutcome::Skipped => debug!(url = %candidate.url, "No new item: already published"),
        ItemOutcome::Failed(ItemFailure::NoUsableImage) => {
            info!(url = %candidate.url, "Skipped: article has no usable image")
        }
        ItemOutcome::Failed(reason) => {
            warn!(url = %candidate.url, title = %candidate.title, error = %reason, "Item failed")
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
