//! Data models passed between pipeline stages.
//!
//! - [`ListingCandidate`]: a card from the listing page that passed the thumbnail gate
//! - [`ArticleContent`]: the parsed article page
//! - [`GeneratedArticle`]: the rewritten body and tags
//! - [`PostDraft`] / [`PublishResult`]: what goes to, and comes back from, WordPress
//!
//! All of these are transient and owned by the item being processed.

use crate::error::ItemFailure;
use std::fmt;

/// A listing card with a usable thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCandidate {
    pub title: String,
    /// Absolute article URL.
    pub url: String,
    pub thumbnail_url: String,
}

/// Content extracted from one article page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleContent {
    pub title: String,
    pub main_image_url: String,
    /// Text blocks joined with blank lines.
    pub raw_text: String,
}

/// Output of the generation service, ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArticle {
    /// `<p>`-wrapped, HTML-escaped paragraphs.
    pub body_html: String,
    pub tags: Vec<String>,
}

/// Media identifier returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaId(pub String);

/// Post identifier returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostId(pub String);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport-neutral description of a post to create.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    pub body_html: String,
    pub tags: Vec<String>,
    pub status: String,
    pub category_id: Option<u64>,
}

/// A post that went out.
///
/// # Fields
///
/// * `post_id` - Id returned by whichever transport created the post.
/// * `media_id` - Featured image the post was created with, if any upload
///   succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub post_id: PostId,
    pub media_id: Option<MediaId>,
}

/// Terminal state of one listing candidate.
#[derive(Debug)]
pub enum ItemOutcome {
    Published(PublishResult),
    /// Already in the seen set.
    Skipped,
    Failed(ItemFailure),
}

/// Per-cycle counters, logged at the end of each poll.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub discovered: usize,
    pub published: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CycleReport {
    pub fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Published(_) => self.published += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed(_) => self.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_report_counts_outcomes() {
        let mut report = CycleReport {
            discovered: 3,
            ..Default::default()
        };
        report.record(&ItemOutcome::Skipped);
        report.record(&ItemOutcome::Failed(ItemFailure::Publish));
        report.record(&ItemOutcome::Published(PublishResult {
            post_id: PostId("42".to_string()),
            media_id: None,
        }));

        assert_eq!(report.published, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_ids_display_raw_value() {
        assert_eq!(PostId("17".to_string()).to_string(), "17");
        assert_eq!(MediaId("abc".to_string()).to_string(), "abc");
    }
}
