//! Source extraction for the news listing and article pages.
//!
//! Extraction runs in two phases, like any scraper in this crate:
//!
//! 1. **Listing**: [`SourceExtractor::list_items`] turns the listing page into
//!    [`ListingCandidate`]s, dropping cards without a real thumbnail.
//! 2. **Article**: [`SourceExtractor::fetch_article`] parses one article page and
//!    rejects it when no usable lead image can be found.
//!
//! Parsing itself is pure (see [`listing`] and [`article`]) and driven by the
//! ordered selector lists in [`ExtractionRules`], so it can be exercised
//! against fixture HTML without any network.

pub mod article;
pub mod listing;

use crate::config::ExtractionRules;
use crate::error::ExtractError;
use crate::http::Fetch;
use crate::models::{ArticleContent, ListingCandidate};
use scraper::{ElementRef, Selector};
use tracing::{debug, info, instrument};

/// Fetches and parses pages from the news source.
#[derive(Debug)]
pub struct SourceExtractor<F> {
    fetch: F,
    rules: ExtractionRules,
}

impl<F: Fetch> SourceExtractor<F> {
    pub fn new(fetch: F, rules: ExtractionRules) -> Self {
        Self { fetch, rules }
    }

    #[cfg(test)]
    pub fn fetcher(&self) -> &F {
        &self.fetch
    }

    /// Fetch the listing page and return every card with a usable thumbnail.
    ///
    /// # Arguments
    ///
    /// * `listing_url` - Absolute URL of the listing page.
    ///
    /// # Returns
    ///
    /// Candidates in page order. An unreachable listing is an error; cards
    /// without a link or usable thumbnail are dropped silently.
    #[instrument(level = "info", skip(self))]
    pub async fn list_items(&self, listing_url: &str) -> Result<Vec<ListingCandidate>, ExtractError> {
        let html = self.fetch.get_text(listing_url).await?;
        let candidates = listing::parse_listing(&html, listing_url, &self.rules)?;
        info!(count = candidates.len(), "Indexed listing candidates with thumbnails");
        debug!(urls = ?candidates.iter().map(|c| &c.url).collect::<Vec<_>>(), "Listing URLs");
        Ok(candidates)
    }

    /// Fetch one article page and extract its title, lead image and text.
    ///
    /// # Arguments
    ///
    /// * `url` - Article URL from the listing card.
    /// * `fallback_title` - Used when the page has neither `og:title` nor `h1`.
    ///
    /// # Returns
    ///
    /// The extracted article, or an error when the page cannot be fetched or
    /// has no usable lead image.
    #[instrument(level = "info", skip(self, fallback_title))]
    pub async fn fetch_article(
        &self,
        url: &str,
        fallback_title: &str,
    ) -> Result<ArticleContent, ExtractError> {
        let html = self.fetch.get_text(url).await?;
        let article = article::parse_article(&html, url, fallback_title, &self.rules)?;
        info!(
            bytes = article.raw_text.len(),
            image = %article.main_image_url,
            "Parsed article"
        );
        Ok(article)
    }
}

/// True when an image URL is absent or a known filler image.
pub fn looks_like_placeholder(img_url: &str, rules: &ExtractionRules) -> bool {
    if img_url.trim().is_empty() {
        return true;
    }
    if rules
        .placeholder_paths
        .iter()
        .any(|path| img_url.contains(path.as_str()))
    {
        return true;
    }
    let lower = img_url.to_lowercase();
    rules
        .placeholder_markers
        .iter()
        .any(|marker| lower.contains(&marker.to_lowercase()))
}

pub(crate) fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|_| ExtractError::Selector {
        selector: css.to_string(),
    })
}

/// Text of an element with each text node trimmed and joined by single spaces.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    itertools::join(
        element.text().map(str::trim).filter(|t| !t.is_empty()),
        " ",
    )
}

/// A trimmed, non-empty attribute value.
pub(crate) fn attr<'a>(element: ElementRef<'a>, name: &str) -> Option<&'a str> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
