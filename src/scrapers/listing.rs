//! Listing page parsing.
//!
//! Each card anchor yields a link, a title (the `title` attribute, else the
//! anchor text) and a thumbnail. Cards without a real thumbnail are dropped
//! here: no image on the listing almost always means no image on the article,
//! so the article fetch is not worth making.

use super::{attr, element_text, looks_like_placeholder, selector};
use crate::config::ExtractionRules;
use crate::error::{ExtractError, FetchError};
use crate::models::ListingCandidate;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

/// Parse listing HTML into candidates.
///
/// Card links are resolved against the site root of `listing_url`; thumbnails
/// against the listing URL itself.
pub fn parse_listing(
    html: &str,
    listing_url: &str,
    rules: &ExtractionRules,
) -> Result<Vec<ListingCandidate>, ExtractError> {
    let base = Url::parse(listing_url).map_err(|source| FetchError::InvalidUrl {
        url: listing_url.to_string(),
        source,
    })?;
    let document = Html::parse_document(html);
    let card_selector = selector(&rules.card_selector)?;
    let thumbnail_selectors = rules
        .thumbnail_selectors
        .iter()
        .map(|css| selector(css))
        .collect::<Result<Vec<_>, _>>()?;

    let mut candidates = Vec::new();
    for card in document.select(&card_selector) {
        let Some(href) = attr(card, "href") else {
            continue;
        };
        let title = attr(card, "title")
            .map(str::to_string)
            .unwrap_or_else(|| element_text(card));
        if title.is_empty() {
            continue;
        }
        let Ok(url) = article_url(&base, href) else {
            debug!(href, "Unresolvable card link");
            continue;
        };

        let thumbnail = thumbnail_src(card, &thumbnail_selectors).unwrap_or_default();
        if looks_like_placeholder(thumbnail, rules) {
            debug!(%url, "Skipping card without a real thumbnail");
            continue;
        }
        let thumbnail_url = base
            .join(thumbnail)
            .map(String::from)
            .unwrap_or_else(|_| thumbnail.to_string());

        candidates.push(ListingCandidate {
            title,
            url: url.into(),
            thumbnail_url,
        });
    }
    Ok(candidates)
}

/// Absolute article URL for a card `href`.
///
/// Anything that is not already an `http(s)` URL is taken as a path from the
/// site root, with or without its leading slash.
fn article_url(listing: &Url, href: &str) -> Result<Url, url::ParseError> {
    if href.starts_with("http") {
        return Url::parse(href);
    }
    listing.join("/")?.join(href.trim_start_matches('/'))
}

/// `src` of the first image matched by the selectors, in priority order.
fn thumbnail_src<'a>(card: ElementRef<'a>, selectors: &[Selector]) -> Option<&'a str> {
    let img = selectors.iter().find_map(|s| card.select(s).next())?;
    attr(img, "src")
}
