//! Article page parsing: lead image, title and body text.
//!
//! Lead image priority is Open Graph, then Twitter card, then the first real
//! image inside the body containers. A page without a usable image is
//! rejected outright with [`ExtractError::NoUsableImage`].
//!
//! Body text is taken from the first body container that yields any blocks;
//! when none does, every paragraph on the page is scanned with a stricter
//! length filter.

use super::{attr, element_text, looks_like_placeholder, selector};
use crate::config::ExtractionRules;
use crate::error::ExtractError;
use crate::models::ArticleContent;
use scraper::Html;
use url::Url;

/// Parse an article page fetched from `page_url`.
///
/// `fallback_title` (the listing title) is used when the page has neither
/// `og:title` nor an `h1`.
pub fn parse_article(
    html: &str,
    page_url: &str,
    fallback_title: &str,
    rules: &ExtractionRules,
) -> Result<ArticleContent, ExtractError> {
    let document = Html::parse_document(html);

    let main_image_url = main_image(&document, rules)?
        .filter(|src| !looks_like_placeholder(src, rules))
        .map(|src| absolutize(page_url, &src))
        .ok_or_else(|| ExtractError::NoUsableImage {
            url: page_url.to_string(),
        })?;

    let title = title(&document)?.unwrap_or_else(|| fallback_title.trim().to_string());
    let raw_text = body_text(&document, rules)?.join("\n\n");

    Ok(ArticleContent {
        title,
        main_image_url,
        raw_text,
    })
}

/// Resolve the lead image candidate, before the placeholder gate.
pub fn main_image(document: &Html, rules: &ExtractionRules) -> Result<Option<String>, ExtractError> {
    for css in [r#"meta[property="og:image"]"#, r#"meta[name="twitter:image"]"#] {
        let meta = selector(css)?;
        if let Some(content) = document.select(&meta).find_map(|m| attr(m, "content")) {
            return Ok(Some(content.to_string()));
        }
    }

    for css in &rules.image_selectors {
        let images = selector(css)?;
        let found = document
            .select(&images)
            .filter_map(|img| attr(img, "src").or_else(|| attr(img, "data-src")))
            .find(|src| !looks_like_placeholder(src, rules));
        if let Some(src) = found {
            return Ok(Some(src.to_string()));
        }
    }
    Ok(None)
}

/// Ordered text blocks, capped at `rules.max_blocks`.
pub fn body_text(document: &Html, rules: &ExtractionRules) -> Result<Vec<String>, ExtractError> {
    let blocks = selector(&rules.text_block_selector)?;
    let keep = |text: &str, min_chars: usize| {
        text.chars().count() > min_chars && !text.contains(rules.attribution.as_str())
    };

    for css in &rules.body_selectors {
        let container = selector(css)?;
        let Some(node) = document.select(&container).next() else {
            continue;
        };
        let parts: Vec<String> = node
            .select(&blocks)
            .map(element_text)
            .filter(|t| keep(t, rules.min_block_chars))
            .take(rules.max_blocks)
            .collect();
        if !parts.is_empty() {
            return Ok(parts);
        }
    }

    let paragraphs = selector("p")?;
    Ok(document
        .select(&paragraphs)
        .map(element_text)
        .filter(|t| keep(t, rules.fallback_min_block_chars))
        .take(rules.max_blocks)
        .collect())
}

fn title(document: &Html) -> Result<Option<String>, ExtractError> {
    let og = selector(r#"meta[property="og:title"]"#)?;
    if let Some(content) = document.select(&og).find_map(|m| attr(m, "content")) {
        return Ok(Some(content.to_string()));
    }
    let h1 = selector("h1")?;
    Ok(document
        .select(&h1)
        .map(element_text)
        .find(|t| !t.is_empty()))
}

fn absolutize(page_url: &str, src: &str) -> String {
    Url::parse(page_url)
        .and_then(|base| base.join(src))
        .map(String::from)
        .unwrap_or_else(|_| src.to_string())
}
