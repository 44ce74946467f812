//! Article rewriting through the chat-completion service.
//!
//! The model is asked for a short neutral Turkish news article followed by a
//! single `ETİKETLER:` line of comma-separated tags. The reply is split at that
//! marker: everything before it becomes `<p>`-wrapped HTML, everything after it
//! becomes the tag list.

use crate::api::{AskAsync, Message};
use crate::error::GenerationError;
use crate::models::GeneratedArticle;
use crate::utils::truncate_for_log;
use regex::Regex;
use tracing::{debug, info, instrument};

const SYSTEM_PROMPT: &str = "Kısa, sade ve tarafsız Türkçe haber yazarı gibi davran.";
const LIMITED_SOURCE: &str = "(Kaynak metin kısıtlı)";
const MAX_TAGS: usize = 12;
const TAG_DELIMITERS: [char; 4] = ['#', ',', ';', '|'];

/// Rewrites articles and extracts tags.
#[derive(Debug)]
pub struct ContentGenerator<A> {
    ask: A,
    tag_marker: String,
    tag_pattern: Regex,
}

impl<A: AskAsync> ContentGenerator<A> {
    pub fn new(ask: A, tag_marker: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            ask,
            tag_marker: tag_marker.to_string(),
            tag_pattern: tag_line_pattern(tag_marker)?,
        })
    }

    #[cfg(test)]
    pub fn asker(&self) -> &A {
        &self.ask
    }

    /// Generate a rewritten article for `title` from the scraped `source_text`.
    ///
    /// # Arguments
    ///
    /// * `title` - Headline placed in the prompt.
    /// * `source_text` - Scraped body; a placeholder is sent when it is blank.
    ///
    /// # Returns
    ///
    /// The HTML body and tags parsed from the reply. A reply without the tag
    /// marker is all body and no tags.
    #[instrument(level = "info", skip(self, source_text))]
    pub async fn generate(
        &self,
        title: &str,
        source_text: &str,
    ) -> Result<GeneratedArticle, GenerationError> {
        let prompt = build_prompt(title, source_text, &self.tag_marker);
        let messages = [Message::system(SYSTEM_PROMPT), Message::user(prompt)];

        let content = self.ask.ask(&messages).await?;
        debug!(response_preview = %truncate_for_log(&content, 300), "Generation response");

        let article = parse_generation(&content, &self.tag_pattern);
        info!(
            body_bytes = article.body_html.len(),
            tags = article.tags.len(),
            "Generated article"
        );
        Ok(article)
    }
}

/// The user prompt sent for one article.
pub fn build_prompt(title: &str, source_text: &str, tag_marker: &str) -> String {
    let source = if source_text.trim().is_empty() {
        LIMITED_SOURCE
    } else {
        source_text
    };
    format!(
        "Aşağıdaki başlık ve kaynak metne dayanarak Türkçe bir haber yaz.\n\
         - Tarafsız ve akıcı olsun\n\
         - 4-7 paragraf\n\
         - Gereksiz tekrar ve abartı olmasın\n\
         - En alta \"{tag_marker}:\" satırında 6-12 adet kısa etiket (virgülle)\n\
         \n\
         BAŞLIK: {title}\n\
         \n\
         KAYNAK METİN:\n\
         {source}"
    )
}

/// Case-insensitive `<marker>: <tags>` line matcher.
///
/// Turkish dotted/dotless `i` do not case-fold onto ASCII `i`, so those
/// letters are widened explicitly.
pub fn tag_line_pattern(marker: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(marker)
        .replace('İ', "[İi]")
        .replace('ı', "[ıI]");
    Regex::new(&format!(r"(?i){escaped}\s*:\s*(.+)"))
}

/// Split a model reply into HTML body and tags.
pub fn parse_generation(content: &str, tag_pattern: &Regex) -> GeneratedArticle {
    let (body, tags) = match tag_pattern.captures(content) {
        Some(caps) => {
            let start = caps.get(0).map_or(0, |m| m.start());
            let tag_line = caps.get(1).map_or("", |m| m.as_str());
            (content[..start].trim(), split_tags(tag_line))
        }
        None => (content, Vec::new()),
    };
    GeneratedArticle {
        body_html: paragraphs_to_html(body),
        tags,
    }
}

fn split_tags(tag_line: &str) -> Vec<String> {
    tag_line
        .split(TAG_DELIMITERS)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS)
        .map(str::to_string)
        .collect()
}

/// One `<p>` per non-blank line, HTML-escaped.
pub fn paragraphs_to_html(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("<p>{}</p>\n", html_escape::encode_quoted_attribute(line)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CannedAsk;
    use itertools::Itertools;

    fn pattern() -> Regex {
        tag_line_pattern("ETİKETLER").unwrap()
    }

    #[test]
    fn test_body_and_tags_are_split_at_marker() {
        let article = parse_generation(
            "Paragraph one.\n\nParagraph two.\n\nETİKETLER: a, b, c",
            &pattern(),
        );

        assert_eq!(article.body_html, "<p>Paragraph one.</p>\n<p>Paragraph two.</p>\n");
        assert_eq!(article.body_html.matches("<p>").count(), 2);
        assert_eq!(article.tags, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_marker_keeps_everything_as_body() {
        let article = parse_generation("Tek paragraf.\nİkinci satır.", &pattern());

        assert_eq!(article.body_html, "<p>Tek paragraf.</p>\n<p>İkinci satır.</p>\n");
        assert!(article.tags.is_empty());
    }

    #[test]
    fn test_marker_is_case_insensitive() {
        let article = parse_generation("Metin.\nEtiketler : ekonomi; dolar", &pattern());
        assert_eq!(article.tags, vec!["ekonomi", "dolar"]);
        assert_eq!(article.body_html, "<p>Metin.</p>\n");

        let article = parse_generation("Metin.\netİketler: spor", &pattern());
        assert_eq!(article.tags, vec!["spor"]);
    }

    #[test]
    fn test_tags_split_on_every_delimiter_and_are_capped() {
        let line = (1..=15).map(|i| format!("t{i}")).join(" | ");
        let article = parse_generation(
            &format!("Gövde.\nETİKETLER: #a #b;c,,{line}"),
            &pattern(),
        );

        assert_eq!(article.tags.len(), 12);
        assert_eq!(&article.tags[..4], &["a", "b", "c", "t1"]);
        assert_eq!(article.tags[11], "t9");
    }

    #[test]
    fn test_duplicate_tags_are_kept_in_order() {
        let article = parse_generation("Gövde.\nETİKETLER: a, b, a, c", &pattern());
        assert_eq!(article.tags, vec!["a", "b", "a", "c"]);

        let line = std::iter::repeat_n("x", 14).join(", ");
        let article = parse_generation(&format!("Gövde.\nETİKETLER: {line}, son"), &pattern());
        assert_eq!(article.tags.len(), 12);
        assert!(!article.tags.contains(&"son".to_string()));
    }

    #[test]
    fn test_body_is_html_escaped() {
        assert_eq!(
            paragraphs_to_html("5 < 6 & \"alıntı\"\n   \n"),
            "<p>5 &lt; 6 &amp; &quot;alıntı&quot;</p>\n"
        );
    }

    #[test]
    fn test_prompt_uses_placeholder_for_empty_source() {
        let prompt = build_prompt("Başlık", "   ", "ETİKETLER");

        assert!(prompt.contains("BAŞLIK: Başlık"));
        assert!(prompt.contains("(Kaynak metin kısıtlı)"));
        assert!(prompt.contains("\"ETİKETLER:\""));
        assert!(prompt.contains("4-7 paragraf"));
    }

    #[tokio::test]
    async fn test_generate_sends_system_and_user_messages() {
        let ask = CannedAsk::replying("Bir.\nİki.\nETİKETLER: x, y");
        let generator = ContentGenerator::new(ask, "ETİKETLER").unwrap();

        let article = generator.generate("Başlık", "Kaynak metin").await.unwrap();

        assert_eq!(article.tags, vec!["x", "y"]);
        let seen = generator.ask.seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].role, "system");
        assert!(seen[1].content.contains("Kaynak metin"));
    }

    #[tokio::test]
    async fn test_generate_propagates_failure() {
        let ask = CannedAsk::failing();
        let generator = ContentGenerator::new(ask, "ETİKETLER").unwrap();

        assert!(generator.generate("Başlık", "").await.is_err());
    }
}
