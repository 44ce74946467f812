//! Runtime configuration loaded from an optional YAML file.
//!
//! Everything that is not a secret has a default matching the haberler.com
//! "son dakika" listing, so the relay runs with no config file at all. Secrets
//! (API key, WordPress passwords) come from the CLI/environment and are merged
//! in by [`Config::with_secrets`].

use crate::cli::Cli;
use crate::error::ConfigError;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listing page polled every cycle.
    pub listing_url: String,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Seconds to sleep between poll cycles.
    pub poll_interval_secs: u64,
    /// Timeout for listing and article page fetches.
    pub page_timeout_secs: u64,
    /// Path of the JSON file holding published identifiers.
    pub seen_path: String,
    pub extraction: ExtractionRules,
    pub generation: GenerationConfig,
    pub wordpress: WordPressConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listing_url: "https://www.haberler.com/son-dakika/".to_string(),
            user_agent: "Mozilla/5.0 (WPHaberBot/1.0; +https://haberler.biz)".to_string(),
            poll_interval_secs: 300,
            page_timeout_secs: 20,
            seen_path: "seen.json".to_string(),
            extraction: ExtractionRules::default(),
            generation: GenerationConfig::default(),
            wordpress: WordPressConfig::default(),
        }
    }
}

/// Ordered selector lists and filters used by the scrapers.
///
/// Every list is tried front to back; the first non-empty result wins.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionRules {
    /// Selector for the anchor of each listing card.
    pub card_selector: String,
    /// Thumbnail selectors inside a card, highest priority first.
    pub thumbnail_selectors: Vec<String>,
    /// Containers searched for a lead image when no meta image exists.
    pub image_selectors: Vec<String>,
    /// Containers searched for body text.
    pub body_selectors: Vec<String>,
    /// Elements inside a body container that hold text blocks.
    pub text_block_selector: String,
    /// A text block must be longer than this (in characters) to be kept.
    pub min_block_chars: usize,
    /// Same, for the page-wide paragraph fallback.
    pub fallback_min_block_chars: usize,
    /// Blocks containing this string are dropped.
    pub attribution: String,
    pub max_blocks: usize,
    /// Exact path fragments of known blank images.
    pub placeholder_paths: Vec<String>,
    /// Case-insensitive markers that flag an image URL as filler.
    pub placeholder_markers: Vec<String>,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            card_selector: "div.new3sondk-news-card a.new3sondk-news".to_string(),
            thumbnail_selectors: strings(&[".images-mobile img", ".images img"]),
            image_selectors: strings(&[
                ".news-detail img",
                ".haber-metni img",
                ".article-content img",
                ".content-body img",
                "article img",
            ]),
            body_selectors: strings(&[
                ".news-detail",
                ".haber-metni",
                "article",
                ".content-body",
                ".article-content",
            ]),
            text_block_selector: "p, h2, li".to_string(),
            min_block_chars: 30,
            fallback_min_block_chars: 40,
            attribution: "Haberler.com".to_string(),
            max_blocks: 12,
            placeholder_paths: strings(&["mstatic/assets/img/white.jpg"]),
            placeholder_markers: strings(&["placeholder", "blank", "noimage"]),
        }
    }
}

/// Chat-completion settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Label of the trailing tag line the model is asked to produce.
    pub tag_marker: String,
    #[serde(skip)]
    pub api_key: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.4,
            max_tokens: 800,
            timeout_secs: 60,
            tag_marker: "ETİKETLER".to_string(),
            api_key: String::new(),
        }
    }
}

/// Publishing backend settings shared by both transports.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WordPressConfig {
    pub base_url: String,
    /// Post status for new posts.
    pub status: String,
    /// Optional category attached to every post.
    pub category_id: Option<u64>,
    pub image_timeout_secs: u64,
    pub request_timeout_secs: u64,
    #[serde(skip)]
    pub username: String,
    /// Account password, used by XML-RPC.
    #[serde(skip)]
    pub password: String,
    /// Application password, used by the REST API.
    #[serde(skip)]
    pub app_password: String,
}

impl Default for WordPressConfig {
    fn default() -> Self {
        Self {
            base_url: "https://haberler.biz".to_string(),
            status: "publish".to_string(),
            category_id: None,
            image_timeout_secs: 30,
            request_timeout_secs: 40,
            username: String::new(),
            password: String::new(),
            app_password: String::new(),
        }
    }
}

impl WordPressConfig {
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl Config {
    /// Load the YAML file at `path`, or the defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        info!(path, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Merge credentials and CLI overrides; fails if a secret is missing.
    pub fn with_secrets(mut self, cli: &Cli) -> Result<Self, ConfigError> {
        if let Some(seen_path) = &cli.seen_path {
            self.seen_path = seen_path.clone();
        }
        self.generation.api_key = required(&cli.openai_api_key, "OPENAI_API_KEY")?;
        self.wordpress.username = required(&cli.wp_username, "WP_USERNAME")?;
        self.wordpress.password = required(&cli.wp_password, "WP_USERPASS")?;
        self.wordpress.app_password = cli.wp_app_password.clone().unwrap_or_default();
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.clone()),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
