//! Error types for each stage of the relay pipeline.
//!
//! Every failure below [`ConfigError`] is item-scoped: the orchestrator logs it
//! and moves on to the next candidate. Configuration errors only occur at startup.

use reqwest::StatusCode;
use thiserror::Error;

/// A network fetch failed (listing page, article page, or image).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Listing or article extraction failed.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extraction failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("no usable image on {url}")]
    NoUsableImage { url: String },

    #[error("invalid selector {selector:?}")]
    Selector { selector: String },
}

/// The chat-completion call did not produce usable text.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generation service returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("generation response had no message content")]
    EmptyResponse,

    #[error("API key is not a valid HTTP header value")]
    InvalidApiKey,
}

/// One transport failed to upload media or create a post.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("could not fetch image: {0}")]
    Image(#[from] FetchError),

    #[error("{transport} request failed: {source}")]
    Http {
        transport: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{transport} returned HTTP {status}: {body}")]
    Status {
        transport: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("XML-RPC fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("{transport} response was malformed: {detail}")]
    Malformed {
        transport: &'static str,
        detail: String,
    },
}

/// Why an item ended in the `Failed` state.
#[derive(Debug, Error)]
pub enum ItemFailure {
    #[error("article fetch failed: {0}")]
    Extraction(ExtractError),

    #[error("no usable image in article")]
    NoUsableImage,

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("could not publish on any transport")]
    Publish,
}

impl From<ExtractError> for ItemFailure {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::NoUsableImage { .. } => ItemFailure::NoUsableImage,
            other => ItemFailure::Extraction(other),
        }
    }
}

/// Startup configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid tag marker: {0}")]
    TagMarker(#[from] regex::Error),

    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
