//! Publishing to WordPress over two alternative transports.
//!
//! | Transport | Module | Auth | Media | Post |
//! |-----------|--------|------|-------|------|
//! | XML-RPC (primary) | [`xmlrpc`] | username + account password | `wp.uploadFile` | `wp.newPost` |
//! | REST (fallback) | [`rest`] | HTTP Basic, application password | `POST /media` | `POST /posts` |
//!
//! [`Publisher::publish`] owns the fallback policy and is the only place that
//! turns transport errors into log lines:
//!
//! 1. upload media on the primary,
//! 2. create the post on the primary with whatever media id came back,
//! 3. if that failed: upload on the fallback only if no media id exists yet,
//!    then create the post on the fallback,
//! 4. the first post id wins.
//!
//! Either transport can be disabled on the backend and posts still go out.

pub mod rest;
pub mod xmlrpc;

use crate::error::PublishError;
use crate::http::Fetch;
use crate::models::{MediaId, PostDraft, PostId, PublishResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{info, instrument, warn};
use url::Url;

static IMAGE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp)$").unwrap());

/// One backend integration path.
pub trait Transport {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch `image_url` and store it in the media library.
    async fn upload_media(&self, image_url: &str) -> Result<MediaId, PublishError>;

    /// Create a post, optionally with a featured image.
    async fn create_post(
        &self,
        draft: &PostDraft,
        featured_media: Option<&MediaId>,
    ) -> Result<PostId, PublishError>;
}

/// Primary and fallback transports with the publish policy between them.
#[derive(Debug)]
pub struct Publisher<P, R> {
    primary: P,
    fallback: R,
}

impl<P: Transport, R: Transport> Publisher<P, R> {
    pub fn new(primary: P, fallback: R) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn fallback(&self) -> &R {
        &self.fallback
    }

    /// Publish one article, falling back to the second transport when the
    /// primary cannot create the post.
    ///
    /// # Arguments
    ///
    /// * `image_url` - Featured image, uploaded before the post is created.
    /// * `draft` - Title, HTML body and tags of the post.
    ///
    /// # Returns
    ///
    /// The post id and the media id it was created with, or `None` when
    /// neither transport produced a post id. Transport errors are logged here
    /// and never returned.
    #[instrument(level = "info", skip(self, draft), fields(title = %draft.title))]
    pub async fn publish(&self, image_url: &str, draft: &PostDraft) -> Option<PublishResult> {
        let mut media_id = upload(&self.primary, image_url).await;
        if let Some(post_id) = create(&self.primary, draft, media_id.as_ref()).await {
            return Some(PublishResult { post_id, media_id });
        }

        if media_id.is_none() {
            media_id = upload(&self.fallback, image_url).await;
        }
        let post_id = create(&self.fallback, draft, media_id.as_ref()).await?;
        Some(PublishResult { post_id, media_id })
    }
}

async fn upload<T: Transport>(transport: &T, image_url: &str) -> Option<MediaId> {
    match transport.upload_media(image_url).await {
        Ok(id) => {
            info!(transport = transport.name(), media_id = %id, "Uploaded media");
            Some(id)
        }
        Err(e) => {
            warn!(transport = transport.name(), error = %e, "Media upload failed");
            None
        }
    }
}

async fn create<T: Transport>(
    transport: &T,
    draft: &PostDraft,
    media_id: Option<&MediaId>,
) -> Option<PostId> {
    match transport.create_post(draft, media_id).await {
        Ok(id) => {
            info!(transport = transport.name(), post_id = %id, "Created post");
            Some(id)
        }
        Err(e) => {
            warn!(transport = transport.name(), error = %e, "Post creation failed");
            None
        }
    }
}

/// An image downloaded for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    /// Download `image_url` and derive its upload filename and MIME type.
    pub async fn fetch<F: Fetch>(
        fetch: &F,
        image_url: &str,
        timeout: Duration,
    ) -> Result<Self, PublishError> {
        let bytes = fetch.get_bytes(image_url, timeout).await?;
        let name = media_filename(image_url);
        let mime = mime_for(&name);
        Ok(Self { name, mime, bytes })
    }
}

/// Filename for an uploaded image.
///
/// # Arguments
///
/// * `image_url` - Absolute URL of the image.
///
/// # Returns
///
/// The last path segment with `.jpg` appended when it lacks an image
/// extension, or `image_<unix timestamp>.jpg` when the URL has no usable
/// segment.
pub fn media_filename(image_url: &str) -> String {
    let segment = Url::parse(image_url)
        .ok()
        .and_then(|u| u.path_segments()?.last().map(str::to_string))
        .filter(|s| !s.is_empty());
    let mut name =
        segment.unwrap_or_else(|| format!("image_{}.jpg", chrono::Utc::now().timestamp()));
    if !IMAGE_EXTENSION.is_match(&name) {
        name.push_str(".jpg");
    }
    name
}

/// MIME type for an upload filename.
///
/// # Arguments
///
/// * `name` - Filename as produced by [`media_filename`].
///
/// # Returns
///
/// `image/png`, `image/gif` or `image/webp` for those extensions (any case),
/// and `image/jpeg` for everything else.
pub fn mime_for(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}
