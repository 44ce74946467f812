//! WordPress REST transport (`/wp-json/wp/v2`), authenticated with an
//! application password over HTTP Basic.

use super::{MediaFile, Transport};
use crate::config::WordPressConfig;
use crate::error::PublishError;
use crate::http::HttpClient;
use crate::models::{MediaId, PostDraft, PostId};
use crate::utils::truncate_for_log;
use reqwest::RequestBuilder;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument};

const TRANSPORT: &str = "rest";

#[derive(Debug, Clone)]
pub struct RestTransport {
    http: HttpClient,
    api_base: String,
    username: String,
    app_password: String,
    image_timeout: Duration,
    request_timeout: Duration,
}

impl RestTransport {
    pub fn new(http: HttpClient, config: &WordPressConfig) -> Self {
        Self {
            http,
            api_base: format!("{}/wp-json/wp/v2", config.base()),
            username: config.username.clone(),
            // WordPress displays application passwords in space-separated groups.
            app_password: config.app_password.replace(' ', ""),
            image_timeout: Duration::from_secs(config.image_timeout_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, PublishError> {
        let http = |source| PublishError::Http {
            transport: TRANSPORT,
            source,
        };
        let response = request
            .basic_auth(&self.username, Some(&self.app_password))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(http)?;

        let status = response.status();
        let body = response.text().await.map_err(http)?;
        if !status.is_success() {
            return Err(PublishError::Status {
                transport: TRANSPORT,
                status,
                body: truncate_for_log(&body, 500),
            });
        }
        debug!(bytes = body.len(), "REST response");
        serde_json::from_str(&body).map_err(|e| PublishError::Malformed {
            transport: TRANSPORT,
            detail: e.to_string(),
        })
    }
}

/// JSON body for `POST /posts`.
pub fn post_payload(draft: &PostDraft, featured_media: Option<&MediaId>) -> Value {
    let mut payload = json!({
        "title": draft.title,
        "content": draft.body_html,
        "status": draft.status,
    });
    if let Some(media) = featured_media {
        payload["featured_media"] = match media.0.parse::<u64>() {
            Ok(id) => json!(id),
            Err(_) => json!(media.0),
        };
    }
    if !draft.tags.is_empty() {
        payload["tags_input"] = json!(draft.tags);
    }
    if let Some(category) = draft.category_id {
        payload["categories"] = json!([category]);
    }
    payload
}

/// The `id` field of a created resource, as a string.
pub fn response_id(response: &Value) -> Option<String> {
    match response.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn missing_id(what: &str) -> PublishError {
    PublishError::Malformed {
        transport: TRANSPORT,
        detail: format!("{what} response has no id"),
    }
}

impl Transport for RestTransport {
    fn name(&self) -> &'static str {
        TRANSPORT
    }

    #[instrument(level = "info", skip(self), fields(transport = TRANSPORT))]
    async fn upload_media(&self, image_url: &str) -> Result<MediaId, PublishError> {
        let file = MediaFile::fetch(&self.http, image_url, self.image_timeout).await?;
        let request = self
            .http
            .client()
            .post(format!("{}/media", self.api_base))
            .header(CONTENT_TYPE, file.mime)
            .header(
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.name),
            )
            .body(file.bytes);

        let response = self.send(request).await?;
        response_id(&response)
            .map(MediaId)
            .ok_or_else(|| missing_id("media"))
    }

    #[instrument(level = "info", skip_all, fields(transport = TRANSPORT, title = %draft.title))]
    async fn create_post(
        &self,
        draft: &PostDraft,
        featured_media: Option<&MediaId>,
    ) -> Result<PostId, PublishError> {
        let request = self
            .http
            .client()
            .post(format!("{}/posts", self.api_base))
            .json(&post_payload(draft, featured_media));

        let response = self.send(request).await?;
        response_id(&response)
            .map(PostId)
            .ok_or_else(|| missing_id("post"))
    }
}
