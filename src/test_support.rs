//! In-process doubles for the network seams, shared by unit tests.

use crate::api::{AskAsync, Message};
use crate::error::{FetchError, GenerationError, PublishError};
use crate::http::Fetch;
use crate::models::{MediaId, PostDraft, PostId};
use crate::publish::Transport;
use reqwest::StatusCode;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Serves canned pages keyed by URL and counts requests.
#[derive(Default)]
pub struct FixtureFetch {
    pages: HashMap<String, String>,
    pub calls: Cell<usize>,
}

impl FixtureFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }
}

impl Fetch for FixtureFetch {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.calls.set(self.calls.get() + 1);
        self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: StatusCode::NOT_FOUND,
        })
    }

    async fn get_bytes(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, FetchError> {
        self.get_text(url).await.map(String::into_bytes)
    }
}

/// Answers every conversation with the same reply and records what it saw.
pub struct CannedAsk {
    reply: Option<String>,
    pub seen: RefCell<Vec<Message>>,
    pub calls: Cell<usize>,
}

impl CannedAsk {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            seen: RefCell::new(Vec::new()),
            calls: Cell::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            seen: RefCell::new(Vec::new()),
            calls: Cell::new(0),
        }
    }
}

impl AskAsync for CannedAsk {
    async fn ask(&self, messages: &[Message]) -> Result<String, GenerationError> {
        self.calls.set(self.calls.get() + 1);
        self.seen.borrow_mut().extend_from_slice(messages);
        self.reply.clone().ok_or(GenerationError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "scripted failure".to_string(),
        })
    }
}

/// Transport with scripted results that records every call.
pub struct ScriptedTransport {
    name: &'static str,
    media: Option<&'static str>,
    post: Option<&'static str>,
    pub calls: RefCell<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(name: &'static str, media: Option<&'static str>, post: Option<&'static str>) -> Self {
        Self {
            name,
            media,
            post,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn uploads(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with("upload"))
            .count()
    }

    fn scripted_failure(&self, what: &str) -> PublishError {
        PublishError::Malformed {
            transport: self.name,
            detail: format!("scripted {what} failure"),
        }
    }
}

impl Transport for ScriptedTransport {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn upload_media(&self, image_url: &str) -> Result<MediaId, PublishError> {
        self.calls.borrow_mut().push(format!("upload {image_url}"));
        self.media
            .map(|m| MediaId(m.to_string()))
            .ok_or_else(|| self.scripted_failure("media"))
    }

    async fn create_post(
        &self,
        draft: &PostDraft,
        featured_media: Option<&MediaId>,
    ) -> Result<PostId, PublishError> {
        let media = featured_media.map_or_else(|| "none".to_string(), |m| m.0.clone());
        self.calls
            .borrow_mut()
            .push(format!("create {} media={media}", draft.title));
        self.post
            .map(|p| PostId(p.to_string()))
            .ok_or_else(|| self.scripted_failure("post"))
    }
}

pub fn draft(title: &str) -> PostDraft {
    PostDraft {
        title: title.to_string(),
        body_html: "<p>Gövde</p>\n".to_string(),
        tags: vec!["a".to_string()],
        status: "publish".to_string(),
        category_id: None,
    }
}

/// A canned HTTP response served by [`StubServer`].
pub struct StubResponse {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl StubResponse {
    pub fn new(status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }
}

/// One request as received by [`StubServer`]; header names are lowercase.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Loopback HTTP/1.1 server that answers one connection per scripted
/// response, in order, and records what it was sent.
pub struct StubServer {
    pub base_url: String,
    handle: JoinHandle<Vec<CapturedRequest>>,
}

impl StubServer {
    pub async fn start(responses: Vec<StubResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut received = Vec::new();
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                received.push(read_request(&mut socket).await);
                let head = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    response.status,
                    response.content_type,
                    response.body.len()
                );
                socket.write_all(head.as_bytes()).await.unwrap();
                socket.write_all(&response.body).await.unwrap();
                let _ = socket.shutdown().await;
            }
            received
        });
        Self { base_url, handle }
    }

    /// Wait for every scripted response to be served and return the requests.
    pub async fn requests(self) -> Vec<CapturedRequest> {
        self.handle.await.unwrap()
    }
}

async fn read_request(socket: &mut TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before the request head ended");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = buf[header_end..].to_vec();
    while body.len() < length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before the body ended");
        body.extend_from_slice(&chunk[..n]);
    }

    CapturedRequest {
        method,
        path,
        headers,
        body,
    }
}

/// Backend settings pointing at a stub server.
pub fn wordpress_at(base_url: &str) -> crate::config::WordPressConfig {
    crate::config::WordPressConfig {
        base_url: format!("{base_url}/"),
        username: "editor".to_string(),
        password: "secret".to_string(),
        app_password: "abcd efgh".to_string(),
        ..Default::default()
    }
}
