//! WordPress XML-RPC transport and the minimal XML-RPC codec it needs.
//!
//! Requests are built as strings with `quick_xml::escape`; responses are read
//! with a `quick_xml::Reader`, flattened into a token list, and parsed by a
//! small recursive-descent parser into [`Value`]s.

use super::{MediaFile, Transport};
use crate::config::WordPressConfig;
use crate::error::PublishError;
use crate::http::HttpClient;
use crate::models::{MediaId, PostDraft, PostId};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use quick_xml::Reader;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::Event;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, instrument};

const TRANSPORT: &str = "xmlrpc";

/// An XML-RPC value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Double(f64),
    String(String),
    Base64(Vec<u8>),
    DateTime(String),
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
    Nil,
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Look up a struct member by name.
    pub fn member(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Render an integer or string value as an identifier.
    pub fn as_id(&self) -> Option<String> {
        match self {
            Value::Int(i) => Some(i.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    fn write(&self, out: &mut String) {
        out.push_str("<value>");
        match self {
            Value::Int(i) => out.push_str(&format!("<int>{i}</int>")),
            Value::Bool(b) => out.push_str(&format!("<boolean>{}</boolean>", u8::from(*b))),
            Value::Double(d) => out.push_str(&format!("<double>{d}</double>")),
            Value::String(s) => out.push_str(&format!("<string>{}</string>", escape(s.as_str()))),
            Value::Base64(bytes) => {
                out.push_str(&format!("<base64>{}</base64>", STANDARD.encode(bytes)))
            }
            Value::DateTime(s) => out.push_str(&format!(
                "<dateTime.iso8601>{}</dateTime.iso8601>",
                escape(s.as_str())
            )),
            Value::Array(items) => {
                out.push_str("<array><data>");
                for item in items {
                    item.write(out);
                }
                out.push_str("</data></array>");
            }
            Value::Struct(members) => {
                out.push_str("<struct>");
                for (name, value) in members {
                    out.push_str(&format!("<member><name>{}</name>", escape(name.as_str())));
                    value.write(out);
                    out.push_str("</member>");
                }
                out.push_str("</struct>");
            }
            Value::Nil => out.push_str("<nil/>"),
        }
        out.push_str("</value>");
    }
}

/// Serialize a `methodCall` document.
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from(r#"<?xml version="1.0"?><methodCall><methodName>"#);
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        param.write(&mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

/// Parse a `methodResponse` document; faults become [`PublishError::Fault`].
pub fn decode_response(xml: &str) -> Result<Value, PublishError> {
    let tokens = tokenize(xml).map_err(malformed)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.skip_ws();
    parser.open("methodResponse")?;
    parser.skip_ws();

    if parser.peek_open("fault") {
        parser.open("fault")?;
        let fault = parser.value()?;
        let code = match fault.member("faultCode") {
            Some(Value::Int(code)) => *code,
            Some(Value::String(code)) => code.trim().parse().unwrap_or_default(),
            _ => 0,
        };
        let message = match fault.member("faultString") {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        return Err(PublishError::Fault { code, message });
    }

    parser.open("params")?;
    parser.skip_ws();
    parser.open("param")?;
    let value = parser.value()?;
    parser.skip_ws();
    parser.close("param")?;
    Ok(value)
}

fn malformed(detail: impl Into<String>) -> PublishError {
    PublishError::Malformed {
        transport: TRANSPORT,
        detail: detail.into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open(String),
    Close(String),
    Empty(String),
    Text(String),
}

fn tokenize(xml: &str) -> Result<Vec<Token>, String> {
    let mut reader = Reader::from_str(xml);
    let mut tokens = Vec::new();
    let mut text = String::new();

    fn flush(text: &mut String, tokens: &mut Vec<Token>) {
        if !text.is_empty() {
            tokens.push(Token::Text(std::mem::take(text)));
        }
    }
    let name = |raw: &[u8]| String::from_utf8_lossy(raw).into_owned();

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => {
                flush(&mut text, &mut tokens);
                tokens.push(Token::Open(name(e.local_name().as_ref())));
            }
            Event::End(e) => {
                flush(&mut text, &mut tokens);
                tokens.push(Token::Close(name(e.local_name().as_ref())));
            }
            Event::Empty(e) => {
                flush(&mut text, &mut tokens);
                tokens.push(Token::Empty(name(e.local_name().as_ref())));
            }
            Event::Text(t) => {
                let raw = String::from_utf8_lossy(&t);
                text.push_str(&unescape(&raw).map_err(|e| e.to_string())?);
            }
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::GeneralRef(r) => {
                let entity = format!("&{};", String::from_utf8_lossy(&r));
                text.push_str(&unescape(&entity).map_err(|e| e.to_string())?);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    flush(&mut text, &mut tokens);
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(Token::Text(t)) if t.trim().is_empty()) {
            self.pos += 1;
        }
    }

    fn peek_open(&self, tag: &str) -> bool {
        matches!(self.peek(), Some(Token::Open(n)) if n == tag)
    }

    fn peek_close(&self, tag: &str) -> bool {
        matches!(self.peek(), Some(Token::Close(n)) if n == tag)
    }

    fn open(&mut self, tag: &str) -> Result<(), PublishError> {
        match self.next() {
            Some(Token::Open(n)) if n == tag => Ok(()),
            other => Err(malformed(format!("expected <{tag}>, found {other:?}"))),
        }
    }

    fn close(&mut self, tag: &str) -> Result<(), PublishError> {
        match self.next() {
            Some(Token::Close(n)) if n == tag => Ok(()),
            other => Err(malformed(format!("expected </{tag}>, found {other:?}"))),
        }
    }

    /// Text content up to and including `</tag>`.
    fn text(&mut self, tag: &str) -> Result<String, PublishError> {
        let mut text = String::new();
        while let Some(Token::Text(t)) = self.peek() {
            text.push_str(t);
            self.pos += 1;
        }
        self.close(tag)?;
        Ok(text)
    }

    fn value(&mut self) -> Result<Value, PublishError> {
        self.skip_ws();
        if matches!(self.peek(), Some(Token::Empty(n)) if n == "value") {
            self.pos += 1;
            return Ok(Value::String(String::new()));
        }
        self.open("value")?;

        // Untyped content is a string.
        if let Some(Token::Text(t)) = self.peek() {
            if matches!(self.tokens.get(self.pos + 1), Some(Token::Close(n)) if n == "value") {
                let s = t.clone();
                self.pos += 2;
                return Ok(Value::String(s));
            }
        }
        self.skip_ws();
        if self.peek_close("value") {
            self.pos += 1;
            return Ok(Value::String(String::new()));
        }

        let value = match self.next() {
            Some(Token::Empty(ty)) => match ty.as_str() {
                "nil" => Value::Nil,
                "array" => Value::Array(Vec::new()),
                "struct" => Value::Struct(Vec::new()),
                _ => Value::String(String::new()),
            },
            Some(Token::Open(ty)) => self.typed(&ty)?,
            other => return Err(malformed(format!("unexpected {other:?} in <value>"))),
        };
        self.skip_ws();
        self.close("value")?;
        Ok(value)
    }

    fn typed(&mut self, ty: &str) -> Result<Value, PublishError> {
        let bad = |raw: &str| malformed(format!("invalid <{ty}> content {raw:?}"));
        Ok(match ty {
            "int" | "i4" | "i8" => {
                let raw = self.text(ty)?;
                Value::Int(raw.trim().parse().map_err(|_| bad(&raw))?)
            }
            "boolean" => {
                let raw = self.text(ty)?;
                Value::Bool(raw.trim() == "1")
            }
            "double" => {
                let raw = self.text(ty)?;
                Value::Double(raw.trim().parse().map_err(|_| bad(&raw))?)
            }
            "string" => Value::String(self.text(ty)?),
            "dateTime.iso8601" => Value::DateTime(self.text(ty)?.trim().to_string()),
            "base64" => {
                let raw: String = self.text(ty)?.split_whitespace().collect();
                Value::Base64(STANDARD.decode(&raw).map_err(|_| bad(&raw))?)
            }
            "nil" => {
                self.close("nil")?;
                Value::Nil
            }
            "array" => Value::Array(self.array()?),
            "struct" => Value::Struct(self.members()?),
            other => return Err(malformed(format!("unknown type <{other}>"))),
        })
    }

    fn array(&mut self) -> Result<Vec<Value>, PublishError> {
        self.skip_ws();
        let mut items = Vec::new();
        match self.next() {
            Some(Token::Empty(n)) if n == "data" => {}
            Some(Token::Open(n)) if n == "data" => loop {
                self.skip_ws();
                if self.peek_close("data") {
                    self.pos += 1;
                    break;
                }
                items.push(self.value()?);
            },
            other => return Err(malformed(format!("expected <data>, found {other:?}"))),
        }
        self.skip_ws();
        self.close("array")?;
        Ok(items)
    }

    fn members(&mut self) -> Result<Vec<(String, Value)>, PublishError> {
        let mut members = Vec::new();
        loop {
            self.skip_ws();
            if self.peek_close("struct") {
                self.pos += 1;
                return Ok(members);
            }
            self.open("member")?;
            self.skip_ws();
            self.open("name")?;
            let name = self.text("name")?;
            let value = self.value()?;
            self.skip_ws();
            self.close("member")?;
            members.push((name, value));
        }
    }
}

/// Publishes through `<base>/xmlrpc.php`.
#[derive(Debug, Clone)]
pub struct XmlRpcTransport {
    http: HttpClient,
    endpoint: String,
    username: String,
    password: String,
    image_timeout: Duration,
    request_timeout: Duration,
}

impl XmlRpcTransport {
    pub fn new(http: HttpClient, config: &WordPressConfig) -> Self {
        Self {
            http,
            endpoint: format!("{}/xmlrpc.php", config.base()),
            username: config.username.clone(),
            password: config.password.clone(),
            image_timeout: Duration::from_secs(config.image_timeout_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Blog id, username and password lead every `wp.*` call.
    fn auth_params(&self) -> [Value; 3] {
        [
            Value::Int(0),
            Value::string(&self.username),
            Value::string(&self.password),
        ]
    }

    #[instrument(level = "debug", skip(self, params))]
    async fn call(&self, method: &str, params: &[Value]) -> Result<Value, PublishError> {
        let http = |source| PublishError::Http {
            transport: TRANSPORT,
            source,
        };
        let response = self
            .http
            .client()
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .timeout(self.request_timeout)
            .body(encode_call(method, params))
            .send()
            .await
            .map_err(http)?;

        let status = response.status();
        let body = response.text().await.map_err(http)?;
        if !status.is_success() {
            return Err(PublishError::Status {
                transport: TRANSPORT,
                status,
                body,
            });
        }
        debug!(bytes = body.len(), "XML-RPC response");
        decode_response(&body)
    }
}

/// `wp.newPost` content struct for a draft.
pub fn post_content(draft: &PostDraft, featured_media: Option<&MediaId>) -> Value {
    let mut members = vec![
        ("post_title".to_string(), Value::string(&draft.title)),
        ("post_content".to_string(), Value::string(&draft.body_html)),
        ("post_status".to_string(), Value::string(&draft.status)),
    ];
    if !draft.tags.is_empty() {
        let tags = draft.tags.iter().map(Value::string).collect();
        members.push((
            "terms_names".to_string(),
            Value::Struct(vec![("post_tag".to_string(), Value::Array(tags))]),
        ));
    }
    if let Some(category) = draft.category_id {
        members.push((
            "terms".to_string(),
            Value::Struct(vec![(
                "category".to_string(),
                Value::Array(vec![Value::Int(category as i64)]),
            )]),
        ));
    }
    if let Some(media) = featured_media {
        let thumbnail = media
            .0
            .parse::<i64>()
            .map(Value::Int)
            .unwrap_or_else(|_| Value::string(&media.0));
        members.push(("post_thumbnail".to_string(), thumbnail));
    }
    Value::Struct(members)
}

impl Transport for XmlRpcTransport {
    fn name(&self) -> &'static str {
        TRANSPORT
    }

    #[instrument(level = "info", skip(self), fields(transport = TRANSPORT))]
    async fn upload_media(&self, image_url: &str) -> Result<MediaId, PublishError> {
        let file = MediaFile::fetch(&self.http, image_url, self.image_timeout).await?;
        let data = Value::Struct(vec![
            ("name".to_string(), Value::string(&file.name)),
            ("type".to_string(), Value::string(file.mime)),
            ("bits".to_string(), Value::Base64(file.bytes)),
            ("overwrite".to_string(), Value::Bool(false)),
        ]);
        let mut params = self.auth_params().to_vec();
        params.push(data);

        let response = self.call("wp.uploadFile", &params).await?;
        response
            .member("id")
            .or_else(|| response.member("attachment_id"))
            .and_then(Value::as_id)
            .map(MediaId)
            .ok_or_else(|| malformed("wp.uploadFile response has no id"))
    }

    #[instrument(level = "info", skip_all, fields(transport = TRANSPORT, title = %draft.title))]
    async fn create_post(
        &self,
        draft: &PostDraft,
        featured_media: Option<&MediaId>,
    ) -> Result<PostId, PublishError> {
        let mut params = self.auth_params().to_vec();
        params.push(post_content(draft, featured_media));

        self.call("wp.newPost", &params)
            .await?
            .as_id()
            .map(PostId)
            .ok_or_else(|| malformed("wp.newPost returned no post id"))
    }
}
