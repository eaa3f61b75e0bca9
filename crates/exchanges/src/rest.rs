//! REST plumbing shared by every venue
//!
//! An adapter describes a call as an [`ApiRequest`] (method, path, query,
//! body). [`RestClient`] signs it when needed, sends it through the
//! [`HttpTransport`], and decodes the reply with one routine that maps
//! HTTP statuses and venue error payloads onto [`ExchangeError`].

use crate::auth::Signer;
use crate::errors::{ExchangeError, Result};
use crate::http::{HttpRequest, HttpTransport, Method};
use unifex_core::prelude::*;

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Inspects a decoded reply for a venue-specific error payload
pub type ErrorProbe = fn(status: u16, body: &Value) -> Option<ExchangeError>;

/// Request body layout
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Form(Vec<(String, String)>),
    Json(Value),
}

impl Body {
    /// Wire text of the body; the same bytes are signed and sent
    pub fn render(&self) -> Result<String> {
        match self {
            Body::Empty => Ok(String::new()),
            Body::Form(params) => Ok(encode_params(params)),
            Body::Json(value) => Ok(serde_json::to_string(value)?),
        }
    }

    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Body::Empty => None,
            Body::Form(_) => Some("application/x-www-form-urlencoded"),
            Body::Json(_) => Some("application/json"),
        }
    }
}

/// One venue call before signing
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Body,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: Body::Empty,
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Append a form-encoded body field
    pub fn form(mut self, key: &str, value: impl ToString) -> Self {
        let field = (key.to_string(), value.to_string());
        match &mut self.body {
            Body::Form(params) => params.push(field),
            _ => self.body = Body::Form(vec![field]),
        }
        self
    }

    pub fn json(mut self, value: Value) -> Self {
        self.body = Body::Json(value);
        self
    }

    pub fn header(mut self, key: &str, value: impl ToString) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// `path?query` as sent on the wire
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, encode_params(&self.query))
        }
    }

    /// The parameter list a venue signs: the form body when there is one,
    /// otherwise the query
    pub fn params(&self) -> &[(String, String)] {
        match &self.body {
            Body::Form(params) => params,
            _ => &self.query,
        }
    }

    /// Mutable parameter list. Write requests without a body get an empty
    /// form body.
    pub fn params_mut(&mut self) -> &mut Vec<(String, String)> {
        let wants_form = matches!(self.body, Body::Empty)
            && matches!(self.method, Method::Post | Method::Put);
        if wants_form {
            self.body = Body::Form(Vec::new());
        }
        match &mut self.body {
            Body::Form(params) => params,
            _ => &mut self.query,
        }
    }

    fn operation(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// `k=v&k=v` with both sides percent-encoded, order preserved
pub fn encode_params(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Venue-bound HTTP client with signing and reply decoding
pub struct RestClient {
    venue: &'static str,
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
    signer: Signer,
    probe: ErrorProbe,
    enable_timing: bool,
}

impl RestClient {
    pub fn new(
        venue: &'static str,
        base_url: &str,
        transport: Arc<dyn HttpTransport>,
        signer: Signer,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.host_str().is_none() {
            return Err(ExchangeError::InvalidUrl(format!("no host in {base_url}")));
        }

        Ok(Self {
            venue,
            base_url,
            transport,
            signer,
            probe: |_, _| None,
            enable_timing: true,
        })
    }

    pub fn with_error_probe(mut self, probe: ErrorProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_timing(mut self, enable: bool) -> Self {
        self.enable_timing = enable;
        self
    }

    pub fn venue(&self) -> &'static str {
        self.venue
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn host(&self) -> String {
        self.base_url.host_str().unwrap_or_default().to_string()
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Unsigned GET; raw body of a 2xx reply
    pub async fn public_get(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<u8>> {
        let request = Self::get_request(path, query);
        let operation = request.operation();
        let response = self.execute(request).await.map_err(|e| e.context(self.venue, &operation))?;
        if !(200..300).contains(&response.0) {
            let text = String::from_utf8_lossy(&response.1).into_owned();
            return Err(status_error(response.0, text).context(self.venue, operation));
        }
        Ok(response.1)
    }

    /// Unsigned GET decoded as JSON
    pub async fn public_get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.send(Self::get_request(path, query)).await
    }

    /// Unsigned request of any shape decoded as JSON
    pub async fn send(&self, request: ApiRequest) -> Result<Value> {
        let operation = request.operation();
        self.execute(request)
            .await
            .and_then(|(status, body)| self.decode(status, &body))
            .map_err(|e| e.context(self.venue, operation))
    }

    /// Signed call; raw body of a 2xx reply without a venue error payload
    pub async fn private_call(&self, request: ApiRequest) -> Result<Vec<u8>> {
        let operation = request.operation();
        let result = async {
            let signed = self.signer.sign(request)?;
            let (status, body) = self.execute(signed).await?;
            self.decode(status, &body)?;
            Ok::<_, ExchangeError>(body)
        };
        result.await.map_err(|e| e.context(self.venue, operation))
    }

    /// Signed call decoded as JSON
    pub async fn private_call_json(&self, request: ApiRequest) -> Result<Value> {
        let operation = request.operation();
        let result = async {
            let signed = self.signer.sign(request)?;
            let (status, body) = self.execute(signed).await?;
            self.decode(status, &body)
        };
        result.await.map_err(|e| e.context(self.venue, operation))
    }

    fn get_request(path: &str, query: &[(&str, &str)]) -> ApiRequest {
        query
            .iter()
            .fold(ApiRequest::get(path), |request, (k, v)| request.query(k, v))
    }

    async fn execute(&self, request: ApiRequest) -> Result<(u16, Vec<u8>)> {
        let timer = PerfTimer::start(format!("{}_{}_{}", self.venue, request.method, request.path));

        let mut url = self.base_url.clone();
        url.set_path(&request.path);
        if !request.query.is_empty() {
            url.set_query(Some(&encode_params(&request.query)));
        }

        let mut headers = request.headers;
        if let Some(content_type) = request.body.content_type() {
            headers.push(("Content-Type".to_string(), content_type.to_string()));
        }
        let body = match request.body {
            Body::Empty => None,
            other => Some(other.render()?),
        };

        debug!("📡 {} {}", request.method, url);
        let response = self
            .transport
            .execute(HttpRequest {
                method: request.method,
                url: url.to_string(),
                headers,
                body,
            })
            .await?;

        if self.enable_timing {
            timer.log_elapsed();
        }
        debug!("Response: HTTP {} ({} bytes)", response.status, response.body.len());

        Ok((response.status, response.body))
    }

    fn decode(&self, status: u16, body: &[u8]) -> Result<Value> {
        let success = (200..300).contains(&status);
        let text = String::from_utf8_lossy(body);

        if text.trim().is_empty() {
            return if success {
                Ok(Value::Null)
            } else {
                Err(status_error(status, String::new()))
            };
        }

        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) if !success => return Err(status_error(status, snippet(&text))),
            Err(e) => return Err(ExchangeError::DecodeFailure(format!("{e}: {}", snippet(&text)))),
        };

        if let Some(err) = (self.probe)(status, &value) {
            return Err(err);
        }
        if !success {
            return Err(status_error(status, snippet(&text)));
        }
        Ok(value)
    }
}

fn status_error(status: u16, text: String) -> ExchangeError {
    match status {
        401 | 403 => ExchangeError::AuthFailure(format!("HTTP {status}: {text}")),
        _ => ExchangeError::venue(status.to_string(), text),
    }
}

fn snippet(text: &str) -> String {
    const LIMIT: usize = 256;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
