//! In-memory transport for tests
//!
//! [`MockTransport`] answers requests from canned responses routed by
//! method and path (optionally path plus exact query) and records every
//! request it receives. Each request yields to the executor once before it
//! is answered, so concurrent callers interleave the way they would on a
//! real socket.

use crate::errors::{ExchangeError, Result};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, Method};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

#[derive(Debug, Clone)]
enum Canned {
    Reply { status: u16, body: String },
    Fail(String),
}

/// Canned-response transport
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Canned>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method route` with a JSON body. `route` is a path, or a path
    /// with the exact query string (`/market/depth?symbol=ethbtc`).
    pub fn on(&self, method: Method, route: &str, status: u16, body: Value) {
        self.push(method, route, Canned::Reply { status, body: body.to_string() });
    }

    /// Answer with a raw text body
    pub fn on_text(&self, method: Method, route: &str, status: u16, body: &str) {
        self.push(method, route, Canned::Reply { status, body: body.to_string() });
    }

    /// Fail with a transport error
    pub fn fail(&self, method: Method, route: &str, reason: &str) {
        self.push(method, route, Canned::Fail(reason.to_string()));
    }

    /// Drop every canned response for a route
    pub fn clear(&self, method: Method, route: &str) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.remove(&(method, route.to_string()));
        }
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of requests whose URL path equals `path`
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && split_url(&r.url).0 == path)
            .count()
    }

    /// Most recent request to `path`
    pub fn last_request(&self, method: Method, path: &str) -> Option<HttpRequest> {
        self.requests()
            .into_iter()
            .rev()
            .find(|r| r.method == method && split_url(&r.url).0 == path)
    }

    // Queued responses are served in order; the last one repeats.
    fn push(&self, method: Method, route: &str, canned: Canned) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.entry((method, route.to_string())).or_default().push_back(canned);
        }
    }

    fn answer(&self, method: Method, path: &str, query: &str) -> Option<Canned> {
        let mut routes = self.routes.lock().ok()?;
        let exact = (method, format!("{path}?{query}"));
        let key = if !query.is_empty() && routes.contains_key(&exact) {
            exact
        } else {
            (method, path.to_string())
        };
        let queue = routes.get_mut(&key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait(?Send)]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        yield_now().await;

        let (path, query) = split_url(&request.url);
        match self.answer(request.method, &path, &query) {
            Some(Canned::Reply { status, body }) => Ok(HttpResponse {
                status,
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body: body.into_bytes(),
            }),
            Some(Canned::Fail(reason)) => Err(ExchangeError::TransportFailure(reason)),
            None => Err(ExchangeError::TransportFailure(format!(
                "no canned response for {} {}",
                request.method, request.url
            ))),
        }
    }
}

fn split_url(url: &str) -> (String, String) {
    match url::Url::parse(url) {
        Ok(parsed) => (
            parsed.path().to_string(),
            parsed.query().unwrap_or_default().to_string(),
        ),
        Err(_) => (url.to_string(), String::new()),
    }
}

/// Returns `Pending` once, letting other joined futures run
pub fn yield_now() -> impl Future<Output = ()> {
    YieldNow(false)
}

struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn get(url: &str) -> HttpRequest {
        HttpRequest {
            method: Method::Get,
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[monoio::test]
    async fn test_routes_by_path_then_exact_query() {
        let mock = MockTransport::new();
        mock.on(Method::Get, "/depth", 200, json!({"any": true}));
        mock.on(Method::Get, "/depth?symbol=ethbtc", 200, json!({"exact": true}));

        let exact = mock.execute(get("https://x.test/depth?symbol=ethbtc")).await.unwrap();
        assert_eq!(exact.text(), r#"{"exact":true}"#);
        let any = mock.execute(get("https://x.test/depth?symbol=ltcbtc")).await.unwrap();
        assert_eq!(any.text(), r#"{"any":true}"#);
        assert_eq!(mock.count(Method::Get, "/depth"), 2);
    }

    #[monoio::test]
    async fn test_queued_responses_then_repeat_last() {
        let mock = MockTransport::new();
        mock.fail(Method::Get, "/ticker", "reset");
        mock.on(Method::Get, "/ticker", 200, json!([]));

        assert!(mock.execute(get("https://x.test/ticker")).await.is_err());
        assert!(mock.execute(get("https://x.test/ticker")).await.is_ok());
        assert!(mock.execute(get("https://x.test/ticker")).await.is_ok());
        assert!(mock.execute(get("https://x.test/other")).await.is_err());
    }
}
