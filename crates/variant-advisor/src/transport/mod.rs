//! Upstream Transport
//!
//! The HTTP seam every lookup adapter goes through. One attempt per request,
//! no retries.

mod http;
mod mock;

pub use http::ReqwestTransport;
pub use mock::MockTransport;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AdvisorError, Result};

/// HTTP method used by the adapters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// An outgoing upstream request
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON body (POST only)
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            ..Self::get(url)
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A received upstream response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// HTTP transport trait (Strategy pattern)
///
/// `ReqwestTransport` talks to the real services; `MockTransport` replays
/// canned responses in tests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform one request. Non-2xx statuses are returned, not raised.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;

    /// Transport name
    fn name(&self) -> &str;
}

/// Send a request and turn any non-2xx status into `AdvisorError::Transport`
pub async fn fetch(transport: &dyn HttpTransport, request: &HttpRequest) -> Result<HttpResponse> {
    tracing::debug!(
        transport = transport.name(),
        url = %request.url,
        method = ?request.method,
        "upstream request"
    );

    let response = transport.send(request).await?;
    if !response.is_success() {
        return Err(AdvisorError::Transport {
            status: response.status,
            url: request.url.clone(),
        });
    }
    Ok(response)
}
