//! Mock Transport
//!
//! For testing and offline demos. Replays canned responses keyed by URL
//! prefix and records every request it sees.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::Result;

/// Mock transport with canned responses
#[derive(Default)]
pub struct MockTransport {
    routes: Vec<(String, HttpResponse)>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests whose URL starts with `prefix`. First match wins.
    #[must_use]
    pub fn with_route(mut self, prefix: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        self.routes.push((prefix.into(), HttpResponse::new(status, body)));
        self
    }

    /// Requests received so far, in order
    pub async fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().await.push(request.clone());

        let response = self
            .routes
            .iter()
            .find(|(prefix, _)| request.url.starts_with(prefix.as_str()))
            .map_or_else(|| HttpResponse::new(404, "not found"), |(_, r)| r.clone());

        Ok(response)
    }

    fn name(&self) -> &str {
        "MockTransport"
    }
}
