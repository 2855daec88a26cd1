#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use metersign_core::{HttpSend, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One request as seen by the mock transport.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub uri: String,
    pub headers: http::HeaderMap,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Canned-response transport recording every outbound request.
///
/// Clones share state, so keep one handle for assertions after moving
/// another into the `Context`.
#[derive(Debug, Clone, Default)]
pub struct MockHttpSend {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    queue: Mutex<VecDeque<(u16, String)>>,
    fallback: Mutex<Option<(u16, String)>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockHttpSend {
    /// Serve the given responses in order, then 404.
    pub fn with_responses(responses: &[(u16, &str)]) -> Self {
        let mock = Self::default();
        mock.inner
            .queue
            .lock()
            .unwrap()
            .extend(responses.iter().map(|(status, body)| (*status, body.to_string())));
        mock
    }

    /// Serve the same response for every request.
    pub fn always(status: u16, body: &str) -> Self {
        let mock = Self::default();
        *mock.inner.fallback.lock().unwrap() = Some((status, body.to_string()));
        mock
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpSend for MockHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let (parts, body) = req.into_parts();
        self.inner.requests.lock().unwrap().push(RecordedRequest {
            method: parts.method.to_string(),
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        });

        let next = self
            .inner
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.inner.fallback.lock().unwrap().clone());
        let (status, body) = next.unwrap_or((404, String::new()));

        Ok(http::Response::builder()
            .status(status)
            .body(Bytes::from(body))
            .expect("response must build"))
    }
}
