//! Streaming request transport.
//!
//! The controller only needs "open a request" and "read the next chunk"; the
//! HTTP implementation is one [`Transport`], tests provide scripted ones.

use reqwest::Url;
use std::future::Future;
use std::time::Duration;

use crate::state::TraceRequest;
use crate::trace::error::{ReadError, TransportError};

/// Source of raw body chunks
pub trait ChunkSource: Send + 'static {
    /// Next chunk, `Ok(None)` at end of stream
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, ReadError>> + Send;

    /// Get a fresh reader after a transient read error
    fn reacquire(&mut self) {}
}

/// Result of opening a request
#[derive(Debug)]
pub enum Opened<B> {
    /// Success status, body ready to stream
    Stream(B),
    /// Non-success status with its body read as text
    Rejected {
        status: u16,
        reason: String,
        body: String,
    },
}

/// Something that can issue a streaming diagnostic request
pub trait Transport: Send + Sync + 'static {
    type Body: ChunkSource;

    fn open(
        &self,
        request: &TraceRequest,
    ) -> impl Future<Output = Result<Opened<Self::Body>, TransportError>> + Send;
}

/// Build `<server>/<action>?target=..[&aftype=..]`
pub fn request_url(server: &str, request: &TraceRequest) -> Result<Url, TransportError> {
    let base = format!("{}/{}", server.trim_end_matches('/'), request.action.path());
    let mut params = vec![("target", request.target.as_str())];
    if let Some(ref aftype) = request.aftype {
        params.push(("aftype", aftype.as_str()));
    }
    Url::parse_with_params(&base, &params)
        .map_err(|e| TransportError::Connect(format!("invalid server URL {}: {}", server, e)))
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    server: String,
}

impl HttpTransport {
    pub fn new(server: impl Into<String>, connect_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("webtrace/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            server: server.into(),
        })
    }
}

impl Transport for HttpTransport {
    type Body = HttpBody;

    async fn open(&self, request: &TraceRequest) -> Result<Opened<HttpBody>, TransportError> {
        let url = request_url(&self.server, request)?;
        tracing::debug!(%url, "opening stream");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Connect(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or_default().to_string();
            let body = rejection_body(response.text().await);
            return Ok(Opened::Rejected {
                status: status.as_u16(),
                reason,
                body,
            });
        }

        Ok(Opened::Stream(HttpBody { response }))
    }
}

/// Text shown for a rejected request. An unreadable body is replaced by its
/// read error so the status line never stands alone.
fn rejection_body<E: std::fmt::Display>(text: Result<String, E>) -> String {
    text.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to read rejected response body");
        format!("response body unreadable: {}", e)
    })
}

/// Body of a successful response
#[derive(Debug)]
pub struct HttpBody {
    response: reqwest::Response,
}

impl ChunkSource for HttpBody {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ReadError> {
        self.response
            .chunk()
            .await
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .map_err(|e| ReadError::Fatal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Action;

    #[test]
    fn test_request_url_encodes_target() {
        let req = TraceRequest::new(Action::Mtr, "host name&x=1");
        let url = request_url("http://localhost:5000/", &req).unwrap();
        assert_eq!(url.path(), "/mtr");
        assert_eq!(url.query(), Some("target=host+name%26x%3D1"));
    }

    #[test]
    fn test_request_url_with_aftype() {
        let req = TraceRequest::new(Action::Trace, "example.com").with_aftype(Some("6".into()));
        let url = request_url("http://localhost:5000/webtrace", &req).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/webtrace/trace?target=example.com&aftype=6");
    }

    #[test]
    fn test_request_url_rejects_bad_server() {
        let req = TraceRequest::new(Action::Trace, "example.com");
        assert!(matches!(
            request_url("not a url", &req),
            Err(TransportError::Connect(_))
        ));
    }

    #[test]
    fn test_rejection_body_keeps_text() {
        let text: Result<String, String> = Ok("ERROR: No traceroute target specified".into());
        assert_eq!(rejection_body(text), "ERROR: No traceroute target specified");
    }

    #[test]
    fn test_rejection_body_reports_read_failure() {
        let text: Result<String, String> = Err("connection reset".into());
        assert_eq!(rejection_body(text), "response body unreadable: connection reset");
    }
}
