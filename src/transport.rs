//! HTTP transport used by the job client and the artifact fetcher
//!
//! The client only needs two request shapes (JSON POST, plain GET) and a fully buffered
//! response, so the seam is a single `send` call. [`ReqwestTransport`] is the production
//! implementation; tests substitute scripted transports to inject connection failures.

use crate::config::HttpConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;

/// HTTP method used by the client
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// GET (status checks, artifact downloads)
    Get,
    /// POST with a JSON body (job creation)
    Post,
}

/// An outbound request
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// Request method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Header name/value pairs
    pub headers: Vec<(String, String)>,
    /// JSON body, sent with `Content-Type: application/json`
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    /// A GET request without headers
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// A POST request carrying a JSON body
    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A fully buffered response
#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Header name/value pairs (names lowercased)
    pub headers: Vec<(String, String)>,
    /// Raw body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Build a response with a JSON body
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string().into_bytes(),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as (lossy) UTF-8 text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON
    pub fn json_body(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Sends requests for the job client
///
/// Implementations must report connection-level failures (refused, reset, timed out) as
/// [`Error::Connection`] so the submission retry policy can recognise them. Non-2xx
/// responses are NOT errors at this layer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and buffer the whole response
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`Transport`] backed by `reqwest`
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport from HTTP settings
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_send_error(&url, e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_send_error(&url, e))?
            .to_vec();

        tracing::trace!(url = %url, status, size = body.len(), "HTTP response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify_send_error(url: &str, e: reqwest::Error) -> Error {
    if e.is_connect() {
        Error::Connection(format!("connection failed for '{}': {}", url, e))
    } else if e.is_timeout() {
        Error::Connection(format!("request to '{}' timed out: {}", url, e))
    } else {
        Error::Network(e)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::IsRetryable;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn post_sends_json_and_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/predictions"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(serde_json::json!({"input": {"prompt": "a cat"}})))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "p1"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::new(&HttpConfig::default()).unwrap();
        let response = transport
            .send(
                HttpRequest::post_json(
                    format!("{}/v1/predictions", mock_server.uri()),
                    serde_json::json!({"input": {"prompt": "a cat"}}),
                )
                .header("Authorization", "Bearer tok"),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 201);
        assert!(response.is_success());
        assert_eq!(response.json_body().unwrap()["id"], "p1");
        assert_eq!(response.header("Content-Type"), Some("application/json"));
    }

    #[tokio::test]
    async fn non_success_status_is_not_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::new(&HttpConfig::default()).unwrap();
        let response = transport
            .send(HttpRequest::get(mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        assert!(!response.is_success());
        assert_eq!(response.text(), "overloaded");
    }

    #[tokio::test]
    async fn refused_connection_is_retryable_connection_error() {
        // Bind then drop to get a port with nothing listening
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let transport = ReqwestTransport::new(&HttpConfig::default()).unwrap();
        let err = transport
            .send(HttpRequest::get(format!("http://127.0.0.1:{}/", port)))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Connection(_)), "got {err:?}");
        assert!(err.is_retryable());
    }
}
