//! The physical HTTP exchange behind the pipeline.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, multipart, redirect};
use serde::Serialize;

use super::request::{self, Body, FormPart, Method};

/// Everything needed for a single dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub url: String,
    pub method: Method,
    /// `Name: value` lines, applied in order.
    pub headers: Vec<String>,
    pub body: Option<Body>,
    pub timeout: Duration,
    pub verify_tls: bool,
    pub follow_redirects: bool,
}

/// Diagnostics about the exchange. Passed through, never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransportInfo {
    pub url: String,
    pub content_type: Option<String>,
    pub total_time: f64,
    pub primary_ip: Option<String>,
    pub size_download: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub info: TransportInfo,
}

/// Connection, timeout, DNS or TLS failure.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportFailure {
    pub message: String,
    /// 0 when no response status was received.
    pub status: u16,
    pub info: TransportInfo,
}

impl TransportFailure {
    pub fn new(message: impl Into<String>, info: TransportInfo) -> Self {
        Self {
            message: message.into(),
            status: 0,
            info,
        }
    }
}

pub type TransportOutcome = Result<TransportResponse, TransportFailure>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes one dispatch. HTTP error statuses are responses, not failures.
    async fn execute(&self, request: TransportRequest) -> TransportOutcome;
}

/// `reqwest` transport. Builds a fresh client per dispatch so TLS and
/// redirect settings apply to that dispatch only.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    pub fn new() -> Self {
        Self
    }

    fn build_client(request: &TransportRequest) -> reqwest::Result<Client> {
        let policy = if request.follow_redirects {
            redirect::Policy::default()
        } else {
            redirect::Policy::none()
        };
        Client::builder()
            .danger_accept_invalid_certs(!request.verify_tls)
            .redirect(policy)
            .build()
    }

    async fn send(request: &TransportRequest, started: Instant) -> TransportOutcome {
        let failure = |message: String| {
            TransportFailure::new(
                message,
                TransportInfo {
                    url: request.url.clone(),
                    total_time: started.elapsed().as_secs_f64(),
                    ..TransportInfo::default()
                },
            )
        };

        let client = Self::build_client(request).map_err(|e| failure(e.to_string()))?;
        let headers = header_map(&request.headers).map_err(failure)?;

        let mut builder = client
            .request(request.method.into(), &request.url)
            .headers(headers)
            .timeout(request.timeout);

        builder = match &request.body {
            Some(Body::Multipart(parts)) => builder.multipart(multipart_form(parts)),
            Some(body) => builder.body(body.encoded().unwrap_or_default()),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| failure(describe(&e)))?;

        let status = response.status().as_u16();
        let mut info = TransportInfo {
            url: response.url().to_string(),
            content_type: response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            primary_ip: response.remote_addr().map(|addr| addr.ip().to_string()),
            ..TransportInfo::default()
        };

        match response.bytes().await {
            Ok(bytes) => {
                info.size_download = bytes.len() as u64;
                info.total_time = started.elapsed().as_secs_f64();
                Ok(TransportResponse {
                    status,
                    body: bytes.to_vec(),
                    info,
                })
            }
            Err(e) => {
                info.total_time = started.elapsed().as_secs_f64();
                Err(TransportFailure {
                    message: describe(&e),
                    status,
                    info,
                })
            }
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: TransportRequest) -> TransportOutcome {
        debug!("{} {}", request.method, request.url);
        let outcome = Self::send(&request, Instant::now()).await;
        if let Err(failure) = &outcome {
            debug!("{} {} failed: {}", request.method, request.url, failure.message);
        }
        outcome
    }
}

/// Converts header lines into a map. Later lines replace earlier ones with
/// the same name.
fn header_map(lines: &[String]) -> Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();
    for line in lines {
        let (name, value) = request::parse_header(line).map_err(|e| e.to_string())?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn multipart_form(parts: &[FormPart]) -> multipart::Form {
    parts
        .iter()
        .fold(multipart::Form::new(), |form, part| match part {
            FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
            FormPart::File {
                name,
                file_name,
                contents,
            } => form.part(
                name.clone(),
                multipart::Part::bytes(contents.clone()).file_name(file_name.clone()),
            ),
        })
}

/// Error text including the underlying cause (reqwest's top-level message
/// alone is often just "error sending request").
fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    if error.is_timeout() && !message.contains("timed out") {
        message.push_str(" (operation timed out)");
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn request(url: String) -> TransportRequest {
        TransportRequest {
            url,
            method: Method::Get,
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(5),
            verify_tls: true,
            follow_redirects: true,
        }
    }

    #[test]
    fn test_header_map_last_line_wins() {
        let lines = vec![
            "Accept: application/json".to_string(),
            "X-Trace: one".to_string(),
            "x-trace: two".to_string(),
        ];
        let headers = header_map(&lines).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["x-trace"], "two");
    }

    #[test]
    fn test_header_map_rejects_malformed_line() {
        let err = header_map(&["no-colon-here".to_string()]).unwrap_err();
        assert!(err.contains("Malformed header line"));
    }

    #[tokio::test]
    async fn test_execute_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pokemon/ditto")
            .match_header("x-test", "1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 132}"#)
            .create_async()
            .await;

        let mut req = request(format!("{}/pokemon/ditto", server.url()));
        req.headers.push("X-Test: 1".to_string());

        let response = ReqwestTransport::new().execute(req).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, br#"{"id": 132}"#);
        assert_eq!(response.info.content_type.as_deref(), Some("application/json"));
        assert_eq!(response.info.size_download, 11);
        assert!(response.info.url.ends_with("/pokemon/ditto"));
    }

    #[tokio::test]
    async fn test_execute_http_error_is_not_a_failure() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let response = ReqwestTransport::new()
            .execute(request(format!("{}/missing", server.url())))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_execute_sends_json_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/items")
            .match_body(Matcher::Json(json!({"name": "ditto"})))
            .with_status(201)
            .create_async()
            .await;

        let mut req = request(format!("{}/items", server.url()));
        req.method = Method::Post;
        req.body = Some(Body::Json(json!({"name": "ditto"})));

        let response = ReqwestTransport::new().execute(req).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn test_execute_sends_multipart_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/upload")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data; boundary=".to_string()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="file"; filename="a.txt""#.to_string()),
                Matcher::Regex("hello".to_string()),
                Matcher::Regex(r#"name="note""#.to_string()),
            ]))
            .with_status(200)
            .create_async()
            .await;

        let mut req = request(format!("{}/upload", server.url()));
        req.method = Method::Post;
        req.body = Some(Body::Multipart(vec![
            FormPart::Text {
                name: "note".to_string(),
                value: "hi".to_string(),
            },
            FormPart::File {
                name: "file".to_string(),
                file_name: "a.txt".to_string(),
                contents: b"hello".to_vec(),
            },
        ]));

        ReqwestTransport::new().execute(req).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_execute_connection_refused_is_a_failure() {
        // Port 1 is reserved and nothing listens on it.
        let failure = ReqwestTransport::new()
            .execute(request("http://127.0.0.1:1/".to_string()))
            .await
            .unwrap_err();

        assert_eq!(failure.status, 0);
        assert!(!failure.message.is_empty());
        assert_eq!(failure.info.url, "http://127.0.0.1:1/");
    }

    #[tokio::test]
    async fn test_execute_does_not_follow_redirects_when_disabled() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/old")
            .with_status(302)
            .with_header("location", "/new")
            .create_async()
            .await;

        let mut req = request(format!("{}/old", server.url()));
        req.follow_redirects = false;

        let response = ReqwestTransport::new().execute(req).await.unwrap();
        assert_eq!(response.status, 302);
    }
}
