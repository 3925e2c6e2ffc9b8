//! Request description as seen by interceptors and the dispatch step.

use std::fmt;
use std::str::FromStr;

use reqwest::header::{HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    /// Parses a method name in any letter case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One field of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        contents: Vec<u8>,
    },
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Sent verbatim.
    Text(String),
    /// Encoded with serde_json before sending.
    Json(Value),
    Multipart(Vec<FormPart>),
}

impl Body {
    /// Serializes any `Serialize` value into a JSON body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, Error> {
        serde_json::to_value(value).map(Body::Json).map_err(Error::Encode)
    }

    /// Wire form of text and JSON bodies. `None` for multipart.
    pub fn encoded(&self) -> Option<String> {
        match self {
            Body::Text(text) => Some(text.clone()),
            Body::Json(value) => Some(value.to_string()),
            Body::Multipart(_) => None,
        }
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

/// Everything a request interceptor may observe or replace.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestSpec {
    pub endpoint: String,
    pub method: Method,
    pub body: Option<Body>,
    pub headers: Vec<String>,
}

impl RequestSpec {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers.extend(headers.into_iter().map(Into::into));
        self
    }
}

/// True when `endpoint` is a full URL that should bypass the base URL.
pub fn is_absolute_url(endpoint: &str) -> bool {
    url::Url::parse(endpoint)
        .map(|url| url.has_host())
        .unwrap_or(false)
}

/// Resolves `endpoint` against `base_url` with exactly one `/` between them.
pub fn resolve_url(base_url: &str, endpoint: &str) -> String {
    if is_absolute_url(endpoint) {
        return endpoint.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Appends URL-encoded query parameters to `endpoint`.
pub fn append_query(endpoint: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return endpoint.to_string();
    }
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!("{}{}{}", endpoint, separator, query)
}

/// Name part of a `Name: value` header line.
pub fn header_name(line: &str) -> &str {
    line.split_once(':').map_or(line, |(name, _)| name).trim()
}

/// Parses a `Name: value` header line.
pub fn parse_header(line: &str) -> Result<(HeaderName, HeaderValue), Error> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| Error::InvalidHeader(format!("Malformed header line: {}", line)))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| {
        Error::InvalidHeader(format!("Invalid header name '{}': {}", name.trim(), e))
    })?;
    let value = HeaderValue::from_str(value.trim()).map_err(|e| {
        Error::InvalidHeader(format!("Invalid value for header '{}': {}", name, e))
    })?;
    Ok((name, value))
}

pub(crate) fn has_header(headers: &[String], name: &str) -> bool {
    headers
        .iter()
        .any(|line| header_name(line).eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_url_slash_combinations() {
        for base in ["http://x/", "http://x"] {
            for endpoint in ["/y", "y"] {
                assert_eq!(resolve_url(base, endpoint), "http://x/y");
            }
        }
    }

    #[test]
    fn test_resolve_url_collapses_repeated_slashes() {
        assert_eq!(resolve_url("http://x///", "///y/z"), "http://x/y/z");
    }

    #[test]
    fn test_resolve_url_absolute_endpoint_ignores_base() {
        assert_eq!(
            resolve_url("http://x", "https://other.example/api?q=1"),
            "https://other.example/api?q=1"
        );
    }

    #[test]
    fn test_is_absolute_url() {
        assert!(is_absolute_url("http://localhost:8080/a"));
        assert!(!is_absolute_url("/pokemon/ditto"));
        assert!(!is_absolute_url("pokemon/ditto"));
        assert!(!is_absolute_url("mailto:someone@example.com"));
    }

    #[test]
    fn test_append_query() {
        assert_eq!(append_query("/search", &[]), "/search");
        assert_eq!(
            append_query("/search", &[("q", "a b"), ("page", "2")]),
            "/search?q=a+b&page=2"
        );
        assert_eq!(append_query("/search?x=1", &[("y", "2")]), "/search?x=1&y=2");
    }

    #[test]
    fn test_parse_header() {
        let (name, value) = parse_header("X-Api-Key:  abc ").unwrap();
        assert_eq!(name, "x-api-key");
        assert_eq!(value, "abc");

        let err = parse_header("no-colon-here").unwrap_err();
        assert_eq!(err.to_string(), "Invalid header: Malformed header line: no-colon-here");
        assert!(matches!(parse_header("Bad Name: 1"), Err(Error::InvalidHeader(_))));
        assert!(matches!(parse_header("X-A: line\nbreak"), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_method_parsing_is_case_insensitive() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("Patch".parse::<Method>().unwrap(), Method::Patch);
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert!(matches!(
            "TRACE".parse::<Method>(),
            Err(Error::InvalidMethod(_))
        ));
    }

    #[test]
    fn test_body_encoding() {
        assert_eq!(Body::from("raw").encoded().as_deref(), Some("raw"));
        assert_eq!(
            Body::from(json!({"a": 1})).encoded().as_deref(),
            Some(r#"{"a":1}"#)
        );
        assert_eq!(Body::Multipart(Vec::new()).encoded(), None);
    }

    #[test]
    fn test_has_header_ignores_case() {
        let headers = vec!["content-type: text/plain".to_string()];
        assert!(has_header(&headers, "Content-Type"));
        assert!(!has_header(&headers, "Accept"));
    }
}
