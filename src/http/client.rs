//! Request pipeline: interceptors, dispatch, retry and response shaping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::envelope::{Response, ResponseEnvelope};
use super::interceptor::{RequestInterceptor, ResponseInterceptor};
use super::request::{self, Body, Method, RequestSpec};
use super::transport::{ReqwestTransport, Transport, TransportRequest};
use crate::config::{ClientConfig, ResponseMode};
use crate::error::{Error, Result};

/// Output shape chosen from the response mode snapshot taken at call start.
enum Shape {
    Envelope,
    Json,
}

/// HTTP client with interceptors, retry and response normalization.
pub struct Client<T: Transport = ReqwestTransport> {
    config: ClientConfig,
    transport: Arc<T>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: Arc::clone(&self.transport),
            request_interceptors: self.request_interceptors.clone(),
            response_interceptors: self.response_interceptors.clone(),
        }
    }
}

impl Client<ReqwestTransport> {
    /// Creates a client for `base_url` using the reqwest transport.
    pub fn new(base_url: &str) -> Self {
        Self::with_transport(ClientConfig::new(base_url, Vec::new()), ReqwestTransport::new())
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn response_mode(&self) -> ResponseMode {
        self.config.response_mode
    }

    /// Sets the per-dispatch timeout. Zero is raised to one second.
    pub fn set_timeout(&mut self, seconds: u64) -> &mut Self {
        self.config.timeout = Duration::from_secs(seconds.max(1));
        self
    }

    /// Allows up to `max_retries` extra dispatches after a transport failure,
    /// waiting `delay_ms` between them.
    pub fn set_retry(&mut self, max_retries: u32, delay_ms: u64) -> &mut Self {
        self.config.max_retries = max_retries;
        self.config.retry_delay = Duration::from_millis(delay_ms);
        self
    }

    pub fn set_response_mode(&mut self, mode: ResponseMode) -> &mut Self {
        self.config.response_mode = mode;
        self
    }

    /// Sets the response mode by name (`array`, `object`, `json`, `raw`).
    pub fn set_response_type(&mut self, name: &str) -> Result<&mut Self> {
        let mode = name.parse()?;
        Ok(self.set_response_mode(mode))
    }

    pub fn as_array(&mut self) -> &mut Self {
        self.set_response_mode(ResponseMode::Array)
    }

    pub fn as_object(&mut self) -> &mut Self {
        self.set_response_mode(ResponseMode::Object)
    }

    pub fn as_json(&mut self) -> &mut Self {
        self.set_response_mode(ResponseMode::Json)
    }

    pub fn as_raw(&mut self) -> &mut Self {
        self.set_response_mode(ResponseMode::Raw)
    }

    pub fn set_verify_tls(&mut self, verify: bool) -> &mut Self {
        self.config.verify_tls = verify;
        self
    }

    pub fn set_follow_redirects(&mut self, follow: bool) -> &mut Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Adds a header line sent with every request, after the existing defaults.
    pub fn with_default_header(&mut self, line: impl Into<String>) -> &mut Self {
        self.config.push_default_header(line.into());
        self
    }

    pub fn add_request_interceptor<I>(&mut self, interceptor: I) -> &mut Self
    where
        I: RequestInterceptor + 'static,
    {
        self.request_interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn add_response_interceptor<I>(&mut self, interceptor: I) -> &mut Self
    where
        I: ResponseInterceptor + 'static,
    {
        self.response_interceptors.push(Arc::new(interceptor));
        self
    }

    /// GET with optional query parameters.
    pub async fn get(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        headers: &[&str],
    ) -> Result<Response> {
        let endpoint = request::append_query(endpoint, params);
        self.request(RequestSpec::new(Method::Get, endpoint).with_headers(headers.iter().copied()))
            .await
    }

    pub async fn post(&self, endpoint: &str, body: Option<Body>, headers: &[&str]) -> Result<Response> {
        self.request(spec(Method::Post, endpoint, body, headers)).await
    }

    pub async fn put(&self, endpoint: &str, body: Option<Body>, headers: &[&str]) -> Result<Response> {
        self.request(spec(Method::Put, endpoint, body, headers)).await
    }

    pub async fn patch(&self, endpoint: &str, body: Option<Body>, headers: &[&str]) -> Result<Response> {
        self.request(spec(Method::Patch, endpoint, body, headers)).await
    }

    pub async fn delete(&self, endpoint: &str, headers: &[&str]) -> Result<Response> {
        self.request(spec(Method::Delete, endpoint, None, headers)).await
    }

    /// Executes one logical request in the client's current response mode.
    pub async fn request(&self, spec: RequestSpec) -> Result<Response> {
        self.request_with_mode(spec, self.config.response_mode).await
    }

    /// Executes one logical request, shaped by `mode` for its whole duration.
    ///
    /// In `Raw` mode the request is dispatched once and a transport failure is
    /// returned as [`Error::Transport`]. In the other modes transport failures
    /// are retried up to `max_retries` times and end up in the error envelope.
    /// HTTP error statuses are responses and are never retried.
    #[tracing::instrument(skip(self, spec), fields(method = %spec.method, endpoint = %spec.endpoint))]
    pub async fn request_with_mode(&self, spec: RequestSpec, mode: ResponseMode) -> Result<Response> {
        let shape = match mode {
            ResponseMode::Raw => return self.fetch_raw(spec).await.map(Response::Raw),
            ResponseMode::Array | ResponseMode::Object => Shape::Envelope,
            ResponseMode::Json => Shape::Json,
        };

        let envelope = self.fetch_envelope(spec).await?;

        match shape {
            Shape::Envelope => Ok(Response::Envelope(envelope)),
            Shape::Json => envelope.to_json().map(Response::Json),
        }
    }

    /// Runs the enveloped flow: interceptors, dispatch with retries, response
    /// interceptors.
    pub async fn fetch_envelope(&self, spec: RequestSpec) -> Result<ResponseEnvelope> {
        let spec = self.apply_request_interceptors(spec)?;
        let request = self.transport_request(spec)?;

        let max_retries = self.config.max_retries;
        let mut retries = 0;
        let envelope = loop {
            let envelope = self.dispatch(&request).await;
            if envelope.success || retries >= max_retries {
                break envelope;
            }
            retries += 1;
            warn!(
                "{} {}: attempt {}/{} failed ({}), retrying in {}ms...",
                request.method,
                request.url,
                retries,
                max_retries.saturating_add(1),
                envelope.error.as_deref().unwrap_or("unknown error"),
                self.config.retry_delay.as_millis()
            );
            tokio::time::sleep(self.config.retry_delay).await;
        };

        self.apply_response_interceptors(envelope)
    }

    /// Runs the raw flow: interceptors and a single dispatch. Returns the body
    /// exactly as received.
    pub async fn fetch_raw(&self, spec: RequestSpec) -> Result<Vec<u8>> {
        let spec = self.apply_request_interceptors(spec)?;
        let request = self.transport_request(spec)?;

        match self.transport.execute(request).await {
            Ok(response) => Ok(response.body),
            Err(failure) => Err(Error::Transport {
                message: failure.message,
                status: failure.status,
            }),
        }
    }

    fn apply_request_interceptors(&self, mut spec: RequestSpec) -> Result<RequestSpec> {
        for interceptor in &self.request_interceptors {
            if let Some(replacement) = interceptor.on_request(&spec).map_err(Error::Interceptor)? {
                spec = replacement;
            }
        }
        Ok(spec)
    }

    fn apply_response_interceptors(&self, mut envelope: ResponseEnvelope) -> Result<ResponseEnvelope> {
        for interceptor in &self.response_interceptors {
            if let Some(replacement) = interceptor
                .on_response(&envelope)
                .map_err(Error::Interceptor)?
            {
                envelope = replacement;
            }
        }
        Ok(envelope)
    }

    /// Builds the dispatch request: default headers, then the request's own
    /// lines, then a JSON content type if a text body has none. Malformed
    /// header lines are rejected before anything is sent.
    fn transport_request(&self, spec: RequestSpec) -> Result<TransportRequest> {
        let mut headers = self.config.default_headers().to_vec();
        headers.extend(spec.headers);
        for line in &headers {
            request::parse_header(line)?;
        }

        let encoded_body = matches!(spec.body, Some(Body::Text(_) | Body::Json(_)));
        if encoded_body && !request::has_header(&headers, "Content-Type") {
            headers.push("Content-Type: application/json".to_string());
        }

        Ok(TransportRequest {
            url: request::resolve_url(self.config.base_url(), &spec.endpoint),
            method: spec.method,
            headers,
            body: spec.body,
            timeout: self.config.timeout,
            verify_tls: self.config.verify_tls,
            follow_redirects: self.config.follow_redirects,
        })
    }

    async fn dispatch(&self, request: &TransportRequest) -> ResponseEnvelope {
        let started = Instant::now();
        let outcome = self.transport.execute(request.clone()).await;
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            Ok(response) => {
                debug!("{} {} -> {} in {:.3}s", request.method, request.url, response.status, elapsed);
                ResponseEnvelope::success(response, elapsed)
            }
            Err(failure) => ResponseEnvelope::failure(failure, elapsed),
        }
    }
}

fn spec(method: Method, endpoint: &str, body: Option<Body>, headers: &[&str]) -> RequestSpec {
    RequestSpec {
        endpoint: endpoint.to_string(),
        method,
        body,
        headers: headers.iter().map(|h| h.to_string()).collect(),
    }
}
