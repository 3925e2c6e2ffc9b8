//! Request and response interceptors.
//!
//! Interceptors run in registration order. Each one sees the output of the
//! previous one and may return a replacement, or `None` to keep the current
//! value. An error aborts the call.

use anyhow::Result;

use super::envelope::ResponseEnvelope;
use super::request::RequestSpec;

pub trait RequestInterceptor: Send + Sync {
    fn on_request(&self, request: &RequestSpec) -> Result<Option<RequestSpec>>;
}

pub trait ResponseInterceptor: Send + Sync {
    fn on_response(&self, response: &ResponseEnvelope) -> Result<Option<ResponseEnvelope>>;
}

impl<F> RequestInterceptor for F
where
    F: Fn(&RequestSpec) -> Result<Option<RequestSpec>> + Send + Sync,
{
    fn on_request(&self, request: &RequestSpec) -> Result<Option<RequestSpec>> {
        self(request)
    }
}

impl<F> ResponseInterceptor for F
where
    F: Fn(&ResponseEnvelope) -> Result<Option<ResponseEnvelope>> + Send + Sync,
{
    fn on_response(&self, response: &ResponseEnvelope) -> Result<Option<ResponseEnvelope>> {
        self(response)
    }
}

/// Appends a fixed set of header lines to every request.
#[derive(Debug, Clone)]
pub struct HeaderInjector {
    headers: Vec<String>,
}

impl HeaderInjector {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
        }
    }

    /// `Authorization: <scheme> <token>`.
    pub fn token(token: &str, scheme: &str) -> Self {
        Self::new([format!("Authorization: {} {}", scheme, token)])
    }
}

impl RequestInterceptor for HeaderInjector {
    fn on_request(&self, request: &RequestSpec) -> Result<Option<RequestSpec>> {
        let mut request = request.clone();
        request.headers.extend(self.headers.iter().cloned());
        Ok(Some(request))
    }
}
