//! Convenience layer over [`Client`].
//!
//! `EasyClient` is an explicitly held handle: create it once with a base URL
//! and reuse it. Shorthand calls unwrap the envelope into a plain JSON value
//! and turn failed envelopes into errors.

use std::path::Path;

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{ClientConfig, DEFAULT_RETRY_DELAY_MS, ResponseMode};
use crate::error::{Error, Result};
use crate::http::{
    Body, Client, Data, FormPart, HeaderInjector, Method, ReqwestTransport, RequestSpec,
    ResponseEnvelope, Transport,
};
use crate::runtime::{RealRuntime, Runtime};

/// Scheme used by [`EasyClient::with_token`] when none is given.
pub const DEFAULT_TOKEN_SCHEME: &str = "Bearer";

/// Form field name used for uploads when none is given.
pub const DEFAULT_UPLOAD_FIELD: &str = "file";

pub struct EasyClient<R: Runtime = RealRuntime, T: Transport = ReqwestTransport> {
    client: Client<T>,
    runtime: R,
}

impl EasyClient<RealRuntime, ReqwestTransport> {
    /// Creates a client for `base_url` backed by reqwest and the local filesystem.
    pub fn create(base_url: &str) -> Self {
        Self::new(Client::new(base_url), RealRuntime)
    }

    /// Replaces the underlying client with a fresh one for `base_url`.
    /// Headers, tokens and settings from the previous client are dropped.
    pub fn rebase(&mut self, base_url: &str) -> &mut Self {
        debug!("Re-creating client for {}", base_url);
        self.client = Client::new(base_url);
        self
    }
}

impl<R: Runtime, T: Transport> EasyClient<R, T> {
    pub fn new(client: Client<T>, runtime: R) -> Self {
        Self { client, runtime }
    }

    /// The underlying client, for calls that need the full envelope.
    pub fn full_response(&mut self) -> &mut Client<T> {
        &mut self.client
    }

    pub fn client(&self) -> &Client<T> {
        &self.client
    }

    #[tracing::instrument(skip(self, params, headers))]
    pub async fn get(&self, url: &str, params: &[(&str, &str)], headers: &[&str]) -> Result<Value> {
        let endpoint = crate::http::request::append_query(url, params);
        let spec = RequestSpec::new(Method::Get, endpoint).with_headers(headers.iter().copied());
        self.send(spec).await
    }

    /// GET and deserialize the response data into `D`.
    pub async fn get_as<D: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
        headers: &[&str],
    ) -> Result<D> {
        let value = self.get(url, params, headers).await?;
        serde_json::from_value(value).map_err(Error::Decode)
    }

    #[tracing::instrument(skip(self, body, headers))]
    pub async fn post(&self, url: &str, body: Option<Body>, headers: &[&str]) -> Result<Value> {
        self.send(with_body(Method::Post, url, body, headers)).await
    }

    #[tracing::instrument(skip(self, body, headers))]
    pub async fn put(&self, url: &str, body: Option<Body>, headers: &[&str]) -> Result<Value> {
        self.send(with_body(Method::Put, url, body, headers)).await
    }

    #[tracing::instrument(skip(self, headers))]
    pub async fn delete(&self, url: &str, headers: &[&str]) -> Result<Value> {
        self.send(with_body(Method::Delete, url, None, headers)).await
    }

    /// Sends every following request with `headers` appended.
    pub fn with_headers<I, S>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.client.add_request_interceptor(HeaderInjector::new(headers));
        self
    }

    /// Sends every following request with `Authorization: <scheme> <token>`.
    pub fn with_token(&mut self, token: &str, scheme: Option<&str>) -> &mut Self {
        let scheme = scheme.unwrap_or(DEFAULT_TOKEN_SCHEME);
        self.client
            .add_request_interceptor(HeaderInjector::token(token, scheme));
        self
    }

    pub fn timeout(&mut self, seconds: u64) -> &mut Self {
        self.client.set_timeout(seconds);
        self
    }

    /// Retries transport failures `times` times, one second apart.
    pub fn retry(&mut self, times: u32) -> &mut Self {
        self.client.set_retry(times, DEFAULT_RETRY_DELAY_MS);
        self
    }

    pub fn disable_ssl(&mut self) -> &mut Self {
        self.client.set_verify_tls(false);
        self
    }

    pub fn enable_ssl(&mut self) -> &mut Self {
        self.client.set_verify_tls(true);
        self
    }

    /// Posts `file_path` as multipart form data under `field_name`, along
    /// with the `fields` text parts.
    #[tracing::instrument(skip(self, fields))]
    pub async fn upload(
        &self,
        url: &str,
        file_path: &Path,
        field_name: &str,
        fields: &[(&str, &str)],
    ) -> Result<Value> {
        if !self.runtime.exists(file_path) {
            return Err(Error::FileNotFound(file_path.to_path_buf()));
        }
        let contents = self.runtime.read(file_path).map_err(Error::Io)?;
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| field_name.to_string());

        let mut parts: Vec<FormPart> = fields
            .iter()
            .map(|(name, value)| FormPart::Text {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect();
        parts.push(FormPart::File {
            name: field_name.to_string(),
            file_name,
            contents,
        });

        info!("Uploading {} to {}...", file_path.display(), url);
        self.post(url, Some(Body::Multipart(parts)), &[]).await
    }

    /// Downloads `url` into `save_path`, creating parent directories.
    ///
    /// The request runs in raw mode (single dispatch). If writing fails, any
    /// partially written file at `save_path` is removed.
    #[tracing::instrument(skip(self))]
    pub async fn download(&self, url: &str, save_path: &Path) -> Result<()> {
        info!("Downloading file from {}...", url);

        let bytes = self
            .client
            .fetch_raw(RequestSpec::new(Method::Get, url))
            .await?;
        if bytes.is_empty() {
            return Err(Error::EmptyResponse);
        }

        if let Err(e) = self.save(save_path, &bytes) {
            warn!("Error downloading file: {}", e);
            if self.runtime.exists(save_path) {
                debug!("Cleaning up: {:?}", save_path);
                if let Err(cleanup) = self.runtime.remove_file(save_path) {
                    warn!("Failed to remove partial file {:?}: {}", save_path, cleanup);
                }
            }
            return Err(e);
        }

        info!("Download complete ({} bytes).", bytes.len());
        Ok(())
    }

    fn save(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !self.runtime.is_dir(dir) {
                self.runtime.create_dir_all(dir).map_err(Error::Io)?;
            }
        }

        self.runtime
            .write(path, bytes)
            .map_err(|cause| Error::Write {
                path: path.to_path_buf(),
                cause,
            })?;

        if !self.runtime.exists(path) {
            return Err(Error::FileNotCreated(path.to_path_buf()));
        }
        Ok(())
    }

    async fn send(&self, spec: RequestSpec) -> Result<Value> {
        let response = self
            .client
            .request_with_mode(spec, ResponseMode::Array)
            .await?;
        match response.into_envelope() {
            Some(envelope) => unwrap_envelope(envelope),
            None => Err(Error::MissingData),
        }
    }
}

impl<R: Runtime + Default> EasyClient<R, ReqwestTransport> {
    /// Builds a client from a prepared configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self::new(Client::with_transport(config, ReqwestTransport::new()), R::default())
    }
}

fn with_body(method: Method, url: &str, body: Option<Body>, headers: &[&str]) -> RequestSpec {
    let spec = RequestSpec::new(method, url).with_headers(headers.iter().copied());
    match body {
        Some(body) => spec.with_body(body),
        None => spec,
    }
}

/// Turns an envelope into its data, or the envelope's error into an `Err`.
pub fn unwrap_envelope(envelope: ResponseEnvelope) -> Result<Value> {
    if !envelope.success {
        let message = envelope.error.unwrap_or_else(|| "Unknown error".to_string());
        return Err(Error::RequestFailed(message));
    }
    match envelope.data {
        Some(data) => Ok(normalize(data)),
        None => Err(Error::MissingData),
    }
}

/// Decodes JSON held in strings; structured values and scalars pass through.
fn normalize(data: Data) -> Value {
    match data {
        Data::Decoded(Value::String(text)) => {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        }
        Data::Decoded(value) => value,
        Data::Undecoded(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
    }
}
