//! Normalized response shapes returned by the pipeline.

use std::borrow::Cow;

use serde::{Serialize, Serializer};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::transport::{TransportFailure, TransportInfo, TransportResponse};
use crate::error::{Error, Result};

/// Response body after the best-effort JSON decode.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    /// Body was valid JSON (including a literal `null`).
    Decoded(Value),
    /// Body was not JSON; kept byte for byte.
    Undecoded(Vec<u8>),
}

impl Data {
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice(body) {
            Ok(value) => Data::Decoded(value),
            Err(_) => Data::Undecoded(body.to_vec()),
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, Data::Decoded(_))
    }

    /// The undecoded body as text, replacing invalid UTF-8.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self {
            Data::Decoded(_) => None,
            Data::Undecoded(bytes) => Some(String::from_utf8_lossy(bytes)),
        }
    }

    /// The data as a JSON value. Undecoded bodies become a JSON string.
    pub fn to_value(&self) -> Value {
        match self {
            Data::Decoded(value) => value.clone(),
            Data::Undecoded(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

// Decoded data serializes as itself, undecoded bodies as lossy text.
impl Serialize for Data {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Data::Decoded(value) => value.serialize(serializer),
            Data::Undecoded(bytes) => serializer.serialize_str(&String::from_utf8_lossy(bytes)),
        }
    }
}

/// Success/failure wrapper for all enveloped response modes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    pub http_code: u16,
    /// Seconds spent in the transport call.
    pub request_time: f64,
    pub info: TransportInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn success(response: TransportResponse, request_time: f64) -> Self {
        Self {
            success: true,
            http_code: response.status,
            request_time,
            data: Some(Data::from_body(&response.body)),
            info: response.info,
            error: None,
        }
    }

    pub fn failure(failure: TransportFailure, request_time: f64) -> Self {
        Self {
            success: false,
            http_code: failure.status,
            request_time,
            info: failure.info,
            data: None,
            error: Some(failure.message),
        }
    }

    /// Deserializes `data` into `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        let data = self.data.as_ref().ok_or(Error::MissingData)?;
        serde_json::from_value(data.to_value()).map_err(Error::Decode)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::Encode)
    }
}

/// What `Client::request` hands back, by response mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// `Array` and `Object` modes.
    Envelope(ResponseEnvelope),
    /// `Json` mode: the envelope encoded as text.
    Json(String),
    /// `Raw` mode: the body exactly as received.
    Raw(Vec<u8>),
}

impl Response {
    pub fn into_envelope(self) -> Option<ResponseEnvelope> {
        match self {
            Response::Envelope(envelope) => Some(envelope),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<String> {
        match self {
            Response::Json(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_raw(self) -> Option<Vec<u8>> {
        match self {
            Response::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }
}
