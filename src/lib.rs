//! Convenience HTTP client with interceptors, retry-with-delay and
//! response-shape normalization.
//!
//! [`Client`] runs the request pipeline; [`EasyClient`] layers shorthand
//! calls, header helpers, uploads and downloads on top of it.

pub mod config;
pub mod error;
pub mod facade;
pub mod http;
pub mod runtime;

pub use config::{ClientConfig, ResponseMode};
pub use error::{Error, Result};
pub use facade::EasyClient;
pub use http::{Body, Client, Data, Method, RequestSpec, Response, ResponseEnvelope};
