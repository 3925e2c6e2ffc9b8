//! HTTP client module: request pipeline, interceptors and transport.

mod client;
mod envelope;
mod interceptor;
pub mod request;
mod transport;

pub use client::Client;
pub use envelope::{Data, Response, ResponseEnvelope};
pub use interceptor::{HeaderInjector, RequestInterceptor, ResponseInterceptor};
pub use request::{Body, FormPart, Method, RequestSpec};
pub use transport::{
    ReqwestTransport, Transport, TransportFailure, TransportInfo, TransportOutcome,
    TransportRequest, TransportResponse,
};

#[cfg(test)]
pub use transport::MockTransport;
