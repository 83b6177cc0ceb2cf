//! Core invocation engine for lambdabridge
//!
//! Serves ordinary HTTP handlers from AWS Lambda behind an API Gateway proxy
//! integration. Each invocation payload is decoded into a [`ProxyRequest`],
//! turned into a [`Request`], handed to a [`Handler`] together with a
//! [`ResponseCapture`], and the captured response is returned as a
//! base64-bodied [`ProxyResponse`] envelope.
//!
//! API Gateway must treat all media types as binary (`*/*` under "Binary
//! Media Types") since every response body is base64 encoded.

pub mod config;
pub mod envelope;
pub mod error;
pub mod event;
pub mod executor;
pub mod handler;
pub mod invoke;
pub mod mangle;
pub mod redirect;
pub mod request;
pub mod response;

pub use config::BridgeConfig;
pub use envelope::ProxyResponse;
pub use error::{DecodeError, InvokeError};
pub use event::{ProxyRequest, ProxyRequestContext};
pub use executor::Executor;
pub use handler::{handler_fn, Handler, HandlerFn, Router};
pub use invoke::{ClientContext, Deadline, InvocationMetadata, InvokeRequest, InvokeResponse, Pong};
pub use mangle::HeaderRemapper;
pub use request::{Context, Malformed, Request};
pub use response::{CapturedResponse, ResponseCapture};
