//! Transports for lambdabridge
//!
//! Inside Lambda, invocations are pulled from the Runtime API. Anywhere else
//! the handler is served over local HTTP behind a stand-in API Gateway.

pub mod local;
pub mod runtime_api;

use lambdabridge_core::{BridgeConfig, Executor, Handler};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub use local::{local_router, serve_local, LocalConfig};
pub use runtime_api::handle_event;

/// Set by Lambda to the `host:port` of the Runtime API.
pub const RUNTIME_API_ENV: &str = "AWS_LAMBDA_RUNTIME_API";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Lambda runtime failed: {0}")]
    Lambda(#[from] lambda_runtime::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serve `handler` on whichever transport the environment provides.
///
/// Returns only if the local listener or the Lambda runtime fails.
pub async fn serve<H: Handler + 'static>(
    handler: H,
    config: BridgeConfig,
    local: &LocalConfig,
) -> Result<(), RuntimeError> {
    let executor = Arc::new(Executor::with_config(handler, config));

    match std::env::var(RUNTIME_API_ENV) {
        Ok(endpoint) if !endpoint.is_empty() => {
            info!(endpoint = %endpoint, "Running inside Lambda");
            runtime_api::run(executor).await
        }
        _ => serve_local(executor, local).await,
    }
}
