//! Lambda Runtime API transport
//!
//! `lambda_runtime` owns the polling loop and the response/error posts; each
//! event it hands over is run through the executor on the blocking pool.

use lambda_runtime::{service_fn, Diagnostic, LambdaEvent};
use lambdabridge_core::{Deadline, Executor, Handler, InvokeRequest, ProxyResponse};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::RuntimeError;

/// Serve invocations until the runtime shuts down.
pub async fn run<H: Handler + 'static>(executor: Arc<Executor<H>>) -> Result<(), RuntimeError> {
    info!("Polling Lambda Runtime API");

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let executor = executor.clone();
        async move { handle_event(executor, event).await }
    }))
    .await?;

    Ok(())
}

/// Run one Runtime API event through the executor.
///
/// Invocations that produce no envelope come back as a `Diagnostic`, which
/// the runtime reports on the invocation's `/error` endpoint.
pub async fn handle_event<H: Handler + 'static>(
    executor: Arc<Executor<H>>,
    event: LambdaEvent<Value>,
) -> Result<ProxyResponse, Diagnostic> {
    let invocation = to_invocation(&event).map_err(|e| {
        error!(request_id = %event.context.request_id, error = %e, "Failed to re-encode event");
        diagnostic("Runtime.InvalidEvent", e.to_string())
    })?;

    let request_id = invocation.request_id.clone();
    debug!(request_id = %request_id, "Received invocation");

    match tokio::task::spawn_blocking(move || executor.respond(&invocation)).await {
        Ok(Ok(envelope)) => Ok(envelope),
        Ok(Err(e)) => {
            error!(request_id = %request_id, error = %e, "Invocation failed");
            Err(diagnostic(e.error_type(), e.to_string()))
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Invocation task aborted");
            Err(diagnostic("Runtime.Unknown", e.to_string()))
        }
    }
}

fn diagnostic(error_type: &str, error_message: String) -> Diagnostic {
    Diagnostic {
        error_type: error_type.to_string(),
        error_message,
    }
}

/// Rebuild the raw invocation from a decoded event and its context.
fn to_invocation(event: &LambdaEvent<Value>) -> Result<InvokeRequest, serde_json::Error> {
    let ctx = &event.context;

    // Millisecond deadlines past i64::MAX are not a real clock
    let deadline = i64::try_from(ctx.deadline)
        .map(Deadline::from_millis)
        .unwrap_or_default();

    let mut invocation = InvokeRequest::new(serde_json::to_vec(&event.payload)?)
        .with_request_id(ctx.request_id.clone())
        .with_deadline(deadline);
    invocation.invoked_function_arn = ctx.invoked_function_arn.clone();
    invocation.trace_id = ctx.xray_trace_id.clone().filter(|id| !id.is_empty());
    if let Some(client_context) = &ctx.client_context {
        invocation = invocation.with_client_context(serde_json::to_vec(client_context)?);
    }
    Ok(invocation)
}
