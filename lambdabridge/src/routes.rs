//! Demo handlers served by the binary

use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use lambdabridge_core::handler::{error, redirect};
use lambdabridge_core::{handler_fn, Request, ResponseCapture, Router};
use serde_json::json;
use std::io::Write;

pub fn create_router() -> Router {
    Router::new()
        .route("/", handler_fn(hello))
        .route("/echo", handler_fn(echo))
        .route("/context", handler_fn(context))
        .route(
            "/redirect",
            handler_fn(|req: &Request, res: &mut ResponseCapture| {
                redirect(req, res, "/error", StatusCode::TEMPORARY_REDIRECT);
            }),
        )
        .route(
            "/error",
            handler_fn(|_: &Request, res: &mut ResponseCapture| {
                error(res, "Something went wrong", StatusCode::INTERNAL_SERVER_ERROR);
            }),
        )
        .route(
            "/panic",
            handler_fn(|_: &Request, _: &mut ResponseCapture| {
                panic!("panic requested");
            }),
        )
}

fn hello(req: &Request, res: &mut ResponseCapture) {
    let _ = writeln!(res, "Hello from {} {}", req.method(), req.uri());
}

/// Reflect the request body with its content type.
fn echo(req: &Request, res: &mut ResponseCapture) {
    if let Some(content_type) = req.headers().get(CONTENT_TYPE) {
        res.headers_mut().insert(CONTENT_TYPE, content_type.clone());
    }
    let _ = res.write_all(req.body());
}

/// Report what the handler can see of its invocation.
fn context(req: &Request, res: &mut ResponseCapture) {
    let ctx = req.context();
    let invocation = ctx.invocation().map(|metadata| {
        let invoke = metadata.invoke_request();
        let gateway = metadata.gateway_request();
        json!({
            "requestId": invoke.request_id,
            "functionArn": invoke.invoked_function_arn,
            "traceId": invoke.trace_id,
            "stage": gateway.stage(),
            "sourceIp": gateway.request_context.identity.source_ip,
            "custom": metadata.client_context().custom,
        })
    });
    let body = json!({
        "deadline": ctx.deadline().map(|d| d.to_rfc3339()),
        "remainingMs": ctx.remaining().map(|r| u64::try_from(r.as_millis()).unwrap_or(u64::MAX)),
        "invocation": invocation,
    });

    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let _ = serde_json::to_writer_pretty(&mut *res, &body);
}
