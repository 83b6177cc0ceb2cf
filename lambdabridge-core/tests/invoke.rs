//! End-to-end invocation tests
//!
//! Each test feeds a proxy event through an `Executor` and inspects the
//! decoded envelope.

use std::io::Write;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;

use lambdabridge_core::handler::{error, redirect};
use lambdabridge_core::{
    handler_fn, BridgeConfig, Deadline, Executor, Handler, InvokeError, InvokeRequest,
    ProxyResponse, Request, ResponseCapture, Router,
};

const PAYLOAD: &str = r#"{
    "body": "{\"test\":\"body\"}",
    "resource": "/{proxy+}",
    "requestContext": {
        "resourceId": "123456",
        "apiId": "1234567890",
        "resourcePath": "/{proxy+}",
        "httpMethod": "POST",
        "requestId": "c6af9ac6-7b61-11e6-9a41-93e8deadbeef",
        "accountId": "123456789012",
        "identity": {
            "apiKey": null,
            "userArn": null,
            "cognitoAuthenticationType": null,
            "caller": null,
            "userAgent": "Custom User Agent String",
            "user": null,
            "cognitoIdentityPoolId": null,
            "cognitoIdentityId": null,
            "cognitoAuthenticationProvider": null,
            "sourceIp": "127.0.0.1",
            "accountId": null
        },
        "stage": "prod"
    },
    "queryStringParameters": {"foo": "bar"},
    "headers": {
        "Via": "1.1 08f323deadbeefa7af34d5feb414ce27.cloudfront.net (CloudFront)",
        "Accept-Language": "en-US,en;q=0.8",
        "X-Forwarded-For": "127.0.0.1, 127.0.0.2",
        "Accept": "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        "X-Forwarded-Port": "443",
        "Host": "1234567890.execute-api.us-east-1.amazonaws.com",
        "X-Forwarded-Proto": "https",
        "Cache-Control": "max-age=0",
        "User-Agent": "Custom User Agent String",
        "Accept-Encoding": "gzip, deflate, sdch"
    },
    "pathParameters": {"proxy": "path/to/resource"},
    "httpMethod": "POST",
    "stageVariables": {"baz": "qux"},
    "path": "/path/to/resource"
}"#;

const GATEWAY_HOST: &str = "1234567890.execute-api.us-east-1.amazonaws.com";

fn invoke<H: Handler>(executor: &Executor<H>, payload: impl Into<String>) -> ProxyResponse {
    let response = executor
        .invoke(&InvokeRequest::new(payload.into()))
        .expect("invocation should succeed");
    serde_json::from_slice(&response.payload).expect("payload should be an envelope")
}

fn event(method: &str, path: &str, host: &str, stage: &str) -> String {
    serde_json::json!({
        "httpMethod": method,
        "path": path,
        "headers": {"Host": host},
        "requestContext": {"stage": stage},
    })
    .to_string()
}

fn demo_router() -> Router {
    Router::new()
        .route(
            "/redirect",
            handler_fn(|req, res| redirect(req, res, "/error", StatusCode::TEMPORARY_REDIRECT)),
        )
        .route(
            "/error",
            handler_fn(|_, res| error(res, "This is an error", StatusCode::INTERNAL_SERVER_ERROR)),
        )
        .route("/panic", handler_fn(|_, _| panic!("handler exploded")))
        .route(
            "/echo",
            handler_fn(|req: &Request, res: &mut ResponseCapture| {
                res.write_all(req.body()).unwrap();
            }),
        )
}

#[test]
fn test_invoke_sample_event_without_route() {
    let executor = Executor::new(Router::new());
    let envelope = invoke(&executor, PAYLOAD);

    assert_eq!(envelope.status_code, 404);
    assert!(envelope.is_base64_encoded);
}

#[test]
fn test_scenario_missing_route() {
    let executor = Executor::new(demo_router());
    let envelope = invoke(&executor, r#"{"httpMethod":"GET","path":"/missing"}"#);

    assert_eq!(envelope.status_code, 404);
    assert!(envelope.is_base64_encoded);
    assert_eq!(envelope.headers.len(), 1);
    assert_eq!(envelope.headers["Content-Type"], "text/plain");
    assert_eq!(envelope.body_bytes().unwrap().as_ref(), b"404 page not found\n");
}

#[test]
fn test_scenario_redirect_fixup_enabled() {
    let executor = Executor::new(demo_router());
    let envelope = invoke(&executor, event("GET", "/redirect", GATEWAY_HOST, "prod"));

    assert_eq!(envelope.status_code, 307);
    assert_eq!(envelope.headers["Location"], "/prod/error");
}

#[test]
fn test_scenario_redirect_fixup_disabled() {
    let config = BridgeConfig::new().fix_relative_redirect(false);
    let executor = Executor::with_config(demo_router(), config);
    let envelope = invoke(&executor, event("GET", "/redirect", GATEWAY_HOST, "prod"));

    assert_eq!(envelope.status_code, 307);
    assert_eq!(envelope.headers["Location"], "/error");
}

#[test]
fn test_redirect_on_custom_domain_is_untouched() {
    let executor = Executor::new(demo_router());
    let envelope = invoke(&executor, event("GET", "/redirect", "api.example.com", "prod"));

    assert_eq!(envelope.headers["Location"], "/error");
}

#[test]
fn test_scenario_panic_then_recovery() {
    let config = BridgeConfig::new().panic_message("Function panic");
    let executor = Executor::with_config(demo_router(), config);

    let envelope = invoke(&executor, event("GET", "/panic", GATEWAY_HOST, "prod"));
    assert_eq!(envelope.status_code, 500);
    assert_eq!(envelope.headers["Content-Type"], "text/plain");
    assert_eq!(envelope.body_bytes().unwrap().as_ref(), b"Function panic");

    let envelope = invoke(
        &executor,
        r#"{"httpMethod":"POST","path":"/echo","body":"still alive"}"#,
    );
    assert_eq!(envelope.status_code, 200);
    assert_eq!(envelope.body_bytes().unwrap().as_ref(), b"still alive");
}

#[test]
fn test_panic_after_partial_write_discards_output() {
    let executor = Executor::with_config(
        handler_fn(|_, res| {
            res.set_status(StatusCode::ACCEPTED);
            res.headers_mut()
                .insert("x-partial", HeaderValue::from_static("yes"));
            res.write_all(b"half a resp").unwrap();
            panic!("midway");
        }),
        BridgeConfig::new().panic_message("custom failure"),
    );
    let envelope = invoke(&executor, r#"{"httpMethod":"GET","path":"/"}"#);

    assert_eq!(envelope.status_code, 500);
    assert!(envelope.header("x-partial").is_none());
    assert_eq!(envelope.body_bytes().unwrap().as_ref(), b"custom failure");
}

#[test]
fn test_body_round_trip() {
    let executor = Executor::new(demo_router());
    let bodies: [&[u8]; 3] = [b"", b"plain text body", &[0, 255, 1, 254, 128, 127, 0, 0]];

    for body in bodies {
        let payload = serde_json::json!({
            "httpMethod": "POST",
            "path": "/echo",
            "isBase64Encoded": true,
            "body": base64_encode(body),
        });
        let envelope = invoke(&executor, payload.to_string());
        assert_eq!(envelope.body_bytes().unwrap().as_ref(), body);
    }
}

#[test]
fn test_default_status_and_explicit_status() {
    let executor = Executor::new(handler_fn(|req, res| {
        if req.path() == "/created" {
            res.set_status(StatusCode::CREATED);
        }
    }));

    assert_eq!(invoke(&executor, r#"{"path":"/"}"#).status_code, 200);
    assert_eq!(invoke(&executor, r#"{"path":"/created"}"#).status_code, 201);
}

#[test]
fn test_content_type_is_not_overridden() {
    let executor = Executor::new(handler_fn(|_, res| {
        res.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
        res.write_all(&[0x89, b'P', b'N', b'G']).unwrap();
    }));
    let envelope = invoke(&executor, r#"{"path":"/logo.png"}"#);

    assert_eq!(envelope.headers["Content-Type"], "image/png");
    assert_eq!(envelope.body_bytes().unwrap().as_ref(), &[0x89, b'P', b'N', b'G']);
}

#[test]
fn test_request_is_synthesized_from_event() {
    let executor = Executor::new(handler_fn(|req, res| {
        let host = req.host().unwrap_or("-").to_string();
        writeln!(res, "{} {} {}", req.method(), req.uri(), host).unwrap();
        res.write_all(req.body()).unwrap();
    }));
    let envelope = invoke(&executor, PAYLOAD);
    let body = String::from_utf8(envelope.body_bytes().unwrap().to_vec()).unwrap();

    assert_eq!(
        body,
        format!("POST /path/to/resource?foo=bar {}\n{{\"test\":\"body\"}}", GATEWAY_HOST)
    );
}

#[test]
fn test_invocation_metadata_is_available() {
    let executor = Executor::new(handler_fn(|req, res| {
        let Some(invocation) = req.context().invocation() else {
            res.set_status(StatusCode::NOT_IMPLEMENTED);
            return;
        };
        let gateway = invocation.gateway_request();
        let client = invocation.client_context();
        write!(
            res,
            "{}|{}|{}|{}",
            invocation.invoke_request().request_id,
            gateway.stage(),
            gateway.stage_variables["baz"],
            client.client.app_title
        )
        .unwrap();
    }));

    let request = InvokeRequest::new(PAYLOAD)
        .with_request_id("req-1")
        .with_client_context(r#"{"client":{"app_title":"demo"}}"#);
    let response = executor.invoke(&request).unwrap();
    let envelope: ProxyResponse = serde_json::from_slice(&response.payload).unwrap();

    assert_eq!(envelope.body_bytes().unwrap().as_ref(), b"req-1|prod|qux|demo");
}

#[test]
fn test_deadline_propagates_to_context() {
    let deadline_ms = Utc::now().timestamp_millis() + 60_000;
    let executor = Executor::new(handler_fn(|req, res| {
        let ctx = req.context();
        let millis = ctx.deadline().map(|d| d.timestamp_millis()).unwrap_or_default();
        write!(res, "{}|{}", millis, ctx.is_cancelled()).unwrap();
    }));

    let request = InvokeRequest::new(r#"{"path":"/"}"#).with_deadline(Deadline::from_millis(deadline_ms));
    let response = executor.invoke(&request).unwrap();
    let envelope: ProxyResponse = serde_json::from_slice(&response.payload).unwrap();

    assert_eq!(
        envelope.body_bytes().unwrap().as_ref(),
        format!("{}|false", deadline_ms).as_bytes()
    );
}

#[test]
fn test_zero_deadline_means_no_deadline() {
    let executor = Executor::new(handler_fn(|req, res| {
        let ctx = req.context();
        write!(res, "{}|{}", ctx.deadline().is_some(), ctx.is_cancelled()).unwrap();
    }));
    let request = InvokeRequest::new(r#"{"path":"/"}"#).with_deadline(Deadline::default());
    let response = executor.invoke(&request).unwrap();
    let envelope: ProxyResponse = serde_json::from_slice(&response.payload).unwrap();

    assert_eq!(envelope.body_bytes().unwrap().as_ref(), b"false|false");
}

#[test]
fn test_expired_deadline_is_observable() {
    let executor = Executor::new(handler_fn(|req, res| {
        if req.context().is_cancelled() {
            res.set_status(StatusCode::GATEWAY_TIMEOUT);
        }
    }));
    let past = Deadline::from_millis(Utc::now().timestamp_millis() - 1_000);
    let response = executor
        .invoke(&InvokeRequest::new(r#"{"path":"/"}"#).with_deadline(past))
        .unwrap();
    let envelope: ProxyResponse = serde_json::from_slice(&response.payload).unwrap();

    assert_eq!(envelope.status_code, 504);
}

#[test]
fn test_demangle_input_headers() {
    let echo_date = handler_fn(|req: &Request, res: &mut ResponseCapture| {
        let date = req
            .headers()
            .get("date")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");
        res.write_all(date.as_bytes()).unwrap();
    });
    let payload = r#"{"path":"/","headers":{"X-Amzn-Remapped-Date":"yesterday"}}"#;

    let plain = Executor::new(echo_date);
    assert_eq!(invoke(&plain, payload).body_bytes().unwrap().as_ref(), b"none");

    let demangling = Executor::with_config(
        plain.handler().clone(),
        BridgeConfig::new().demangle_input_headers(true),
    );
    assert_eq!(
        invoke(&demangling, payload).body_bytes().unwrap().as_ref(),
        b"yesterday"
    );
}

#[test]
fn test_mangle_output_headers() {
    let handler = Arc::new(handler_fn(|_, res| {
        res.headers_mut()
            .insert("server", HeaderValue::from_static("lambdabridge"));
        res.headers_mut()
            .insert("x-amzn-remapped-date", HeaderValue::from_static("kept"));
        res.headers_mut()
            .insert("date", HeaderValue::from_static("ignored"));
    }));

    let envelope = invoke(&Executor::new(handler.clone()), r#"{"path":"/"}"#);
    assert!(envelope.header("X-Amzn-Remapped-Server").is_none());

    let executor = Executor::with_config(handler, BridgeConfig::new().mangle_output_headers(true));
    let envelope = invoke(&executor, r#"{"path":"/"}"#);
    assert_eq!(envelope.headers["X-Amzn-Remapped-Server"], "lambdabridge");
    assert_eq!(envelope.headers["X-Amzn-Remapped-Content-Type"], "text/plain");
    assert_eq!(envelope.headers["X-Amzn-Remapped-Date"], "kept");
}

#[test]
fn test_multi_value_headers() {
    let handler = Arc::new(handler_fn(|_, res| {
        res.headers_mut()
            .append("set-cookie", HeaderValue::from_static("a=1"));
        res.headers_mut()
            .append("set-cookie", HeaderValue::from_static("b=2"));
    }));

    let envelope = invoke(&Executor::new(handler.clone()), r#"{"path":"/"}"#);
    assert_eq!(envelope.headers["Set-Cookie"], "a=1");
    assert!(envelope.multi_value_headers.is_none());

    let executor = Executor::with_config(handler, BridgeConfig::new().multi_value_headers(true));
    let envelope = invoke(&executor, r#"{"path":"/"}"#);
    assert_eq!(
        envelope.multi_value_headers.unwrap()["Set-Cookie"],
        vec!["a=1".to_string(), "b=2".to_string()]
    );
}

#[test]
fn test_malformed_request_reaches_handler() {
    let executor = Executor::new(demo_router());
    let envelope = invoke(&executor, r#"{"httpMethod":"BAD METHOD","path":"/echo"}"#);

    assert_eq!(envelope.status_code, 400);
}

#[test]
fn test_decode_errors_fail_the_call() {
    let executor = Executor::new(demo_router());

    for payload in ["", "not json", "[]", "\"string\"", r#"{"path": 5}"#] {
        let result = executor.invoke(&InvokeRequest::new(payload));
        assert!(
            matches!(result, Err(InvokeError::Decode(_))),
            "payload {:?} should fail to decode",
            payload
        );
    }
}

#[test]
fn test_concurrent_invocations_with_separate_configs() {
    let router = Arc::new(demo_router());
    let fixing = Arc::new(Executor::new(router.clone()));
    let plain = Arc::new(Executor::with_config(
        router,
        BridgeConfig::new().fix_relative_redirect(false),
    ));

    let mut workers = Vec::new();
    for i in 0..8 {
        let executor = if i % 2 == 0 { fixing.clone() } else { plain.clone() };
        workers.push(thread::spawn(move || {
            let mut locations = Vec::new();
            for _ in 0..25 {
                let envelope = invoke(&*executor, event("GET", "/redirect", GATEWAY_HOST, "prod"));
                locations.push(envelope.headers["Location"].clone());
            }
            (i, locations)
        }));
    }

    for worker in workers {
        let (i, locations) = worker.join().unwrap();
        let expected = if i % 2 == 0 { "/prod/error" } else { "/error" };
        assert!(locations.iter().all(|l| l == expected), "worker {}", i);
    }
}

fn base64_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}
