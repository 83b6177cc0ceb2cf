//! Local stand-in for API Gateway
//!
//! Outside Lambda the handler is served over plain HTTP. Every request is
//! translated into the proxy event API Gateway would have sent, run through
//! the executor, and the envelope is mapped back to an HTTP response.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose, Engine};
use bytes::Bytes;
use lambdabridge_core::envelope::{canonical_header_name, envelope_headers};
use lambdabridge_core::event::RequestIdentity;
use lambdabridge_core::{
    Deadline, Executor, Handler, InvokeRequest, ProxyRequest, ProxyRequestContext, ProxyResponse,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::RuntimeError;

/// Local gateway settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    /// Listen address; port 0 picks a free port
    #[serde(default = "default_addr")]
    pub addr: SocketAddr,

    /// Stage name reported in `requestContext.stage`
    #[serde(default = "default_stage")]
    pub stage: String,

    /// Time budget given to each request, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

fn default_stage() -> String {
    "local".to_string()
}

fn default_timeout_ms() -> u64 {
    29_000
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            stage: default_stage(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl LocalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

struct GatewayState<H> {
    executor: Arc<Executor<H>>,
    stage: String,
    timeout: Duration,
}

/// Router that feeds every request to `executor`.
pub fn local_router<H: Handler + 'static>(executor: Arc<Executor<H>>, config: &LocalConfig) -> axum::Router {
    let state = Arc::new(GatewayState {
        executor,
        stage: config.stage.clone(),
        timeout: config.timeout(),
    });

    axum::Router::new()
        .fallback(handle_request::<H>)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until the listener fails.
pub async fn serve_local<H: Handler + 'static>(
    executor: Arc<Executor<H>>,
    config: &LocalConfig,
) -> Result<(), RuntimeError> {
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    let addr = listener.local_addr()?;
    info!("Serving locally on http://{}", addr);

    let app = local_router(executor, config);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

async fn handle_request<H: Handler + 'static>(
    State(state): State<Arc<GatewayState<H>>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let source_ip = peer
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let event = proxy_event(&state.stage, source_ip, &method, &uri, &headers, &body);
    let request_id = event.request_context.request_id.clone();
    debug!(request_id = %request_id, method = %method, path = %uri.path(), "Local request");

    let payload = match serde_json::to_vec(&event) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "Failed to encode proxy event");
            return gateway_error(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let deadline_ms = chrono::Utc::now().timestamp_millis()
        + i64::try_from(state.timeout.as_millis()).unwrap_or(i64::MAX / 2);
    let invocation = InvokeRequest::new(payload)
        .with_request_id(request_id.clone())
        .with_deadline(Deadline::from_millis(deadline_ms));

    let executor = state.executor.clone();
    let outcome = tokio::task::spawn_blocking(move || executor.invoke(&invocation)).await;

    let payload = match outcome {
        Ok(Ok(response)) => response.payload,
        Ok(Err(e)) => {
            error!(request_id = %request_id, error = %e, "Invocation failed");
            return gateway_error(StatusCode::BAD_GATEWAY);
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Invocation task aborted");
            return gateway_error(StatusCode::BAD_GATEWAY);
        }
    };

    match http_response(&payload) {
        Some(response) => response,
        None => {
            error!(request_id = %request_id, "Malformed proxy response");
            gateway_error(StatusCode::BAD_GATEWAY)
        }
    }
}

/// Proxy event for one local HTTP request.
///
/// Single-valued maps keep the last value of a repeated header or query
/// parameter, as API Gateway does.
pub fn proxy_event(
    stage: &str,
    source_ip: String,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> ProxyRequest {
    let mut header_map = HashMap::new();
    for (name, value) in headers {
        header_map.insert(
            canonical_header_name(name),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }

    let query: HashMap<String, String> = uri
        .query()
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let user_agent = headers
        .get(header::USER_AGENT)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default();

    ProxyRequest {
        resource: "/{proxy+}".to_string(),
        path: uri.path().to_string(),
        http_method: method.as_str().to_string(),
        headers: header_map,
        query_string_parameters: query,
        path_parameters: HashMap::from([(
            "proxy".to_string(),
            uri.path().trim_start_matches('/').to_string(),
        )]),
        stage_variables: HashMap::new(),
        request_context: ProxyRequestContext {
            stage: stage.to_string(),
            request_id: uuid::Uuid::new_v4().to_string(),
            resource_path: "/{proxy+}".to_string(),
            http_method: method.as_str().to_string(),
            identity: RequestIdentity {
                source_ip,
                user_agent,
            },
            ..Default::default()
        },
        body: if body.is_empty() {
            String::new()
        } else {
            general_purpose::STANDARD.encode(body)
        },
        is_base64_encoded: !body.is_empty(),
    }
}

/// Map an encoded envelope back to an HTTP response.
pub fn http_response(payload: &[u8]) -> Option<Response> {
    let envelope: ProxyResponse = serde_json::from_slice(payload).ok()?;
    let status = StatusCode::from_u16(envelope.status_code).ok()?;
    let body = envelope.body_bytes().ok()?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = envelope_headers(&envelope);
    Some(response)
}

fn gateway_error(status: StatusCode) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"message": "Internal server error"}"#,
    )
        .into_response()
}
