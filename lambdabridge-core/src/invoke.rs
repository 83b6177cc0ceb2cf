//! Invocation call messages

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use crate::event::ProxyRequest;

/// Invocation deadline as seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    pub seconds: i64,
    pub nanos: i64,
}

impl Deadline {
    pub fn from_millis(millis: i64) -> Self {
        Self {
            seconds: millis.div_euclid(1000),
            nanos: millis.rem_euclid(1000) * 1_000_000,
        }
    }

    /// The deadline as a UTC timestamp. A zero deadline means none was given.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        if self.seconds == 0 && self.nanos == 0 {
            return None;
        }
        let extra_secs = self.nanos.div_euclid(1_000_000_000);
        let nanos = u32::try_from(self.nanos.rem_euclid(1_000_000_000)).ok()?;
        Utc.timestamp_opt(self.seconds.checked_add(extra_secs)?, nanos)
            .single()
    }
}

/// One invocation as delivered by the transport.
#[derive(Debug, Clone, Default)]
pub struct InvokeRequest {
    pub request_id: String,
    pub invoked_function_arn: String,
    pub trace_id: Option<String>,
    pub payload: Bytes,
    pub deadline: Deadline,
    pub client_context: Bytes,
}

impl InvokeRequest {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            ..Default::default()
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_client_context(mut self, client_context: impl Into<Bytes>) -> Self {
        self.client_context = client_context.into();
        self
    }
}

/// Serialized proxy response envelope.
#[derive(Debug, Clone, Default)]
pub struct InvokeResponse {
    pub payload: Bytes,
}

/// Liveness acknowledgement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pong;

/// Client application info from the mobile SDK client context.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientApplication {
    #[serde(default, alias = "installationId")]
    pub installation_id: String,
    #[serde(default, alias = "appTitle")]
    pub app_title: String,
    #[serde(default, alias = "appVersionCode")]
    pub app_version_code: String,
    #[serde(default, alias = "appPackageName")]
    pub app_package_name: String,
}

/// Decoded `clientContext` of an invocation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientContext {
    #[serde(default, alias = "Client")]
    pub client: ClientApplication,
    #[serde(default, alias = "environment")]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub custom: HashMap<String, String>,
}

/// Lambda specific view of the current invocation.
///
/// Present in a request's context only when the request came from an
/// invocation; requests built directly see `None`.
#[derive(Debug, Clone)]
pub struct InvocationMetadata {
    invoke_request: InvokeRequest,
    gateway_request: ProxyRequest,
}

impl InvocationMetadata {
    pub fn new(invoke_request: InvokeRequest, gateway_request: ProxyRequest) -> Self {
        Self {
            invoke_request,
            gateway_request,
        }
    }

    pub fn invoke_request(&self) -> &InvokeRequest {
        &self.invoke_request
    }

    pub fn gateway_request(&self) -> &ProxyRequest {
        &self.gateway_request
    }

    /// Parsed client context. Missing or unparseable context yields the
    /// default value.
    pub fn client_context(&self) -> ClientContext {
        serde_json::from_slice(&self.invoke_request.client_context).unwrap_or_default()
    }
}
