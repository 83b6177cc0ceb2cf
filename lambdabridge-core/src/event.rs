//! API Gateway proxy integration event
//!
//! `ProxyRequest` mirrors the REST API (payload format 1.0) event that API
//! Gateway sends to a Lambda proxy integration. Only the single-valued maps
//! are read; `multiValueHeaders` and friends are ignored.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::error::DecodeError;

/// Inbound proxy event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub resource: String,
    #[serde(default, deserialize_with = "nullable")]
    pub path: String,
    #[serde(default, deserialize_with = "nullable")]
    pub http_method: String,
    #[serde(default, deserialize_with = "nullable")]
    pub headers: HashMap<String, String>,
    #[serde(default, deserialize_with = "nullable")]
    pub query_string_parameters: HashMap<String, String>,
    #[serde(default, deserialize_with = "nullable")]
    pub path_parameters: HashMap<String, String>,
    #[serde(default, deserialize_with = "nullable")]
    pub stage_variables: HashMap<String, String>,
    #[serde(default, deserialize_with = "nullable")]
    pub request_context: ProxyRequestContext,
    #[serde(default, deserialize_with = "nullable")]
    pub body: String,
    #[serde(default, deserialize_with = "nullable")]
    pub is_base64_encoded: bool,
}

/// `requestContext` of a proxy event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequestContext {
    #[serde(default, deserialize_with = "nullable")]
    pub stage: String,
    #[serde(default, deserialize_with = "nullable")]
    pub request_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub api_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub account_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub resource_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub resource_path: String,
    #[serde(default, deserialize_with = "nullable")]
    pub http_method: String,
    #[serde(default, deserialize_with = "nullable")]
    pub identity: RequestIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorizer: Option<serde_json::Value>,
}

/// Caller identity reported by API Gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestIdentity {
    #[serde(default, deserialize_with = "nullable")]
    pub source_ip: String,
    #[serde(default, deserialize_with = "nullable")]
    pub user_agent: String,
}

impl ProxyRequest {
    /// Parse an invocation payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let value: serde_json::Value = serde_json::from_slice(payload)?;
        let kind = match &value {
            serde_json::Value::Object(_) => None,
            serde_json::Value::Null => Some("null"),
            serde_json::Value::Bool(_) => Some("boolean"),
            serde_json::Value::Number(_) => Some("number"),
            serde_json::Value::String(_) => Some("string"),
            serde_json::Value::Array(_) => Some("array"),
        };
        if let Some(kind) = kind {
            return Err(DecodeError::NotAnObject(kind));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Value of the inbound `Host` header, matched case-insensitively.
    pub fn host(&self) -> Option<&str> {
        self.header("host")
    }

    /// Look up an inbound header case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn stage(&self) -> &str {
        &self.request_context.stage
    }
}

/// API Gateway sends `null` rather than omitting empty fields.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
