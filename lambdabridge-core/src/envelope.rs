//! API Gateway proxy response envelope

use base64::{engine::general_purpose, Engine};
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::response::CapturedResponse;

/// Outbound proxy response.
///
/// `headers` holds one value per name. When a handler sets a header more
/// than once only the first value survives there; `multi_value_headers`
/// carries the full lists when enabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_value_headers: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl ProxyResponse {
    /// Collapse a finished capture into an envelope.
    pub fn from_captured(captured: CapturedResponse, multi_value: bool) -> Self {
        let status_code = captured.status_or_default().as_u16();
        let mut headers = BTreeMap::new();
        let mut multi = BTreeMap::new();

        for name in captured.headers.keys() {
            let canonical = canonical_header_name(name);
            let values: Vec<String> = captured
                .headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            if let Some(first) = values.first() {
                headers.insert(canonical.clone(), first.clone());
            }
            if multi_value && values.len() > 1 {
                multi.insert(canonical, values);
            }
        }

        Self {
            status_code,
            headers,
            multi_value_headers: (!multi.is_empty()).then_some(multi),
            body: captured.body,
            is_base64_encoded: true,
        }
    }

    /// Fixed response for a handler that panicked.
    pub fn panic(message: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "text/plain".to_string());
        Self {
            status_code: 500,
            headers,
            multi_value_headers: None,
            body: general_purpose::STANDARD.encode(message),
            is_base64_encoded: true,
        }
    }

    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    /// Raw body bytes, decoding base64 when flagged.
    pub fn body_bytes(&self) -> Result<Bytes, base64::DecodeError> {
        if self.is_base64_encoded {
            general_purpose::STANDARD.decode(&self.body).map(Bytes::from)
        } else {
            Ok(Bytes::from(self.body.clone()))
        }
    }

    /// Header value looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// MIME style canonical form: `x-amzn-remapped-via` becomes
/// `X-Amzn-Remapped-Via`.
pub fn canonical_header_name(name: &HeaderName) -> String {
    let mut upper = true;
    name.as_str()
        .chars()
        .map(|c| {
            let out = if upper { c.to_ascii_uppercase() } else { c };
            upper = c == '-';
            out
        })
        .collect()
}

/// Headers of an envelope as an `http` header map, preferring the multi
/// valued lists when present.
pub fn envelope_headers(response: &ProxyResponse) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in &response.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            http::HeaderValue::from_str(value),
        ) {
            map.insert(name, value);
        }
    }
    for (name, values) in response.multi_value_headers.iter().flatten() {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        map.remove(&name);
        for value in values {
            if let Ok(value) = http::HeaderValue::from_str(value) {
                map.append(name.clone(), value);
            }
        }
    }
    map
}
