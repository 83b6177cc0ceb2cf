//! Relative redirect correction
//!
//! Without a custom domain, API Gateway URLs carry the stage as the first
//! path segment (`https://{api}.execute-api.{region}.amazonaws.com/prod/...`)
//! but the stage is stripped from the path the function sees. A handler
//! redirecting to `/error` would send the client outside the stage, so the
//! stage is put back in front of root-relative `Location` values.

use http::header::{HeaderMap, HeaderValue, LOCATION};
use http::StatusCode;
use tracing::debug;

use crate::event::ProxyRequest;

/// Host suffix of API Gateway endpoints without a custom domain.
pub const DEFAULT_DOMAIN_SUFFIX: &str = ".amazonaws.com";

/// Prefix a root-relative `Location` with the stage.
///
/// An empty stage is never prefixed, so `/error` cannot turn into the
/// protocol-relative `//error`.
///
/// Returns whether the header was rewritten.
pub fn fix_relative_redirect(
    headers: &mut HeaderMap,
    status: StatusCode,
    event: &ProxyRequest,
    domain_suffix: &str,
) -> bool {
    if !(301..400).contains(&status.as_u16()) {
        return false;
    }

    if !event.host().is_some_and(|host| host.ends_with(domain_suffix)) {
        return false;
    }

    let stage = event.stage();
    if stage.is_empty() {
        return false;
    }

    let Some(location) = headers.get(LOCATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    if !location.starts_with('/') {
        return false;
    }

    let fixed = format!("/{}{}", stage, location);
    match HeaderValue::from_str(&fixed) {
        Ok(value) => {
            debug!(from = %location, to = %fixed, "Rewrote relative redirect");
            headers.insert(LOCATION, value);
            true
        }
        Err(_) => false,
    }
}
