//! Bridge configuration
//!
//! Built once before serving and shared read-only by every invocation.

use http::header::HeaderName;
use serde::Deserialize;

use crate::mangle::{deserialize_names, HeaderRemapper};
use crate::redirect::DEFAULT_DOMAIN_SUFFIX;

/// Settings of an [`Executor`](crate::Executor).
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Prefix root-relative redirects with the stage when served from the
    /// default API Gateway domain.
    #[serde(default = "default_true")]
    pub fix_relative_redirect: bool,

    /// Host suffix that identifies the default API Gateway domain.
    #[serde(default = "default_domain_suffix")]
    pub domain_suffix: String,

    /// Restore `X-Amzn-Remapped-*` request headers to their standard names.
    #[serde(default)]
    pub demangle_input_headers: bool,

    /// Duplicate remappable response headers as `X-Amzn-Remapped-*`.
    #[serde(default)]
    pub mangle_output_headers: bool,

    /// Body of the 500 response sent when a handler panics.
    #[serde(default = "default_panic_message")]
    pub panic_message: String,

    /// Content-Type used when the handler sets none.
    #[serde(default = "default_content_type")]
    pub default_content_type: String,

    /// Also emit `multiValueHeaders` for headers with several values.
    #[serde(default)]
    pub multi_value_headers: bool,

    #[serde(default = "default_mangle", deserialize_with = "deserialize_names")]
    pub mangle: Vec<HeaderName>,

    #[serde(default = "default_demangle", deserialize_with = "deserialize_names")]
    pub demangle: Vec<HeaderName>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            fix_relative_redirect: true,
            domain_suffix: default_domain_suffix(),
            demangle_input_headers: false,
            mangle_output_headers: false,
            panic_message: default_panic_message(),
            default_content_type: default_content_type(),
            multi_value_headers: false,
            mangle: default_mangle(),
            demangle: default_demangle(),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fix_relative_redirect(mut self, enabled: bool) -> Self {
        self.fix_relative_redirect = enabled;
        self
    }

    pub fn demangle_input_headers(mut self, enabled: bool) -> Self {
        self.demangle_input_headers = enabled;
        self
    }

    pub fn mangle_output_headers(mut self, enabled: bool) -> Self {
        self.mangle_output_headers = enabled;
        self
    }

    pub fn multi_value_headers(mut self, enabled: bool) -> Self {
        self.multi_value_headers = enabled;
        self
    }

    pub fn panic_message(mut self, message: impl Into<String>) -> Self {
        self.panic_message = message.into();
        self
    }

    pub fn domain_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.domain_suffix = suffix.into();
        self
    }

    /// Replace both remap tables.
    pub fn remap_tables(mut self, remapper: &HeaderRemapper) -> Self {
        self.mangle = remapper.mangle_table().to_vec();
        self.demangle = remapper.demangle_table().to_vec();
        self
    }

    pub fn remapper(&self) -> HeaderRemapper {
        HeaderRemapper::with_tables(self.mangle.clone(), self.demangle.clone())
    }
}

fn default_true() -> bool {
    true
}

fn default_domain_suffix() -> String {
    DEFAULT_DOMAIN_SUFFIX.to_string()
}

fn default_panic_message() -> String {
    "Function panic".to_string()
}

fn default_content_type() -> String {
    "text/plain".to_string()
}

fn default_mangle() -> Vec<HeaderName> {
    HeaderRemapper::default().mangle_table().to_vec()
}

fn default_demangle() -> Vec<HeaderName> {
    HeaderRemapper::default().demangle_table().to_vec()
}
