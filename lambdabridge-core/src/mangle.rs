//! Header remapping between standard names and `X-Amzn-Remapped-*` aliases
//!
//! API Gateway renames some reserved headers when they travel through a
//! proxy integration, e.g. a client supplied `Date` arrives as
//! `X-Amzn-Remapped-Date`. [`HeaderRemapper::demangle`] restores the
//! standard names on the way in and [`HeaderRemapper::mangle`] adds the
//! aliases on the way out.

use http::header::{HeaderMap, HeaderName};
use serde::{Deserialize, Deserializer};

/// Prefix API Gateway applies to remapped headers.
pub const REMAPPED_PREFIX: &str = "X-Amzn-Remapped-";

/// Standard headers API Gateway may expect as `X-Amzn-Remapped-*`.
pub const DEFAULT_MANGLE: [&str; 27] = [
    "Accept",
    "Accept-Charset",
    "Accept-Encoding",
    "Age",
    "Authorization",
    "Connection",
    "Content-Encoding",
    "Content-Length",
    "Content-MD5",
    "Content-Type",
    "Date",
    "Expect",
    "Host",
    "Max-Forwards",
    "Pragma",
    "Proxy-Authenticate",
    "Range",
    "Referer",
    "Server",
    "TE",
    "Trailer",
    "Transfer-Encoding",
    "Upgrade",
    "User-Agent",
    "Via",
    "WWW-Authenticate",
    "Warn",
];

/// Symmetric remap tables.
///
/// Both tables can be narrowed to the headers of concern before serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRemapper {
    mangle: Vec<HeaderName>,
    demangle: Vec<HeaderName>,
}

impl Default for HeaderRemapper {
    fn default() -> Self {
        let mangle: Vec<HeaderName> = DEFAULT_MANGLE
            .iter()
            .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
            .collect();
        let demangle = mangle.iter().filter_map(prefixed).collect();
        Self { mangle, demangle }
    }
}

impl HeaderRemapper {
    /// Build a remapper from explicit tables.
    ///
    /// `demangle` entries are full `X-Amzn-Remapped-*` names; entries without
    /// the prefix are kept but never match anything.
    pub fn with_tables(mangle: Vec<HeaderName>, demangle: Vec<HeaderName>) -> Self {
        Self { mangle, demangle }
    }

    /// Remapper whose demangle table mirrors the given mangle table.
    pub fn symmetric(mangle: Vec<HeaderName>) -> Self {
        let demangle = mangle.iter().filter_map(prefixed).collect();
        Self { mangle, demangle }
    }

    pub fn mangle_table(&self) -> &[HeaderName] {
        &self.mangle
    }

    pub fn demangle_table(&self) -> &[HeaderName] {
        &self.demangle
    }

    /// Copy every remappable header into its `X-Amzn-Remapped-*` alias
    /// unless the alias already holds a non-empty value.
    pub fn mangle(&self, headers: &mut HeaderMap) {
        let present: Vec<HeaderName> = headers
            .keys()
            .filter(|name| self.mangle.contains(name))
            .cloned()
            .collect();

        for name in present {
            let Some(alias) = prefixed(&name) else {
                continue;
            };
            if !is_empty(headers, &alias) {
                continue;
            }
            if let Some(value) = headers.get(&name).cloned() {
                headers.insert(alias, value);
            }
        }
    }

    /// Copy every non-empty `X-Amzn-Remapped-*` header down to its standard
    /// name unless the standard header already holds a non-empty value.
    pub fn demangle(&self, headers: &mut HeaderMap) {
        for alias in &self.demangle {
            let Some(value) = headers.get(alias) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            let Some(name) = unprefixed(alias) else {
                continue;
            };
            if is_empty(headers, &name) {
                let value = value.clone();
                headers.insert(name, value);
            }
        }
    }
}

fn is_empty(headers: &HeaderMap, name: &HeaderName) -> bool {
    headers.get(name).map_or(true, |v| v.is_empty())
}

fn prefixed(name: &HeaderName) -> Option<HeaderName> {
    HeaderName::from_bytes(format!("{REMAPPED_PREFIX}{name}").as_bytes()).ok()
}

fn unprefixed(alias: &HeaderName) -> Option<HeaderName> {
    // HeaderName is always lowercase
    let stripped = alias
        .as_str()
        .strip_prefix(REMAPPED_PREFIX.to_ascii_lowercase().as_str())?;
    HeaderName::from_bytes(stripped.as_bytes()).ok()
}

/// Deserialize a remap table from a list of header name strings.
pub(crate) fn deserialize_names<'de, D>(deserializer: D) -> Result<Vec<HeaderName>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    names
        .into_iter()
        .map(|name| HeaderName::from_bytes(name.as_bytes()).map_err(serde::de::Error::custom))
        .collect()
}
