//! Synthetic HTTP request construction

use base64::{engine::general_purpose, Engine};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, Uri};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::event::ProxyRequest;
use crate::invoke::InvocationMetadata;

/// Characters that may not appear literally in a URI path. `%` is left alone
/// so already escaped paths pass through unchanged.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^');

/// Execution context of one request.
///
/// Cancellation is cooperative: the context reports itself cancelled once
/// the deadline has passed, but nothing interrupts a handler that ignores it.
///
/// An invocation deadline of zero means none was given: such a context has
/// no deadline and is never cancelled.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<DateTime<Utc>>,
    invocation: Option<Arc<InvocationMetadata>>,
}

impl Context {
    pub fn new(deadline: Option<DateTime<Utc>>) -> Self {
        Self {
            deadline,
            invocation: None,
        }
    }

    pub fn with_invocation(mut self, invocation: Arc<InvocationMetadata>) -> Self {
        self.invocation = Some(invocation);
        self
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Time left until the deadline, `None` without a deadline.
    pub fn remaining(&self) -> Option<Duration> {
        let deadline = self.deadline?;
        Some((deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }

    pub fn is_cancelled(&self) -> bool {
        self.deadline.is_some_and(|deadline| Utc::now() >= deadline)
    }

    /// Lambda invocation details, when the request came from an invocation.
    pub fn invocation(&self) -> Option<&InvocationMetadata> {
        self.invocation.as_deref()
    }
}

/// Why a synthesized request could not be represented faithfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Malformed {
    Method(String),
    Uri(String),
    Header(String),
    Body(String),
}

impl std::fmt::Display for Malformed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Method(m) => write!(f, "invalid method {:?}", m),
            Self::Uri(u) => write!(f, "invalid request target {:?}", u),
            Self::Header(h) => write!(f, "invalid header {:?}", h),
            Self::Body(e) => write!(f, "invalid base64 body: {}", e),
        }
    }
}

/// HTTP request handed to a [`Handler`](crate::Handler).
///
/// When [`malformed`](Request::malformed) is set, the offending part holds a
/// placeholder (`GET`, `/`, a dropped header or an empty body).
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    context: Context,
    malformed: Option<Malformed>,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            context: Context::default(),
            malformed: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Decoded query parameters.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        form_urlencoded::parse(self.query().unwrap_or_default().as_bytes())
            .into_owned()
            .collect()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn host(&self) -> Option<&str> {
        self.headers
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn malformed(&self) -> Option<&Malformed> {
        self.malformed.as_ref()
    }
}

/// Build the request target: path plus query parameters sorted by key.
pub fn request_target(path: &str, query: &std::collections::HashMap<String, String>) -> String {
    let path = if path.is_empty() { "/" } else { path };
    let mut target: String = utf8_percent_encode(path, PATH).collect();

    if !query.is_empty() {
        let sorted: BTreeMap<&String, &String> = query.iter().collect();
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(sorted)
            .finish();
        target.push('?');
        target.push_str(&encoded);
    }
    target
}

/// Construct the synthetic request for a decoded proxy event.
///
/// Never fails: anything that cannot be represented is reported through
/// [`Request::malformed`] so the handler decides how to answer.
pub fn synthesize(event: &ProxyRequest, context: Context) -> Request {
    let mut malformed = None;

    let method = if event.http_method.is_empty() {
        Method::GET
    } else {
        Method::from_bytes(event.http_method.as_bytes()).unwrap_or_else(|_| {
            malformed.get_or_insert(Malformed::Method(event.http_method.clone()));
            Method::GET
        })
    };

    let target = request_target(&event.path, &event.query_string_parameters);
    let uri = target.parse::<Uri>().unwrap_or_else(|_| {
        malformed.get_or_insert(Malformed::Uri(target.clone()));
        Uri::from_static("/")
    });

    let mut headers = HeaderMap::with_capacity(event.headers.len());
    for (name, value) in &event.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => {
                malformed.get_or_insert(Malformed::Header(name.clone()));
            }
        }
    }

    let body = if event.is_base64_encoded {
        general_purpose::STANDARD
            .decode(&event.body)
            .map(Bytes::from)
            .unwrap_or_else(|e| {
                malformed.get_or_insert(Malformed::Body(e.to_string()));
                Bytes::new()
            })
    } else {
        Bytes::from(event.body.clone())
    };

    Request {
        method,
        uri,
        headers,
        body,
        context,
        malformed,
    }
}
