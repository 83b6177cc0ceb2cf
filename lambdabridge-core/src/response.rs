//! Response capture
//!
//! `ResponseCapture` is the sink a handler writes its response into. The
//! body is base64 encoded while it is written, so the buffered form is
//! always the text that ends up in the envelope.
//!
//! Nothing reaches the client before the handler returns and the
//! connection cannot be taken over: an invocation answers with exactly one
//! complete envelope.

use base64::engine::general_purpose::{GeneralPurpose, STANDARD};
use base64::write::EncoderWriter;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use std::io::{self, Write};

/// Response sink handed to a handler.
pub struct ResponseCapture {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: EncoderWriter<'static, GeneralPurpose, Vec<u8>>,
    written: usize,
}

impl std::fmt::Debug for ResponseCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCapture")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

impl Default for ResponseCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCapture {
    pub fn new() -> Self {
        Self {
            status: None,
            headers: HeaderMap::new(),
            body: EncoderWriter::new(Vec::new(), &STANDARD),
            written: 0,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Response headers. Changes are honoured until the handler returns.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a single header value, replacing any previous values.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Set the status code. Calling it again replaces the previous code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// Status set so far, `None` if the handler never set one.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Number of raw (unencoded) body bytes written.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Close the body encoder and hand over what was captured.
    pub fn finish(mut self) -> io::Result<CapturedResponse> {
        let encoded = self.body.finish()?;
        let body = String::from_utf8(encoded)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        Ok(CapturedResponse {
            status: self.status,
            headers: self.headers,
            body,
        })
    }
}

impl Write for ResponseCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.body.write(buf)?;
        self.written += n;
        Ok(n)
    }

    /// Flushes into the internal buffer only; nothing reaches the client
    /// before the handler returns.
    fn flush(&mut self) -> io::Result<()> {
        self.body.flush()
    }
}

/// What a handler produced, with the body already base64 encoded.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: String,
}

impl CapturedResponse {
    /// Status with the 200 default applied.
    pub fn status_or_default(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }
}
