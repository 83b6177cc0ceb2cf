//! Invocation execution
//!
//! One call to [`Executor::invoke`] walks a single invocation through
//! decoding, request synthesis, the handler call, response capture and
//! envelope encoding. The handler call is the only place a panic is caught.

use http::header::{HeaderValue, CONTENT_TYPE};
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};
use tracing::{debug, error, warn};

use crate::config::BridgeConfig;
use crate::envelope::ProxyResponse;
use crate::error::InvokeError;
use crate::event::ProxyRequest;
use crate::handler::Handler;
use crate::invoke::{InvocationMetadata, InvokeRequest, InvokeResponse, Pong};
use crate::mangle::HeaderRemapper;
use crate::redirect::fix_relative_redirect;
use crate::request::{synthesize, Context, Request};
use crate::response::{CapturedResponse, ResponseCapture};

/// Stages of one invocation, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Decoding,
    Synthesizing,
    Executing,
    Capturing,
    Finalizing,
    Faulted,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decoding => "decoding",
            Self::Synthesizing => "synthesizing",
            Self::Executing => "executing",
            Self::Capturing => "capturing",
            Self::Finalizing => "finalizing",
            Self::Faulted => "faulted",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs invocations against a handler.
///
/// Holds no per-invocation state, so one executor can serve invocations
/// from several threads at once.
pub struct Executor<H> {
    handler: H,
    config: Arc<BridgeConfig>,
    remapper: HeaderRemapper,
    default_content_type: HeaderValue,
}

impl<H: Handler> Executor<H> {
    pub fn new(handler: H) -> Self {
        Self::with_config(handler, BridgeConfig::default())
    }

    pub fn with_config(handler: H, config: impl Into<Arc<BridgeConfig>>) -> Self {
        let config = config.into();
        let remapper = config.remapper();
        let default_content_type = HeaderValue::from_str(&config.default_content_type)
            .unwrap_or_else(|_| {
                warn!(
                    content_type = %config.default_content_type,
                    "Invalid default content type, using text/plain"
                );
                HeaderValue::from_static("text/plain")
            });

        Self {
            handler,
            config,
            remapper,
            default_content_type,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Liveness check.
    pub fn ping(&self) -> Pong {
        Pong
    }

    /// Handle one invocation.
    ///
    /// Fails only when the payload is not a proxy event or the envelope
    /// cannot be encoded. A panicking handler yields a 500 envelope and
    /// `Ok`.
    pub fn invoke(&self, invocation: &InvokeRequest) -> Result<InvokeResponse, InvokeError> {
        let envelope = self.respond(invocation)?;

        debug!(
            request_id = %invocation.request_id,
            phase = %Phase::Finalizing,
            status = envelope.status_code,
            "Encoding envelope"
        );
        let payload = envelope.encode().map_err(InvokeError::Encode)?;
        Ok(InvokeResponse { payload })
    }

    /// Handle one invocation, stopping short of serializing the envelope.
    pub fn respond(&self, invocation: &InvokeRequest) -> Result<ProxyResponse, InvokeError> {
        debug!(request_id = %invocation.request_id, phase = %Phase::Decoding, "Invocation started");
        let event = ProxyRequest::decode(&invocation.payload)?;

        debug!(
            request_id = %invocation.request_id,
            phase = %Phase::Synthesizing,
            method = %event.http_method,
            path = %event.path,
            "Synthesizing request"
        );
        let request = self.synthesize(invocation, &event);

        let envelope = match self.execute(&request) {
            Ok(capture) => {
                debug!(request_id = %invocation.request_id, phase = %Phase::Capturing, "Handler returned");
                let captured = capture.finish()?;
                self.envelope(captured, &event)
            }
            Err(fault) => {
                error!(
                    request_id = %invocation.request_id,
                    phase = %Phase::Faulted,
                    panic = %fault.message,
                    location = fault.location.as_deref().unwrap_or("unknown"),
                    "Handler panicked\n{}",
                    fault.backtrace
                );
                ProxyResponse::panic(&self.config.panic_message)
            }
        };

        Ok(envelope)
    }

    fn synthesize(&self, invocation: &InvokeRequest, event: &ProxyRequest) -> Request {
        let metadata = InvocationMetadata::new(invocation.clone(), event.clone());
        let context =
            Context::new(invocation.deadline.to_datetime()).with_invocation(Arc::new(metadata));

        let mut request = synthesize(event, context);
        if self.config.demangle_input_headers {
            self.remapper.demangle(request.headers_mut());
        }
        request
    }

    /// The fault boundary: run the handler, catching any panic.
    fn execute(&self, request: &Request) -> Result<ResponseCapture, Fault> {
        debug!(phase = %Phase::Executing, "Calling handler");
        install_panic_hook();

        let mut capture = ResponseCapture::new();
        let outer = IN_BOUNDARY.with(|flag| flag.replace(true));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.handler.serve(request, &mut capture);
        }));
        IN_BOUNDARY.with(|flag| flag.set(outer));
        let site = PANIC_SITE.with(|slot| slot.borrow_mut().take());

        match outcome {
            Ok(()) => Ok(capture),
            Err(payload) => {
                let (location, backtrace) = match site {
                    Some(site) => (site.location, site.backtrace),
                    None => (None, Backtrace::force_capture()),
                };
                Err(Fault {
                    message: panic_message(payload.as_ref()),
                    location,
                    backtrace,
                })
            }
        }
    }

    fn envelope(&self, mut captured: CapturedResponse, event: &ProxyRequest) -> ProxyResponse {
        let status = captured.status_or_default();
        captured.status = Some(status);

        if !captured.headers.contains_key(CONTENT_TYPE) {
            captured
                .headers
                .insert(CONTENT_TYPE, self.default_content_type.clone());
        }

        if self.config.mangle_output_headers {
            self.remapper.mangle(&mut captured.headers);
        }

        if self.config.fix_relative_redirect {
            fix_relative_redirect(
                &mut captured.headers,
                status,
                event,
                &self.config.domain_suffix,
            );
        }

        ProxyResponse::from_captured(captured, self.config.multi_value_headers)
    }
}

struct Fault {
    message: String,
    location: Option<String>,
    backtrace: Backtrace,
}

/// Where a handler panicked, recorded by the panic hook before unwinding.
struct PanicSite {
    location: Option<String>,
    backtrace: Backtrace,
}

thread_local! {
    static IN_BOUNDARY: Cell<bool> = const { Cell::new(false) };
    static PANIC_SITE: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chain a hook that records the panicking stack while a handler runs.
///
/// Panics outside a fault boundary go to the previous hook unchanged.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if IN_BOUNDARY.with(Cell::get) {
                let site = PanicSite {
                    location: info.location().map(ToString::to_string),
                    backtrace: Backtrace::force_capture(),
                };
                PANIC_SITE.with(|slot| *slot.borrow_mut() = Some(site));
            } else {
                previous(info);
            }
        }));
    });
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
