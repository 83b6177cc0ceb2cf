//! Handler abstraction and a small path router

use http::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use http::{Method, StatusCode};
use std::io::Write;
use std::sync::Arc;
use tracing::warn;

use crate::request::Request;
use crate::response::ResponseCapture;

/// Something that answers HTTP requests.
///
/// Handlers run synchronously on the invoking thread. A panic inside
/// `serve` is turned into a 500 response by the executor.
pub trait Handler: Send + Sync {
    fn serve(&self, req: &Request, res: &mut ResponseCapture);
}

/// Handler backed by a closure, see [`handler_fn`].
#[derive(Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap a closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&Request, &mut ResponseCapture) + Send + Sync,
{
    HandlerFn { f }
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&Request, &mut ResponseCapture) + Send + Sync,
{
    fn serve(&self, req: &Request, res: &mut ResponseCapture) {
        (self.f)(req, res)
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve(&self, req: &Request, res: &mut ResponseCapture) {
        (**self).serve(req, res)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn serve(&self, req: &Request, res: &mut ResponseCapture) {
        (**self).serve(req, res)
    }
}

struct Route {
    pattern: String,
    method: Option<Method>,
    handler: Box<dyn Handler>,
}

impl Route {
    /// Patterns ending in `/` match the whole subtree, others match exactly.
    fn matches(&self, path: &str) -> bool {
        if self.pattern.ends_with('/') {
            path.starts_with(&self.pattern)
        } else {
            path == self.pattern
        }
    }
}

/// Dispatches by path, most specific pattern first.
///
/// Unmatched paths get `404 page not found`; requests that could not be
/// synthesized faithfully get `400 Bad Request` without reaching a route.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    fallback: Option<Box<dyn Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route any method on `pattern` to `handler`.
    pub fn route(mut self, pattern: &str, handler: impl Handler + 'static) -> Self {
        self.routes.push(Route {
            pattern: pattern.to_string(),
            method: None,
            handler: Box::new(handler),
        });
        self
    }

    /// Route one method on `pattern` to `handler`. Other methods get 405.
    pub fn route_method(mut self, method: Method, pattern: &str, handler: impl Handler + 'static) -> Self {
        self.routes.push(Route {
            pattern: pattern.to_string(),
            method: Some(method),
            handler: Box::new(handler),
        });
        self
    }

    /// Handler for paths no route matches.
    pub fn fallback(mut self, handler: impl Handler + 'static) -> Self {
        self.fallback = Some(Box::new(handler));
        self
    }
}

impl Handler for Router {
    fn serve(&self, req: &Request, res: &mut ResponseCapture) {
        if let Some(reason) = req.malformed() {
            warn!(reason = %reason, "Rejecting malformed request");
            error(res, &format!("400 Bad Request: {}", reason), StatusCode::BAD_REQUEST);
            return;
        }

        let path = req.path();
        let mut candidates: Vec<&Route> = self.routes.iter().filter(|r| r.matches(path)).collect();
        if candidates.is_empty() {
            match &self.fallback {
                Some(fallback) => fallback.serve(req, res),
                None => not_found(res),
            }
            return;
        }

        let longest = candidates.iter().map(|r| r.pattern.len()).max().unwrap_or(0);
        candidates.retain(|r| r.pattern.len() == longest);

        let route = candidates
            .iter()
            .find(|r| r.method.as_ref() == Some(req.method()))
            .or_else(|| candidates.iter().find(|r| r.method.is_none()));

        match route {
            Some(route) => route.handler.serve(req, res),
            None => error(
                res,
                StatusCode::METHOD_NOT_ALLOWED
                    .canonical_reason()
                    .unwrap_or("Method Not Allowed"),
                StatusCode::METHOD_NOT_ALLOWED,
            ),
        }
    }
}

/// Reply with a plain text error body.
pub fn error(res: &mut ResponseCapture, message: &str, status: StatusCode) {
    res.set_status(status);
    let _ = writeln!(res, "{}", message);
}

/// Reply `404 page not found`.
pub fn not_found(res: &mut ResponseCapture) {
    error(res, "404 page not found", StatusCode::NOT_FOUND);
}

/// Reply with a redirect to `location`, resolved against the request path
/// when it is relative (`../error` from `/a/b` becomes `/error`).
pub fn redirect(req: &Request, res: &mut ResponseCapture, location: &str, status: StatusCode) {
    let target = resolve_location(req.path(), location);
    let Ok(value) = HeaderValue::from_str(&target) else {
        error(res, "invalid redirect target", StatusCode::INTERNAL_SERVER_ERROR);
        return;
    };

    res.headers_mut().insert(LOCATION, value);
    let is_get = req.method() == Method::GET || req.method() == Method::HEAD;
    if is_get && !res.headers().contains_key(CONTENT_TYPE) {
        res.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    }
    res.set_status(status);
    if req.method() == Method::GET {
        let reason = status.canonical_reason().unwrap_or("Redirect");
        let _ = writeln!(res, "<a href=\"{}\">{}</a>.", html_escape(&target), reason);
    }
}

fn resolve_location(path: &str, location: &str) -> String {
    if location.contains("://") || location.starts_with("//") {
        return location.to_string();
    }
    let Ok(base) = url::Url::parse("http://localhost").and_then(|u| u.join(path)) else {
        return location.to_string();
    };
    match base.join(location) {
        Ok(resolved) => {
            let mut out = resolved.path().to_string();
            if let Some(query) = resolved.query() {
                out.push('?');
                out.push_str(query);
            }
            if let Some(fragment) = resolved.fragment() {
                out.push('#');
                out.push_str(fragment);
            }
            out
        }
        Err(_) => location.to_string(),
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&#34;")
        .replace('\'', "&#39;")
}
