//! The per-request engine: middleware chain, lazy routing, panic recovery.
//!
//! # The chain
//!
//! For `GET /admin/tickets/7` routed to a handler on `tickets`:
//!
//! ```text
//! root mw… ─▶ [resolve path] ─▶ admin mw… ─▶ tickets mw… ─▶ handler
//! ```
//!
//! Root middleware runs before the path is resolved, so it can rewrite the
//! request or answer it outright. Each call to [`Next::run`] performs exactly
//! one step; a middleware that never calls it ends the chain there.
//!
//! # Panics
//!
//! The whole chain runs inside one `catch_unwind`. On a panic the nearest
//! router with an error handler is chosen, starting from the router that owns
//! the matched route (or the root, if routing had not happened yet) and
//! walking towards the root.

use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use http::header::{ACCESS_CONTROL_ALLOW_METHODS, CONTENT_TYPE};
use http::{HeaderValue, StatusCode};
use tracing::debug;

use crate::context::{self, ErasedContext};
use crate::handler::BoxedMiddleware;
use crate::method::Method;
use crate::panic::{self as panics, Panic, PanicReport};
use crate::request::Request;
use crate::response::ResponseWriter;
use crate::router::{App, RouteId, RouterId, ROOT};

/// Body written when no route matches and no not-found handler is set.
pub const DEFAULT_NOT_FOUND_BODY: &str = "Not Found";

/// Body written when a panic reaches no error handler.
pub const DEFAULT_PANIC_BODY: &str = "Application Error";

/// The continuation handed to middleware.
///
/// Calling [`run`](Next::run) advances the chain by one step: the next
/// middleware, or the route handler once all middleware has run. It may be
/// called more than once; after the handler has run it does nothing.
pub struct Next<'a> {
    dispatch: &'a mut dyn Step,
}

impl Next<'_> {
    pub fn run(&mut self, rw: &mut ResponseWriter, req: &mut Request) {
        self.dispatch.step(rw, req);
    }
}

trait Step {
    fn step(&mut self, rw: &mut ResponseWriter, req: &mut Request);
}

/// What the resolved request ends in.
pub(crate) enum Target {
    Route(RouteId),
    /// No OPTIONS route, but these methods have one for the path.
    Options(Vec<Method>),
}

/// Outcome of resolving a method and path against the route table.
pub(crate) struct Resolution<'app> {
    pub(crate) router: RouterId,
    pub(crate) path: &'app str,
    pub(crate) params: crate::tree::Params,
    pub(crate) target: Target,
}

/// Cursor state for one request.
pub(crate) struct Dispatch<'app> {
    app: &'app App,
    // Routers from the root to the target, once routed; just the root before.
    chain: &'app [RouterId],
    // One per entry in `chain` (same instance for same-typed neighbours).
    contexts: Vec<ErasedContext>,
    target: Option<Target>,
    router_index: usize,
    middleware_index: usize,
}

impl<'app> Dispatch<'app> {
    pub(crate) fn new(app: &'app App) -> Self {
        Self {
            app,
            chain: app.router(ROOT).lineage(),
            contexts: Vec::with_capacity(app.max_depth()),
            target: None,
            router_index: 0,
            middleware_index: 0,
        }
    }

    /// Runs the full chain for one request, recovering from any panic.
    pub(crate) fn run(mut self, rw: &mut ResponseWriter, req: &mut Request) {
        panics::install_hook();
        panics::clear_trace();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.contexts.push(self.app.router(ROOT).context().instantiate());
            self.step(rw, req);
        }));

        if let Err(payload) = outcome {
            self.recover(rw, req, Panic::new(payload));
        }
    }

    fn invoke(&mut self, middleware: &BoxedMiddleware, rw: &mut ResponseWriter, req: &mut Request) {
        let ctx = Rc::clone(&self.contexts[self.router_index]);
        middleware.call(&*ctx, rw, req, Next { dispatch: self });
    }

    /// Resolves the route and builds the context chain. Returns `false` if
    /// the request was answered as not found.
    fn route(&mut self, rw: &mut ResponseWriter, req: &mut Request) -> bool {
        let app = self.app;
        let Some(resolution) = app.resolve(req.method(), req.path()) else {
            debug!(method = %req.method(), path = req.path(), "no route");
            match app.not_found_handler() {
                Some(handler) => handler.call(&*self.contexts[0], rw, req),
                None => write_default(rw, StatusCode::NOT_FOUND, DEFAULT_NOT_FOUND_BODY),
            }
            return false;
        };

        debug!(method = %req.method(), path = req.path(), route = resolution.path, "routed");

        let router = app.router(resolution.router);
        context::build_chain(router.lineage_contexts(), &mut self.contexts);
        req.set_route(resolution.path, resolution.params);
        self.chain = router.lineage();
        self.target = Some(resolution.target);
        true
    }

    /// Invokes the route handler (or the options responder). Always the last
    /// step.
    fn finish(&mut self, rw: &mut ResponseWriter, req: &mut Request) {
        let app = self.app;
        match &self.target {
            Some(Target::Route(id)) => {
                let ctx = &self.contexts[self.contexts.len() - 1];
                app.route(*id).handler().call(&**ctx, rw, req);
            }
            Some(Target::Options(methods)) => match app.options_handler() {
                Some(handler) => handler.call(&*self.contexts[0], rw, req, methods),
                None => allow_methods(rw, methods),
            },
            None => {}
        }
    }

    fn recover(&mut self, rw: &mut ResponseWriter, req: &mut Request, panic: Panic) {
        let app = self.app;
        let backtrace = panics::take_trace();

        // Before routing the chain is just the root.
        let mut level = if self.target.is_some() { self.chain.len() - 1 } else { 0 };
        while app.router(self.chain[level]).error_handler().is_none() && level > 0 {
            level -= 1;
        }

        let router = app.router(self.chain[level]);
        match (router.error_handler(), self.contexts.get(level)) {
            (Some(handler), Some(ctx)) => {
                assert!(
                    context::type_of(ctx) == router.context().id(),
                    "context chain out of sync: router expects `{}`",
                    router.context().name(),
                );

                rw.set_implicit_status(StatusCode::INTERNAL_SERVER_ERROR);
                let handled = panic::catch_unwind(AssertUnwindSafe(|| {
                    handler.call(&**ctx, rw, req, &panic);
                }));
                if let Err(payload) = handled {
                    write_default(rw, StatusCode::INTERNAL_SERVER_ERROR, DEFAULT_PANIC_BODY);
                    self.report(req, &Panic::new(payload), panics::take_trace());
                }
            }
            _ => write_default(rw, StatusCode::INTERNAL_SERVER_ERROR, DEFAULT_PANIC_BODY),
        }

        self.report(req, &panic, backtrace);
    }

    fn report(&self, req: &Request, panic: &Panic, backtrace: String) {
        self.app.panic_reporter().report(&PanicReport {
            source: format!("{} {}", req.method(), req.path()),
            message: panic.to_string(),
            backtrace,
        });
    }
}

impl Step for Dispatch<'_> {
    fn step(&mut self, rw: &mut ResponseWriter, req: &mut Request) {
        let app = self.app;
        let Some(&current) = self.chain.get(self.router_index) else {
            return;
        };

        if let Some(middleware) = app.router(current).middleware().get(self.middleware_index) {
            self.middleware_index += 1;
            return self.invoke(middleware, rw, req);
        }

        if self.router_index == 0 && self.target.is_none() && !self.route(rw, req) {
            self.router_index = self.chain.len();
            return;
        }

        // Skip routers without middleware.
        self.router_index += 1;
        while let Some(&id) = self.chain.get(self.router_index) {
            if let Some(middleware) = app.router(id).middleware().first() {
                self.middleware_index = 1;
                return self.invoke(middleware, rw, req);
            }
            self.router_index += 1;
        }

        self.finish(rw, req);
    }
}

fn write_default(rw: &mut ResponseWriter, status: StatusCode, body: &str) {
    rw.headers_mut()
        .entry(CONTENT_TYPE)
        .or_insert(HeaderValue::from_static("text/plain; charset=utf-8"));
    rw.write_header(status);
    rw.write_body(body.as_bytes());
}

fn allow_methods(rw: &mut ResponseWriter, methods: &[Method]) {
    let joined = methods.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
    if let Ok(value) = HeaderValue::from_str(&joined) {
        rw.headers_mut().insert(ACCESS_CONTROL_ALLOW_METHODS, value);
    }
}
