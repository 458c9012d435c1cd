//! Router tree construction and the frozen [`App`] it builds.
//!
//! Routers form a tree rooted at the one created with [`Router::new`]. Every
//! router has a path prefix (concatenated with its ancestors'), a context
//! type, an ordered middleware list, and optionally an error handler. All
//! routes, whichever router registers them, land in one trie per method, so
//! lookup cost does not depend on how deep the tree is.
//!
//! Registration faults (bad patterns, duplicates, root-only handlers set on a
//! child) panic at startup. They are programming errors, not runtime
//! conditions.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::debug;

use crate::config::Config;
use crate::context::{ContextType, SubContext};
use crate::dispatch::{Dispatch, Resolution, Target};
use crate::handler::{
    BoxedErrorHandler, BoxedHandler, BoxedMiddleware, BoxedOptionsHandler, ErrorHandler, Handler,
    Middleware, OptionsHandler,
};
use crate::method::Method;
use crate::panic::PanicReporter;
use crate::request::Request;
use crate::response::ResponseWriter;
use crate::tree::{Found, PathTrie};

pub(crate) type RouterId = usize;
pub(crate) type RouteId = usize;

pub(crate) const ROOT: RouterId = 0;

/// A node of the router tree whose middleware and handlers receive `&C`.
///
/// `Router` is a cheap handle; cloning it yields another handle to the same
/// node. Every registration method takes `&self` and returns `&Self`, so calls
/// chain:
///
/// ```rust
/// use arbor::{Request, ResponseWriter, Router};
///
/// #[derive(Default)]
/// struct Ctx;
///
/// fn index(_rw: &mut ResponseWriter, _req: &mut Request) {}
/// fn create(_ctx: &Ctx, _rw: &mut ResponseWriter, _req: &mut Request) {}
///
/// let router = Router::<Ctx>::new();
/// router.get("/", index).post("/items", create);
/// let app = router.build();
/// ```
pub struct Router<C> {
    app: Rc<RefCell<App>>,
    id: RouterId,
    _ctx: PhantomData<fn() -> C>,
}

impl<C: Default + 'static> Router<C> {
    /// Creates a root router with the prefix `/` and the default [`Config`].
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a root router whose routes all start with `prefix`.
    pub fn with_prefix(prefix: &str) -> Self {
        Self::root(prefix, Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::root("/", config)
    }

    fn root(prefix: &str, config: Config) -> Self {
        check_prefix(prefix);
        let context = ContextType::root::<C>();
        let app = App {
            routers: vec![RouterNode {
                context,
                prefix: prefix.to_owned(),
                middleware: Vec::new(),
                error_handler: None,
                lineage: vec![ROOT],
                lineage_contexts: vec![context],
            }],
            routes: Vec::new(),
            trees: HashMap::new(),
            not_found: None,
            options: None,
            max_depth: 1,
            config,
        };
        Self::handle(Rc::new(RefCell::new(app)), ROOT)
    }
}

impl<C: Default + 'static> Default for Router<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> Router<C> {
    fn handle(app: Rc<RefCell<App>>, id: RouterId) -> Self {
        Self { app, id, _ctx: PhantomData }
    }

    /// Creates a child router with its own context type `D`, built from this
    /// router's context for every request routed beneath it.
    pub fn subrouter<D: SubContext<Parent = C>>(&self, prefix: &str) -> Router<D> {
        Router::handle(Rc::clone(&self.app), self.child(ContextType::derived::<D>(), prefix))
    }

    /// Creates a child router that shares this router's context instance.
    ///
    /// Useful for grouping routes under a prefix with their own middleware or
    /// error handler.
    pub fn scope(&self, prefix: &str) -> Router<C> {
        let context = self.app.borrow().routers[self.id].context.shared();
        Router::handle(Rc::clone(&self.app), self.child(context, prefix))
    }

    fn child(&self, context: ContextType, prefix: &str) -> RouterId {
        check_prefix(prefix);
        let mut app = self.app.borrow_mut();
        let id = app.routers.len();
        let parent = &app.routers[self.id];

        let mut lineage = parent.lineage.clone();
        lineage.push(id);
        let mut lineage_contexts = parent.lineage_contexts.clone();
        lineage_contexts.push(context);

        let node = RouterNode {
            context,
            prefix: join(&parent.prefix, prefix),
            middleware: Vec::new(),
            error_handler: None,
            lineage,
            lineage_contexts,
        };
        debug!(prefix = %node.prefix, context = context.name(), "router created");

        app.max_depth = app.max_depth.max(node.lineage.len());
        app.routers.push(node);
        id
    }

    /// Appends middleware. Middleware runs in registration order, parents
    /// before children, each deciding whether to call [`Next::run`](crate::Next::run).
    pub fn middleware<K>(&self, middleware: impl Middleware<C, K>) -> &Self {
        self.app.borrow_mut().routers[self.id].middleware.push(middleware.into_boxed());
        self
    }

    /// Sets the handler for panics raised beneath this router. Replaces any
    /// previous one.
    pub fn error<K>(&self, handler: impl ErrorHandler<C, K>) -> &Self {
        self.app.borrow_mut().routers[self.id].error_handler = Some(handler.into_boxed());
        self
    }

    /// Sets the handler for requests no route matches.
    ///
    /// # Panics
    ///
    /// Panics unless called on the root router.
    pub fn not_found<K>(&self, handler: impl Handler<C, K>) -> &Self {
        assert!(self.id == ROOT, "a not-found handler can only be set on the root router");
        self.app.borrow_mut().not_found = Some(handler.into_boxed());
        self
    }

    /// Sets the responder for OPTIONS requests to paths that have routes for
    /// other methods but no OPTIONS route of their own.
    ///
    /// # Panics
    ///
    /// Panics unless called on the root router.
    pub fn options_handler<K>(&self, handler: impl OptionsHandler<C, K>) -> &Self {
        assert!(self.id == ROOT, "an options handler can only be set on the root router");
        self.app.borrow_mut().options = Some(handler.into_boxed());
        self
    }

    pub fn get<K>(&self, path: &str, handler: impl Handler<C, K>) -> &Self {
        self.on(Method::Get, path, handler)
    }

    pub fn post<K>(&self, path: &str, handler: impl Handler<C, K>) -> &Self {
        self.on(Method::Post, path, handler)
    }

    pub fn put<K>(&self, path: &str, handler: impl Handler<C, K>) -> &Self {
        self.on(Method::Put, path, handler)
    }

    pub fn delete<K>(&self, path: &str, handler: impl Handler<C, K>) -> &Self {
        self.on(Method::Delete, path, handler)
    }

    pub fn patch<K>(&self, path: &str, handler: impl Handler<C, K>) -> &Self {
        self.on(Method::Patch, path, handler)
    }

    pub fn head<K>(&self, path: &str, handler: impl Handler<C, K>) -> &Self {
        self.on(Method::Head, path, handler)
    }

    pub fn options<K>(&self, path: &str, handler: impl Handler<C, K>) -> &Self {
        self.on(Method::Options, path, handler)
    }

    /// Registers `handler` for `method` and this router's prefix followed by
    /// `path`.
    ///
    /// Path segments are literals, `:name` wildcards (optionally constrained
    /// as `:name:regex`), or a final `:*` catch-all:
    ///
    /// ```rust
    /// # use arbor::{Method, Request, ResponseWriter, Router};
    /// # #[derive(Default)] struct Ctx;
    /// # fn h(_: &mut ResponseWriter, _: &mut Request) {}
    /// let router = Router::<Ctx>::new();
    /// router
    ///     .on(Method::Get, "/users/:id:\\d+", h)
    ///     .on(Method::Get, "/users/:name", h)
    ///     .on(Method::Get, "/static/:*", h);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the full path is malformed or was already registered for
    /// `method`.
    pub fn on<K>(&self, method: Method, path: &str, handler: impl Handler<C, K>) -> &Self {
        let mut app = self.app.borrow_mut();
        let path = join(&app.routers[self.id].prefix, path);
        let id = app.routes.len();

        app.trees
            .entry(method)
            .or_insert_with(PathTrie::new)
            .insert(&path, id)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        debug!(%method, path = %path, "route registered");

        app.routes.push(Route { method, path, router: self.id, handler: handler.into_boxed() });
        self
    }

    /// This router's full prefix, including its ancestors'.
    pub fn prefix(&self) -> String {
        self.app.borrow().routers[self.id].prefix.clone()
    }

    /// Freezes the whole tree (from whichever node it is called on) into an
    /// [`App`]. The router can keep being extended; later registrations do
    /// not affect apps already built.
    pub fn build(&self) -> App {
        self.app.borrow().clone()
    }
}

impl<C> Clone for Router<C> {
    fn clone(&self) -> Self {
        Self { app: Rc::clone(&self.app), id: self.id, _ctx: PhantomData }
    }
}

impl<C> fmt::Debug for Router<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let app = self.app.borrow();
        let node = &app.routers[self.id];
        f.debug_struct("Router")
            .field("prefix", &node.prefix)
            .field("context", &node.context.name())
            .field("middleware", &node.middleware.len())
            .finish_non_exhaustive()
    }
}

/// An empty prefix is allowed and adds nothing.
fn check_prefix(prefix: &str) {
    assert!(
        prefix.is_empty() || prefix.starts_with('/'),
        "invalid prefix `{prefix}`: prefix must be empty or start with `/`",
    );
}

/// `"/"` on the root contributes nothing, so `/` + `/users` is `/users`.
fn join(prefix: &str, path: &str) -> String {
    if prefix == "/" {
        path.to_owned()
    } else {
        format!("{prefix}{path}")
    }
}

/// One registered route.
#[derive(Clone)]
pub struct Route {
    method: Method,
    path: String,
    router: RouterId,
    handler: BoxedHandler,
}

impl Route {
    pub fn method(&self) -> Method { self.method }

    /// The full registered pattern, prefixes included.
    pub fn path(&self) -> &str { &self.path }

    pub(crate) fn handler(&self) -> &BoxedHandler { &self.handler }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub(crate) struct RouterNode {
    context: ContextType,
    prefix: String,
    middleware: Vec<BoxedMiddleware>,
    error_handler: Option<BoxedErrorHandler>,
    // Router ids from the root down to and including this one.
    lineage: Vec<RouterId>,
    lineage_contexts: Vec<ContextType>,
}

impl RouterNode {
    pub(crate) fn context(&self) -> &ContextType { &self.context }
    pub(crate) fn middleware(&self) -> &[BoxedMiddleware] { &self.middleware }
    pub(crate) fn error_handler(&self) -> Option<&BoxedErrorHandler> { self.error_handler.as_ref() }
    pub(crate) fn lineage(&self) -> &[RouterId] { &self.lineage }
    pub(crate) fn lineage_contexts(&self) -> &[ContextType] { &self.lineage_contexts }
}

/// A built router tree, ready to serve requests.
///
/// `App` is `Send + Sync`; share it behind an `Arc` and call
/// [`serve`](App::serve) from as many threads as needed. Each request gets
/// its own contexts, which never leave the thread serving it.
#[derive(Clone)]
pub struct App {
    routers: Vec<RouterNode>,
    routes: Vec<Route>,
    trees: HashMap<Method, PathTrie<RouteId>>,
    not_found: Option<BoxedHandler>,
    options: Option<BoxedOptionsHandler>,
    max_depth: usize,
    config: Config,
}

impl App {
    /// Runs one request through middleware, routing, and the matched handler.
    ///
    /// Never panics because of a handler: panics are recovered and answered
    /// by the nearest error handler, or with a plain 500.
    pub fn serve(&self, rw: &mut ResponseWriter, req: &mut Request) {
        Dispatch::new(self).run(rw, req);
    }

    /// Convenience wrapper around [`serve`](App::serve) that owns the request
    /// and returns the filled writer.
    pub fn handle(&self, req: impl Into<Request>) -> ResponseWriter {
        let mut req = req.into();
        let mut rw = ResponseWriter::new();
        self.serve(&mut rw, &mut req);
        rw
    }

    /// Every registered route, in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub(crate) fn router(&self, id: RouterId) -> &RouterNode { &self.routers[id] }
    pub(crate) fn route(&self, id: RouteId) -> &Route { &self.routes[id] }
    pub(crate) fn max_depth(&self) -> usize { self.max_depth }
    pub(crate) fn not_found_handler(&self) -> Option<&BoxedHandler> { self.not_found.as_ref() }
    pub(crate) fn options_handler(&self) -> Option<&BoxedOptionsHandler> { self.options.as_ref() }
    pub(crate) fn panic_reporter(&self) -> &dyn PanicReporter { &*self.config.panic_reporter }

    /// Looks up the route for a request.
    ///
    /// A HEAD request without a HEAD route falls back to the GET route. An
    /// OPTIONS request without an OPTIONS route resolves to the list of
    /// methods that do have a route for the path, owned by the router of the
    /// first one found.
    pub(crate) fn resolve(&self, method: &http::Method, path: &str) -> Option<Resolution<'_>> {
        let method = Method::from_http(method)?;
        if let Some(found) = self.find(method, path) {
            let id = *found.value;
            return Some(self.resolution(found, Target::Route(id)));
        }

        match method {
            Method::Head => {
                let found = self.find(Method::Get, path)?;
                let id = *found.value;
                Some(self.resolution(found, Target::Route(id)))
            }
            Method::Options => {
                let mut first = None;
                let mut allowed = Vec::new();
                for candidate in Method::ALL {
                    if candidate == Method::Options {
                        continue;
                    }
                    if let Some(found) = self.find(candidate, path) {
                        allowed.push(candidate);
                        first.get_or_insert(found);
                    }
                }
                Some(self.resolution(first?, Target::Options(allowed)))
            }
            _ => None,
        }
    }

    fn find(&self, method: Method, path: &str) -> Option<Found<'_, RouteId>> {
        self.trees.get(&method)?.find(path)
    }

    fn resolution(&self, found: Found<'_, RouteId>, target: Target) -> Resolution<'_> {
        let route = &self.routes[*found.value];
        Resolution { router: route.router, path: &route.path, params: found.params, target }
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routers", &self.routers.len())
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}
