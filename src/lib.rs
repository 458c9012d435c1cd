//! # arbor
//!
//! Nested HTTP routers with typed per-request contexts.
//!
//! ## The model
//!
//! An application is a tree of routers. Each router owns a path prefix, a
//! context type, middleware, and optionally an error handler. For every
//! request, dispatch:
//!
//! 1. creates the root context (`C::default()`),
//! 2. runs the root router's middleware,
//! 3. resolves the path against one trie per method,
//! 4. builds one context per router down to the one owning the route,
//! 5. runs each of those routers' middleware, outermost first,
//! 6. runs the handler.
//!
//! A panic anywhere in that chain is recovered and handed to the closest
//! error handler, walking from the matched router towards the root.
//!
//! ## Route patterns
//!
//! | Segment        | Matches                                        |
//! |----------------|------------------------------------------------|
//! | `users`        | exactly `users`                                |
//! | `:id`          | any one segment, captured as `id`              |
//! | `:id:\d+`      | one segment matching the regex, captured       |
//! | `:*` (last)    | one or more remaining segments, captured as `*`|
//!
//! Literals win over wildcards; a wildcard branch that fails further down is
//! backtracked out of. Trailing slashes are ignored.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::cell::RefCell;
//! use std::io::Write;
//! use std::rc::Rc;
//!
//! use arbor::{Next, Panic, Request, ResponseWriter, Router, Server, SubContext};
//! use http::StatusCode;
//!
//! #[derive(Default)]
//! struct App {
//!     user: RefCell<Option<String>>,
//! }
//!
//! struct Admin {
//!     app: Rc<App>,
//! }
//!
//! impl SubContext for Admin {
//!     type Parent = App;
//!     fn from_parent(app: Rc<App>) -> Self { Admin { app } }
//!     fn parent(&self) -> &App { &self.app }
//! }
//!
//! fn authenticate(ctx: &App, rw: &mut ResponseWriter, req: &mut Request, mut next: Next<'_>) {
//!     *ctx.user.borrow_mut() = req.header("x-user").map(str::to_owned);
//!     next.run(rw, req);
//! }
//!
//! fn require_user(ctx: &Admin, rw: &mut ResponseWriter, req: &mut Request, mut next: Next<'_>) {
//!     if ctx.parent().user.borrow().is_none() {
//!         rw.write_header(StatusCode::UNAUTHORIZED);
//!         return;
//!     }
//!     next.run(rw, req);
//! }
//!
//! fn ticket(ctx: &Admin, rw: &mut ResponseWriter, req: &mut Request) {
//!     let user = ctx.parent().user.borrow();
//!     write!(rw, "ticket {} for {}", req.param("id").unwrap_or("?"), user.as_deref().unwrap_or("")).ok();
//! }
//!
//! fn oops(rw: &mut ResponseWriter, _req: &mut Request, err: &Panic) {
//!     write!(rw, "something broke: {err}").ok();
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let root = Router::<App>::new();
//!     root.middleware(authenticate).error(oops);
//!
//!     let admin = root.subrouter::<Admin>("/admin");
//!     admin.middleware(require_user).get("/tickets/:id:\\d+", ticket);
//!
//!     Server::bind("0.0.0.0:3000").serve(root.build()).await.unwrap();
//! }
//! ```

mod config;
mod context;
mod dispatch;
mod error;
mod handler;
mod method;
mod panic;
mod request;
mod response;
mod router;
mod server;
mod tree;

pub mod middleware;

pub use config::Config;
pub use context::SubContext;
pub use dispatch::{Next, DEFAULT_NOT_FOUND_BODY, DEFAULT_PANIC_BODY};
pub use error::{Error, RouteError};
pub use handler::{Contextual, ErrorHandler, Generic, Handler, Middleware, OptionsHandler};
pub use method::{Method, UnknownMethod};
pub use panic::{Panic, PanicReport, PanicReporter, TracingReporter};
pub use request::Request;
pub use response::ResponseWriter;
pub use router::{App, Route, Router};
pub use server::Server;
pub use tree::{Found, Params, PathTrie, CATCH_ALL};
