//! A small ticket desk: a root context carrying the caller, an admin
//! subrouter with its own context, and a scope with its own error handler.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/
//!   curl -H 'x-user: alice' http://localhost:3000/admin/tickets/42
//!   curl http://localhost:3000/admin/tickets/42          # 401
//!   curl http://localhost:3000/admin/tickets/abc         # 404, id must be numeric
//!   curl -H 'x-user: alice' http://localhost:3000/admin/reports/crash
//!   curl -X OPTIONS -i http://localhost:3000/admin/tickets/42

use std::cell::{Cell, RefCell};
use std::io::Write;
use std::rc::Rc;

use arbor::{middleware, Next, Panic, Request, ResponseWriter, Router, Server, SubContext};
use http::StatusCode;

#[derive(Default)]
struct Desk {
    user: RefCell<Option<String>>,
}

struct Admin {
    desk: Rc<Desk>,
    checks: Cell<u32>,
}

impl SubContext for Admin {
    type Parent = Desk;

    fn from_parent(desk: Rc<Desk>) -> Self {
        Admin { desk, checks: Cell::new(0) }
    }

    fn parent(&self) -> &Desk {
        &self.desk
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let root = Router::<Desk>::new();
    root.middleware(middleware::logger)
        .middleware(identify)
        .not_found(not_found)
        .get("/", index);

    let admin = root.subrouter::<Admin>("/admin");
    admin
        .middleware(require_user)
        .get("/tickets/:id:\\d+", show_ticket)
        .post("/tickets", create_ticket);

    let reports = admin.scope("/reports");
    reports.error(report_failed).get("/crash", crash);

    Server::bind("0.0.0.0:3000")
        .serve(root.build())
        .await
        .expect("server error");
}

fn identify(ctx: &Desk, rw: &mut ResponseWriter, req: &mut Request, mut next: Next<'_>) {
    *ctx.user.borrow_mut() = req.header("x-user").map(str::to_owned);
    next.run(rw, req);
}

fn require_user(ctx: &Admin, rw: &mut ResponseWriter, req: &mut Request, mut next: Next<'_>) {
    ctx.checks.set(ctx.checks.get() + 1);
    if ctx.parent().user.borrow().is_none() {
        rw.write_header(StatusCode::UNAUTHORIZED);
        let _ = write!(rw, "who are you?");
        return;
    }
    next.run(rw, req);
}

fn index(rw: &mut ResponseWriter, _req: &mut Request) {
    let _ = write!(rw, "ticket desk");
}

fn not_found(rw: &mut ResponseWriter, req: &mut Request) {
    rw.write_header(StatusCode::NOT_FOUND);
    let _ = write!(rw, "nothing at {}", req.path());
}

fn show_ticket(ctx: &Admin, rw: &mut ResponseWriter, req: &mut Request) {
    let user = ctx.parent().user.borrow();
    let _ = write!(
        rw,
        r#"{{"id":{},"viewer":"{}"}}"#,
        req.param("id").unwrap_or("0"),
        user.as_deref().unwrap_or(""),
    );
}

fn create_ticket(rw: &mut ResponseWriter, req: &mut Request) {
    if req.body().is_empty() {
        rw.write_header(StatusCode::BAD_REQUEST);
        return;
    }
    rw.write_header(StatusCode::CREATED);
    let _ = rw.write_all(req.body());
}

fn crash(_ctx: &Admin, _rw: &mut ResponseWriter, _req: &mut Request) {
    panic!("report generator fell over");
}

fn report_failed(ctx: &Admin, rw: &mut ResponseWriter, _req: &mut Request, err: &Panic) {
    let _ = write!(rw, "report failed after {} check(s): {err}", ctx.checks.get());
}
