mod common;

use std::io::Write;

use arbor::{Method, Next, Request, ResponseWriter, Router};
use http::header::{ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN};
use http::StatusCode;

use common::{body, request};

#[derive(Default)]
struct Ctx;

fn noop(_rw: &mut ResponseWriter, _req: &mut Request) {}

fn explicit(rw: &mut ResponseWriter, _req: &mut Request) {
    write!(rw, "explicit").unwrap();
}

#[test]
fn default_responder_lists_allowed_methods() {
    let root = Router::<Ctx>::new();
    root.put("/items/:id", noop).get("/items/:id", noop);
    root.scope("").delete("/items/:id", noop);

    let rw = root.build().handle(request("OPTIONS", "/items/3"));
    assert_eq!(rw.headers()[ACCESS_CONTROL_ALLOW_METHODS], "GET, PUT, DELETE");
    assert!(rw.body().is_empty());
}

#[test]
fn custom_responder_receives_the_methods() {
    fn allow(rw: &mut ResponseWriter, req: &mut Request, methods: &[Method]) {
        rw.write_header(StatusCode::NO_CONTENT);
        rw.headers_mut().insert("allow", methods.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(",").parse().unwrap());
        assert_eq!(req.route_path(), Some("/items"));
    }

    let root = Router::<Ctx>::new();
    root.options_handler(allow).get("/items", noop).post("/items", noop);

    let rw = root.build().handle(request("OPTIONS", "/items"));
    assert_eq!(rw.status_code(), 204);
    assert_eq!(rw.headers()["allow"], "GET,POST");
}

#[test]
fn explicit_options_route_is_used_as_is() {
    let root = Router::<Ctx>::new();
    root.get("/items", noop).options("/items", explicit);

    let rw = root.build().handle(request("OPTIONS", "/items"));
    assert_eq!(body(&rw), "explicit");
    assert!(rw.headers().get(ACCESS_CONTROL_ALLOW_METHODS).is_none());
}

#[test]
fn options_for_an_unknown_path_is_not_found() {
    let root = Router::<Ctx>::new();
    root.get("/items", noop);

    let rw = root.build().handle(request("OPTIONS", "/elsewhere"));
    assert_eq!(rw.status_code(), 404);
}

#[test]
fn auto_response_runs_the_owning_router_middleware() {
    fn cors(rw: &mut ResponseWriter, req: &mut Request, mut next: Next<'_>) {
        rw.headers_mut().insert(ACCESS_CONTROL_ALLOW_ORIGIN, "*".parse().unwrap());
        next.run(rw, req);
    }

    let root = Router::<Ctx>::new();
    root.scope("/sub").middleware(cors).get("/action", noop).put("/action", noop);

    let rw = root.build().handle(request("OPTIONS", "/sub/action"));
    assert_eq!(rw.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(rw.headers()[ACCESS_CONTROL_ALLOW_METHODS], "GET, PUT");
}
