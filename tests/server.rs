mod common;

use std::io::Write;

use arbor::{Request, ResponseWriter, Router, Server};
use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use common::Capture;

#[derive(Default)]
struct Ctx;

fn hello(rw: &mut ResponseWriter, req: &mut Request) {
    write!(rw, "hello {}", req.param("name").unwrap_or("?")).unwrap();
}

fn echo(rw: &mut ResponseWriter, req: &mut Request) {
    rw.write_header(StatusCode::CREATED);
    rw.write_all(req.body()).unwrap();
}

fn boom(_rw: &mut ResponseWriter, _req: &mut Request) {
    panic!("boom");
}

async fn roundtrip(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = String::new();
    stream.read_to_string(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn serves_requests_over_http1() {
    let capture = Capture::default();
    let root = Router::<Ctx>::with_config(capture.config());
    root.get("/hello/:name", hello).post("/echo", echo).get("/boom", boom);
    let app = root.build();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(
        Server::from_listener(listener).serve_with_shutdown(app, async move {
            let _ = stopped.await;
        }),
    );

    let res = roundtrip(addr, "GET /hello/world HTTP/1.1\r\nhost: x\r\nconnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 200 OK"), "{res}");
    assert!(res.ends_with("hello world"), "{res}");

    let res = roundtrip(
        addr,
        "POST /echo HTTP/1.1\r\nhost: x\r\ncontent-length: 4\r\nconnection: close\r\n\r\nping",
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 201 Created"), "{res}");
    assert!(res.ends_with("ping"), "{res}");

    let res = roundtrip(addr, "GET /missing HTTP/1.1\r\nhost: x\r\nconnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 404 Not Found"), "{res}");

    let res = roundtrip(addr, "GET /boom HTTP/1.1\r\nhost: x\r\nconnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 500 Internal Server Error"), "{res}");
    assert_eq!(capture.reports().len(), 1);

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn bind_failure_is_an_io_error() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = taken.local_addr().unwrap().to_string();

    let root = Router::<Ctx>::new();
    let result = Server::bind(addr).serve_with_shutdown(root.build(), async {}).await;
    assert!(matches!(result, Err(arbor::Error::Io(_))));
}
