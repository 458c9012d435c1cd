use std::time::Instant;

use tracing::info;

use crate::dispatch::Next;
use crate::request::Request;
use crate::response::ResponseWriter;

/// Logs one `INFO` event per request once everything downstream has run:
/// method, path, matched route, status, and elapsed time.
///
/// Register it first on the root router so the timing covers the whole chain.
pub fn logger(rw: &mut ResponseWriter, req: &mut Request, mut next: Next<'_>) {
    let start = Instant::now();
    next.run(rw, req);

    info!(
        method = %req.method(),
        path = req.path(),
        route = req.route_path().unwrap_or("-"),
        status = rw.status_code(),
        bytes = rw.size(),
        elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX),
        "request",
    );
}

#[cfg(test)]
mod tests {
    use crate::{Router, ResponseWriter, Request};

    #[derive(Default)]
    struct Ctx;

    fn teapot(rw: &mut ResponseWriter, _req: &mut Request) {
        rw.write_header(http::StatusCode::IM_A_TEAPOT);
    }

    #[test]
    fn passes_through_to_the_handler() {
        let root = Router::<Ctx>::new();
        root.middleware(super::logger).get("/tea", teapot);
        let app = root.build();

        let rw = app.handle(http::Request::get("/tea").body(bytes::Bytes::new()).unwrap());
        assert_eq!(rw.status_code(), 418);
    }
}
