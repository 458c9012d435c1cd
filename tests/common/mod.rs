#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use arbor::{Config, PanicReport, PanicReporter, ResponseWriter};
use bytes::Bytes;

/// Collects every recovered panic instead of logging it.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<PanicReport>>>);

impl Capture {
    pub fn config(&self) -> Config {
        Config::default().panic_reporter(Arc::new(self.clone()))
    }

    pub fn reports(&self) -> Vec<PanicReport> {
        self.0.lock().unwrap().clone()
    }
}

impl PanicReporter for Capture {
    fn report(&self, report: &PanicReport) {
        self.0.lock().unwrap().push(report.clone());
    }
}

pub fn request(method: &str, path: &str) -> http::Request<Bytes> {
    http::Request::builder().method(method).uri(path).body(Bytes::new()).unwrap()
}

pub fn body(rw: &ResponseWriter) -> String {
    String::from_utf8(rw.body().to_vec()).unwrap()
}
