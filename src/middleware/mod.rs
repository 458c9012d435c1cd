//! Built-in middleware.
//!
//! Everything here is generic middleware: it works on a router of any context
//! type.
//!
//! ```rust
//! use arbor::{middleware, Router};
//!
//! #[derive(Default)]
//! struct Ctx;
//!
//! let root = Router::<Ctx>::new();
//! root.middleware(middleware::logger);
//! ```

mod logger;

pub use logger::logger;
