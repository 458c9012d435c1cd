//! Router configuration.

use std::fmt;
use std::sync::Arc;

use crate::panic::{PanicReporter, TracingReporter};

/// Settings fixed when the root router is created.
///
/// ```rust
/// use std::sync::Arc;
/// use arbor::{Config, Router, TracingReporter};
///
/// #[derive(Default)]
/// struct Ctx;
///
/// let router = Router::<Ctx>::with_config(
///     Config::default().panic_reporter(Arc::new(TracingReporter)),
/// );
/// ```
#[derive(Clone)]
pub struct Config {
    pub(crate) panic_reporter: Arc<dyn PanicReporter>,
}

impl Config {
    /// Replaces the sink recovered panics are reported to.
    pub fn panic_reporter(mut self, reporter: Arc<dyn PanicReporter>) -> Self {
        self.panic_reporter = reporter;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { panic_reporter: Arc::new(TracingReporter) }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config").finish_non_exhaustive()
    }
}
