//! Recovered panics and where they get reported.
//!
//! Any panic raised by middleware or a handler is caught once, at the top of
//! dispatch. The nearest error handler turns it into a response, and the
//! configured [`PanicReporter`] always hears about it, whether or not a
//! custom error handler ran.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::sync::Once;

use tracing::error;

/// The payload of a recovered panic, as handed to error handlers.
pub struct Panic {
    payload: Box<dyn Any + Send>,
}

impl Panic {
    pub(crate) fn new(payload: Box<dyn Any + Send>) -> Self {
        Self { payload }
    }

    /// The panic message, for the usual `panic!("...")` payloads.
    pub fn message(&self) -> Option<&str> {
        if let Some(s) = self.payload.downcast_ref::<&'static str>() {
            Some(*s)
        } else {
            self.payload.downcast_ref::<String>().map(String::as_str)
        }
    }

    /// Downcasts a payload raised with `std::panic::panic_any`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for Panic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Panic").field("message", &self.message()).finish()
    }
}

impl fmt::Display for Panic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message().unwrap_or("Box<dyn Any>"))
    }
}

thread_local! {
    // Trace of the most recent panic on this thread, taken on the panicking stack.
    static LAST_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Chains a hook in front of the current panic hook that records a backtrace
/// of the panic site. Idempotent.
pub(crate) fn install_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            let _ = LAST_TRACE.try_with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

/// Takes the trace recorded for the last panic on this thread. Falls back to
/// a trace of the caller if the hook was replaced after installation.
pub(crate) fn take_trace() -> String {
    LAST_TRACE
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(|| Backtrace::force_capture().to_string())
}

pub(crate) fn clear_trace() {
    LAST_TRACE.with(|slot| *slot.borrow_mut() = None);
}

/// What a [`PanicReporter`] receives for each recovered panic.
#[derive(Debug, Clone)]
pub struct PanicReport {
    /// The request that panicked, as `"<METHOD> <path>"`.
    pub source: String,
    pub message: String,
    pub backtrace: String,
}

/// Process sink for recovered panics. Injected through
/// [`Config::panic_reporter`](crate::Config::panic_reporter).
pub trait PanicReporter: Send + Sync + 'static {
    fn report(&self, report: &PanicReport);
}

/// Default reporter: one `ERROR` event per panic on the `arbor::panic` target.
///
/// With `tracing_subscriber::fmt` installed this lands on stderr with a
/// timestamp and source location.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl PanicReporter for TracingReporter {
    fn report(&self, report: &PanicReport) {
        error!(
            target: "arbor::panic",
            source = %report.source,
            panic = %report.message,
            "PANIC\n{}",
            report.backtrace,
        );
    }
}
