//! Ctrl+C handling for graceful shutdown.
//!
//! A single `AtomicBool` is shared by the walker, the hashing pool and the
//! action executor. Setting it lets each of them finish the file in hand and
//! stop; whatever was already written to the index stays there, so an
//! interrupted scan simply resumes on the next run.
//!
//! ```rust,no_run
//! use dupefox::signal::install_handler;
//!
//! let handler = install_handler();
//! let flag = handler.flag();
//! // pass `flag` to Scanner / ResolverConfig / ActionExecutor
//! if handler.is_shutdown_requested() {
//!     std::process::exit(130);
//! }
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested. No signal is hooked.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once Ctrl+C was pressed or [`request_shutdown`](Self::request_shutdown) called.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Raise the flag by hand.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag to hand to long-running components.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Lower the flag again.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Hook Ctrl+C (and SIGTERM) to a process-wide [`ShutdownHandler`].
///
/// The hook is installed once per process; later calls return the same
/// handler with its flag reset, so `run_app` can be called repeatedly (as
/// the integration tests do). If the hook cannot be installed, an unhooked
/// handler is returned and a debug message logged.
pub fn install_handler() -> ShutdownHandler {
    let handler = GLOBAL_HANDLER.get_or_init(|| {
        let handler = ShutdownHandler::new();
        let flag = handler.flag();
        let hooked = ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "\nInterrupted. Finishing current file...");
            let _ = stderr.flush();
            log::info!("Shutdown signal received");
        });
        if let Err(e) = hooked {
            log::debug!("Ctrl+C handler not installed ({}), using unhooked handler", e);
        }
        handler
    });
    handler.reset();
    handler.clone()
}
