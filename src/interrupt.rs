//! Ctrl+C handling.
//!
//! A Ctrl+C does not exit the process directly. It cancels the run's token;
//! the dispatch loop stops before the next setting, the shim kills any
//! in-flight child, and `main` maps the resulting [`Interrupted`] error to
//! the INTERRUPTED exit code.

use std::fmt;
use tokio_util::sync::CancellationToken;

/// The run was aborted by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interrupted")
    }
}

impl std::error::Error for Interrupted {}

/// Whether an error chain bottoms out in a user interrupt.
pub fn is_interrupted(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Interrupted>().is_some()
}

/// Set up Ctrl+C (SIGINT) handling that cancels `cancel`.
///
/// Install this after any interactive confirmation. While the prompt holds
/// the terminal in raw mode, Ctrl+C reaches it as input rather than SIGINT,
/// and `TerminalConfirm` reports it as [`Interrupted`].
pub fn setup_ctrlc_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("Failed to listen for Ctrl+C: {}", e);
            return;
        }

        eprintln!("\nInterrupted (Ctrl+C). Stopping...");
        cancel.cancel();
    });
}
