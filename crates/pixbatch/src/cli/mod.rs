//! Command implementations.

pub mod config;
pub mod process;
pub mod stress;

mod report;

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

/// Exit status for a run stopped by a second interrupt.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Cancel the returned token on the first Ctrl-C and exit on the second.
///
/// In-flight images are allowed to finish within the configured grace
/// period; queued images are reported as cancelled.
pub(crate) fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupt received; finishing in-flight images (Ctrl-C again to abort)");
        trigger.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Second interrupt received; aborting");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
    token
}

/// Expand `~` and reject an input directory that does not exist.
pub(crate) fn resolve_input(input: &std::path::Path) -> anyhow::Result<PathBuf> {
    let input = pixbatch_core::config::expand_path(input);
    if !input.exists() {
        anyhow::bail!(
            "Input path does not exist: {:?}\n\n  Hint: Check the directory path and try again.",
            input
        );
    }
    Ok(input)
}
