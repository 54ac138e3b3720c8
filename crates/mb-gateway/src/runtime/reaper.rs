//! The delayed reaper: a detached timer that guarantees a bot workload is
//! eventually stopped even when the best-effort `leave` command is never
//! acted on. Cancellation is not supported — a double-stop is idempotent
//! at the launcher, so a reap racing a clean exit is harmless.

use std::sync::Arc;
use std::time::Duration;

use mb_launcher::RuntimeLauncher;

/// Spawns a detached task that sleeps for `delay` then stops `handle`.
/// Failures are logged, never escalated — there is no caller left to
/// report to by the time this fires.
pub fn schedule(launcher: Arc<dyn RuntimeLauncher>, handle: String, delay: Duration) {
    tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Err(e) = launcher.stop_bot(&handle).await {
            tracing::warn!(handle, error = %e, "delayed reap failed");
        }
    });
}
