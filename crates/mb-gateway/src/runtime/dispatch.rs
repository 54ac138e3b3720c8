//! Fires exactly once per terminal transition. The actual downstream tasks
//! (transcription handoff, webhook delivery, analytics) are a separate
//! collaborator this crate doesn't own; `run` is the hook point a real
//! deployment wires a task queue into.

use uuid::Uuid;

/// Schedules the post-meeting task set for `meeting_id`, fire-and-forget.
/// The current implementation only logs — wiring an actual task queue in
/// is left to the deployment, since the task set itself is out of scope
/// here.
pub fn run(meeting_id: Uuid) {
    tokio::spawn(async move {
        tracing::info!(%meeting_id, "post-meeting tasks dispatched (no-op)");
    });
}
