//! Background and fire-and-forget machinery that sits behind the HTTP
//! handlers in [`crate::api::bots`]: the delayed reaper, the post-meeting
//! dispatcher, and the status publisher.

pub mod dispatch;
pub mod publish;
pub mod reaper;
