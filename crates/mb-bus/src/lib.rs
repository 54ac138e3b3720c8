//! Redis-backed publish/cache client for meeting status fan-out and bot
//! command delivery.

pub mod channels;
pub mod client;

pub use channels::{
    command_channel, current_session_key, status_channel, BotCommand, MeetingRef,
    MeetingStatusMessage, StatusPayloadInner,
};
pub use client::BusClient;
