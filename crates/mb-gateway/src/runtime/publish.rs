//! Publishes exactly one `meeting.status` message per committed,
//! status-changing FSM transition. Callers invoke this strictly after the
//! corresponding store write has committed, never before or speculatively.

use mb_domain::Platform;
use mb_fsm::Status;

pub async fn status_changed(bus: &mb_bus::BusClient, platform: Platform, native_id: &str, status: Status) {
    bus.publish_status(platform, native_id, status).await;
}
