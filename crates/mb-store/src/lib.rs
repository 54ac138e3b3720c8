//! Meeting Store.
//!
//! Persists [`Meeting`] and [`MeetingSession`] rows in Postgres and
//! implements the FSM-aware write path (`ApplyTransition`):
//! re-read-then-optimistic-update, copy-on-write `data` rebuild, and
//! migration of the legacy `status_transitions` (plural) key.

pub mod meetings;
pub mod model;
pub mod pool;
pub mod sessions;
pub mod transition;

pub use meetings::{CreateOutcome, MeetingsRepository, TransitionArgs};
pub use model::{Meeting, MeetingSession};
pub use sessions::MeetingSessionsRepository;
pub use transition::TransitionRecord;
