//! Shared domain types for the tortuga fleet control plane.

pub mod clock;
pub mod job;
pub mod presence;

pub use clock::{TimeView, now_epoch, time_view};
pub use job::{Job, JobState};
pub use presence::Presence;
