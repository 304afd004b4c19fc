//! Current-state views over the append-only event log.
//!
//! Nothing here caches state across calls: every read replays the relevant
//! stream through a per-entity combine rule. Jobs merge field-wise in append
//! order; device status, aliases, forgets, and file reports replace-latest.

pub mod error;
pub mod queue;
pub mod reducer;
pub mod registry;
pub mod reports;

pub use error::KernelError;
pub use queue::JobQueue;
pub use registry::{DeviceRegistry, ONLINE_WINDOW_SECS};
pub use reports::ReportStore;
