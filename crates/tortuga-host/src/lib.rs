//! HTTP surface and process bootstrap for the tortuga control plane.
//!
//! Handlers are thin and stateless: every mutating request appends one
//! record to the event log, every read re-folds the relevant streams. The
//! authorization gate runs before any handler, so a denied request never
//! touches the log.

pub mod auth;
pub mod config;
pub mod http;
pub mod paths;

pub use config::{AuthConfig, AuthMode, HostConfig};
pub use http::HttpState;
