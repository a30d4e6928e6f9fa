//! Session controller for the Twitch streaming bridge.
//!
//! This crate owns the single streaming session: it walks the media
//! pipeline through setup, rolls back on failure and releases every
//! handle on teardown.

mod controller;
mod diagnostics;
mod error;
mod session;

pub use controller::{SessionController, StartOutcome, StopOutcome};
pub use diagnostics::log_available_types;
pub use error::EngineError;
pub use session::Session;
