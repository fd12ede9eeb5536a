//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load settings → Build sources → Initial refresh → Spawn controller + watchers
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Controller loop, admin API exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger config refresh
//! ```
//!
//! # Design Decisions
//! - The first refresh happens before anything is served
//! - With fail_fast, a failed first refresh is fatal; otherwise the relay
//!   starts empty and keeps retrying

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Relay, StartupError};
