//! Conductor - orchestrate interactive CLI-agent sessions
//!
//! Runs several long-lived interactive agent processes side by side, each in
//! its own pseudo-terminal, keeps a bounded tail of their output, detects when
//! an agent is back at its input prompt, and exposes all of it over a local
//! HTTP control API so an automation client can create, address, poll and tear
//! down sessions.

pub mod agent;
pub mod client;
pub mod conductor;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_server;
pub mod session;

pub use conductor::{Conductor, DispatchReceipt, NewSession, SessionOutput};
pub use domain::*;
pub use error::ConductorError;
