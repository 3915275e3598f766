//! Core domain types for the conductor

mod session;
mod task;

pub use session::{Session, SessionId, SessionRole, SessionStatus};
pub use task::DispatchTask;
