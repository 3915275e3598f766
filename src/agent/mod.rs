//! Agent process management: spawning, PTY handles and supervision

mod env;
mod process;
mod pty;
mod supervisor;

pub use env::{augmented_path, launch_env};
pub use process::{EventSink, LaunchSpec, ProcessEvent, ProcessHandle, ProcessSpawner};
pub use pty::{PtyProcess, PtySpawner};
pub use supervisor::{Supervisor, WriteOutcome};
