//! Session bookkeeping: output buffers, completion detection, registry and snapshots.

mod buffer;
mod detector;
mod registry;
mod snapshot;

pub use buffer::{OutputBuffer, DEFAULT_MAX_BYTES};
pub use detector::{is_awaiting_instruction, strip_ansi_codes, INSPECTED_LINES};
pub use registry::{SessionRegistry, DEFAULT_FIRST_PORT};
pub use snapshot::{SessionRecord, SnapshotStore};
