//! Mark-sweep collection engines.

mod mark;
mod sweep;
mod verify;

pub use mark::Marker;
pub use sweep::{sweep, SweepResult};
pub use verify::{verify_heap, HeapViolation};
