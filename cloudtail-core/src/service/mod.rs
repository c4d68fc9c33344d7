//! The supervision hierarchy: one manager, one supervisor per log group, one
//! tailer per (group, stream) pair.

mod context;
mod group;
mod manager;
mod stream;

pub use context::Context;
pub use group::GroupSupervisor;
pub use manager::GroupManager;
pub use stream::StreamTailer;
