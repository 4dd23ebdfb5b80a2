//! Shared configuration types for changefeeds.

mod barrier;
mod base;
mod changefeed;
mod redo;
mod sink;

pub use barrier::BarrierConfig;
pub use base::ValidationError;
pub use changefeed::ChangefeedConfig;
pub use redo::RedoConfig;
pub use sink::{DownstreamType, SinkConfig};
