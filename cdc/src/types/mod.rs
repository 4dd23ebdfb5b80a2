//! Core data types shared by the DDL coordinator and its collaborators.

mod barrier;
mod ddl;
mod table;

pub use barrier::{Barrier, TableBarrier, TickOutput};
pub use ddl::{ActionType, DdlEvent, DdlJob};
pub use table::{PartitionInfo, SchemaId, TableId, TableInfo, TableName};

/// Logical timestamp assigned by the upstream database.
///
/// Timestamps are totally ordered and are used for commit ordering, checkpoints and resolved
/// timestamps alike.
pub type Ts = u64;
