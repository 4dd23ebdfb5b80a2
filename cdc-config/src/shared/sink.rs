use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of system a changefeed writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownstreamType {
    Mysql,
    Tidb,
    Kafka,
    Pulsar,
    Storage,
}

impl DownstreamType {
    /// Returns `true` when the downstream applies changes in commit order.
    ///
    /// Only database downstreams do. Message queues and object storage deliver DDL and rows
    /// through independent paths.
    pub fn is_commit_ordered(&self) -> bool {
        matches!(self, DownstreamType::Mysql | DownstreamType::Tidb)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DownstreamType::Mysql => "mysql",
            DownstreamType::Tidb => "tidb",
            DownstreamType::Kafka => "kafka",
            DownstreamType::Pulsar => "pulsar",
            DownstreamType::Storage => "storage",
        }
    }
}

impl fmt::Display for DownstreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Downstream configuration of a changefeed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SinkConfig {
    pub downstream: DownstreamType,
}
