use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::load::Config;
use crate::shared::{BarrierConfig, RedoConfig, SinkConfig, ValidationError};

/// Configuration of one changefeed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChangefeedConfig {
    /// Identifier of the changefeed, unique within its namespace.
    pub id: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Upstream timestamp the changefeed was created at.
    pub start_ts: u64,
    /// Tracks the upstream schema without applying DDL downstream.
    #[serde(default)]
    pub one_way_mode: bool,
    pub sink: SinkConfig,
    #[serde(default)]
    pub redo: RedoConfig,
    #[serde(default)]
    pub barrier: BarrierConfig,
}

impl ChangefeedConfig {
    pub const DEFAULT_NAMESPACE: &'static str = "default";

    /// Validates the changefeed configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyChangefeedId);
        }

        if !self.sink.downstream.is_commit_ordered() {
            return Err(ValidationError::DownstreamNotCommitOrdered(
                self.sink.downstream,
            ));
        }

        self.barrier.validate()
    }

    /// Returns the `namespace/id` pair identifying the changefeed in logs.
    pub fn qualified_id(&self) -> String {
        format!("{}/{}", self.namespace, self.id)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.barrier.tick_interval_ms)
    }
}

impl Config for ChangefeedConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

fn default_namespace() -> String {
    ChangefeedConfig::DEFAULT_NAMESPACE.to_string()
}
