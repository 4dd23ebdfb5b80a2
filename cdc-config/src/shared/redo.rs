use serde::{Deserialize, Serialize};

/// Redo log configuration of a changefeed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RedoConfig {
    /// Whether DDL and resolved ts are persisted to a redo log before being applied.
    #[serde(default)]
    pub enabled: bool,
}
