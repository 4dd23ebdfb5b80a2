use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Barrier computation and scheduling settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BarrierConfig {
    /// Maximum number of per-table entries reported in one barrier.
    #[serde(default = "default_table_barrier_limit")]
    pub table_barrier_limit: usize,
    /// Interval, in milliseconds, between two coordinator ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl BarrierConfig {
    pub const DEFAULT_TABLE_BARRIER_LIMIT: usize = 256;

    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 50;

    /// Validates barrier settings.
    ///
    /// Ensures the table barrier limit and the tick interval are non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.table_barrier_limit == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "barrier.table_barrier_limit".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.tick_interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "barrier.tick_interval_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            table_barrier_limit: default_table_barrier_limit(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

fn default_table_barrier_limit() -> usize {
    BarrierConfig::DEFAULT_TABLE_BARRIER_LIMIT
}

fn default_tick_interval_ms() -> u64 {
    BarrierConfig::DEFAULT_TICK_INTERVAL_MS
}
