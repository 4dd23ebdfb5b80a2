use thiserror::Error;

use crate::shared::DownstreamType;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The changefeed id is empty.
    #[error("`id` cannot be empty")]
    EmptyChangefeedId,
    /// DDL coordination requires a downstream that applies changes in commit order.
    #[error("downstream `{0}` does not apply changes in commit order")]
    DownstreamNotCommitOrdered(DownstreamType),
    /// A field holds a value outside of its allowed range.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}
