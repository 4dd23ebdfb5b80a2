//! Configuration of changefeeds.
//!
//! [`shared`] holds the serde types of a changefeed and their validation. [`load_config`]
//! reads them from the `configuration` directory and `APP_` environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
