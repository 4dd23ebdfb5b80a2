use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory holding configuration files, relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

const ENV_PREFIX: &str = "APP";

const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator of nested keys in environment variables, as in `APP_SINK__DOWNSTREAM`.
const ENV_SEPARATOR: &str = "__";

const LIST_SEPARATOR: &str = ",";

/// Trait implemented by top level configuration types.
pub trait Config {
    /// Keys whose environment variable values are parsed as comma separated lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

#[derive(Debug, Clone, Copy)]
enum ConfigFile {
    Base,
    Environment(Environment),
}

impl ConfigFile {
    fn stem(&self) -> Cow<'static, str> {
        match self {
            ConfigFile::Base => Cow::Borrowed("base"),
            ConfigFile::Environment(environment) => Cow::Borrowed(environment.as_str()),
        }
    }
}

impl fmt::Display for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFile::Base => f.write_str("base configuration"),
            ConfigFile::Environment(environment) => {
                write!(f, "{environment} environment configuration")
            }
        }
    }
}

/// Errors raised while loading a configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("could not locate {file} in `{directory}`; attempted: {attempted}")]
    ConfigurationFileMissing {
        file: String,
        directory: PathBuf,
        attempted: String,
    },

    #[error("failed to load {file} from `{path}`: {source}")]
    ConfigurationFileLoad {
        file: String,
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("failed to build configuration: {0}")]
    Builder(#[source] config::ConfigError),

    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] config::ConfigError),

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),
}

/// Loads a configuration from the `configuration` directory of the working directory.
///
/// Reads `base.(yaml|yml|json)`, then `{environment}.(yaml|yml|json)` with the environment
/// taken from `APP_ENVIRONMENT`, then `APP_`-prefixed environment variables. Later sources
/// override earlier ones.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let working_directory = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let environment = Environment::load()?;

    load_config_from(&working_directory.join(CONFIGURATION_DIR), environment)
}

/// Loads a configuration from `directory` for the given `environment`.
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let base_file = find_configuration_file(directory, ConfigFile::Base)?;
    let environment_file =
        find_configuration_file(directory, ConfigFile::Environment(environment))?;

    let builder = config::Config::builder().add_source(config::File::from(base_file.as_path()));
    check_source(&builder, ConfigFile::Base, &base_file)?;

    let builder = builder.add_source(config::File::from(environment_file.as_path()));
    check_source(&builder, ConfigFile::Environment(environment), &environment_file)?;

    let settings = builder
        .add_source(environment_variables::<T>())
        .build()
        .map_err(LoadConfigError::Builder)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn environment_variables<T: Config>() -> config::Environment {
    let mut source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if !T::LIST_PARSE_KEYS.is_empty() {
        source = source.try_parsing(true).list_separator(LIST_SEPARATOR);
        for key in T::LIST_PARSE_KEYS {
            source = source.with_list_parse_key(key);
        }
    }

    source
}

fn find_configuration_file(directory: &Path, file: ConfigFile) -> Result<PathBuf, LoadConfigError> {
    let stem = file.stem();
    let candidates: Vec<PathBuf> = CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{stem}.{extension}")))
        .collect();

    if let Some(path) = candidates.iter().find(|path| path.is_file()) {
        return Ok(path.clone());
    }

    let attempted = candidates
        .iter()
        .map(|path| format!("`{}`", path.display()))
        .collect::<Vec<_>>()
        .join(", ");

    Err(LoadConfigError::ConfigurationFileMissing {
        file: file.to_string(),
        directory: directory.to_path_buf(),
        attempted,
    })
}

/// Builds the sources added so far to attribute parse errors to the file that caused them.
fn check_source(
    builder: &ConfigBuilder<DefaultState>,
    file: ConfigFile,
    path: &Path,
) -> Result<(), LoadConfigError> {
    builder
        .clone()
        .build()
        .map(|_| ())
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            file: file.to_string(),
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{ChangefeedConfig, DownstreamType};
    use std::fs;

    fn configuration_directory(name: &str) -> PathBuf {
        let directory = std::env::temp_dir().join(format!(
            "cdc-config-{}-{name}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&directory);
        fs::create_dir_all(&directory).unwrap();
        directory
    }

    #[test]
    fn environment_file_overrides_base_file() {
        let directory = configuration_directory("override");
        fs::write(
            directory.join("base.yaml"),
            "id: orders\nstart_ts: 100\nsink:\n  downstream: mysql\n",
        )
        .unwrap();
        fs::write(
            directory.join("prod.json"),
            r#"{ "sink": { "downstream": "tidb" }, "redo": { "enabled": true } }"#,
        )
        .unwrap();

        let config: ChangefeedConfig = load_config_from(&directory, Environment::Prod).unwrap();

        assert_eq!(config.id, "orders");
        assert_eq!(config.start_ts, 100);
        assert_eq!(config.sink.downstream, DownstreamType::Tidb);
        assert!(config.redo.enabled);
        assert_eq!(config.barrier.table_barrier_limit, 256);

        fs::remove_dir_all(&directory).unwrap();
    }

    #[test]
    fn missing_environment_file_is_reported() {
        let directory = configuration_directory("missing");
        fs::write(directory.join("base.yml"), "id: orders\n").unwrap();

        let err = load_config_from::<ChangefeedConfig>(&directory, Environment::Dev).unwrap_err();
        assert!(matches!(
            err,
            LoadConfigError::ConfigurationFileMissing { .. }
        ));

        fs::remove_dir_all(&directory).unwrap();
    }
}
