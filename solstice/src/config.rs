//! Framework configuration, used by [Application](crate::application::Application) to configure
//! itself.
//!
//! By default, the config is created with opinionated default values, which can then be overwritten
//! by `solstice.json` file or environment variables prefixed with `SOLSTICE_`. Lists are given in
//! environment variables as comma-separated values, e.g.
//! `SOLSTICE_DEFINITION_FILES=base.json,local.json`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_ENV_PREFIX: &str = "SOLSTICE";

/// Name of the default config file.
pub const CONFIG_FILE: &str = "solstice.json";

/// Framework configuration.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationConfig {
    /// Should a default tracing logger be installed in the scope of the application.
    pub install_tracing_logger: bool,
    /// Additional service definition files, loaded before the main definition file.
    pub definition_files: Vec<String>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            install_tracing_logger: true,
            definition_files: vec![],
        }
    }
}

impl From<OptionalApplicationConfig> for ApplicationConfig {
    fn from(value: OptionalApplicationConfig) -> Self {
        let default = Self::default();
        Self {
            install_tracing_logger: value
                .install_tracing_logger
                .unwrap_or(default.install_tracing_logger),
            definition_files: value
                .definition_files
                .unwrap_or(default.definition_files),
        }
    }
}

impl ApplicationConfig {
    /// Reads the config from the default file and the environment.
    pub fn init_from_environment() -> Result<Self, ConfigError> {
        Self::init_from_file(CONFIG_FILE)
    }

    /// Reads the config from given file (if it exists) and the environment. Environment variables
    /// take precedence.
    pub fn init_from_file(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("definition_files"),
            )
            .build()
            .and_then(|config| config.try_deserialize::<OptionalApplicationConfig>())
            .map(|config| config.into())
    }
}

#[derive(Deserialize)]
struct OptionalApplicationConfig {
    install_tracing_logger: Option<bool>,
    definition_files: Option<Vec<String>>,
}
