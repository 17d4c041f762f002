//! Core application bootstrapping functionality.

use crate::config::ApplicationConfig;
use crate::loader::{DefinitionLoader, LoaderError};
use config::ConfigError;
use derive_more::Constructor;
use solstice_di::error::DefinitionError;
use solstice_di::{Core, CoreBuilder};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable pointing to the main definition file.
pub const DEFINITION_PATH_VARIABLE: &str = "SOLSTICE_CONF_FILEPATH";

/// Main definition file used when no other is given.
pub const DEFAULT_DEFINITION_FILE: &str = "services.json";

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Error reading configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Error creating core: {0}")]
    CoreCreation(#[from] DefinitionError),
    #[error("Error loading definitions: {0}")]
    Definitions(#[from] LoaderError),
}

/// Main entrypoint for the application. Creates a standalone [Core] filled with services from
/// definition files.
#[derive(Constructor, Clone, Debug)]
pub struct Application {
    config: ApplicationConfig,
}

impl Application {
    /// Creates an application configured from the environment.
    pub fn from_environment() -> Result<Self, ApplicationError> {
        Ok(Self::new(ApplicationConfig::init_from_environment()?))
    }

    #[inline]
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    /// Creates a core with default configuration and loads definitions. The main definition file
    /// is `definition_path`, if given, the file pointed to by `SOLSTICE_CONF_FILEPATH` or
    /// `services.json`, in that order. Files from the config are loaded before it.
    pub fn bootstrap(&self, definition_path: Option<&Path>) -> Result<Core, ApplicationError> {
        self.bootstrap_with(CoreBuilder::new()?, definition_path)
    }

    /// Same as [Application::bootstrap], but with a custom [CoreBuilder]. The resulting core is
    /// always standalone.
    pub fn bootstrap_with(
        &self,
        builder: CoreBuilder,
        definition_path: Option<&Path>,
    ) -> Result<Core, ApplicationError> {
        if self.config.install_tracing_logger {
            install_tracing_logger();
        }

        info!("Bootstrapping application...");

        let mut loader = DefinitionLoader::new();
        for file in &self.config.definition_files {
            load_if_exists(&mut loader, Path::new(file), true)?;
        }

        let (main_path, explicit) = main_definition_path(definition_path);
        load_if_exists(&mut loader, &main_path, explicit)?;

        let core = builder.with_standalone(true).build();
        loader.install(&core)?;

        info!(services = core.all_ids().len(), "Application bootstrapped.");
        Ok(core)
    }
}

fn install_tracing_logger() {
    let result = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    if result.is_err() {
        debug!("Global tracing subscriber already installed.");
    }
}

fn main_definition_path(definition_path: Option<&Path>) -> (PathBuf, bool) {
    match definition_path {
        Some(path) => (path.to_path_buf(), true),
        None => match env::var(DEFINITION_PATH_VARIABLE) {
            Ok(path) if !path.is_empty() => (PathBuf::from(path), true),
            _ => (PathBuf::from(DEFAULT_DEFINITION_FILE), false),
        },
    }
}

fn load_if_exists(
    loader: &mut DefinitionLoader,
    path: &Path,
    explicit: bool,
) -> Result<(), LoaderError> {
    if path.is_file() {
        return loader.load_file(path);
    }

    if explicit {
        warn!(path = %path.display(), "Definition file not found - skipping.");
    } else {
        debug!(path = %path.display(), "No default definition file found.");
    }

    Ok(())
}
