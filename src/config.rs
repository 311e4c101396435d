use std::path::Path;

use confique::Config as _;

use crate::prelude::*;


/// The locations where we look for a configuration file if the environment
/// does not say otherwise. All existing files are loaded, earlier ones taking
/// precedence. In a Lambda deployment there is usually no file at all and
/// everything comes from environment variables.
const DEFAULT_PATHS: &[&str] = &["config.toml", "/etc/alexandria/config.toml"];

/// Environment variable to explicitly set the config file path.
const CONFIG_PATH_ENV: &str = "ALEXANDRIA_CONFIG_PATH";

/// Configuration for the whole backend.
///
/// Each section lives next to the subsystem it configures; this is just the
/// glue. Environment variables (e.g. `MONGODB_URI`, `JWT_SECRET`) override
/// values from files.
#[derive(Debug, confique::Config)]
pub(crate) struct Config {
    #[config(nested)]
    pub(crate) store: crate::store::StoreConfig,

    #[config(nested)]
    pub(crate) auth: crate::auth::AuthConfig,

    #[config(nested)]
    pub(crate) gateway: crate::gateway::GatewayConfig,

    #[config(nested)]
    pub(crate) log: crate::logger::LogConfig,
}

impl Config {
    /// Loads the configuration from the environment and any config files that
    /// exist. Required values that are missing everywhere (like the store URI
    /// or the JWT secret) make this fail, which aborts startup right away.
    pub(crate) fn load() -> Result<Self> {
        let mut builder = Self::builder().env();

        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            let path = Path::new(&path);
            if !path.exists() {
                bail!(
                    "config file '{}' (set via {}) does not exist",
                    path.display(),
                    CONFIG_PATH_ENV,
                );
            }
            builder = builder.file(path);
        }
        for path in DEFAULT_PATHS {
            builder = builder.file(path);
        }

        builder.load().context("failed to load configuration")
    }
}
