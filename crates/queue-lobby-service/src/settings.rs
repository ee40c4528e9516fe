//! Layered configuration loading and logging setup.
//!
//! Sources, later ones overriding earlier ones:
//!  1. `/etc/queue-lobby/service.yaml`, system-wide defaults
//!  2. `./config/service.yaml`, deployment-local override
//!  3. the file passed with `--config` / `QUEUE_LOBBY_CONFIG` (must exist)
//!  4. environment variables prefixed `QL__`, `__` separating keys,
//!     e.g. `QL__SERVER__PORT=9090` sets `server.port`
//!
//! Every field has a default, so with no sources at all the service still
//! starts. A malformed file or an uncoercible variable is a hard error.

use config::{Config, Environment, File, FileFormat};
use queue_lobby_api::{LoggingConfig, ServiceConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;

const SYSTEM_CONFIG: &str = "/etc/queue-lobby/service.yaml";
const LOCAL_CONFIG: &str = "config/service.yaml";
const ENV_PREFIX: &str = "QL";

/// Where configuration is read from
pub struct ConfigLoader {
    system_file: PathBuf,
    local_file: PathBuf,
    explicit_file: Option<PathBuf>,
    environment: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new(explicit_file: Option<PathBuf>) -> Self {
        Self {
            system_file: PathBuf::from(SYSTEM_CONFIG),
            local_file: PathBuf::from(LOCAL_CONFIG),
            explicit_file,
            environment: None,
        }
    }

    /// Read variables from `vars` instead of the process environment
    #[cfg(test)]
    fn with_environment(mut self, vars: HashMap<String, String>) -> Self {
        self.environment = Some(vars);
        self
    }

    #[cfg(test)]
    fn with_default_files(mut self, system_file: PathBuf, local_file: PathBuf) -> Self {
        self.system_file = system_file;
        self.local_file = local_file;
        self
    }

    pub fn load(&self) -> Result<ServiceConfig, config::ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::from(self.system_file.clone()).required(false).format(FileFormat::Yaml))
            .add_source(File::from(self.local_file.clone()).required(false).format(FileFormat::Yaml));

        if let Some(path) = &self.explicit_file {
            builder = builder.add_source(File::from(path.clone()).required(true).format(FileFormat::Yaml));
        }

        let environment = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(self.environment.clone());

        builder.add_source(environment).build()?.try_deserialize()
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
