//! Tracing subscriber setup.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::PortalError;

/// `[logging]` table of the portal configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
    /// Extra filter directives, e.g. `"parcelgate_session=debug"`.
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            directives: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl LoggingConfig {
    /// The filter this configuration installs. `RUST_LOG` wins over
    /// `level` when set; `directives` are added on top either way.
    pub fn env_filter(&self) -> Result<EnvFilter, PortalError> {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.level));
        for directive in &self.directives {
            let parsed = directive.parse().map_err(|e| {
                PortalError::Config(format!("bad log directive {directive:?}: {e}"))
            })?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }
}

/// Installs the global tracing subscriber.
///
/// # Errors
/// [`PortalError::Config`] for an unparsable directive, or when a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), PortalError> {
    let filter = config.env_filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };
    installed.map_err(|e| PortalError::Config(format!("tracing already initialised: {e}")))
}
