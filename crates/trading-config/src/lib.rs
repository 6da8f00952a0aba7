//! Configuration management.

mod settings;

pub use settings::{
    AppConfig, AppSettings, DecoderSettings, ExchangeSettings, LoggingConfig, PipelineMode,
    ObserverKind, PipelineSettings, StrategySettings, TraderSettings,
};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load configuration from file and environment.
///
/// Variables like `TRADING__TRADER__AGGRESSIVE=true` override the file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("TRADING")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}

/// Render the default configuration as TOML.
pub fn default_template() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&AppConfig::default())
}
