//! Configuration management

use lambdabridge_core::BridgeConfig;
use lambdabridge_runtime::LocalConfig;
use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub local: LocalConfig,
}

impl Settings {
    /// Load configuration from file and environment
    ///
    /// The file is optional. Environment variables use the `LAMBDABRIDGE_`
    /// prefix and `__` between sections, e.g.
    /// `LAMBDABRIDGE_BRIDGE__MULTI_VALUE_HEADERS=true`.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("LAMBDABRIDGE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        Ok(builder.build()?.try_deserialize::<Settings>()?)
    }
}
