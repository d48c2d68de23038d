//! Bridge configuration.
//!
//! Configuration is a single JSON document, usually handed over by the
//! extension module through `lobbywire_init_steam`. Every field has a
//! default, so `{}` is a valid config.
//!
//! ```json
//! {
//!   "steam": { "library_paths": ["bin/"], "prefer_init_safe": true },
//!   "pump": { "rate_hz": 60, "budget_us": 4000 },
//!   "log_filter": "lobbywire=debug"
//! }
//! ```

#[cfg(feature = "steam")]
use lobbywire_dispatch::SteamConfig;
use lobbywire_pump::PumpConfig;
use serde::{Deserialize, Serialize};

use crate::LobbywireError;

/// Everything a [`Bridge`](crate::Bridge) can be configured with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Where to find the SDK library and how to initialise it.
    #[cfg(feature = "steam")]
    pub steam: SteamConfig,

    /// Callback pump cadence and budget.
    pub pump: PumpConfig,

    /// `tracing` filter directive. Overrides `LOBBYWIRE_LOG` / `RUST_LOG`.
    pub log_filter: Option<String>,
}

impl BridgeConfig {
    /// Parses a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, LobbywireError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the config, e.g. to log the effective settings.
    pub fn to_json(&self) -> Result<String, LobbywireError> {
        Ok(serde_json::to_string(self)?)
    }
}
