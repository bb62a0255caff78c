//! Driver settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use catalog::StoreOptions;
use tile_engine::{parse_shape, TileEngineConfig};

/// Settings for a [`crate::RasterDriver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSettings {
    /// Seconds to wait for a backing store connection, and for a concurrent
    /// writer to release the catalog.
    pub db_connection_timeout_secs: u64,

    /// Maximum pooled backing store connections.
    pub max_connections: u32,

    /// Decimation bound `(rows, cols)` for metadata computed on first
    /// access of a dataset registered without it.
    pub lazy_loading_max_shape: (usize, usize),

    /// Tile engine configuration.
    pub engine: TileEngineConfig,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            db_connection_timeout_secs: 10,
            max_connections: 5,
            lazy_loading_max_shape: (1024, 1024),
            engine: TileEngineConfig::default(),
        }
    }
}

impl DriverSettings {
    /// Load settings from environment variables.
    pub fn from_env() -> Self {
        let mut settings = Self {
            engine: TileEngineConfig::from_env(),
            ..Self::default()
        };

        if let Ok(val) = std::env::var("RASTERCAT_DB_CONNECTION_TIMEOUT") {
            if let Ok(secs) = val.parse() {
                settings.db_connection_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("RASTERCAT_DB_MAX_CONNECTIONS") {
            if let Ok(max) = val.parse() {
                settings.max_connections = max;
            }
        }

        if let Ok(val) = std::env::var("RASTERCAT_LAZY_LOADING_MAX_SHAPE") {
            if let Some(shape) = parse_shape(&val) {
                settings.lazy_loading_max_shape = shape;
            }
        }

        settings
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.db_connection_timeout_secs == 0 {
            return Err("db_connection_timeout_secs must be > 0".to_string());
        }

        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }

        if self.lazy_loading_max_shape.0 == 0 || self.lazy_loading_max_shape.1 == 0 {
            return Err("lazy_loading_max_shape must have non-zero dimensions".to_string());
        }

        self.engine.validate()
    }

    /// Backing store options derived from these settings.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_connections: self.max_connections,
            connect_timeout: Duration::from_secs(self.db_connection_timeout_secs),
            busy_timeout: Duration::from_secs(self.db_connection_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = DriverSettings::default();
        assert_eq!(settings.lazy_loading_max_shape, (1024, 1024));
        assert!(settings.validate().is_ok());

        let options = settings.store_options();
        assert_eq!(options.max_connections, 5);
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
        assert_eq!(options.busy_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = DriverSettings::default();
        settings.max_connections = 0;
        assert!(settings.validate().is_err());

        let mut settings = DriverSettings::default();
        settings.lazy_loading_max_shape = (0, 10);
        assert!(settings.validate().is_err());

        let mut settings = DriverSettings::default();
        settings.engine.percentile_histogram_bins = 0;
        assert!(settings.validate().is_err());
    }
}
