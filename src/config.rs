//! Tunables for sub-sampling and remote elevation correction.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ElevationError, Result};

/// Configuration for the elevation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevationConfig {
    /// Minimum horizontal distance between two sub-sampled points.
    /// Default: 20 meters
    pub sampling_meters: u32,

    /// Number of sub-sampled points sent in one elevation request.
    /// Default: 40
    pub chunk_size: usize,

    /// Maximum number of elevation requests in flight for one segment.
    /// Default: 8
    pub max_concurrency: usize,

    /// Time budget of a single elevation request.
    /// Default: 4000 ms
    pub request_timeout_ms: u64,

    /// Host probed first to tell "no internet" apart from "service down".
    /// Default: "google.com"
    pub probe_host: String,

    /// Host of the elevation service.
    /// Default: "data.geopf.fr"
    pub service_host: String,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            sampling_meters: 20,
            chunk_size: 40,
            max_concurrency: 8,
            request_timeout_ms: 4000,
            probe_host: "google.com".to_string(),
            service_host: "data.geopf.fr".to_string(),
        }
    }
}

impl ElevationConfig {
    /// Parse a configuration from JSON. Missing fields take their default value.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ElevationError::Config {
            message: format!("invalid JSON: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every tunable is usable.
    pub fn validate(&self) -> Result<()> {
        let problem = if self.sampling_meters == 0 {
            Some("sampling_meters must be positive")
        } else if self.chunk_size == 0 {
            Some("chunk_size must be positive")
        } else if self.max_concurrency == 0 {
            Some("max_concurrency must be positive")
        } else if self.request_timeout_ms == 0 {
            Some("request_timeout_ms must be positive")
        } else if self.probe_host.is_empty() || self.service_host.is_empty() {
            Some("hosts must not be empty")
        } else {
            None
        };

        match problem {
            Some(message) => Err(ElevationError::Config {
                message: message.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn sampling_threshold(&self) -> f64 {
        f64::from(self.sampling_meters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ElevationConfig::default();
        assert_eq!(config.sampling_meters, 20);
        assert_eq!(config.chunk_size, 40);
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.request_timeout(), Duration::from_millis(4000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = ElevationConfig::from_json(r#"{"chunk_size": 10}"#).unwrap();
        assert_eq!(config.chunk_size, 10);
        assert_eq!(config.sampling_meters, 20);
        assert_eq!(config.service_host, "data.geopf.fr");
    }

    #[test]
    fn test_from_json_rejects_zero_concurrency() {
        let result = ElevationConfig::from_json(r#"{"max_concurrency": 0}"#);
        assert!(matches!(result, Err(ElevationError::Config { .. })));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(ElevationConfig::from_json("not json").is_err());
    }
}
