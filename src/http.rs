//! HTTP client for the IGN altimetry service (RGE ALTI).
//!
//! One request per chunk of points: coordinates are joined with `|` in the
//! query string and the service answers with one elevation per point, in
//! order. Points without data come back as [`NON_TRUSTED_ELEVATION`].
//!
//! [`NON_TRUSTED_ELEVATION`]: crate::remote::NON_TRUSTED_ELEVATION

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::ElevationConfig;
use crate::error::{ElevationError, Result};
use crate::remote::ElevationFetcher;

const ELEVATION_PATH: &str = "/altimetrie/1.0/calcul/alti/rest/elevation.json";
const RESOURCE: &str = "ign_rge_alti_wld";

// Retries only cover throttling; anything else fails the chunk
const MAX_RETRIES: u32 = 2;
const RETRY_BACKOFF_MS: u64 = 250;

#[derive(Debug, Deserialize)]
struct ElevationResponse {
    elevations: Vec<f64>,
}

/// [`ElevationFetcher`] backed by reqwest.
pub struct IgnElevationClient {
    client: Client,
    host: String,
}

impl IgnElevationClient {
    pub fn new(config: &ElevationConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.max_concurrency)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ElevationError::http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            host: config.service_host.clone(),
        })
    }

    fn url(&self, latitudes: &[f64], longitudes: &[f64]) -> String {
        format!(
            "https://{}{}?lon={}&lat={}&resource={}&delimiter=|&indent=false&measures=false&zonly=true",
            self.host,
            ELEVATION_PATH,
            join(longitudes),
            join(latitudes),
            RESOURCE
        )
    }
}

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

fn parse_elevations(body: &str, expected: usize) -> Result<Vec<f64>> {
    let response: ElevationResponse =
        serde_json::from_str(body).map_err(|e| ElevationError::http(format!("Invalid response: {}", e)))?;

    if response.elevations.len() != expected {
        return Err(ElevationError::MalformedResponse {
            expected,
            got: response.elevations.len(),
        });
    }
    Ok(response.elevations)
}

#[async_trait]
impl ElevationFetcher for IgnElevationClient {
    async fn fetch_elevations(&self, latitudes: &[f64], longitudes: &[f64]) -> Result<Vec<f64>> {
        if latitudes.len() != longitudes.len() {
            return Err(ElevationError::Internal {
                message: format!(
                    "{} latitudes for {} longitudes",
                    latitudes.len(),
                    longitudes.len()
                ),
            });
        }

        let url = self.url(latitudes, longitudes);
        let start = Instant::now();
        let mut retries = 0;

        loop {
            let response = self.client.get(&url).send().await.map_err(|e| {
                if e.is_timeout() {
                    ElevationError::Timeout {
                        timeout_ms: start.elapsed().as_millis() as u64,
                    }
                } else {
                    ElevationError::http(e.to_string())
                }
            })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                retries += 1;
                let backoff = Duration::from_millis(RETRY_BACKOFF_MS << retries);
                warn!(
                    "[IgnElevationClient] 429, retry {} after {:?}",
                    retries, backoff
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            if !status.is_success() {
                return Err(ElevationError::Http {
                    message: format!("HTTP {}", status),
                    status_code: Some(status.as_u16()),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| ElevationError::http(e.to_string()))?;

            debug!(
                "[IgnElevationClient] {} points in {:.0}ms",
                latitudes.len(),
                start.elapsed().as_secs_f64() * 1000.0
            );
            return parse_elevations(&body, latitudes.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url() {
        let client = IgnElevationClient::new(&ElevationConfig::default()).unwrap();
        let url = client.url(&[45.5, 45.25], &[6.0, 6.125]);
        assert_eq!(
            url,
            "https://data.geopf.fr/altimetrie/1.0/calcul/alti/rest/elevation.json\
             ?lon=6|6.125&lat=45.5|45.25&resource=ign_rge_alti_wld\
             &delimiter=|&indent=false&measures=false&zonly=true"
        );
    }

    #[test]
    fn test_parse_elevations() {
        let body = r#"{"elevations": [1012.5, -99999.0]}"#;
        assert_eq!(parse_elevations(body, 2).unwrap(), vec![1012.5, -99999.0]);
    }

    #[test]
    fn test_parse_rejects_wrong_count() {
        let body = r#"{"elevations": [1012.5]}"#;
        assert!(matches!(
            parse_elevations(body, 2),
            Err(ElevationError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_elevations("<html>", 1),
            Err(ElevationError::Http { .. })
        ));
    }

    #[tokio::test]
    async fn test_mismatched_coordinates() {
        let client = IgnElevationClient::new(&ElevationConfig::default()).unwrap();
        assert!(client.fetch_elevations(&[45.0], &[]).await.is_err());
    }
}
