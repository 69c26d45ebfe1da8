//! Boundaries with the outside world.
//!
//! The correction pipeline only needs three things from its environment:
//! - a request primitive returning one elevation per (lat, lon) pair
//! - a reachability probe, to classify failures as "no internet" or "service down"
//! - somewhere to store corrected elevations
//!
//! Each is a trait so that tests and embedders can plug their own.

use async_trait::async_trait;
use log::debug;

use crate::engine::ElevationData;
use crate::error::Result;

/// Value returned by the elevation service where it has no data.
pub const NON_TRUSTED_ELEVATION: f64 = -99999.0;

/// Request primitive of the elevation service.
#[async_trait]
pub trait ElevationFetcher: Send + Sync {
    /// Fetch one elevation per (latitude, longitude) pair, in order.
    ///
    /// Transport failures are errors. A response containing
    /// [`NON_TRUSTED_ELEVATION`] is a valid answer: the caller decides what
    /// to make of it.
    async fn fetch_elevations(&self, latitudes: &[f64], longitudes: &[f64]) -> Result<Vec<f64>>;
}

/// Reachability check of a host.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self, host: &str) -> bool;
}

/// Durable storage of corrected elevations, owned by the embedding application.
#[async_trait]
pub trait ElevationPersister: Send + Sync {
    /// Write back the elevations of `data.segment_profiles` into the recording
    /// identified by `data.id`.
    async fn update_elevations(&self, data: &ElevationData) -> Result<()>;
}

/// Probe considering a host reachable when its name resolves.
#[derive(Debug, Clone, Default)]
pub struct DnsProbe;

#[async_trait]
impl ReachabilityProbe for DnsProbe {
    async fn is_reachable(&self, host: &str) -> bool {
        match tokio::net::lookup_host((host, 443)).await {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(e) => {
                debug!("[DnsProbe] {} unreachable: {}", host, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dns_probe_rejects_invalid_host() {
        assert!(!DnsProbe.is_reachable("host.invalid").await);
    }

    #[tokio::test]
    async fn test_dns_probe_accepts_localhost() {
        assert!(DnsProbe.is_reachable("localhost").await);
    }
}
