//! # Track Elevation
//!
//! GPS track statistics and elevation profiles for recorded or imported hikes.
//!
//! This library provides:
//! - Distance and elevation gain computation robust to GPS elevation noise
//! - Distance-based sub-sampling of dense tracks
//! - Remote elevation correction with bounded-parallelism requests
//! - Per-point elevation-vs-distance profiles
//! - A debounced recomputation engine publishing its state to observers
//!
//! ## Features
//!
//! - **`parallel`** - Compute per-segment statistics in parallel with rayon
//! - **`http`** - Enable the reqwest-backed elevation service client
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use track_elevation::{distance_calculator, subsample, TrackPoint};
//!
//! let points: Vec<TrackPoint> = (0..10)
//!     .map(|i| TrackPoint::new(45.0 + i as f64 * 0.001, 6.0).with_elevation(1000.0))
//!     .collect();
//!
//! // Keep a point roughly every 20 meters
//! let sampled: Vec<_> = subsample(&points, 20.0).collect();
//! assert_eq!(sampled.first().map(|p| p.index), Some(0));
//! assert_eq!(sampled.last().map(|p| p.index), Some(9));
//!
//! // Cumulative distance with trusted elevations
//! let mut calculator = distance_calculator(true);
//! for p in &points {
//!     calculator.add_point(p.latitude, p.longitude, p.elevation);
//! }
//! assert!(calculator.distance() > 1000.0);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{ElevationError, OptionExt, Result};

// Pipeline configuration
pub mod config;
pub use config::ElevationConfig;

// Geographic utilities (flat-earth deltas)
pub mod geo_utils;

// Distance-based point sub-sampling
pub mod subsample;
pub use subsample::{subsample, SubSampler};

// Distance & elevation gain calculators
pub mod distance;
pub use distance::{distance_calculator, DistanceCalculator};

// Track statistics and merging
pub mod stats;
pub use stats::{merge_bounds, merge_stats, record_statistics, TrackStatCalculator};

// Collaborator boundaries (request primitive, reachability, persistence)
pub mod remote;
pub use remote::{
    DnsProbe, ElevationFetcher, ElevationPersister, ReachabilityProbe, NON_TRUSTED_ELEVATION,
};

// Remote elevation correction
pub mod corrector;
pub use corrector::{ElevationCorrector, NetworkStatus, TrackElevations};

// Elevation profile interpolation
pub mod profile;
pub use profile::{build_elevation_state, interpolate_segment};

// Debounced recomputation engine
pub mod engine;
pub use engine::{ElevationData, ElevationEngine, ElevationEvent, ElevationState};

// HTTP client for the elevation service
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::IgnElevationClient;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS fix, the immutable input unit of every computation.
///
/// # Example
/// ```
/// use track_elevation::TrackPoint;
/// let point = TrackPoint::new(45.1885, 5.7245).with_elevation(212.0);
/// assert_eq!(point.elevation, Some(212.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in meters, if known
    pub elevation: Option<f64>,
    /// Epoch milliseconds, if known
    pub timestamp: Option<i64>,
}

impl TrackPoint {
    /// Create a point without elevation nor timestamp.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
            timestamp: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp = Some(timestamp_ms);
        self
    }
}

/// A contiguous run of points, e.g. one recording session without pause.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub points: Vec<TrackPoint>,
}

impl Segment {
    pub fn new(points: Vec<TrackPoint>) -> Self {
        Self { points }
    }
}

/// An ordered sequence of segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub segments: Vec<Segment>,
}

impl Track {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }
}

/// Where the elevations of a recording come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElevationSource {
    /// Raw GPS altitude, noisy
    Gps,
    /// Corrected by the IGN RGE Alti service
    IgnRgeAlti,
    Unknown,
}

impl ElevationSource {
    pub fn is_trusted(self) -> bool {
        matches!(self, ElevationSource::IgnRgeAlti)
    }
}

/// Elevation source of a recording, with the sampling used to obtain it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationSourceInfo {
    pub source: ElevationSource,
    pub sampling_meters: u32,
}

/// A recording: one or more tracks plus the provenance of their elevations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRecord {
    pub id: String,
    pub name: String,
    pub tracks: Vec<Track>,
    pub elevation_source_info: Option<ElevationSourceInfo>,
}

impl GeoRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tracks,
            elevation_source_info: None,
        }
    }

    pub fn with_elevation_source(mut self, source: ElevationSource, sampling_meters: u32) -> Self {
        self.elevation_source_info = Some(ElevationSourceInfo {
            source,
            sampling_meters,
        });
        self
    }

    /// The declared elevation source, `Unknown` when the recording says nothing.
    pub fn elevation_source(&self) -> ElevationSource {
        self.elevation_source_info
            .map(|info| info.source)
            .unwrap_or(ElevationSource::Unknown)
    }

    pub fn has_trusted_elevations(&self) -> bool {
        self.elevation_source().is_trusted()
    }
}

/// A sub-sampled point, tagged with its position in the original sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexedPoint {
    /// Index in the original (full resolution) segment
    pub index: usize,
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in meters; unknown elevations are stored as 0.0
    pub elevation: f64,
}

/// One point of an elevation profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElePoint {
    /// Distance from the start of the track, in meters
    pub distance: f64,
    pub elevation: f64,
}

/// The profile of one segment, one point per original track point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentProfile {
    pub points: Vec<ElePoint>,
}

/// Bounding box of a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl Bounds {
    /// Degenerate bounds around a single point.
    pub fn from_point(latitude: f64, longitude: f64) -> Self {
        Self {
            min_lat: latitude,
            min_lon: longitude,
            max_lat: latitude,
            max_lon: longitude,
        }
    }

    /// Grow the bounds to include a point.
    pub fn extend(&mut self, latitude: f64, longitude: f64) {
        self.min_lat = self.min_lat.min(latitude);
        self.min_lon = self.min_lon.min(longitude);
        self.max_lat = self.max_lat.max(latitude);
        self.max_lon = self.max_lon.max(longitude);
    }

    /// Smallest bounds containing all the given bounds.
    pub fn merge<'a>(bounds: impl IntoIterator<Item = &'a Bounds>) -> Option<Bounds> {
        bounds.into_iter().fold(None, |acc, b| {
            Some(match acc {
                None => *b,
                Some(acc) => Bounds {
                    min_lat: acc.min_lat.min(b.min_lat),
                    min_lon: acc.min_lon.min(b.min_lon),
                    max_lat: acc.max_lat.max(b.max_lat),
                    max_lon: acc.max_lon.max(b.max_lon),
                },
            })
        })
    }
}

/// Summary statistics of a track. Always recomputed as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoStatistics {
    /// Distance in meters
    pub distance: f64,
    /// Lowest stable elevation in meters
    pub elevation_min: Option<f64>,
    /// Highest stable elevation in meters
    pub elevation_max: Option<f64>,
    /// Cumulative elevation up in meters
    pub elevation_up_stack: f64,
    /// Cumulative elevation down in meters
    pub elevation_down_stack: f64,
    pub duration_seconds: Option<u64>,
    /// Average speed in m/s
    pub avg_speed: Option<f64>,
}

impl GeoStatistics {
    /// Combine statistics of several tracks or segments.
    ///
    /// Distances and stacks are summed, elevation extremes are global, and
    /// the average speed is weighted by duration.
    pub fn merge<'a>(stats: impl IntoIterator<Item = &'a GeoStatistics>) -> GeoStatistics {
        let mut merged = GeoStatistics::default();
        let mut total_duration: u64 = 0;
        let mut has_duration = false;
        let mut weighted_speed = 0.0;
        let mut speed_duration: u64 = 0;

        for s in stats {
            merged.distance += s.distance;
            merged.elevation_up_stack += s.elevation_up_stack;
            merged.elevation_down_stack += s.elevation_down_stack;
            merged.elevation_min = min_option(merged.elevation_min, s.elevation_min);
            merged.elevation_max = max_option(merged.elevation_max, s.elevation_max);

            if let Some(duration) = s.duration_seconds {
                has_duration = true;
                total_duration += duration;
                if let Some(speed) = s.avg_speed {
                    weighted_speed += speed * duration as f64;
                    speed_duration += duration;
                }
            }
        }

        if has_duration {
            merged.duration_seconds = Some(total_duration);
        }
        if speed_duration > 0 {
            merged.avg_speed = Some(weighted_speed / speed_duration as f64);
        }
        merged
    }
}

fn min_option(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_option(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

// ============================================================================
// Tests
// ============================================================================
