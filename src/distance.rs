//! Distance & elevation gain calculators.
//!
//! Two strategies share one contract: points are added one at a time, the
//! cumulative distance can be read at any moment, and `add_point` reports the
//! elevations considered stable enough to feed elevation statistics.
//!
//! A calculator is stateful and not meant to be shared: use one instance per
//! segment (or per task) and merge the results afterwards.

use std::collections::VecDeque;

use crate::geo_utils::{delta_two_points, delta_two_points_with_elevation};

/// Number of elevation samples in the rolling mean of the untrusted strategy.
pub const ELEVATION_WINDOW: usize = 5;

/// Minimum change of the rolling mean, in meters, considered a genuine
/// elevation change by the untrusted strategy.
pub const ELEVATION_THRESHOLD: f64 = 10.0;

/// Select the calculator matching the trust put in the elevations.
pub fn distance_calculator(elevation_trusted: bool) -> DistanceCalculator {
    if elevation_trusted {
        DistanceCalculator::Trusted(TrustedDistance::default())
    } else {
        DistanceCalculator::Untrusted(UntrustedDistance::default())
    }
}

/// Cumulative distance calculator, see [`distance_calculator`].
#[derive(Debug, Clone)]
pub enum DistanceCalculator {
    Trusted(TrustedDistance),
    Untrusted(UntrustedDistance),
}

impl DistanceCalculator {
    /// Add the next point of the track.
    ///
    /// Returns the elevation to account for in elevation statistics, if this
    /// point produced one.
    pub fn add_point(&mut self, latitude: f64, longitude: f64, elevation: Option<f64>) -> Option<f64> {
        match self {
            DistanceCalculator::Trusted(c) => c.add_point(latitude, longitude, elevation),
            DistanceCalculator::Untrusted(c) => c.add_point(latitude, longitude, elevation),
        }
    }

    /// Cumulative distance in meters.
    pub fn distance(&self) -> f64 {
        match self {
            DistanceCalculator::Trusted(c) => c.distance,
            DistanceCalculator::Untrusted(c) => c.distance,
        }
    }
}

/// Every elevation is taken as is. Distances are 3D when both ends of a step
/// have an elevation.
#[derive(Debug, Clone, Default)]
pub struct TrustedDistance {
    distance: f64,
    previous: Option<(f64, f64, Option<f64>)>,
}

impl TrustedDistance {
    fn add_point(&mut self, lat: f64, lon: f64, ele: Option<f64>) -> Option<f64> {
        if let Some((prev_lat, prev_lon, prev_ele)) = self.previous {
            self.distance += match (prev_ele, ele) {
                (Some(prev_ele), Some(ele)) => {
                    delta_two_points_with_elevation(prev_lat, prev_lon, prev_ele, lat, lon, ele)
                }
                _ => delta_two_points(prev_lat, prev_lon, lat, lon),
            };
        }
        self.previous = Some((lat, lon, ele));
        ele
    }
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    distance: f64,
    elevation: f64,
}

/// Rolling mean with threshold.
///
/// Distance accumulates horizontally. Once the window is full the first time,
/// its mean becomes the reference snapshot. Afterwards, whenever the mean
/// moves more than [`ELEVATION_THRESHOLD`] away from the snapshot, the
/// elevation difference is folded into the distance travelled since the
/// snapshot, and the mean is reported as a stable elevation.
#[derive(Debug, Clone, Default)]
pub struct UntrustedDistance {
    distance: f64,
    /// Missing elevations are NaN: they take a slot but not part in the mean
    window: VecDeque<f64>,
    previous: Option<(f64, f64)>,
    snapshot: Option<Snapshot>,
}

impl UntrustedDistance {
    fn add_point(&mut self, lat: f64, lon: f64, ele: Option<f64>) -> Option<f64> {
        self.window.push_back(ele.unwrap_or(f64::NAN));
        if self.window.len() > ELEVATION_WINDOW {
            self.window.pop_front();
        }

        if let Some((prev_lat, prev_lon)) = self.previous {
            self.distance += delta_two_points(prev_lat, prev_lon, lat, lon);
        }
        self.previous = Some((lat, lon));

        if self.window.len() < ELEVATION_WINDOW {
            return None;
        }
        let mean = self.window_mean()?;

        match self.snapshot {
            None => {
                self.snapshot = Some(Snapshot {
                    distance: self.distance,
                    elevation: mean,
                });
                None
            }
            Some(snapshot) => {
                let diff = (mean - snapshot.elevation).abs();
                if diff <= ELEVATION_THRESHOLD {
                    return None;
                }
                self.distance = snapshot.distance + (self.distance - snapshot.distance).hypot(diff);
                self.snapshot = Some(Snapshot {
                    distance: self.distance,
                    elevation: mean,
                });
                Some(mean)
            }
        }
    }

    fn window_mean(&self) -> Option<f64> {
        let (sum, count) = self
            .window
            .iter()
            .filter(|e| !e.is_nan())
            .fold((0.0, 0usize), |(sum, count), e| (sum + e, count + 1));
        (count > 0).then(|| sum / count as f64)
    }
}
