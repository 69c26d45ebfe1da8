//! Track statistics: distance, elevation extremes and stacks, duration,
//! average speed and bounds, computed incrementally in a single pass.
//!
//! A [`TrackStatCalculator`] is not synchronized. Use one per segment (or per
//! task) and combine them with [`merge_stats`] and [`merge_bounds`].

use log::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::distance::{distance_calculator, DistanceCalculator};
use crate::{Bounds, GeoRecord, GeoStatistics, Segment, TrackPoint};

/// Incremental statistics of one run of points.
#[derive(Debug, Clone)]
pub struct TrackStatCalculator {
    distance_calculator: DistanceCalculator,
    elevation_up_stack: f64,
    elevation_down_stack: f64,
    duration_seconds: Option<u64>,

    first_point_time: Option<i64>,

    last_known_elevation: Option<f64>,
    lowest_elevation: Option<f64>,
    highest_elevation: Option<f64>,

    bounds: Option<Bounds>,
}

impl TrackStatCalculator {
    pub fn new(distance_calculator: DistanceCalculator) -> Self {
        Self {
            distance_calculator,
            elevation_up_stack: 0.0,
            elevation_down_stack: 0.0,
            duration_seconds: None,
            first_point_time: None,
            last_known_elevation: None,
            lowest_elevation: None,
            highest_elevation: None,
            bounds: None,
        }
    }

    /// Calculator using the distance strategy matching `elevation_trusted`.
    pub fn for_trust(elevation_trusted: bool) -> Self {
        Self::new(distance_calculator(elevation_trusted))
    }

    pub fn add_track_point(&mut self, point: &TrackPoint) {
        if let Some(elevation) =
            self.distance_calculator
                .add_point(point.latitude, point.longitude, point.elevation)
        {
            self.update_elevation_stats(elevation);
        }
        self.update_duration(point.timestamp);
        self.update_bounds(point.latitude, point.longitude);
    }

    pub fn add_track_points<'a>(&mut self, points: impl IntoIterator<Item = &'a TrackPoint>) {
        for point in points {
            self.add_track_point(point);
        }
    }

    /// Cumulative distance so far, in meters.
    pub fn distance(&self) -> f64 {
        self.distance_calculator.distance()
    }

    pub fn statistics(&self) -> GeoStatistics {
        let avg_speed = self
            .duration_seconds
            .filter(|&d| d > 0)
            .map(|d| self.distance() / d as f64);

        GeoStatistics {
            distance: self.distance(),
            elevation_min: self.lowest_elevation,
            elevation_max: self.highest_elevation,
            elevation_up_stack: self.elevation_up_stack,
            elevation_down_stack: self.elevation_down_stack,
            duration_seconds: self.duration_seconds,
            avg_speed,
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// True until the first point is added.
    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    fn update_elevation_stats(&mut self, elevation: f64) {
        self.lowest_elevation = Some(self.lowest_elevation.map_or(elevation, |e| e.min(elevation)));
        self.highest_elevation = Some(self.highest_elevation.map_or(elevation, |e| e.max(elevation)));

        if let Some(previous) = self.last_known_elevation {
            if elevation > previous {
                self.elevation_up_stack += elevation - previous;
            } else {
                self.elevation_down_stack += previous - elevation;
            }
        }
        self.last_known_elevation = Some(elevation);
    }

    /// The first timestamp is the origin. Timestamps going backwards are ignored.
    fn update_duration(&mut self, timestamp: Option<i64>) {
        let Some(time) = timestamp else { return };
        match self.first_point_time {
            None => self.first_point_time = Some(time),
            Some(origin) if time > origin => {
                self.duration_seconds = Some(((time - origin) / 1000) as u64);
            }
            Some(_) => {}
        }
    }

    fn update_bounds(&mut self, latitude: f64, longitude: f64) {
        match self.bounds.as_mut() {
            Some(bounds) => bounds.extend(latitude, longitude),
            None => self.bounds = Some(Bounds::from_point(latitude, longitude)),
        }
    }
}

/// Statistics of several calculators taken as one track. Empty calculators
/// are skipped.
pub fn merge_stats(calculators: &[TrackStatCalculator]) -> GeoStatistics {
    let stats: Vec<GeoStatistics> = calculators
        .iter()
        .filter(|c| !c.is_empty())
        .map(TrackStatCalculator::statistics)
        .collect();
    GeoStatistics::merge(&stats)
}

/// Bounds of several calculators taken as one track, `None` if all are empty.
pub fn merge_bounds(calculators: &[TrackStatCalculator]) -> Option<Bounds> {
    let bounds: Vec<Bounds> = calculators.iter().filter_map(TrackStatCalculator::bounds).collect();
    Bounds::merge(&bounds)
}

fn segment_calculator(segment: &Segment, elevation_trusted: bool) -> TrackStatCalculator {
    let mut calculator = TrackStatCalculator::for_trust(elevation_trusted);
    calculator.add_track_points(&segment.points);
    calculator
}

/// Statistics and bounds of a whole recording, every track and segment
/// included. Each segment gets its own calculator.
pub fn record_statistics(record: &GeoRecord) -> (GeoStatistics, Option<Bounds>) {
    let trusted = record.has_trusted_elevations();
    let segments: Vec<&Segment> = record
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .collect();

    #[cfg(feature = "parallel")]
    let calculators: Vec<TrackStatCalculator> = segments
        .par_iter()
        .map(|segment| segment_calculator(segment, trusted))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let calculators: Vec<TrackStatCalculator> = segments
        .iter()
        .map(|segment| segment_calculator(segment, trusted))
        .collect();

    debug!(
        "[Stats] Record {}: {} segments, trusted elevations: {}",
        record.id,
        calculators.len(),
        trusted
    );

    (merge_stats(&calculators), merge_bounds(&calculators))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ElevationSource, Track};

    fn climb(start_time: i64) -> Vec<TrackPoint> {
        (0..11)
            .map(|i| {
                TrackPoint::new(45.0 + i as f64 * 0.001, 6.0)
                    .with_elevation(1000.0 + i as f64 * 10.0)
                    .with_timestamp(start_time + i * 60_000)
            })
            .collect()
    }

    #[test]
    fn test_empty_calculator() {
        let calculator = TrackStatCalculator::for_trust(true);
        assert!(calculator.is_empty());
        assert!(calculator.bounds().is_none());
        assert_eq!(calculator.statistics(), GeoStatistics::default());
    }

    #[test]
    fn test_trusted_climb() {
        let mut calculator = TrackStatCalculator::for_trust(true);
        calculator.add_track_points(&climb(0));

        let stats = calculator.statistics();
        assert_eq!(stats.elevation_min, Some(1000.0));
        assert_eq!(stats.elevation_max, Some(1100.0));
        assert!((stats.elevation_up_stack - 100.0).abs() < 1e-9);
        assert_eq!(stats.elevation_down_stack, 0.0);
        assert_eq!(stats.duration_seconds, Some(600));
        let speed = stats.avg_speed.unwrap();
        assert!((speed - stats.distance / 600.0).abs() < 1e-9);

        let bounds = calculator.bounds().unwrap();
        assert_eq!(bounds.min_lat, 45.0);
        assert!((bounds.max_lat - 45.01).abs() < 1e-12);
    }

    #[test]
    fn test_untrusted_noise_keeps_stacks_at_zero() {
        let mut calculator = TrackStatCalculator::for_trust(false);
        for i in 0..100 {
            let ele = if i % 2 == 0 { 1209.0 } else { 1191.0 };
            calculator.add_track_point(&TrackPoint::new(45.0, 6.0).with_elevation(ele));
        }
        let stats = calculator.statistics();
        assert_eq!(stats.elevation_up_stack, 0.0);
        assert_eq!(stats.elevation_down_stack, 0.0);
        assert_eq!(stats.elevation_min, None);
    }

    #[test]
    fn test_timestamps_going_backwards_are_ignored() {
        let mut calculator = TrackStatCalculator::for_trust(true);
        calculator.add_track_point(&TrackPoint::new(45.0, 6.0).with_timestamp(10_000));
        calculator.add_track_point(&TrackPoint::new(45.0, 6.0).with_timestamp(70_000));
        calculator.add_track_point(&TrackPoint::new(45.0, 6.0).with_timestamp(5_000));
        assert_eq!(calculator.statistics().duration_seconds, Some(60));
    }

    #[test]
    fn test_merge_skips_empty_calculators() {
        let mut a = TrackStatCalculator::for_trust(true);
        a.add_track_points(&climb(0));
        let empty = TrackStatCalculator::for_trust(true);

        let merged = merge_stats(&[a.clone(), empty.clone()]);
        let single = a.statistics();
        assert_eq!(merged.distance, single.distance);
        assert_eq!(merged.elevation_max, single.elevation_max);
        assert_eq!(merged.duration_seconds, single.duration_seconds);
        assert!((merged.avg_speed.unwrap() - single.avg_speed.unwrap()).abs() < 1e-9);
        assert_eq!(merge_bounds(&[empty.clone(), a.clone()]), a.bounds());
        assert!(merge_bounds(&[empty]).is_none());
    }

    #[test]
    fn test_record_statistics_spans_all_tracks() {
        let first = Track::new(vec![Segment::new(climb(0))]);
        let second = Track::new(vec![Segment::new(climb(3_600_000))]);
        let record = GeoRecord::new("r1", "Two climbs", vec![first, second])
            .with_elevation_source(ElevationSource::IgnRgeAlti, 20);

        let (stats, bounds) = record_statistics(&record);
        assert_eq!(stats.duration_seconds, Some(1200));
        assert!((stats.elevation_up_stack - 200.0).abs() < 1e-9);
        assert!(bounds.is_some());
    }
}
