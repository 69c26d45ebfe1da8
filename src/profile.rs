//! Elevation profile assembly.
//!
//! Sparse sub-sampled elevations are spread back over every original point by
//! linear interpolation on the point index. The interpolated points feed a
//! [`TrackStatCalculator`], which yields both the running distance of the
//! profile and the statistics of the segment.

use crate::corrector::TrackElevations;
use crate::engine::{ElevationData, ElevationState};
use crate::stats::{merge_bounds, merge_stats, TrackStatCalculator};
use crate::{ElePoint, GeoRecord, IndexedPoint, SegmentProfile, TrackPoint};

/// Interpolate the elevation of every point of a segment from its reference
/// points.
///
/// `references` must come from sub-sampling `points` (indices strictly
/// increasing, within bounds). Distances start at `distance_offset` so that
/// consecutive segments form one continuous profile.
///
/// Returns the profile and the statistics calculator fed along the way.
///
/// # Example
/// ```
/// use track_elevation::{interpolate_segment, IndexedPoint, TrackPoint};
///
/// let points: Vec<TrackPoint> = (0..11).map(|i| TrackPoint::new(45.0 + i as f64 * 0.0001, 6.0)).collect();
/// let references = [
///     IndexedPoint { index: 0, latitude: 45.0, longitude: 6.0, elevation: 100.0 },
///     IndexedPoint { index: 10, latitude: 45.001, longitude: 6.0, elevation: 200.0 },
/// ];
/// let (profile, _) = interpolate_segment(&points, &references, true, 0.0);
/// assert_eq!(profile[5].elevation, 150.0);
/// ```
pub fn interpolate_segment(
    points: &[TrackPoint],
    references: &[IndexedPoint],
    elevation_trusted: bool,
    distance_offset: f64,
) -> (Vec<ElePoint>, TrackStatCalculator) {
    let mut calculator = TrackStatCalculator::for_trust(elevation_trusted);

    let mut sorted = references.to_vec();
    sorted.sort_by_key(|p| p.index);

    if sorted.len() < 2 {
        let Some(only) = sorted.first() else {
            return (Vec::new(), calculator);
        };
        let profile = points
            .iter()
            .map(|point| {
                calculator.add_track_point(&TrackPoint {
                    elevation: Some(only.elevation),
                    ..*point
                });
                ElePoint {
                    distance: distance_offset,
                    elevation: only.elevation,
                }
            })
            .collect();
        return (profile, calculator);
    }

    let mut next_refs = sorted.iter().skip(2);
    let mut previous_ref = &sorted[0];
    let mut next_ref = &sorted[1];

    let profile = points
        .iter()
        .enumerate()
        .map(|(index, point)| {
            debug_assert!(next_ref.index > previous_ref.index);
            let ratio = (index as f64 - previous_ref.index as f64)
                / (next_ref.index - previous_ref.index) as f64;
            let elevation =
                previous_ref.elevation + ratio * (next_ref.elevation - previous_ref.elevation);

            calculator.add_track_point(&TrackPoint {
                elevation: Some(elevation),
                ..*point
            });

            if index >= next_ref.index {
                if let Some(following) = next_refs.next() {
                    previous_ref = next_ref;
                    next_ref = following;
                }
            }

            ElePoint {
                distance: distance_offset + calculator.distance(),
                elevation,
            }
        })
        .collect();

    (profile, calculator)
}

/// Build the terminal state for `record` from its sub-sampled elevations.
///
/// Segments are concatenated into one profile. Elevation extremes come from
/// the sub-sampled points rather than the full resolution ones.
pub fn build_elevation_state(
    record: &GeoRecord,
    elevations: TrackElevations,
    sampling_meters: u32,
) -> ElevationState {
    let Some(track) = record.tracks.first() else {
        return ElevationState::NoElevationData;
    };
    if elevations.segments.iter().all(|s| s.is_empty()) {
        return ElevationState::NoElevationData;
    }

    let trusted = elevations.source.is_trusted();
    let mut distance_offset = 0.0;
    let mut calculators = Vec::with_capacity(track.segments.len());
    let mut segment_profiles = Vec::with_capacity(track.segments.len());

    for (segment, references) in track.segments.iter().zip(&elevations.segments) {
        let (points, calculator) =
            interpolate_segment(&segment.points, references, trusted, distance_offset);
        if let Some(last) = points.last() {
            distance_offset = last.distance;
        }
        calculators.push(calculator);
        segment_profiles.push(SegmentProfile { points });
    }

    let sampled = elevations.segments.iter().flatten().map(|p| p.elevation);
    let elevation_min = sampled.clone().fold(f64::INFINITY, f64::min);
    let elevation_max = sampled.fold(f64::NEG_INFINITY, f64::max);

    ElevationState::ElevationData(ElevationData {
        id: record.id.clone(),
        segment_profiles,
        elevation_min,
        elevation_max,
        source: elevations.source,
        needs_update: elevations.needs_update,
        sampling_meters,
        statistics: merge_stats(&calculators),
        bounds: merge_bounds(&calculators),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ElevationSource, Segment, Track};

    fn reference(index: usize, elevation: f64) -> IndexedPoint {
        IndexedPoint {
            index,
            latitude: 45.0,
            longitude: 6.0,
            elevation,
        }
    }

    fn line(n: usize, start_lat: f64) -> Vec<TrackPoint> {
        (0..n)
            .map(|i| TrackPoint::new(start_lat + i as f64 * 0.001, 6.0))
            .collect()
    }

    #[test]
    fn test_midpoint_interpolation() {
        let points = line(11, 45.0);
        let (profile, _) =
            interpolate_segment(&points, &[reference(0, 100.0), reference(10, 200.0)], true, 0.0);
        assert_eq!(profile.len(), 11);
        assert_eq!(profile[0].elevation, 100.0);
        assert_eq!(profile[5].elevation, 150.0);
        assert_eq!(profile[10].elevation, 200.0);
    }

    #[test]
    fn test_bracket_advances_across_references() {
        let points = line(9, 45.0);
        let refs = [reference(0, 0.0), reference(4, 40.0), reference(8, 0.0)];
        let (profile, _) = interpolate_segment(&points, &refs, true, 0.0);
        let elevations: Vec<f64> = profile.iter().map(|p| p.elevation).collect();
        assert_eq!(elevations, vec![0.0, 10.0, 20.0, 30.0, 40.0, 30.0, 20.0, 10.0, 0.0]);
    }

    #[test]
    fn test_single_reference_is_flat() {
        let points = line(4, 45.0);
        let (profile, calculator) = interpolate_segment(&points, &[reference(0, 321.0)], false, 12.5);
        assert_eq!(profile.len(), 4);
        assert!(profile.iter().all(|p| p.distance == 12.5 && p.elevation == 321.0));
        assert!(!calculator.is_empty());
    }

    #[test]
    fn test_no_reference() {
        let (profile, calculator) = interpolate_segment(&line(3, 45.0), &[], true, 0.0);
        assert!(profile.is_empty());
        assert!(calculator.is_empty());
    }

    #[test]
    fn test_distance_is_offset_and_non_decreasing() {
        let points = line(20, 45.0);
        let refs = [reference(0, 100.0), reference(19, 300.0)];
        let (profile, _) = interpolate_segment(&points, &refs, false, 1000.0);
        assert_eq!(profile[0].distance, 1000.0);
        assert!(profile.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_segments_are_concatenated() {
        let first = line(5, 45.0);
        let second = line(5, 45.01);
        let track = Track::new(vec![Segment::new(first), Segment::new(second)]);
        let record = GeoRecord::new("r1", "two segments", vec![track]);
        let elevations = TrackElevations {
            segments: vec![
                vec![reference(0, 100.0), reference(4, 140.0)],
                vec![reference(0, 90.0), reference(4, 150.0)],
            ],
            source: ElevationSource::IgnRgeAlti,
            needs_update: true,
            network_status: None,
        };

        let ElevationState::ElevationData(data) = build_elevation_state(&record, elevations, 20) else {
            panic!("expected elevation data");
        };

        assert_eq!(data.id, "r1");
        assert_eq!(data.segment_profiles.len(), 2);
        let end_of_first = data.segment_profiles[0].points.last().unwrap().distance;
        assert_eq!(data.segment_profiles[1].points[0].distance, end_of_first);
        assert_eq!(data.elevation_min, 90.0);
        assert_eq!(data.elevation_max, 150.0);
        assert!(data.needs_update);
        assert_eq!(data.sampling_meters, 20);
        assert!((data.statistics.elevation_up_stack - 100.0).abs() < 1e-9);
        assert!(data.bounds.is_some());
    }

    #[test]
    fn test_no_elevation_data() {
        let record = GeoRecord::new("r1", "empty", vec![]);
        let elevations = TrackElevations {
            segments: vec![],
            source: ElevationSource::Gps,
            needs_update: false,
            network_status: None,
        };
        assert_eq!(
            build_elevation_state(&record, elevations.clone(), 20),
            ElevationState::NoElevationData
        );

        let record = GeoRecord::new("r2", "no points", vec![Track::new(vec![Segment::default()])]);
        let elevations = TrackElevations {
            segments: vec![vec![]],
            ..elevations
        };
        assert_eq!(
            build_elevation_state(&record, elevations, 20),
            ElevationState::NoElevationData
        );
    }
}
