//! Distance-based sub-sampling of a dense point sequence.
//!
//! The first and the last points are always kept. In between, a point is kept
//! once it is more than `threshold` meters away from the previously kept one.

use crate::geo_utils::delta_two_points;
use crate::{IndexedPoint, TrackPoint};

/// Sub-sample `points`, keeping a point every `threshold_meters`.
///
/// The returned iterator is lazy and owns no state beyond the call: calling
/// `subsample` again on the same slice restarts from the first point.
///
/// # Example
/// ```
/// use track_elevation::{subsample, TrackPoint};
///
/// let points = vec![
///     TrackPoint::new(45.0, 6.0),
///     TrackPoint::new(45.00001, 6.0), // ~1 m away, dropped
///     TrackPoint::new(45.001, 6.0),   // ~111 m away, kept
/// ];
/// let indices: Vec<usize> = subsample(&points, 20.0).map(|p| p.index).collect();
/// assert_eq!(indices, vec![0, 2]);
/// ```
pub fn subsample(points: &[TrackPoint], threshold_meters: f64) -> SubSampler<'_> {
    SubSampler {
        points,
        threshold: threshold_meters,
        next_index: 0,
        previous_kept: None,
    }
}

/// Lazy iterator returned by [`subsample`].
#[derive(Debug, Clone)]
pub struct SubSampler<'a> {
    points: &'a [TrackPoint],
    threshold: f64,
    next_index: usize,
    previous_kept: Option<&'a TrackPoint>,
}

impl<'a> Iterator for SubSampler<'a> {
    type Item = IndexedPoint;

    fn next(&mut self) -> Option<IndexedPoint> {
        let last_index = self.points.len().checked_sub(1)?;

        while self.next_index <= last_index {
            let index = self.next_index;
            self.next_index += 1;
            let point = &self.points[index];

            let keep = match self.previous_kept {
                None => true,
                Some(prev) => {
                    index == last_index
                        || delta_two_points(
                            prev.latitude,
                            prev.longitude,
                            point.latitude,
                            point.longitude,
                        ) > self.threshold
                }
            };

            if keep {
                self.previous_kept = Some(point);
                return Some(IndexedPoint {
                    index,
                    latitude: point.latitude,
                    longitude: point.longitude,
                    elevation: point.elevation.unwrap_or(0.0),
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Points every ~5.5 m going north.
    fn dense_line(n: usize) -> Vec<TrackPoint> {
        (0..n)
            .map(|i| TrackPoint::new(45.0 + i as f64 * 0.00005, 6.0).with_elevation(i as f64))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(subsample(&[], 20.0).count(), 0);
    }

    #[test]
    fn test_single_point_is_first_and_last() {
        let points = vec![TrackPoint::new(45.0, 6.0)];
        let sampled: Vec<_> = subsample(&points, 20.0).collect();
        assert_eq!(sampled.len(), 1);
        assert_eq!(sampled[0].index, 0);
        assert_eq!(sampled[0].elevation, 0.0);
    }

    #[test]
    fn test_indices_strictly_increasing_and_bounded() {
        let points = dense_line(200);
        for threshold in [0.0, 1.0, 20.0, 50.0, 10_000.0] {
            let indices: Vec<usize> = subsample(&points, threshold).map(|p| p.index).collect();
            assert_eq!(indices.first(), Some(&0));
            assert_eq!(indices.last(), Some(&199));
            assert!(indices.windows(2).all(|w| w[0] < w[1]), "threshold {}", threshold);
        }
    }

    #[test]
    fn test_threshold_reduces_density() {
        let points = dense_line(200);
        let sampled: Vec<_> = subsample(&points, 20.0).collect();
        // ~5.5 m spacing, a point is kept every 4 steps (~22 m)
        assert!(sampled.len() < 60 && sampled.len() > 40, "got {}", sampled.len());
        assert_eq!(sampled[1].index, 4);
        assert_eq!(sampled[1].elevation, 4.0);
    }

    #[test]
    fn test_distance_measured_from_last_kept_point() {
        let points = dense_line(9);
        let indices: Vec<usize> = subsample(&points, 20.0).map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 4, 8]);
    }

    #[test]
    fn test_restartable() {
        let points = dense_line(30);
        let first: Vec<_> = subsample(&points, 20.0).collect();
        let second: Vec<_> = subsample(&points, 20.0).collect();
        assert_eq!(first, second);
    }
}
