//! Remote elevation correction of a recording.
//!
//! Each segment of the first track is sub-sampled, split into chunks, and the
//! chunks are sent to the elevation service with bounded parallelism:
//! - at most `max_concurrency` requests in flight, each bounded by a timeout
//! - results are reassembled in chunk order, not completion order
//! - the first transport failure aborts every request still in flight
//!
//! Correction is all-or-nothing for a track: if any segment cannot be
//! corrected, every segment falls back to plain sub-sampling of the recorded
//! elevations, and the track is not marked for update.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use tokio::sync::Semaphore;

use crate::config::ElevationConfig;
use crate::error::{ElevationError, OptionExt, Result};
use crate::remote::{ElevationFetcher, ReachabilityProbe, NON_TRUSTED_ELEVATION};
use crate::subsample::subsample;
use crate::{ElevationSource, GeoRecord, IndexedPoint, Segment, Track};

/// Outcome of the connectivity checks made after a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkStatus {
    pub internet_ok: bool,
    pub service_ok: bool,
}

impl NetworkStatus {
    pub fn is_ok(&self) -> bool {
        self.internet_ok && self.service_ok
    }
}

/// Sub-sampled (and possibly corrected) elevations of a track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackElevations {
    /// One sub-sampled sequence per segment, in segment order
    pub segments: Vec<Vec<IndexedPoint>>,
    /// Source of the elevations in `segments`
    pub source: ElevationSource,
    /// True when the recording was untrusted and every segment got corrected
    pub needs_update: bool,
    /// Set when correction was aborted by a transport or timeout failure
    pub network_status: Option<NetworkStatus>,
}

enum ChunkElevations {
    Trusted(Vec<IndexedPoint>),
    /// The service had no data for at least one point; raw elevations kept
    NonTrusted(Vec<IndexedPoint>),
}

enum SegmentCorrection {
    Corrected(Vec<IndexedPoint>),
    NonTrusted,
}

/// Fetches corrected elevations for the sub-sampled points of a recording.
#[derive(Clone)]
pub struct ElevationCorrector {
    fetcher: Arc<dyn ElevationFetcher>,
    probe: Arc<dyn ReachabilityProbe>,
    config: ElevationConfig,
}

impl ElevationCorrector {
    /// Fails with [`ElevationError::Config`] when `config` is not usable.
    pub fn new(
        fetcher: Arc<dyn ElevationFetcher>,
        probe: Arc<dyn ReachabilityProbe>,
        config: ElevationConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fetcher,
            probe,
            config,
        })
    }

    pub fn config(&self) -> &ElevationConfig {
        &self.config
    }

    /// Sub-sample the first track of `record`, correcting its elevations
    /// unless they are already trusted. Never fails: any problem degrades to
    /// the recorded elevations.
    pub async fn process_track(&self, record: &GeoRecord) -> TrackElevations {
        let recorded_source = record.elevation_source();
        let Some(track) = record.tracks.first() else {
            return TrackElevations {
                segments: Vec::new(),
                source: recorded_source,
                needs_update: false,
                network_status: None,
            };
        };

        if record.has_trusted_elevations() {
            debug!("[ElevationCorrector] {} already has trusted elevations", record.id);
            return self.sample_without_api(track, recorded_source, None);
        }

        let start = Instant::now();
        let mut segments = Vec::with_capacity(track.segments.len());

        for (i, segment) in track.segments.iter().enumerate() {
            match self.correct_segment(segment).await {
                Ok(SegmentCorrection::Corrected(points)) => segments.push(points),
                Ok(SegmentCorrection::NonTrusted) => {
                    info!(
                        "[ElevationCorrector] {}: no reliable elevation for segment {}, keeping recorded elevations",
                        record.id, i
                    );
                    return self.sample_without_api(track, recorded_source, None);
                }
                Err(e) => {
                    warn!(
                        "[ElevationCorrector] {}: correction of segment {} failed: {}",
                        record.id, i, e
                    );
                    let status = self.check_status().await;
                    return self.sample_without_api(track, recorded_source, Some(status));
                }
            }
        }

        info!(
            "[ElevationCorrector] {}: corrected {} segments in {:.2}s",
            record.id,
            segments.len(),
            start.elapsed().as_secs_f64()
        );

        TrackElevations {
            segments,
            source: ElevationSource::IgnRgeAlti,
            needs_update: true,
            network_status: None,
        }
    }

    fn sample_without_api(
        &self,
        track: &Track,
        source: ElevationSource,
        network_status: Option<NetworkStatus>,
    ) -> TrackElevations {
        let threshold = self.config.sampling_threshold();
        TrackElevations {
            segments: track
                .segments
                .iter()
                .map(|segment| subsample(&segment.points, threshold).collect())
                .collect(),
            source,
            needs_update: false,
            network_status,
        }
    }

    async fn correct_segment(&self, segment: &Segment) -> Result<SegmentCorrection> {
        let points: Vec<IndexedPoint> =
            subsample(&segment.points, self.config.sampling_threshold()).collect();
        let chunks: Vec<&[IndexedPoint]> = points.chunks(self.config.chunk_size).collect();
        let semaphore = Semaphore::new(self.config.max_concurrency);

        debug!(
            "[ElevationCorrector] {} points sub-sampled to {}, {} chunks",
            segment.points.len(),
            points.len(),
            chunks.len()
        );

        let mut in_flight: FuturesUnordered<_> = chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| {
                let semaphore = &semaphore;
                async move {
                    let _permit = semaphore.acquire().await.map_err(|e| ElevationError::Internal {
                        message: format!("semaphore closed: {}", e),
                    })?;
                    let elevations = self.fetch_chunk(chunk).await?;
                    Ok::<_, ElevationError>((index, elevations))
                }
            })
            .collect();

        let mut slots: Vec<Option<ChunkElevations>> = (0..chunks.len()).map(|_| None).collect();
        while let Some(result) = in_flight.next().await {
            // Dropping `in_flight` on error cancels the other requests
            let (index, elevations) = result?;
            slots[index] = Some(elevations);
        }

        let mut corrected = Vec::with_capacity(points.len());
        let mut non_trusted = false;
        for slot in slots {
            match slot.ok_or_internal("chunk without result")? {
                ChunkElevations::Trusted(chunk) => corrected.extend(chunk),
                ChunkElevations::NonTrusted(chunk) => {
                    non_trusted = true;
                    corrected.extend(chunk);
                }
            }
        }

        if non_trusted {
            Ok(SegmentCorrection::NonTrusted)
        } else {
            Ok(SegmentCorrection::Corrected(corrected))
        }
    }

    async fn fetch_chunk(&self, chunk: &[IndexedPoint]) -> Result<ChunkElevations> {
        let latitudes: Vec<f64> = chunk.iter().map(|p| p.latitude).collect();
        let longitudes: Vec<f64> = chunk.iter().map(|p| p.longitude).collect();

        let elevations = tokio::time::timeout(
            self.config.request_timeout(),
            self.fetcher.fetch_elevations(&latitudes, &longitudes),
        )
        .await
        .map_err(|_| ElevationError::Timeout {
            timeout_ms: self.config.request_timeout_ms,
        })??;

        if elevations.len() != chunk.len() {
            return Err(ElevationError::MalformedResponse {
                expected: chunk.len(),
                got: elevations.len(),
            });
        }

        if elevations.contains(&NON_TRUSTED_ELEVATION) {
            return Ok(ChunkElevations::NonTrusted(chunk.to_vec()));
        }

        Ok(ChunkElevations::Trusted(
            chunk
                .iter()
                .zip(elevations)
                .map(|(point, elevation)| IndexedPoint { elevation, ..*point })
                .collect(),
        ))
    }

    /// Check internet access first, then the elevation service itself.
    async fn check_status(&self) -> NetworkStatus {
        let internet_ok = self.probe.is_reachable(&self.config.probe_host).await;
        let service_ok = internet_ok && self.probe.is_reachable(&self.config.service_host).await;
        NetworkStatus {
            internet_ok,
            service_ok,
        }
    }
}
