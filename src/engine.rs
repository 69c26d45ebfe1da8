//! # Elevation Engine
//!
//! Debounced recomputation of the elevation profile of the current recording.
//!
//! ## Architecture
//!
//! The engine owns one long-lived worker task processing commands in order:
//! - `update` with the id already processed last is a no-op
//! - `update` with a new id aborts the running computation, publishes
//!   `Calculating` and spawns a new one
//! - `reset` publishes `Calculating` without touching the computation
//!
//! The state is published through a `watch` channel, so observers always see
//! either `Calculating` or a complete terminal state. Side-channel events go
//! through a `broadcast` channel of capacity 1: a slow receiver only gets the
//! most recent event.
//!
//! Every computation carries a generation number. It publishes only if its
//! generation is still the current one, so an abandoned computation never
//! emits a terminal state, even if it completed before being aborted.
//!
//! Writing corrected elevations back runs in its own task, once the state is
//! published: switching to another recording does not interrupt it.

use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::corrector::ElevationCorrector;
use crate::profile::build_elevation_state;
use crate::remote::ElevationPersister;
use crate::{Bounds, ElevationSource, GeoRecord, GeoStatistics, SegmentProfile};

// ============================================================================
// Core Types
// ============================================================================

/// Published state of the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ElevationState {
    Calculating,
    ElevationData(ElevationData),
    /// The recording has no segment, or no point to sample
    NoElevationData,
}

/// Elevation profile and statistics of a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationData {
    pub id: String,
    /// One profile per segment of the first track, distances continuing
    /// from one segment to the next
    pub segment_profiles: Vec<SegmentProfile>,
    pub elevation_min: f64,
    pub elevation_max: f64,
    pub source: ElevationSource,
    /// True when the elevations were corrected and should be written back
    pub needs_update: bool,
    pub sampling_meters: u32,
    pub statistics: GeoStatistics,
    pub bounds: Option<Bounds>,
}

/// Side-channel notifications, not part of the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationEvent {
    /// Correction was abandoned because of connectivity
    NoNetwork { internet_ok: bool, service_ok: bool },
    /// Corrected elevations could not be persisted
    ElevationCorrectionError,
}

enum Command {
    Update(Arc<GeoRecord>),
    Reset,
}

// ============================================================================
// Engine
// ============================================================================

/// Handle on the elevation worker.
///
/// Must be created from within a tokio runtime. Dropping the handle stops
/// the worker and aborts the running computation.
pub struct ElevationEngine {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ElevationState>,
    events: broadcast::Sender<ElevationEvent>,
}

impl ElevationEngine {
    pub fn new(corrector: ElevationCorrector) -> Self {
        Self::spawn(corrector, None)
    }

    /// Engine handing every corrected profile to `persister`.
    pub fn with_persister(
        corrector: ElevationCorrector,
        persister: Arc<dyn ElevationPersister>,
    ) -> Self {
        Self::spawn(corrector, Some(persister))
    }

    fn spawn(corrector: ElevationCorrector, persister: Option<Arc<dyn ElevationPersister>>) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ElevationState::Calculating);
        let (events, _) = broadcast::channel(1);

        let worker = Worker {
            context: JobContext {
                corrector: Arc::new(corrector),
                persister,
                state: Arc::new(state_tx),
                events: events.clone(),
                generation: Arc::new(Mutex::new(0)),
            },
            last_id: None,
            job: None,
        };
        tokio::spawn(worker.run(receiver));

        Self {
            commands,
            state,
            events,
        }
    }

    /// Recompute the profile of `record`, unless it is the recording
    /// processed last.
    pub fn update(&self, record: impl Into<Arc<GeoRecord>>) {
        self.send(Command::Update(record.into()));
    }

    /// Publish `Calculating`. The last processed id is kept.
    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    /// Current state.
    pub fn state(&self) -> ElevationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ElevationState> {
        self.state.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<ElevationEvent> {
        self.events.subscribe()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("[ElevationEngine] Worker stopped, command dropped");
        }
    }
}

// ============================================================================
// Worker
// ============================================================================

#[derive(Clone)]
struct JobContext {
    corrector: Arc<ElevationCorrector>,
    persister: Option<Arc<dyn ElevationPersister>>,
    state: Arc<watch::Sender<ElevationState>>,
    events: broadcast::Sender<ElevationEvent>,
    /// Generation of the current computation; held while publishing
    generation: Arc<Mutex<u64>>,
}

struct Worker {
    context: JobContext,
    last_id: Option<String>,
    job: Option<JoinHandle<()>>,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Update(record) => self.update(record),
                Command::Reset => {
                    let _guard = self
                        .context
                        .generation
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    self.context.state.send_replace(ElevationState::Calculating);
                }
            }
        }

        if let Some(job) = self.job.take() {
            job.abort();
        }
        debug!("[ElevationEngine] Worker stopped");
    }

    fn update(&mut self, record: Arc<GeoRecord>) {
        if self.last_id.as_deref() == Some(record.id.as_str()) {
            debug!("[ElevationEngine] {} already processed", record.id);
            return;
        }

        let generation = {
            let mut current = self
                .context
                .generation
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *current += 1;
            self.context.state.send_replace(ElevationState::Calculating);
            *current
        };

        if let Some(job) = self.job.take() {
            debug!("[ElevationEngine] Cancelling previous computation");
            job.abort();
        }

        info!("[ElevationEngine] Computing elevations of {}", record.id);
        self.last_id = Some(record.id.clone());
        self.job = Some(tokio::spawn(compute(self.context.clone(), record, generation)));
    }
}

async fn compute(context: JobContext, record: Arc<GeoRecord>, generation: u64) {
    let elevations = context.corrector.process_track(&record).await;
    let network_status = elevations.network_status;
    let sampling_meters = context.corrector.config().sampling_meters;
    let state = build_elevation_state(&record, elevations, sampling_meters);

    let to_persist = match &state {
        ElevationState::ElevationData(data) if data.needs_update => Some(data.clone()),
        _ => None,
    };

    {
        let current = context
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *current != generation {
            debug!("[ElevationEngine] Dropping stale result for {}", record.id);
            return;
        }
        if let Some(status) = network_status.filter(|s| !s.is_ok()) {
            let _ = context.events.send(ElevationEvent::NoNetwork {
                internet_ok: status.internet_ok,
                service_ok: status.service_ok,
            });
        }
        context.state.send_replace(state);
    }

    let (Some(persister), Some(data)) = (context.persister, to_persist) else {
        return;
    };
    // Detached from the computation: the next update must not abort the write
    let events = context.events;
    tokio::spawn(async move {
        if let Err(e) = persister.update_elevations(&data).await {
            warn!("[ElevationEngine] Failed to persist elevations of {}: {}", data.id, e);
            let _ = events.send(ElevationEvent::ElevationCorrectionError);
        }
    });
}
