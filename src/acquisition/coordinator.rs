//! Acquisition coordinator.
//!
//! - Plans each cycle (random total, random local/remote split)
//! - Runs the local and remote sources concurrently on tokio tasks
//! - Funnels their output through one channel into a single aggregator task,
//!   the only writer of `AcquisitionState` while a cycle runs
//! - Rejects `fetch` while a cycle is in flight
//!
//! The display layer reads state through `snapshot()` and can follow
//! progress through `events()`. Each call to `events()` registers a new
//! subscriber; events are only queued for subscribers that are still alive.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::AcquireError;
use crate::models::{
    AccessStatus, AcquiredImage, AcquisitionRequest, AcquisitionState, CountRange, CyclePhase,
};
use crate::sources::{LocalFetchReport, LocalPhotoSource, RemotePhotoSource};

/// Progress notifications for the display layer.
#[derive(Debug, Clone)]
pub enum AcquisitionEvent {
    Started {
        cycle: u64,
        request: AcquisitionRequest,
    },
    LocalImage {
        cycle: u64,
        progress: usize,
    },
    RemoteBatch {
        cycle: u64,
        count: usize,
        progress: usize,
    },
    LocalFinished {
        cycle: u64,
        report: LocalFetchReport,
    },
    RemoteFinished {
        cycle: u64,
    },
    Completed(CycleSummary),
}

/// Final tally of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub cycle: u64,
    pub request: AcquisitionRequest,
    pub local_delivered: usize,
    pub remote_delivered: usize,
    pub placeholders: usize,
    pub progress: usize,
    pub photos: usize,
}

/// Messages from the source tasks to the aggregator.
enum SourceMessage {
    Local(AcquiredImage),
    LocalDone(LocalFetchReport),
    Remote(Vec<AcquiredImage>),
}

impl From<AcquiredImage> for SourceMessage {
    fn from(image: AcquiredImage) -> Self {
        Self::Local(image)
    }
}

/// Fan-out of progress events to live subscribers.
///
/// Subscribers whose receiver has been dropped are pruned on the next
/// publish, so nothing accumulates when no one is listening.
#[derive(Clone, Default)]
struct EventHub {
    subscribers: Arc<Mutex<Vec<flume::Sender<AcquisitionEvent>>>>,
}

impl EventHub {
    fn subscribe(&self) -> flume::Receiver<AcquisitionEvent> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    fn publish(&self, event: AcquisitionEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// A running cycle. Dropping the handle does not stop the cycle.
pub struct CycleHandle {
    pub cycle: u64,
    pub request: AcquisitionRequest,
    handle: JoinHandle<CycleSummary>,
}

impl CycleHandle {
    /// Wait until both sources have finished.
    pub async fn wait(self) -> Result<CycleSummary, AcquireError> {
        self.handle
            .await
            .map_err(|e| AcquireError::Aborted(e.to_string()))
    }
}

pub struct PhotoAcquisitionCoordinator {
    local: Arc<LocalPhotoSource>,
    remote: Arc<RemotePhotoSource>,
    state: Arc<RwLock<AcquisitionState>>,
    planner: Mutex<StdRng>,
    count_range: CountRange,
    events: EventHub,
}

impl PhotoAcquisitionCoordinator {
    pub fn new(local: LocalPhotoSource, remote: RemotePhotoSource) -> Self {
        Self::with_rng(local, remote, StdRng::from_entropy())
    }

    /// Use a specific random source for planning and sampling.
    pub fn with_rng(local: LocalPhotoSource, remote: RemotePhotoSource, rng: StdRng) -> Self {
        let state = AcquisitionState {
            access: local.library().authorization_status(),
            ..Default::default()
        };

        Self {
            local: Arc::new(local),
            remote: Arc::new(remote),
            state: Arc::new(RwLock::new(state)),
            planner: Mutex::new(rng),
            count_range: CountRange::default(),
            events: EventHub::default(),
        }
    }

    pub fn with_count_range(mut self, range: CountRange) -> Self {
        self.count_range = range;
        self
    }

    /// Ask the library for access and record the answer in the state.
    pub async fn request_access(&self) -> AccessStatus {
        let status = self.local.library().request_authorization().await;
        self.state.write().access = status;
        if status == AccessStatus::Denied {
            warn!("Photo library access denied; only remote photos will be used");
        }
        status
    }

    /// Start a cycle with a randomly planned request.
    pub fn fetch(&self) -> Result<CycleHandle, AcquireError> {
        let request = AcquisitionRequest::random(&mut *self.planner.lock(), &self.count_range);
        self.fetch_with(request)
    }

    /// Start a cycle with an explicit request.
    ///
    /// Must be called from within a tokio runtime.
    pub fn fetch_with(&self, request: AcquisitionRequest) -> Result<CycleHandle, AcquireError> {
        let cycle = {
            let mut state = self.state.write();
            if state.phase == CyclePhase::Fetching {
                warn!(cycle = state.cycle, "Rejecting fetch while a cycle is in flight");
                return Err(AcquireError::CycleInFlight);
            }
            state.begin(request)
        };

        info!(
            cycle,
            total = request.total_count(),
            local = request.local_count(),
            remote = request.remote_count(),
            "Starting acquisition cycle"
        );
        self.events.publish(AcquisitionEvent::Started { cycle, request });

        let (tx, rx) = flume::unbounded::<SourceMessage>();
        let sample_rng = StdRng::seed_from_u64(self.planner.lock().gen());

        let local = Arc::clone(&self.local);
        let local_tx = tx.clone();
        tokio::spawn(async move {
            let report = local.fetch(request.local_count(), sample_rng, &local_tx).await;
            let _ = local_tx.send(SourceMessage::LocalDone(report));
        });

        let remote = Arc::clone(&self.remote);
        tokio::spawn(async move {
            let batch = remote.fetch(request.remote_count()).await;
            let _ = tx.send(SourceMessage::Remote(batch));
        });

        let handle = tokio::spawn(aggregate(
            cycle,
            request,
            rx,
            Arc::clone(&self.state),
            self.events.clone(),
        ));

        Ok(CycleHandle {
            cycle,
            request,
            handle,
        })
    }

    /// Copy of the current state for display.
    pub fn snapshot(&self) -> AcquisitionState {
        self.state.read().clone()
    }

    pub fn photos(&self) -> Vec<AcquiredImage> {
        self.state.read().photos.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.state.read().is_busy()
    }

    /// Subscribe to progress events from now on. Events are queued until
    /// read; dropping the receiver unsubscribes.
    pub fn events(&self) -> flume::Receiver<AcquisitionEvent> {
        self.events.subscribe()
    }
}

/// Aggregator task: applies source messages to the state until both
/// sources have reported, then returns the cycle to Idle.
async fn aggregate(
    cycle: u64,
    request: AcquisitionRequest,
    rx: flume::Receiver<SourceMessage>,
    state: Arc<RwLock<AcquisitionState>>,
    events: EventHub,
) -> CycleSummary {
    let mut local_done = false;
    let mut remote_done = false;
    let mut local_delivered = 0;
    let mut remote_delivered = 0;

    while !(local_done && remote_done) {
        let message = match rx.recv_async().await {
            Ok(message) => message,
            Err(_) => {
                warn!(cycle, "Source tasks ended without reporting completion");
                break;
            }
        };

        let mut state = state.write();
        match message {
            SourceMessage::Local(image) => {
                state.append_local(image);
                local_delivered += 1;
                trace!(cycle, progress = state.progress, "Local photo appended");
                events.publish(AcquisitionEvent::LocalImage {
                    cycle,
                    progress: state.progress,
                });
            }
            SourceMessage::LocalDone(report) => {
                local_done = true;
                state.finish_local();
                debug!(cycle, ?report, "Local source finished");
                events.publish(AcquisitionEvent::LocalFinished { cycle, report });
            }
            SourceMessage::Remote(batch) => {
                let count = batch.len();
                remote_delivered += count;
                state.append_remote(batch);
                remote_done = true;
                state.finish_remote();
                debug!(cycle, count, progress = state.progress, "Remote batch appended");
                events.publish(AcquisitionEvent::RemoteBatch {
                    cycle,
                    count,
                    progress: state.progress,
                });
                events.publish(AcquisitionEvent::RemoteFinished { cycle });
            }
        }
    }

    let summary = {
        let mut state = state.write();
        // A source task that died without reporting must not wedge the
        // state machine in Fetching.
        if state.busy_local {
            state.finish_local();
        }
        if state.busy_remote {
            state.finish_remote();
        }

        CycleSummary {
            cycle,
            request,
            local_delivered,
            remote_delivered,
            placeholders: state.photos.iter().filter(|p| p.is_placeholder()).count(),
            progress: state.progress,
            photos: state.photos.len(),
        }
    };

    info!(
        cycle,
        photos = summary.photos,
        local = summary.local_delivered,
        remote = summary.remote_delivered,
        placeholders = summary.placeholders,
        "Acquisition cycle complete"
    );
    events.publish(AcquisitionEvent::Completed(summary.clone()));
    summary
}
