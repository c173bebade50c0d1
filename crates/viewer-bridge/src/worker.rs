//! Background executor that owns the kernel.
//!
//! One thread runs requests one at a time. Updates come back over a
//! completion channel tagged with the request they belong to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shape_kernel::Kernel;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::controller::PipelineController;
use crate::dispatch::dispatch;
use crate::messages::{ControllerState, PipelineOutcome, PresentationUpdate, Presenter, ViewerRequest};
use crate::source::ModelSource;

/// Correlates updates with the request that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerUpdate {
    pub request: RequestId,
    pub update: PresentationUpdate,
}

/// Errors from the bridge layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    #[error("a request is already in flight")]
    Busy,

    #[error("pipeline worker has stopped")]
    Disconnected,

    #[error("timed out waiting for the pipeline")]
    Timeout,
}

struct Job {
    id: RequestId,
    request: ViewerRequest,
}

/// Sends updates back to the submitter. Clears the busy flag just
/// before the final `Idle` transition goes out.
struct ChannelPresenter<'a> {
    id: RequestId,
    updates: &'a Sender<WorkerUpdate>,
    busy: &'a AtomicBool,
}

impl Presenter for ChannelPresenter<'_> {
    fn publish(&mut self, update: PresentationUpdate) {
        if update
            == (PresentationUpdate::StateChanged {
                state: ControllerState::Idle,
            })
        {
            self.busy.store(false, Ordering::SeqCst);
        }
        let sent = self.updates.send(WorkerUpdate {
            request: self.id,
            update,
        });
        if sent.is_err() {
            debug!("update receiver dropped");
        }
    }
}

/// Serialized pipeline executor.
///
/// The kernel is built on the worker thread and never leaves it. Only one
/// request may be in flight; a new one is accepted once the `Idle` state
/// change of the previous one has been delivered.
pub struct PipelineWorker {
    requests: Option<Sender<Job>>,
    updates: Receiver<WorkerUpdate>,
    busy: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PipelineWorker {
    pub fn spawn<K, F, S>(config: BridgeConfig, make_kernel: F, source: S) -> Self
    where
        K: Kernel + 'static,
        F: FnOnce() -> K + Send + 'static,
        S: ModelSource + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel::<Job>();
        let (update_tx, update_rx) = mpsc::channel::<WorkerUpdate>();
        let busy = Arc::new(AtomicBool::new(false));
        let worker_busy = Arc::clone(&busy);

        let handle = std::thread::spawn(move || {
            let mut kernel = make_kernel();
            let mut controller = PipelineController::new(&config);
            info!("pipeline worker started");
            for job in request_rx {
                let mut presenter = ChannelPresenter {
                    id: job.id,
                    updates: &update_tx,
                    busy: &worker_busy,
                };
                dispatch(&mut controller, job.request, &mut kernel, &source, &mut presenter);
            }
            info!("pipeline worker stopped");
        });

        Self {
            requests: Some(request_tx),
            updates: update_rx,
            busy,
            handle: Some(handle),
        }
    }

    /// Queue a request. Fails with `Busy` while another is in flight.
    pub fn submit(&self, request: ViewerRequest) -> Result<RequestId, BridgeError> {
        let requests = self.requests.as_ref().ok_or(BridgeError::Disconnected)?;
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(BridgeError::Busy);
        }
        let id = RequestId(Uuid::new_v4());
        if requests.send(Job { id, request }).is_err() {
            self.busy.store(false, Ordering::SeqCst);
            return Err(BridgeError::Disconnected);
        }
        Ok(id)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<WorkerUpdate, BridgeError> {
        self.updates.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => BridgeError::Timeout,
            RecvTimeoutError::Disconnected => BridgeError::Disconnected,
        })
    }

    /// Submit a request and collect its updates until it returns to `Idle`.
    pub fn run(
        &self,
        request: ViewerRequest,
        timeout: Duration,
    ) -> Result<(PipelineOutcome, Vec<PresentationUpdate>), BridgeError> {
        let id = self.submit(request)?;
        let mut updates = Vec::new();
        let mut outcome = None;
        loop {
            let received = self.recv_timeout(timeout)?;
            if received.request != id {
                warn!(request = ?received.request, "dropping update for another request");
                continue;
            }
            if let PresentationUpdate::Outcome { outcome: o } = &received.update {
                outcome = Some(o.clone());
            }
            let idle = received.update
                == PresentationUpdate::StateChanged {
                    state: ControllerState::Idle,
                };
            updates.push(received.update);
            if idle {
                break;
            }
        }
        outcome
            .map(|o| (o, updates))
            .ok_or(BridgeError::Disconnected)
    }
}

impl Drop for PipelineWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("pipeline worker panicked");
            }
        }
    }
}
