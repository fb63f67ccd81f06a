// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Offload of updates to an external backend.
//!
//! Programming an external system may block, which the scheduling thread of the host
//! can't afford. A [`BackendWorker`] runs a [`Backend`] on its own tokio runtime: the
//! provider submits records without blocking and collects the completions on a later
//! cycle.

use crate::op::{DplaneOp, OpFamily};
use crate::update::{Outcome, UpdateRecord};
use async_trait::async_trait;
use crossbeam::channel::{Receiver, Sender, unbounded};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use tracectl::trace_target;
#[allow(unused)]
use tracing::{debug, error, info, warn};

trace_target!("dplane-backend", LevelFilter::INFO, &["dplane"]);

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to start backend runtime: {0}")]
    Runtime(String),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Backend rejected update: {0}")]
    Rejected(String),
}

/// An external system that updates are programmed into
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Tell if updates of the given kind are to be programmed into this backend
    fn handles(&self, op: DplaneOp) -> bool {
        !matches!(
            op.family(),
            OpFamily::Route | OpFamily::SysRoute | OpFamily::Nexthop | OpFamily::Unknown
        )
    }

    /// Program one update
    async fn apply(&self, record: &UpdateRecord) -> Result<(), BackendError>;
}

/// A backend that programs nothing and logs what it is given
pub struct LogBackend;

#[async_trait]
impl Backend for LogBackend {
    fn name(&self) -> &str {
        "log"
    }
    async fn apply(&self, record: &UpdateRecord) -> Result<(), BackendError> {
        info!("backend: programming {record}");
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// max number of updates submitted and not yet picked by the worker
    pub queue_capacity: usize,
    /// how long a graceful stop may wait for the worker to drain
    pub grace: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            grace: Duration::from_millis(500),
        }
    }
}

/// An update handled by the backend, along with its outcome
pub type Completion = (UpdateRecord, Outcome);

pub struct BackendWorker {
    backend: Arc<dyn Backend>,
    config: BackendConfig,
    runtime: Option<Runtime>,
    requests: Option<mpsc::Sender<UpdateRecord>>,
    completions: Receiver<Completion>,
    task: Option<JoinHandle<()>>,
    inflight: usize,
}

async fn worker_loop(
    backend: Arc<dyn Backend>,
    mut requests: mpsc::Receiver<UpdateRecord>,
    completions: Sender<Completion>,
) {
    debug!("Backend worker for '{}' started", backend.name());
    while let Some(record) = requests.recv().await {
        let outcome = match backend.apply(&record).await {
            Ok(()) => Outcome::Success,
            Err(e) => {
                warn!("Backend '{}' failed update {}: {e}", backend.name(), record.seqn());
                Outcome::Failure(e.to_string())
            }
        };
        if completions.send((record, outcome)).is_err() {
            warn!("Completion channel closed: backend worker exiting");
            break;
        }
    }
    debug!("Backend worker for '{}' stopped", backend.name());
}

impl BackendWorker {
    /// Start a worker for the given backend
    ///
    /// # Errors
    ///
    /// Fails if the runtime for the worker can't be built.
    pub fn start(backend: Arc<dyn Backend>, config: BackendConfig) -> Result<Self, BackendError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("dplane-backend")
            .enable_all()
            .build()
            .map_err(|e| BackendError::Runtime(e.to_string()))?;

        let (req_tx, req_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (done_tx, done_rx) = unbounded();
        let task = runtime.spawn(worker_loop(Arc::clone(&backend), req_rx, done_tx));
        info!("Started backend '{}'", backend.name());

        Ok(Self {
            backend,
            config,
            runtime: Some(runtime),
            requests: Some(req_tx),
            completions: done_rx,
            task: Some(task),
            inflight: 0,
        })
    }

    #[must_use]
    pub fn handles(&self, op: DplaneOp) -> bool {
        self.backend.handles(op)
    }

    /// Number of submitted updates whose completion has not been collected
    #[must_use]
    pub fn inflight(&self) -> usize {
        self.inflight
    }

    /// Submit a record to the backend. This never blocks.
    ///
    /// # Errors
    ///
    /// Gives the record back if the worker queue is full or the worker is stopped.
    pub fn submit(&mut self, record: UpdateRecord) -> Result<(), Box<UpdateRecord>> {
        let Some(requests) = &self.requests else {
            return Err(Box::new(record));
        };
        match requests.try_send(record) {
            Ok(()) => {
                self.inflight += 1;
                Ok(())
            }
            Err(TrySendError::Full(record) | TrySendError::Closed(record)) => Err(Box::new(record)),
        }
    }

    /// Collect the completions available, without waiting
    pub fn completions(&mut self) -> Vec<Completion> {
        let done: Vec<_> = self.completions.try_iter().collect();
        self.inflight = self.inflight.saturating_sub(done.len());
        done
    }

    /// Stop the worker. If `early`, the worker is aborted right away; otherwise it is given
    /// up to the configured grace period to finish the updates it was given.
    /// Returns the completions that were not collected.
    pub fn stop(&mut self, early: bool) -> Vec<Completion> {
        drop(self.requests.take());
        let Some(runtime) = self.runtime.take() else {
            return self.completions();
        };
        let task = self.task.take();
        let name = self.backend.name().to_owned();
        let can_block = tokio::runtime::Handle::try_current().is_err();

        match task {
            Some(task) if !early && can_block => {
                let grace = self.config.grace;
                let drained = runtime.block_on(async { tokio::time::timeout(grace, task).await });
                if drained.is_err() {
                    warn!("Backend '{name}' did not drain within {grace:?}: abandoning it");
                }
            }
            Some(task) => {
                if !early {
                    warn!("Can't wait for backend '{name}' from an async context: aborting it");
                }
                task.abort();
            }
            None => {}
        }
        runtime.shutdown_background();

        let pending = self.completions();
        if self.inflight > 0 {
            warn!(
                "Backend '{name}' stopped with {} updates in flight",
                self.inflight
            );
        }
        info!("Stopped backend '{name}'");
        pending
    }
}

impl Drop for BackendWorker {
    fn drop(&mut self) {
        if self.runtime.is_some() {
            self.stop(true);
        }
    }
}
