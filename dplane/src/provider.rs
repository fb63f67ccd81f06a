// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Dataplane providers: the batch processor and the lifecycle of the HH provider

use crate::backend::{Backend, BackendConfig, BackendWorker, Completion};
use crate::dispatch::DispatchTable;
use crate::errors::{DplaneError, ProviderError};
use crate::update::{Outcome, ProcessingResult, UpdateRecord};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

#[allow(unused)]
use tracing::{debug, error, info, warn};

/// The interface between a provider and the host for the duration of one processing call
pub trait ProviderIo {
    /// Get the next update for the provider, if any
    fn dequeue(&mut self) -> Option<UpdateRecord>;
    /// Give an update back to the host, with the outcome of its processing
    fn enqueue_result(&mut self, record: UpdateRecord, outcome: Outcome);
    /// Max number of updates the provider may dequeue in this call
    fn work_limit(&self) -> usize;
}

/// A dataplane provider, driven by the host
pub trait DplaneProvider: Send {
    fn name(&self) -> &str;

    /// One-time setup. Failing to start prevents the provider from processing updates.
    fn start(&mut self) -> Result<(), ProviderError>;

    /// Process a batch of updates. Returns the results reported in this call, in the
    /// order they were reported.
    fn process(&mut self, io: &mut dyn ProviderIo) -> Result<Vec<ProcessingResult>, DplaneError>;

    /// Number of updates consumed and not reported yet
    fn inflight(&self) -> usize {
        0
    }

    /// Release resources. `early` signals an abrupt shutdown. Returns the updates that
    /// were consumed and not reported yet, with their outcome, in dequeue order.
    fn finish(&mut self, early: bool) -> Vec<Completion>;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, strum::Display)]
pub enum ProviderState {
    #[default]
    Uninitialized,
    Started,
    Finished,
    Failed,
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown cause".to_string()
    }
}

/// A consumed update waiting for its turn to be reported
enum Held {
    /// handed to the backend, outcome not known yet
    Offloaded(UpdateRecord),
    Done(UpdateRecord, Outcome),
}

/// Drains a bounded batch of updates per call, running each through a [`DispatchTable`]
/// or handing it to a backend. Results are reported in dequeue order: an update answered
/// inline waits behind any update dequeued before it that the backend has not completed.
#[derive(Default)]
pub struct BatchProcessor {
    table: DispatchTable,
    offload: Option<BackendWorker>,
    held: VecDeque<Held>,
}

impl BatchProcessor {
    #[must_use]
    pub fn new(table: DispatchTable) -> Self {
        Self {
            table,
            offload: None,
            held: VecDeque::new(),
        }
    }

    pub fn set_offload(&mut self, worker: BackendWorker) {
        self.offload = Some(worker);
    }

    /// Number of updates dequeued and not yet reported
    #[must_use]
    pub fn inflight(&self) -> usize {
        self.held.len()
    }

    /// Run the handler for a record. A handler that panics fails that record only.
    pub fn dispatch(&self, record: &UpdateRecord) -> Outcome {
        match catch_unwind(AssertUnwindSafe(|| self.table.dispatch(record))) {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                error!("Handler for update {record} panicked: {reason}");
                Outcome::Failure(format!("handler panicked: {reason}"))
            }
        }
    }

    fn report(
        io: &mut dyn ProviderIo,
        results: &mut Vec<ProcessingResult>,
        record: UpdateRecord,
        outcome: Outcome,
    ) {
        results.push(ProcessingResult {
            seqn: record.seqn(),
            outcome: outcome.clone(),
        });
        io.enqueue_result(record, outcome);
    }

    /// Record the outcome of updates completed by the backend
    fn complete(&mut self, completions: Vec<Completion>) {
        for (record, outcome) in completions {
            let slot = self.held.iter_mut().find(
                |held| matches!(held, Held::Offloaded(r) if r.seqn() == record.seqn()),
            );
            match slot {
                Some(slot) => *slot = Held::Done(record, outcome),
                None => warn!("Backend completed update {record}, which is not outstanding"),
            }
        }
    }

    /// Report the updates at the head of the reorder queue whose outcome is known
    fn release(&mut self, io: &mut dyn ProviderIo, results: &mut Vec<ProcessingResult>) {
        while matches!(self.held.front(), Some(Held::Done(..))) {
            if let Some(Held::Done(record, outcome)) = self.held.pop_front() {
                Self::report(io, results, record, outcome);
            }
        }
    }

    /// Process up to `io.work_limit()` updates. Every update dequeued is reported back
    /// to the host as soon as it and all the updates dequeued before it have an outcome.
    /// Completions of updates handed to a backend in previous calls are collected first
    /// and do not count against the limit.
    pub fn process(&mut self, io: &mut dyn ProviderIo) -> Vec<ProcessingResult> {
        let limit = io.work_limit();
        let mut results = Vec::with_capacity(limit.min(1024));

        let completions = self
            .offload
            .as_mut()
            .map(BackendWorker::completions)
            .unwrap_or_default();
        self.complete(completions);
        self.release(io, &mut results);

        for _ in 0..limit {
            let Some(record) = io.dequeue() else {
                break;
            };
            let held = if let Some(worker) =
                self.offload.as_mut().filter(|w| w.handles(record.op()))
            {
                let copy = record.clone();
                match worker.submit(record) {
                    Ok(()) => Held::Offloaded(copy),
                    Err(record) => {
                        warn!("Could not hand update {record} to backend: queue full");
                        Held::Done(*record, Outcome::Failure("backend queue full".to_string()))
                    }
                }
            } else {
                let outcome = self.dispatch(&record);
                Held::Done(record, outcome)
            };
            self.held.push_back(held);
            self.release(io, &mut results);
        }
        results
    }

    /// Stop the backend, if any, and hand back every update not reported yet, in dequeue
    /// order. Updates the backend did not complete are failed.
    pub fn shutdown(&mut self, early: bool) -> Vec<Completion> {
        if let Some(mut worker) = self.offload.take() {
            let completions = worker.stop(early);
            self.complete(completions);
        }
        self.held
            .drain(..)
            .map(|held| match held {
                Held::Done(record, outcome) => (record, outcome),
                Held::Offloaded(record) => {
                    warn!("Update {record} was abandoned by the backend");
                    let reason = "backend stopped before completing the update";
                    (record, Outcome::Failure(reason.to_string()))
                }
            })
            .collect()
    }
}

/// The HH dataplane provider
pub struct HhProvider {
    name: String,
    state: ProviderState,
    processor: BatchProcessor,
    backend: Option<(Arc<dyn Backend>, BackendConfig)>,
}

impl HhProvider {
    pub const DEFAULT_NAME: &'static str = "HH plugin";

    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            state: ProviderState::Uninitialized,
            processor: BatchProcessor::default(),
            backend: None,
        }
    }

    /// Use a dispatch table other than the default one
    #[must_use]
    pub fn with_table(mut self, table: DispatchTable) -> Self {
        self.processor = BatchProcessor::new(table);
        self
    }

    /// Program the updates the backend handles into it, from a worker started with the provider
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn Backend>, config: BackendConfig) -> Self {
        self.backend = Some((backend, config));
        self
    }

    #[must_use]
    pub fn state(&self) -> ProviderState {
        self.state
    }
}

impl Default for HhProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NAME)
    }
}

impl DplaneProvider for HhProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), ProviderError> {
        match self.state {
            ProviderState::Uninitialized => {}
            ProviderState::Started => {
                debug!("Provider '{}' is already started", self.name);
                return Ok(());
            }
            state @ (ProviderState::Finished | ProviderState::Failed) => {
                return Err(ProviderError::BadState(state));
            }
        }
        info!("Initializing provider '{}'", self.name);
        if let Some((backend, config)) = &self.backend {
            match BackendWorker::start(Arc::clone(backend), config.clone()) {
                Ok(worker) => self.processor.set_offload(worker),
                Err(e) => {
                    error!("Provider '{}' failed to start its backend: {e}", self.name);
                    self.state = ProviderState::Failed;
                    return Err(e.into());
                }
            }
        }
        self.state = ProviderState::Started;
        Ok(())
    }

    fn process(&mut self, io: &mut dyn ProviderIo) -> Result<Vec<ProcessingResult>, DplaneError> {
        debug_assert!(
            self.state == ProviderState::Started,
            "Provider '{}' can't process updates in state {}",
            self.name,
            self.state
        );
        if self.state != ProviderState::Started {
            return Err(DplaneError::LifecycleMisuse {
                name: self.name.clone(),
                action: "process updates",
                state: self.state,
            });
        }
        debug!("processing {}", self.name);
        Ok(self.processor.process(io))
    }

    fn inflight(&self) -> usize {
        self.processor.inflight()
    }

    fn finish(&mut self, early: bool) -> Vec<Completion> {
        if self.state == ProviderState::Finished {
            return vec![];
        }
        let remaining = self.processor.shutdown(early);
        if !remaining.is_empty() {
            debug!(
                "Provider '{}' hands back {} updates on finish",
                self.name,
                remaining.len()
            );
        }
        self.state = ProviderState::Finished;
        info!("Provider '{}' finished (early: {early})", self.name);
        remaining
    }
}
