// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! An in-process dataplane framework: the host side of the provider interface.
//!
//! The framework owns the providers registered with it, keeps them ordered by priority,
//! and runs them as a pipeline: on every cycle each provider is given a fresh work limit,
//! and the updates it completes successfully are queued for the next provider. Updates
//! that fail, or that made it through the last provider, are completed.

use crate::backend::Completion;
use crate::errors::{DplaneError, RegistrationError};
use crate::op::DplaneOp;
use crate::provider::{DplaneProvider, ProviderIo, ProviderState};
use crate::queue::UpdateQueue;
use crate::update::{Outcome, ProcessingResult, SeqNum, UpdatePayload, UpdateRecord};
use bitflags::bitflags;
use std::collections::VecDeque;
use std::fmt::Display;

#[allow(unused)]
use tracing::{debug, error, info, warn};

/// Relative order of providers in the pipeline
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum ProviderPriority {
    PreProcess,
    PreKernel,
    Kernel,
    PostKernel,
    Last,
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct ProviderFlags: u32 {
        const DEFAULT = 0;
    }
}

#[derive(Clone, Debug)]
pub struct FrameworkConfig {
    /// max number of updates a provider may dequeue per cycle
    pub work_limit: usize,
    /// capacity of the queue of pending updates
    pub queue_capacity: usize,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            work_limit: 100,
            queue_capacity: 1024,
        }
    }
}

/// The handle to a registered provider
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProviderHandle {
    id: usize,
    name: String,
}

impl ProviderHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An update that went through the pipeline
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedUpdate {
    pub record: UpdateRecord,
    pub outcome: Outcome,
    /// name of the provider that reported the final outcome
    pub provider: String,
}

/// Per-provider counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderCounters {
    pub input: u64,
    pub output: u64,
    pub errors: u64,
    pub queue_max: usize,
}

struct ProviderSlot {
    id: usize,
    name: String,
    priority: ProviderPriority,
    flags: ProviderFlags,
    state: ProviderState,
    provider: Box<dyn DplaneProvider>,
    pending: VecDeque<UpdateRecord>,
    counters: ProviderCounters,
}

enum Input<'a> {
    Ingress(&'a UpdateQueue),
    Pending(&'a mut VecDeque<UpdateRecord>),
}

/// The [`ProviderIo`] given to a provider during a cycle
struct CycleIo<'a> {
    input: Input<'a>,
    output: Vec<(UpdateRecord, Outcome)>,
    limit: usize,
    counters: &'a mut ProviderCounters,
}

impl ProviderIo for CycleIo<'_> {
    fn dequeue(&mut self) -> Option<UpdateRecord> {
        let record = match &mut self.input {
            Input::Ingress(queue) => queue.pop(),
            Input::Pending(queue) => queue.pop_front(),
        };
        if record.is_some() {
            self.counters.input += 1;
        }
        record
    }
    fn enqueue_result(&mut self, record: UpdateRecord, outcome: Outcome) {
        self.counters.output += 1;
        if !outcome.is_success() {
            self.counters.errors += 1;
        }
        self.output.push((record, outcome));
    }
    fn work_limit(&self) -> usize {
        self.limit
    }
}

/// What happened in one cycle
#[derive(Debug, Default)]
pub struct CycleReport {
    /// results reported by each provider, in pipeline order
    pub results: Vec<(String, Vec<ProcessingResult>)>,
    /// number of updates completed in the cycle
    pub completed: usize,
}

impl CycleReport {
    /// Total number of results reported by all providers
    #[must_use]
    pub fn reported(&self) -> usize {
        self.results.iter().map(|(_, r)| r.len()).sum()
    }
}

pub struct Framework {
    config: FrameworkConfig,
    ingress: UpdateQueue,
    slots: Vec<ProviderSlot>,
    completed: VecDeque<CompletedUpdate>,
    next_id: usize,
    running: bool,
    finished: bool,
}

impl Framework {
    #[must_use]
    pub fn new(config: FrameworkConfig) -> Self {
        let ingress = UpdateQueue::new(config.queue_capacity);
        Self {
            config,
            ingress,
            slots: vec![],
            completed: VecDeque::new(),
            next_id: 0,
            running: false,
            finished: false,
        }
    }

    /// Register a provider. Providers run in priority order; providers with the same
    /// priority run in registration order.
    ///
    /// # Errors
    ///
    /// Fails if the name is empty or already taken, or if the framework was started.
    pub fn register(
        &mut self,
        name: &str,
        priority: ProviderPriority,
        flags: ProviderFlags,
        provider: Box<dyn DplaneProvider>,
    ) -> Result<ProviderHandle, RegistrationError> {
        if self.running || self.finished {
            return Err(RegistrationError::NotReady);
        }
        if name.trim().is_empty() {
            return Err(RegistrationError::InvalidName(name.to_owned()));
        }
        if self.slots.iter().any(|s| s.name == name) {
            error!("Provider registration failed: '{name}' already exists");
            return Err(RegistrationError::Duplicate(name.to_owned()));
        }
        let id = self.next_id;
        self.next_id += 1;
        let position = self
            .slots
            .iter()
            .position(|s| s.priority > priority)
            .unwrap_or(self.slots.len());
        self.slots.insert(
            position,
            ProviderSlot {
                id,
                name: name.to_owned(),
                priority,
                flags,
                state: ProviderState::Uninitialized,
                provider,
                pending: VecDeque::new(),
                counters: ProviderCounters::default(),
            },
        );
        info!("Registered provider '{name}' with priority {priority}");
        Ok(ProviderHandle {
            id,
            name: name.to_owned(),
        })
    }

    fn slot(&self, handle: &ProviderHandle) -> Option<&ProviderSlot> {
        self.slots.iter().find(|s| s.id == handle.id)
    }

    #[must_use]
    pub fn provider_state(&self, handle: &ProviderHandle) -> Option<ProviderState> {
        self.slot(handle).map(|s| s.state)
    }

    #[must_use]
    pub fn provider_flags(&self, handle: &ProviderHandle) -> Option<ProviderFlags> {
        self.slot(handle).map(|s| s.flags)
    }

    #[must_use]
    pub fn counters(&self, handle: &ProviderHandle) -> Option<&ProviderCounters> {
        self.slot(handle).map(|s| &s.counters)
    }

    /// Names of the providers in pipeline order
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    #[must_use]
    pub fn work_limit(&self) -> usize {
        self.config.work_limit
    }

    /// Change the work limit given to providers from the next cycle on
    pub fn set_work_limit(&mut self, limit: usize) {
        self.config.work_limit = limit;
    }

    /// A handle to the queue of pending updates, e.g. to feed it from other threads
    #[must_use]
    pub fn ingress(&self) -> UpdateQueue {
        self.ingress.clone()
    }

    /// Queue an update for the providers.
    ///
    /// # Errors
    ///
    /// Fails if the framework was finished or the queue is full.
    pub fn enqueue(&mut self, op: DplaneOp, payload: UpdatePayload) -> Result<SeqNum, DplaneError> {
        if self.finished {
            return Err(DplaneError::Finished);
        }
        self.ingress
            .push(op, payload)
            .map_err(|record| DplaneError::QueueFull(record.seqn()))
    }

    /// Number of updates not yet completed: queued, or consumed by a provider that has
    /// not reported them yet
    #[must_use]
    pub fn pending(&self) -> usize {
        self.ingress.len()
            + self
                .slots
                .iter()
                .map(|s| s.pending.len() + s.provider.inflight())
                .sum::<usize>()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start all providers, in pipeline order. Starting a running framework does nothing.
    ///
    /// # Errors
    ///
    /// Fails if any provider fails to start. The framework is then not running.
    pub fn start(&mut self) -> Result<(), DplaneError> {
        if self.finished {
            return Err(DplaneError::Finished);
        }
        if self.running {
            return Ok(());
        }
        for slot in &mut self.slots {
            if slot.state == ProviderState::Started {
                continue;
            }
            if let Err(e) = slot.provider.start() {
                error!("Failed to start provider '{}': {e}", slot.name);
                slot.state = ProviderState::Failed;
                return Err(DplaneError::StartFailed {
                    name: slot.name.clone(),
                    reason: e.to_string(),
                });
            }
            slot.state = ProviderState::Started;
            debug!("Started provider '{}'", slot.name);
        }
        self.running = true;
        info!("Dataplane framework started with {} provider(s)", self.slots.len());
        Ok(())
    }

    /// Run one scheduling cycle: every provider is called once.
    ///
    /// # Errors
    ///
    /// Fails if the framework is not running or a provider is misused.
    pub fn run_cycle(&mut self) -> Result<CycleReport, DplaneError> {
        if !self.running {
            return Err(DplaneError::NotRunning);
        }
        let mut report = CycleReport::default();
        let limit = self.config.work_limit;
        let count = self.slots.len();

        for index in 0..count {
            let (head, tail) = self.slots.split_at_mut(index + 1);
            let slot = &mut head[index];

            let queue_len = if index == 0 {
                self.ingress.len()
            } else {
                slot.pending.len()
            };
            slot.counters.queue_max = slot.counters.queue_max.max(queue_len);

            let input = if index == 0 {
                Input::Ingress(&self.ingress)
            } else {
                Input::Pending(&mut slot.pending)
            };
            let mut io = CycleIo {
                input,
                output: vec![],
                limit,
                counters: &mut slot.counters,
            };
            let results = slot.provider.process(&mut io)?;
            let output = io.output;

            for (record, outcome) in output {
                match tail.first_mut() {
                    Some(next) if outcome.is_success() => next.pending.push_back(record),
                    _ => {
                        self.completed.push_back(CompletedUpdate {
                            record,
                            outcome,
                            provider: slot.name.clone(),
                        });
                        report.completed += 1;
                    }
                }
            }
            report.results.push((slot.name.clone(), results));
        }
        Ok(report)
    }

    /// Take the updates completed so far, in completion order
    pub fn take_completed(&mut self) -> Vec<CompletedUpdate> {
        self.completed.drain(..).collect()
    }

    /// Finish all providers, in reverse pipeline order. The updates a provider hands back
    /// when finishing are completed with the outcome it gives them. Updates still queued
    /// are dropped.
    pub fn finish(&mut self, early: bool) {
        if self.finished {
            return;
        }
        for slot in self.slots.iter_mut().rev() {
            if slot.state == ProviderState::Started {
                let remaining: Vec<Completion> = slot.provider.finish(early);
                for (record, outcome) in remaining {
                    slot.counters.output += 1;
                    if !outcome.is_success() {
                        slot.counters.errors += 1;
                    }
                    self.completed.push_back(CompletedUpdate {
                        record,
                        outcome,
                        provider: slot.name.clone(),
                    });
                }
                slot.state = ProviderState::Finished;
            }
        }
        let abandoned = self.pending();
        if abandoned > 0 {
            warn!("Dataplane framework finished with {abandoned} updates pending");
        }
        self.running = false;
        self.finished = true;
        info!("Dataplane framework finished (early: {early})");
    }
}

impl Display for ProviderCounters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:>10} {:>10} {:>10} {:>10}",
            self.input, self.output, self.errors, self.queue_max
        )
    }
}

impl Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━ Dataplane providers ━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            " {:<16} {:<11} {:<14} {:>10} {:>10} {:>10} {:>10}",
            "name", "priority", "state", "in", "out", "errors", "queue max"
        )?;
        for slot in &self.slots {
            writeln!(
                f,
                " {:<16} {:<11} {:<14} {}",
                slot.name,
                slot.priority.to_string(),
                slot.state.to_string(),
                slot.counters
            )?;
        }
        writeln!(
            f,
            " pending: {} (ingress {}/{}) completed: {}",
            self.pending(),
            self.ingress.len(),
            self.ingress.capacity(),
            self.completed.len()
        )
    }
}
