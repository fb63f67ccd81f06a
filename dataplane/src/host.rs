// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Drives the provider framework: feeds it updates and runs its cycles

use crate::script::UpdateScript;
use dplane::{CompletedUpdate, DplaneError, Framework};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub fed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cycles: u64,
    pub interrupted: bool,
}

impl RunSummary {
    #[must_use]
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }
}

pub struct Host {
    framework: Framework,
    stop: Arc<AtomicBool>,
    max_cycles: Option<u64>,
    interval: Duration,
    summary: RunSummary,
}

impl Host {
    #[must_use]
    pub fn new(framework: Framework, stop: Arc<AtomicBool>) -> Self {
        Self {
            framework,
            stop,
            max_cycles: None,
            interval: Duration::ZERO,
            summary: RunSummary::default(),
        }
    }

    #[must_use]
    pub fn with_max_cycles(mut self, cycles: Option<u64>) -> Self {
        self.max_cycles = cycles;
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn framework(&self) -> &Framework {
        &self.framework
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn exhausted(&self) -> bool {
        self.max_cycles
            .is_some_and(|max| self.summary.cycles >= max)
    }

    fn account(&mut self, completed: Vec<CompletedUpdate>) {
        for update in completed {
            if update.outcome.is_success() {
                self.summary.succeeded += 1;
            } else {
                warn!(
                    "Update {} failed at '{}': {}",
                    update.record, update.provider, update.outcome
                );
                self.summary.failed += 1;
            }
        }
    }

    fn cycle(&mut self) -> Result<(), DplaneError> {
        let report = self.framework.run_cycle()?;
        self.summary.cycles += 1;
        debug!(
            "Cycle {}: {} reported, {} completed",
            self.summary.cycles,
            report.reported(),
            report.completed
        );
        let completed = self.framework.take_completed();
        self.account(completed);
        Ok(())
    }

    /// Feed the updates of a script and run cycles until all of them are completed,
    /// the cycle budget is exhausted or a stop is requested.
    ///
    /// # Errors
    ///
    /// Fails if the framework is not running or rejects an update.
    pub fn run(&mut self, script: &UpdateScript) -> Result<RunSummary, DplaneError> {
        for (op, payload) in script.updates() {
            loop {
                if self.stopped() || self.exhausted() {
                    self.summary.interrupted = true;
                    return Ok(self.summary.clone());
                }
                match self.framework.enqueue(op, payload.clone()) {
                    Ok(seqn) => {
                        debug!("Queued update {seqn} {op}");
                        self.summary.fed += 1;
                        break;
                    }
                    Err(DplaneError::QueueFull(_)) => self.cycle()?,
                    Err(e) => return Err(e),
                }
            }
        }
        while self.summary.completed() < self.summary.fed {
            if self.stopped() || self.exhausted() {
                self.summary.interrupted = true;
                break;
            }
            self.cycle()?;
            if !self.interval.is_zero() && self.summary.completed() < self.summary.fed {
                std::thread::sleep(self.interval);
            }
        }
        Ok(self.summary.clone())
    }

    /// Finish the framework. The finish is early if a stop was requested.
    pub fn shutdown(&mut self) {
        let early = self.stopped();
        self.framework.finish(early);
        let completed = self.framework.take_completed();
        self.account(completed);
        info!(
            "Fed {} updates: {} succeeded, {} failed in {} cycles",
            self.summary.fed, self.summary.succeeded, self.summary.failed, self.summary.cycles
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dplane::{
        BackendConfig, FrameworkConfig, HhProvider, LogBackend, ProviderFlags, ProviderPriority,
    };
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    const SCRIPT: &str = r"
updates:
  - op: addr_install
    payload:
      type: address
      ifindex: 2
      address: 10.0.0.1/24
  - op: route_install
    repeat: 4
  - op: 4000
";

    fn framework(work_limit: usize, queue_capacity: usize, provider: HhProvider) -> Framework {
        let mut fw = Framework::new(FrameworkConfig {
            work_limit,
            queue_capacity,
        });
        fw.register(
            "HH plugin",
            ProviderPriority::PreKernel,
            ProviderFlags::DEFAULT,
            Box::new(provider),
        )
        .unwrap();
        fw.start().unwrap();
        fw
    }

    #[test]
    #[traced_test]
    fn test_run_script() {
        let script = UpdateScript::parse(SCRIPT).unwrap();
        let fw = framework(2, 2, HhProvider::default());
        let mut host = Host::new(fw, Arc::new(AtomicBool::new(false)));
        let summary = host.run(&script).unwrap();
        assert_eq!(summary.fed, 6);
        assert_eq!(summary.succeeded, 6);
        assert_eq!(summary.failed, 0);
        assert!(!summary.interrupted);
        assert!(summary.cycles >= 3);
        assert_eq!(host.framework().pending(), 0);
        host.shutdown();
        assert!(logs_contain("Received unhandled op 4000"));
    }

    #[test]
    fn test_cycle_budget() {
        let script = UpdateScript::parse(SCRIPT).unwrap();
        let fw = framework(1, 1024, HhProvider::default());
        let mut host = Host::new(fw, Arc::new(AtomicBool::new(false))).with_max_cycles(Some(2));
        let summary = host.run(&script).unwrap();
        assert_eq!(summary.fed, 6);
        assert_eq!(summary.completed(), 2);
        assert_eq!(summary.cycles, 2);
        assert!(summary.interrupted);
        host.shutdown();
    }

    #[test]
    fn test_stop_requested() {
        let script = UpdateScript::parse(SCRIPT).unwrap();
        let fw = framework(100, 1024, HhProvider::default());
        let mut host = Host::new(fw, Arc::new(AtomicBool::new(true)));
        let summary = host.run(&script).unwrap();
        assert_eq!(summary.fed, 0);
        assert!(summary.interrupted);
        host.shutdown();
        assert!(!host.framework().is_running());
    }

    #[test]
    fn test_run_with_backend() {
        let script = UpdateScript::parse(SCRIPT).unwrap();
        let provider = HhProvider::default()
            .with_backend(Arc::new(LogBackend), BackendConfig::default());
        let fw = framework(100, 1024, provider);
        let mut host = Host::new(fw, Arc::new(AtomicBool::new(false)))
            .with_interval(Duration::from_millis(5))
            .with_max_cycles(Some(1000));
        let summary = host.run(&script).unwrap();
        assert_eq!(summary.fed, 6);
        assert_eq!(summary.succeeded, 6);
        assert!(!summary.interrupted);
        host.shutdown();
    }
}
