// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Command line arguments of the dataplane provider host

pub use clap::Parser;
use std::fmt::Display;
use std::num::NonZero;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PROVIDER_NAME: &str = "HH plugin";
pub const DEFAULT_WORK_LIMIT: usize = 100;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_GRACE_MS: u64 = 500;

/// The backend updates are programmed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum BackendArg {
    /// updates are only dispatched and logged, from the scheduling thread
    None,
    /// updates are handed to a logging backend that runs in a worker
    Log,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown backend '{0}': allowed values are none|log")]
pub struct UnknownBackend(String);

impl FromStr for BackendArg {
    type Err = UnknownBackend;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "none" => Ok(BackendArg::None),
            "log" => Ok(BackendArg::Log),
            other => Err(UnknownBackend(other.to_string())),
        }
    }
}

impl Display for BackendArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendArg::None => write!(f, "none"),
            BackendArg::Log => write!(f, "log"),
        }
    }
}

#[derive(Parser, serde::Serialize)]
#[command(name = "Hedgehog dataplane provider host")]
#[command(version)]
#[command(about = "Runs the HH dataplane provider against a scripted sequence of updates", long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct CmdArgs {
    #[arg(
        long,
        value_name = "NAME",
        default_value = DEFAULT_PROVIDER_NAME,
        help = "Name to register the provider with"
    )]
    name: String,

    #[arg(
        long,
        value_name = "N",
        default_value_t = NonZero::new(DEFAULT_WORK_LIMIT).unwrap_or(NonZero::<usize>::MIN),
        help = "Max number of updates the provider may process per cycle"
    )]
    work_limit: NonZero<usize>,

    #[arg(
        long,
        value_name = "N",
        default_value_t = NonZero::new(DEFAULT_QUEUE_CAPACITY).unwrap_or(NonZero::<usize>::MIN),
        help = "Capacity of the queue of pending updates"
    )]
    queue_capacity: NonZero<usize>,

    #[arg(
        long,
        value_name = "YAML file",
        help = "File with the sequence of updates to feed the provider with"
    )]
    script: Option<PathBuf>,

    #[arg(
        long,
        value_name = "N",
        help = "Stop after N cycles, even if updates are pending"
    )]
    cycles: Option<u64>,

    #[arg(
        long,
        value_name = "MS",
        default_value_t = 10,
        help = "Pause between cycles, in milliseconds"
    )]
    cycle_interval_ms: u64,

    #[arg(
        long,
        value_name = "none|log",
        default_value = "none",
        value_parser = BackendArg::from_str,
        help = "Backend to program updates into"
    )]
    backend: BackendArg,

    #[arg(
        long,
        value_name = "MS",
        default_value_t = DEFAULT_GRACE_MS,
        help = "Max time to wait for the backend to drain on shutdown, in milliseconds"
    )]
    grace_ms: u64,

    #[arg(
        long,
        default_value_t = false,
        help = "Show the available tracing tags and exit"
    )]
    show_tracing_tags: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "Show configurable tracing targets and exit"
    )]
    show_tracing_targets: bool,

    #[arg(
        long,
        value_name = "tracing configuration",
        help = "Tracing config string as comma-separated sequence of tag=level, with level one in [off,error,warn,info,debug,trace].
Passing default=level sets the default log-level.
E.g. default=error,dplane=debug"
    )]
    tracing: Option<String>,
}

impl CmdArgs {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    #[must_use]
    pub fn work_limit(&self) -> usize {
        self.work_limit.get()
    }
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.get()
    }
    #[must_use]
    pub fn script(&self) -> Option<&PathBuf> {
        self.script.as_ref()
    }
    #[must_use]
    pub fn cycles(&self) -> Option<u64> {
        self.cycles
    }
    #[must_use]
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }
    #[must_use]
    pub fn backend(&self) -> BackendArg {
        self.backend
    }
    #[must_use]
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
    #[must_use]
    pub fn show_tracing_tags(&self) -> bool {
        self.show_tracing_tags
    }
    #[must_use]
    pub fn show_tracing_targets(&self) -> bool {
        self.show_tracing_targets
    }
    #[must_use]
    pub fn tracing(&self) -> Option<&String> {
        self.tracing.as_ref()
    }
}
