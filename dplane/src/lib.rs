// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A dataplane provider for the routing daemon's dataplane framework.
//!
//! The HH provider consumes the updates (routes, nexthops, addresses, EVPN neighbors,
//! VTEPs, interfaces...) queued by the host, classifies them by operation and reports
//! an outcome for each of them. Updates can optionally be programmed into an external
//! backend, from a worker that runs off the scheduling thread of the host.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod backend;
pub mod dispatch;
mod errors;
pub mod framework;
pub mod op;
pub mod provider;
mod queue;
pub mod update;

// re-exports
pub use backend::{
    Backend, BackendConfig, BackendError, BackendWorker, Completion, LogBackend,
};
pub use dispatch::{DispatchTable, Handler, noop_handler, observe_handler, unhandled_handler};
pub use errors::{DplaneError, ProviderError, RegistrationError};
pub use framework::{
    CompletedUpdate, CycleReport, Framework, FrameworkConfig, ProviderCounters, ProviderFlags,
    ProviderHandle, ProviderPriority,
};
pub use op::{DplaneOp, OpFamily};
pub use provider::{BatchProcessor, DplaneProvider, HhProvider, ProviderIo, ProviderState};
pub use queue::UpdateQueue;
pub use update::{Mac, Outcome, ProcessingResult, SeqNum, UpdatePayload, UpdateRecord, Vni};

/// Static description of this module
#[derive(Debug, Clone, Copy)]
pub struct ModuleInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
}

pub const MODULE_INFO: ModuleInfo = ModuleInfo {
    name: "dplane_hh",
    version: env!("CARGO_PKG_VERSION"),
    description: "HH dataplane provider",
};

// main trace target for the provider
use tracectl::trace_target;
trace_target!("dplane", LevelFilter::DEBUG, &["dplane-full"]);
