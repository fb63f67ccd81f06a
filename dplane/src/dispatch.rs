// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Dispatch of update records to per-operation handlers

use crate::op::DplaneOp;
use crate::update::{Outcome, UpdateRecord};
use ahash::RandomState;
use std::collections::HashMap;

use tracing::{debug, info, trace};

/// A handler for some [`DplaneOp`]
pub type Handler = Box<dyn Fn(&UpdateRecord) -> Outcome + Send + Sync>;

/// A table mapping operations to handlers, with a default handler for the operations
/// that have no entry.
pub struct DispatchTable {
    handlers: HashMap<DplaneOp, Handler, RandomState>,
    default: Handler,
}

/// Handler for operations that require no action from this provider
#[must_use]
pub fn noop_handler(record: &UpdateRecord) -> Outcome {
    trace!("Dplane op {} {}: nothing to do", record.seqn(), record.op());
    Outcome::Success
}

/// Handler for operations whose only action is to be observed
#[must_use]
pub fn observe_handler(record: &UpdateRecord) -> Outcome {
    info!(
        "Dplane op {} {}: {}",
        record.seqn(),
        record.op(),
        record.payload()
    );
    Outcome::Success
}

/// Handler for operations this provider does not know about. Those are tolerated.
#[must_use]
pub fn unhandled_handler(record: &UpdateRecord) -> Outcome {
    debug!(
        "Received unhandled op {} for update {}",
        record.op().code(),
        record.seqn()
    );
    Outcome::Success
}

impl DispatchTable {
    /// Create an empty table whose entries all resolve to `default`
    #[must_use]
    pub fn new(default: Handler) -> Self {
        Self {
            handlers: HashMap::with_hasher(RandomState::with_seed(0)),
            default,
        }
    }

    /// Build the table of the HH provider: every known operation gets an explicit entry.
    /// Installs of addresses, MACs, neighbors and VTEPs are observed, as is every interface
    /// event. Routes, nexthops and the remaining removals and updates need no action.
    #[must_use]
    pub fn hh() -> Self {
        let mut table = Self::new(Box::new(unhandled_handler));
        for op in DplaneOp::KNOWN {
            let handler: Handler = match op {
                DplaneOp::AddrInstall
                | DplaneOp::MacInstall
                | DplaneOp::NeighInstall
                | DplaneOp::VtepAdd
                | DplaneOp::IntfAddrAdd
                | DplaneOp::IntfAddrDel
                | DplaneOp::IntfNetconfig
                | DplaneOp::IntfInstall
                | DplaneOp::IntfUpdate
                | DplaneOp::IntfDelete => Box::new(observe_handler),
                DplaneOp::RouteInstall
                | DplaneOp::RouteUpdate
                | DplaneOp::RouteDelete
                | DplaneOp::RouteNotify
                | DplaneOp::SysRouteAdd
                | DplaneOp::SysRouteDelete
                | DplaneOp::NhInstall
                | DplaneOp::NhUpdate
                | DplaneOp::NhDelete
                | DplaneOp::AddrUninstall
                | DplaneOp::MacDelete
                | DplaneOp::NeighUpdate
                | DplaneOp::NeighDelete
                | DplaneOp::VtepDelete
                | DplaneOp::BrPortUpdate => Box::new(noop_handler),
                DplaneOp::Unknown(_) => continue,
            };
            table.set(*op, handler);
        }
        table
    }

    /// Install or replace the handler for `op`
    pub fn set(&mut self, op: DplaneOp, handler: Handler) {
        self.handlers.insert(op, handler);
    }

    /// Remove the handler for `op`, so that it resolves to the default handler
    pub fn unset(&mut self, op: DplaneOp) {
        self.handlers.remove(&op);
    }

    #[must_use]
    pub fn contains(&self, op: DplaneOp) -> bool {
        self.handlers.contains_key(&op)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for the operation of `record`
    pub fn dispatch(&self, record: &UpdateRecord) -> Outcome {
        let handler = self.handlers.get(&record.op()).unwrap_or(&self.default);
        handler(record)
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::hh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::{SeqNum, UpdatePayload};
    use tracing_test::traced_test;

    fn record(op: DplaneOp) -> UpdateRecord {
        UpdateRecord::new(op, UpdatePayload::None, SeqNum(1))
    }

    #[test]
    fn test_hh_table_is_complete() {
        let table = DispatchTable::hh();
        assert_eq!(table.len(), DplaneOp::KNOWN.len());
        assert!(DplaneOp::KNOWN.iter().all(|op| table.contains(*op)));
        assert!(!table.contains(DplaneOp::Unknown(1000)));
    }

    #[test]
    #[traced_test]
    fn test_known_ops_succeed_and_are_idempotent() {
        let table = DispatchTable::hh();
        for op in DplaneOp::KNOWN {
            let record = record(*op);
            let first = table.dispatch(&record);
            let second = table.dispatch(&record);
            assert_eq!(first, Outcome::Success);
            assert_eq!(first, second);
        }
    }

    #[test]
    #[traced_test]
    fn test_observed_ops_emit_info() {
        let table = DispatchTable::hh();
        let record = UpdateRecord::new(
            DplaneOp::AddrInstall,
            UpdatePayload::Address {
                ifindex: 2,
                address: "10.0.0.1/24".parse().unwrap(),
            },
            SeqNum(9),
        );
        assert_eq!(table.dispatch(&record), Outcome::Success);
        assert!(logs_contain(
            "Dplane op #9 addr_install: address 10.0.0.1/24 ifindex 2"
        ));
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains(" INFO ")).count() {
                1 => Ok(()),
                n => Err(format!("expected one info event, got {n}")),
            }
        });
    }

    #[test]
    #[traced_test]
    fn test_noop_ops_are_silent() {
        let table = DispatchTable::hh();
        for op in [
            DplaneOp::RouteInstall,
            DplaneOp::SysRouteDelete,
            DplaneOp::NhUpdate,
            DplaneOp::AddrUninstall,
            DplaneOp::MacDelete,
            DplaneOp::NeighUpdate,
            DplaneOp::NeighDelete,
            DplaneOp::VtepDelete,
            DplaneOp::BrPortUpdate,
        ] {
            assert_eq!(table.dispatch(&record(op)), Outcome::Success);
        }
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|l| l.contains(" INFO ") || l.contains(" DEBUG "))
                .count()
            {
                0 => Ok(()),
                n => Err(format!("expected no info/debug events, got {n}")),
            }
        });
    }

    #[test]
    #[traced_test]
    fn test_interface_events_are_observed() {
        let table = DispatchTable::hh();
        for op in [
            DplaneOp::IntfAddrAdd,
            DplaneOp::IntfAddrDel,
            DplaneOp::IntfNetconfig,
            DplaneOp::IntfInstall,
            DplaneOp::IntfUpdate,
            DplaneOp::IntfDelete,
        ] {
            assert_eq!(table.dispatch(&record(op)), Outcome::Success);
        }
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains(" INFO ")).count() {
                6 => Ok(()),
                n => Err(format!("expected 6 info events, got {n}")),
            }
        });
    }

    #[test]
    fn test_table_from_exported_handlers() {
        let mut table = DispatchTable::new(Box::new(crate::unhandled_handler));
        table.set(DplaneOp::VtepAdd, Box::new(crate::observe_handler));
        table.set(DplaneOp::VtepDelete, Box::new(crate::noop_handler));
        assert_eq!(table.len(), 2);
        for op in [DplaneOp::VtepAdd, DplaneOp::VtepDelete, DplaneOp::Unknown(9)] {
            assert_eq!(table.dispatch(&record(op)), Outcome::Success);
        }
    }

    #[test]
    #[traced_test]
    fn test_unknown_op_is_tolerated() {
        let table = DispatchTable::hh();
        assert_eq!(
            table.dispatch(&record(DplaneOp::Unknown(4242))),
            Outcome::Success
        );
        assert!(logs_contain("Received unhandled op 4242"));
        logs_assert(|lines: &[&str]| {
            let debug = lines.iter().filter(|l| l.contains(" DEBUG ")).count();
            let other = lines
                .iter()
                .filter(|l| l.contains(" INFO ") || l.contains(" ERROR "))
                .count();
            if debug == 1 && other == 0 {
                Ok(())
            } else {
                Err(format!("expected one debug event, got {debug} (+{other})"))
            }
        });
    }

    #[test]
    fn test_custom_handlers() {
        let mut table = DispatchTable::new(Box::new(|_: &UpdateRecord| {
            Outcome::Failure("nope".to_string())
        }));
        assert!(table.is_empty());
        table.set(DplaneOp::VtepAdd, Box::new(|_: &UpdateRecord| Outcome::Success));
        assert_eq!(table.dispatch(&record(DplaneOp::VtepAdd)), Outcome::Success);
        assert_eq!(
            table.dispatch(&record(DplaneOp::VtepDelete)),
            Outcome::Failure("nope".to_string())
        );
        table.unset(DplaneOp::VtepAdd);
        assert!(!table.dispatch(&record(DplaneOp::VtepAdd)).is_success());
    }
}
