// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Dataplane operation kinds

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The kind of change requested by an update. The set of kinds is versioned with the
/// host protocol: codes that this provider does not know are kept as [`DplaneOp::Unknown`]
/// so that they can be tolerated instead of rejected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DplaneOp {
    RouteInstall,
    RouteUpdate,
    RouteDelete,
    RouteNotify,
    SysRouteAdd,
    SysRouteDelete,
    NhInstall,
    NhUpdate,
    NhDelete,
    AddrInstall,
    AddrUninstall,
    MacInstall,
    MacDelete,
    NeighInstall,
    NeighUpdate,
    NeighDelete,
    VtepAdd,
    VtepDelete,
    BrPortUpdate,
    IntfAddrAdd,
    IntfAddrDel,
    IntfNetconfig,
    IntfInstall,
    IntfUpdate,
    IntfDelete,
    Unknown(u16),
}

impl Display for DplaneOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DplaneOp::Unknown(code) => write!(f, "unknown({code})"),
            known => {
                let name: &'static str = known.into();
                f.write_str(name)
            }
        }
    }
}

/// Group of related [`DplaneOp`]s
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum OpFamily {
    Route,
    SysRoute,
    Nexthop,
    Address,
    Mac,
    Neighbor,
    Vtep,
    BridgePort,
    IntfAddress,
    IntfNetconfig,
    Interface,
    Unknown,
}

impl DplaneOp {
    /// All the operations known to this provider, in code order
    pub const KNOWN: &'static [DplaneOp] = &[
        DplaneOp::RouteInstall,
        DplaneOp::RouteUpdate,
        DplaneOp::RouteDelete,
        DplaneOp::RouteNotify,
        DplaneOp::SysRouteAdd,
        DplaneOp::SysRouteDelete,
        DplaneOp::NhInstall,
        DplaneOp::NhUpdate,
        DplaneOp::NhDelete,
        DplaneOp::AddrInstall,
        DplaneOp::AddrUninstall,
        DplaneOp::MacInstall,
        DplaneOp::MacDelete,
        DplaneOp::NeighInstall,
        DplaneOp::NeighUpdate,
        DplaneOp::NeighDelete,
        DplaneOp::VtepAdd,
        DplaneOp::VtepDelete,
        DplaneOp::BrPortUpdate,
        DplaneOp::IntfAddrAdd,
        DplaneOp::IntfAddrDel,
        DplaneOp::IntfNetconfig,
        DplaneOp::IntfInstall,
        DplaneOp::IntfUpdate,
        DplaneOp::IntfDelete,
    ];

    /// The raw code of this operation. Code 0 is reserved and never assigned.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            DplaneOp::Unknown(code) => code,
            known => Self::KNOWN
                .iter()
                .position(|op| *op == known)
                .and_then(|pos| u16::try_from(pos + 1).ok())
                .unwrap_or_else(|| unreachable!()),
        }
    }

    #[must_use]
    pub fn is_known(self) -> bool {
        !matches!(self, DplaneOp::Unknown(_))
    }

    #[must_use]
    pub fn family(self) -> OpFamily {
        match self {
            DplaneOp::RouteInstall
            | DplaneOp::RouteUpdate
            | DplaneOp::RouteDelete
            | DplaneOp::RouteNotify => OpFamily::Route,
            DplaneOp::SysRouteAdd | DplaneOp::SysRouteDelete => OpFamily::SysRoute,
            DplaneOp::NhInstall | DplaneOp::NhUpdate | DplaneOp::NhDelete => OpFamily::Nexthop,
            DplaneOp::AddrInstall | DplaneOp::AddrUninstall => OpFamily::Address,
            DplaneOp::MacInstall | DplaneOp::MacDelete => OpFamily::Mac,
            DplaneOp::NeighInstall | DplaneOp::NeighUpdate | DplaneOp::NeighDelete => {
                OpFamily::Neighbor
            }
            DplaneOp::VtepAdd | DplaneOp::VtepDelete => OpFamily::Vtep,
            DplaneOp::BrPortUpdate => OpFamily::BridgePort,
            DplaneOp::IntfAddrAdd | DplaneOp::IntfAddrDel => OpFamily::IntfAddress,
            DplaneOp::IntfNetconfig => OpFamily::IntfNetconfig,
            DplaneOp::IntfInstall | DplaneOp::IntfUpdate | DplaneOp::IntfDelete => {
                OpFamily::Interface
            }
            DplaneOp::Unknown(_) => OpFamily::Unknown,
        }
    }
}

impl From<u16> for DplaneOp {
    fn from(code: u16) -> Self {
        usize::from(code)
            .checked_sub(1)
            .and_then(|pos| Self::KNOWN.get(pos))
            .copied()
            .unwrap_or(DplaneOp::Unknown(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_codes() {
        for op in DplaneOp::KNOWN {
            assert_ne!(op.code(), 0);
            assert_eq!(DplaneOp::from(op.code()), *op);
            assert!(op.is_known());
        }
        assert_eq!(DplaneOp::from(0), DplaneOp::Unknown(0));
        assert_eq!(DplaneOp::from(999), DplaneOp::Unknown(999));
        assert_eq!(DplaneOp::Unknown(999).code(), 999);
        assert!(!DplaneOp::from(999).is_known());
    }

    #[test]
    fn test_op_families() {
        assert_eq!(DplaneOp::KNOWN.len(), 25);
        assert_eq!(DplaneOp::RouteNotify.family(), OpFamily::Route);
        assert_eq!(DplaneOp::NeighUpdate.family(), OpFamily::Neighbor);
        assert_eq!(DplaneOp::IntfNetconfig.family(), OpFamily::IntfNetconfig);
        assert_eq!(DplaneOp::Unknown(7).family(), OpFamily::Unknown);
        assert!(
            DplaneOp::KNOWN
                .iter()
                .all(|op| op.family() != OpFamily::Unknown)
        );
    }

    #[test]
    fn test_op_display() {
        assert_eq!(DplaneOp::AddrInstall.to_string(), "addr_install");
        assert_eq!(DplaneOp::Unknown(42).to_string(), "unknown(42)");
        assert_eq!(OpFamily::SysRoute.to_string(), "sys-route");
    }
}
