// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Update records: the changes requested by the host and their outcomes

use crate::op::DplaneOp;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::net::IpAddr;
use std::num::NonZero;
use std::str::FromStr;

/// A MAC address
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mac(pub [u8; 6]);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid MAC address '{0}'")]
pub struct InvalidMac(String);

impl FromStr for Mac {
    type Err = InvalidMac;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mac = [0u8; 6];
        let mut parts = s.split(':');
        for byte in &mut mac {
            *byte = parts
                .next()
                .filter(|p| p.len() == 2)
                .and_then(|p| u8::from_str_radix(p, 16).ok())
                .ok_or_else(|| InvalidMac(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(InvalidMac(s.to_string()));
        }
        Ok(Mac(mac))
    }
}
impl TryFrom<String> for Mac {
    type Error = InvalidMac;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Mac::from_str(&value)
    }
}
impl From<Mac> for String {
    fn from(mac: Mac) -> Self {
        mac.to_string()
    }
}
impl Display for Mac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// A VXLAN network identifier: a non-zero 24-bit value
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Vni(NonZero<u32>);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidVni {
    #[error("Vni 0 is reserved")]
    ReservedZero,
    #[error("Vni {0} is too large")]
    TooLarge(u32),
}

impl Vni {
    pub const MAX: u32 = 0x00_FF_FF_FF;

    /// Create a [`Vni`]
    ///
    /// # Errors
    ///
    /// Fails if the value is 0 or does not fit in 24 bits.
    pub fn new(vni: u32) -> Result<Self, InvalidVni> {
        match NonZero::<u32>::new(vni) {
            None => Err(InvalidVni::ReservedZero),
            Some(_) if vni > Vni::MAX => Err(InvalidVni::TooLarge(vni)),
            Some(vni) => Ok(Vni(vni)),
        }
    }
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0.get()
    }
}
impl TryFrom<u32> for Vni {
    type Error = InvalidVni;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Vni::new(value)
    }
}
impl From<Vni> for u32 {
    fn from(vni: Vni) -> Self {
        vni.as_u32()
    }
}
impl Display for Vni {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// Data of an update. It belongs to the host: providers only read it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdatePayload {
    #[default]
    None,
    Route {
        vrf: u32,
        prefix: IpNet,
        nhg: Option<u32>,
    },
    Nexthop {
        id: u32,
    },
    Address {
        ifindex: u32,
        address: IpNet,
    },
    Mac {
        vni: Vni,
        mac: Mac,
    },
    Neighbor {
        ifindex: u32,
        ip: IpAddr,
        mac: Option<Mac>,
    },
    Vtep {
        vni: Vni,
        address: IpAddr,
    },
    BridgePort {
        ifindex: u32,
    },
    Interface {
        ifindex: u32,
        name: String,
    },
}

impl Display for UpdatePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdatePayload::None => write!(f, "(no data)"),
            UpdatePayload::Route { vrf, prefix, nhg } => {
                write!(f, "vrf {vrf} prefix {prefix}")?;
                if let Some(nhg) = nhg {
                    write!(f, " nhg {nhg}")?;
                }
                Ok(())
            }
            UpdatePayload::Nexthop { id } => write!(f, "nhg {id}"),
            UpdatePayload::Address { ifindex, address } => {
                write!(f, "address {address} ifindex {ifindex}")
            }
            UpdatePayload::Mac { vni, mac } => write!(f, "mac {mac} vni {vni}"),
            UpdatePayload::Neighbor { ifindex, ip, mac } => {
                write!(f, "neighbor {ip} ifindex {ifindex}")?;
                if let Some(mac) = mac {
                    write!(f, " mac {mac}")?;
                }
                Ok(())
            }
            UpdatePayload::Vtep { vni, address } => write!(f, "vtep {address} vni {vni}"),
            UpdatePayload::BridgePort { ifindex } => write!(f, "bridge-port ifindex {ifindex}"),
            UpdatePayload::Interface { ifindex, name } => {
                write!(f, "interface {name} ifindex {ifindex}")
            }
        }
    }
}

/// Sequence number of an update, assigned by the host when the update is queued
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeqNum(pub u64);

impl Display for SeqNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One requested change. Records are created by the host and handed to providers by
/// value: a provider gives each one back together with its [`Outcome`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateRecord {
    op: DplaneOp,
    payload: UpdatePayload,
    seqn: SeqNum,
}

impl UpdateRecord {
    #[must_use]
    pub fn new(op: DplaneOp, payload: UpdatePayload, seqn: SeqNum) -> Self {
        Self { op, payload, seqn }
    }
    #[must_use]
    pub fn op(&self) -> DplaneOp {
        self.op
    }
    #[must_use]
    pub fn payload(&self) -> &UpdatePayload {
        &self.payload
    }
    #[must_use]
    pub fn seqn(&self) -> SeqNum {
        self.seqn
    }
}

impl Display for UpdateRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.seqn, self.op, self.payload)
    }
}

/// Outcome of processing one [`UpdateRecord`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure(reason) => write!(f, "failure: {reason}"),
        }
    }
}

/// The result reported for a consumed [`UpdateRecord`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessingResult {
    pub seqn: SeqNum,
    pub outcome: Outcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_parse() {
        let mac = Mac::from_str("02:00:00:aa:bb:0c").unwrap();
        assert_eq!(mac, Mac([0x02, 0, 0, 0xaa, 0xbb, 0x0c]));
        assert_eq!(mac.to_string(), "02:00:00:aa:bb:0c");
        assert!(Mac::from_str("02:00:00:aa:bb").is_err());
        assert!(Mac::from_str("02:00:00:aa:bb:0c:11").is_err());
        assert!(Mac::from_str("02:00:00:aa:bb:zz").is_err());
        assert!(Mac::from_str("2:00:00:aa:bb:0c").is_err());
    }

    #[test]
    fn test_vni_bounds() {
        assert_eq!(Vni::new(0), Err(InvalidVni::ReservedZero));
        assert_eq!(Vni::new(Vni::MAX + 1), Err(InvalidVni::TooLarge(Vni::MAX + 1)));
        assert_eq!(Vni::new(3000).unwrap().as_u32(), 3000);
    }

    #[test]
    fn test_record_display() {
        let payload = UpdatePayload::Neighbor {
            ifindex: 5,
            ip: "10.0.0.1".parse().unwrap(),
            mac: Some(Mac::from_str("02:00:00:00:00:01").unwrap()),
        };
        let record = UpdateRecord::new(DplaneOp::NeighInstall, payload, SeqNum(3));
        assert_eq!(
            record.to_string(),
            "#3 neigh_install: neighbor 10.0.0.1 ifindex 5 mac 02:00:00:00:00:01"
        );
    }

    #[test]
    fn test_payload_from_yaml() {
        let yaml = "type: vtep\nvni: 3000\naddress: 192.168.1.1\n";
        let payload: UpdatePayload = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(
            payload,
            UpdatePayload::Vtep {
                vni: Vni::new(3000).unwrap(),
                address: "192.168.1.1".parse().unwrap(),
            }
        );
        let bad = "type: vtep\nvni: 0\naddress: 192.168.1.1\n";
        assert!(serde_yaml_ng::from_str::<UpdatePayload>(bad).is_err());
    }
}
