// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Scripts of updates to feed the provider with

use dplane::{DplaneOp, UpdatePayload};
use miette::{Context, IntoDiagnostic};
use serde::Deserialize;
use std::path::Path;

/// An operation, by name or by raw code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OpSpec {
    Name(DplaneOp),
    Code(u16),
}

impl From<OpSpec> for DplaneOp {
    fn from(spec: OpSpec) -> Self {
        match spec {
            OpSpec::Name(op) => op,
            OpSpec::Code(code) => DplaneOp::from(code),
        }
    }
}

fn once() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptEntry {
    pub op: OpSpec,
    #[serde(default)]
    pub payload: UpdatePayload,
    #[serde(default = "once")]
    pub repeat: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateScript {
    pub updates: Vec<ScriptEntry>,
}

impl UpdateScript {
    /// Parse a script from its YAML text
    pub fn parse(yaml: &str) -> miette::Result<Self> {
        serde_yaml_ng::from_str(yaml)
            .into_diagnostic()
            .wrap_err("failed to parse update script")
    }

    /// Load a script from a YAML file
    pub fn load(path: &Path) -> miette::Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read update script {}", path.display()))?;
        Self::parse(&yaml)
    }

    /// The updates of the script, in order, with repetitions expanded
    pub fn updates(&self) -> impl Iterator<Item = (DplaneOp, UpdatePayload)> + '_ {
        self.updates.iter().flat_map(|entry| {
            std::iter::repeat_n((DplaneOp::from(entry.op), entry.payload.clone()), entry.repeat)
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.updates.iter().map(|e| e.repeat).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dplane::Vni;
    use pretty_assertions::assert_eq;

    const SCRIPT: &str = r#"
updates:
  - op: addr_install
    payload:
      type: address
      ifindex: 2
      address: 10.0.0.1/24
  - op: neigh_install
    payload:
      type: neighbor
      ifindex: 2
      ip: 10.0.0.2
      mac: "02:00:00:00:00:02"
  - op: vtep_add
    payload:
      type: vtep
      vni: 3000
      address: 192.168.1.1
  - op: route_install
    repeat: 3
  - op: 4000
"#;

    #[test]
    fn test_parse_script() {
        let script = UpdateScript::parse(SCRIPT).unwrap();
        assert_eq!(script.updates.len(), 5);
        assert_eq!(script.len(), 7);
        let ops: Vec<_> = script.updates().map(|(op, _)| op).collect();
        assert_eq!(
            ops,
            vec![
                DplaneOp::AddrInstall,
                DplaneOp::NeighInstall,
                DplaneOp::VtepAdd,
                DplaneOp::RouteInstall,
                DplaneOp::RouteInstall,
                DplaneOp::RouteInstall,
                DplaneOp::Unknown(4000),
            ]
        );
        assert_eq!(
            script.updates[2].payload,
            UpdatePayload::Vtep {
                vni: Vni::new(3000).unwrap(),
                address: "192.168.1.1".parse().unwrap(),
            }
        );
        assert_eq!(script.updates[3].payload, UpdatePayload::None);
    }

    #[test]
    fn test_demo_script() {
        let script = UpdateScript::parse(include_str!("../../demos/updates.yaml")).unwrap();
        assert_eq!(script.len(), 13);
        assert_eq!(script.updates().last().unwrap().0, DplaneOp::Unknown(4000));
    }

    #[test]
    fn test_op_by_code() {
        let script = UpdateScript::parse("updates:\n  - op: 1\n").unwrap();
        assert_eq!(script.updates().next().unwrap().0, DplaneOp::RouteInstall);
    }

    #[test]
    fn test_bad_scripts() {
        assert!(UpdateScript::parse("updates:\n  - op: teleport\n").is_err());
        assert!(UpdateScript::parse("updates:\n  - op: mac_install\n    payload:\n      type: mac\n      vni: 1\n      mac: zz\n").is_err());
        assert!(UpdateScript::load(Path::new("/nonexistent/updates.yaml")).is_err());
    }
}
