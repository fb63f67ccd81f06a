// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Display of the tracing configuration

use crate::control::TraceConfig;
use ordermap::OrderMap;
use std::fmt::Display;

impl Display for TraceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━ Trace targets ━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, " default level: {}", self.default)?;
        writeln!(f, " {:<20} {:<6} {:<32} tags", "name", "level", "target")?;
        for (target, t) in &self.targets {
            writeln!(
                f,
                " {:<20} {:<6} {:<32} {}",
                t.name,
                t.level.to_string(),
                target,
                t.tags.join(",")
            )?;
        }
        Ok(())
    }
}

/// View of a [`TraceConfig`] by tag
pub(crate) struct TagView<'a>(pub(crate) &'a TraceConfig);

impl Display for TagView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: OrderMap<&str, Vec<&str>> = OrderMap::new();
        for (target, t) in &self.0.targets {
            tags.entry(t.name).or_default().push(*target);
            for tag in t.tags {
                tags.entry(*tag).or_default().push(*target);
            }
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━ Trace tags ━━━━━━━━━━━━━━━━━━━━━━")?;
        for (tag, targets) in &tags {
            writeln!(f, " {tag:<20} {}", targets.join(" "))?;
        }
        Ok(())
    }
}
