// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Trace targets: named groups of modules whose log level can be tuned at runtime.
//!
//! Targets are declared where they are used with [`trace_target!`] (for module-scoped
//! events) or [`custom_target!`] (for events emitted with an explicit `target:`), and are
//! collected at link time in [`TRACE_TARGETS`].

use linkme::distributed_slice;
use tracing_subscriber::filter::LevelFilter;

/// A statically declared trace target
#[derive(Debug)]
pub struct TraceTarget {
    /// name of the target, also usable as a tag
    pub name: &'static str,
    /// the `tracing` target (module path or custom string) the level applies to
    pub target: &'static str,
    /// level used until changed at runtime
    pub level: LevelFilter,
    /// additional tags this target can be addressed by
    pub tags: &'static [&'static str],
}

impl TraceTarget {
    #[must_use]
    pub const fn new(
        name: &'static str,
        target: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            target,
            level,
            tags,
        }
    }

    /// Tell if this target answers to the given tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.name == tag || self.tags.contains(&tag)
    }
}

/// All trace targets linked into the binary
#[distributed_slice]
pub static TRACE_TARGETS: [TraceTarget];

/// Declare a trace target for the module where it is invoked.
///
/// ```ignore
/// trace_target!("dplane", LevelFilter::DEBUG, &["dplane-full"]);
/// ```
#[macro_export]
macro_rules! trace_target {
    ($name:expr, $level:expr, $tags:expr) => {
        const _: () = {
            #[allow(unused_imports)]
            use $crate::LevelFilter;
            #[$crate::linkme::distributed_slice($crate::targets::TRACE_TARGETS)]
            #[linkme(crate = $crate::linkme)]
            static TRACE_TARGET: $crate::targets::TraceTarget =
                $crate::targets::TraceTarget::new($name, module_path!(), $level, $tags);
        };
    };
}

/// Declare a trace target for events logged with an explicit `target: $name`.
#[macro_export]
macro_rules! custom_target {
    ($name:expr, $level:expr, $tags:expr) => {
        const _: () = {
            #[allow(unused_imports)]
            use $crate::LevelFilter;
            #[$crate::linkme::distributed_slice($crate::targets::TRACE_TARGETS)]
            #[linkme(crate = $crate::linkme)]
            static TRACE_TARGET: $crate::targets::TraceTarget =
                $crate::targets::TraceTarget::new($name, $name, $level, $tags);
        };
    };
}

// targets of this crate, used by the tests of the control module
trace_target!("tracectl", LevelFilter::INFO, &["tracectl-test"]);
custom_target!("tracectl-custom", LevelFilter::WARN, &["tracectl-test"]);
