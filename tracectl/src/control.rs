// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Runtime control of the tracing subscriber

use crate::targets::{TRACE_TARGETS, TraceTarget};
use arc_swap::ArcSwap;
use ordermap::OrderMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Level for anything not covered by a trace target
pub const DEFAULT_DEFAULT_LOGLEVEL: LevelFilter = LevelFilter::INFO;

/// Pseudo-tag used to change the default level
const DEFAULT_TAG: &str = "default";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TraceCtlError {
    #[error("Unknown tag '{0}'")]
    UnknownTag(String),
    #[error("Invalid level '{1}' for tag '{0}'")]
    InvalidLevel(String, String),
    #[error("Bad syntax '{0}': expected tag=level")]
    Syntax(String),
    #[error("Failed to build filter: {0}")]
    Filter(String),
    #[error("Failed to reload filter: {0}")]
    Reload(String),
}

/// Runtime settings of one trace target
#[derive(Clone, Debug)]
pub struct TargetConfig {
    pub name: &'static str,
    pub level: LevelFilter,
    pub tags: &'static [&'static str],
}

impl TargetConfig {
    fn has_tag(&self, tag: &str) -> bool {
        self.name == tag || self.tags.contains(&tag)
    }
}

/// Snapshot of the tracing configuration, keyed by `tracing` target
#[derive(Clone, Debug)]
pub struct TraceConfig {
    pub(crate) default: LevelFilter,
    pub(crate) targets: OrderMap<&'static str, TargetConfig>,
}

impl TraceConfig {
    fn new(default: LevelFilter, targets: &[TraceTarget]) -> Self {
        let mut map = OrderMap::new();
        for t in targets {
            map.insert(
                t.target,
                TargetConfig {
                    name: t.name,
                    level: t.level,
                    tags: t.tags,
                },
            );
        }
        Self {
            default,
            targets: map,
        }
    }

    #[must_use]
    pub fn default_level(&self) -> LevelFilter {
        self.default
    }

    /// Level of the target(s) with the given name. If several targets share a name,
    /// the first registered one is reported.
    #[must_use]
    pub fn level_of(&self, name: &str) -> Option<LevelFilter> {
        self.targets
            .values()
            .find(|t| t.name == name)
            .map(|t| t.level)
    }

    fn set_tag_level(&mut self, tag: &str, level: LevelFilter) -> Result<(), TraceCtlError> {
        if tag == DEFAULT_TAG {
            self.default = level;
            return Ok(());
        }
        let mut found = false;
        for t in self.targets.values_mut().filter(|t| t.has_tag(tag)) {
            t.level = level;
            found = true;
        }
        if found {
            Ok(())
        } else {
            Err(TraceCtlError::UnknownTag(tag.to_string()))
        }
    }

    pub(crate) fn directives(&self) -> String {
        self.targets
            .iter()
            .map(|(target, t)| {
                format!("{target}={}", t.level.to_string().to_ascii_lowercase())
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn env_filter(&self) -> Result<EnvFilter, TraceCtlError> {
        EnvFilter::builder()
            .with_default_directive(self.default.into())
            .parse(self.directives())
            .map_err(|e| TraceCtlError::Filter(e.to_string()))
    }
}

/// Parse a "tag=level,tag=level" string
fn parse_settings(input: &str) -> Result<Vec<(&str, LevelFilter)>, TraceCtlError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|setting| {
            let (tag, level) = setting
                .split_once('=')
                .ok_or_else(|| TraceCtlError::Syntax(setting.to_string()))?;
            let (tag, level) = (tag.trim(), level.trim());
            if tag.is_empty() {
                return Err(TraceCtlError::Syntax(setting.to_string()));
            }
            let level = LevelFilter::from_str(level)
                .map_err(|_| TraceCtlError::InvalidLevel(tag.to_string(), level.to_string()))?;
            Ok((tag, level))
        })
        .collect()
}

/// The object that controls tracing at runtime. There is a single one per process,
/// obtained with [`get_trace_ctl`].
pub struct TracingControl {
    config: ArcSwap<TraceConfig>,
    writer: Mutex<()>,
    reload: Option<reload::Handle<EnvFilter, Registry>>,
}

impl TracingControl {
    fn init() -> Self {
        let config = TraceConfig::new(DEFAULT_DEFAULT_LOGLEVEL, &TRACE_TARGETS);
        let filter = config.env_filter().unwrap_or_else(|e| {
            eprintln!("tracectl: {e}; falling back to level {DEFAULT_DEFAULT_LOGLEVEL}");
            EnvFilter::default().add_directive(DEFAULT_DEFAULT_LOGLEVEL.into())
        });
        let (filter, handle) = reload::Layer::new(filter);
        let reload = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init()
            .ok()
            .map(|()| handle);
        if reload.is_none() {
            tracing::warn!("A global subscriber was already set: tracing levels are not controllable");
        }
        Self {
            config: ArcSwap::from_pointee(config),
            writer: Mutex::new(()),
            reload,
        }
    }

    /// Get a snapshot of the current configuration
    #[must_use]
    pub fn config(&self) -> Arc<TraceConfig> {
        self.config.load_full()
    }

    fn update<F>(&self, change: F) -> Result<(), TraceCtlError>
    where
        F: FnOnce(&mut TraceConfig) -> Result<(), TraceCtlError>,
    {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut config = TraceConfig::clone(&self.config.load());
        change(&mut config)?;
        let filter = config.env_filter()?;
        if let Some(reload) = &self.reload {
            reload
                .reload(filter)
                .map_err(|e| TraceCtlError::Reload(e.to_string()))?;
        }
        self.config.store(Arc::new(config));
        Ok(())
    }

    /// Set the level for events not covered by any target
    pub fn set_default_level(&self, level: LevelFilter) -> Result<(), TraceCtlError> {
        self.update(|config| {
            config.default = level;
            Ok(())
        })
    }

    /// Set the level of all targets that answer to `tag`
    pub fn set_tag_level(&self, tag: &str, level: LevelFilter) -> Result<(), TraceCtlError> {
        self.update(|config| config.set_tag_level(tag, level))
    }

    /// Apply a configuration string like "dplane=debug,backend=info,default=warn".
    /// Nothing is applied if any of the settings is invalid.
    pub fn setup_from_string(&self, input: &str) -> Result<(), TraceCtlError> {
        let settings = parse_settings(input)?;
        self.update(|config| {
            for (tag, level) in settings {
                config.set_tag_level(tag, level)?;
            }
            Ok(())
        })
    }

    /// Render the configured targets
    pub fn as_string(&self) -> Result<String, TraceCtlError> {
        Ok(self.config().to_string())
    }

    /// Render the known tags with the targets they select
    pub fn as_string_by_tag(&self) -> Result<String, TraceCtlError> {
        Ok(crate::display::TagView(&self.config()).to_string())
    }
}

static TRACE_CTL: OnceLock<TracingControl> = OnceLock::new();

/// Get the tracing control, installing the global subscriber on first use.
pub fn get_trace_ctl() -> &'static TracingControl {
    TRACE_CTL.get_or_init(TracingControl::init)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_settings() {
        let settings = parse_settings("a=debug, b = warn,,").unwrap();
        assert_eq!(
            settings,
            vec![("a", LevelFilter::DEBUG), ("b", LevelFilter::WARN)]
        );
        assert_eq!(
            parse_settings("a:debug"),
            Err(TraceCtlError::Syntax("a:debug".to_string()))
        );
        assert_eq!(
            parse_settings("=debug"),
            Err(TraceCtlError::Syntax("=debug".to_string()))
        );
        assert_eq!(
            parse_settings("a=loud"),
            Err(TraceCtlError::InvalidLevel("a".to_string(), "loud".to_string()))
        );
    }

    #[test]
    fn test_directives() {
        let targets = [
            TraceTarget::new("one", "crate_a::one", LevelFilter::DEBUG, &["common"]),
            TraceTarget::new("two", "crate_b", LevelFilter::ERROR, &["common"]),
        ];
        let mut config = TraceConfig::new(LevelFilter::INFO, &targets);
        assert_eq!(config.directives(), "crate_a::one=debug,crate_b=error");

        config.set_tag_level("common", LevelFilter::TRACE).unwrap();
        assert_eq!(config.directives(), "crate_a::one=trace,crate_b=trace");
        assert_eq!(
            config.set_tag_level("nope", LevelFilter::OFF),
            Err(TraceCtlError::UnknownTag("nope".to_string()))
        );
        config.set_tag_level("default", LevelFilter::WARN).unwrap();
        assert_eq!(config.default_level(), LevelFilter::WARN);
        assert!(config.env_filter().is_ok());
    }

    #[test]
    #[serial]
    fn test_linked_targets() {
        let tctl = get_trace_ctl();
        let config = tctl.config();
        assert_eq!(config.level_of("tracectl"), Some(LevelFilter::INFO));
        assert_eq!(config.level_of("tracectl-custom"), Some(LevelFilter::WARN));
    }

    #[test]
    #[serial]
    fn test_setup_from_string() {
        let tctl = get_trace_ctl();
        tctl.setup_from_string("tracectl-test=debug").unwrap();
        let config = tctl.config();
        assert_eq!(config.level_of("tracectl"), Some(LevelFilter::DEBUG));
        assert_eq!(config.level_of("tracectl-custom"), Some(LevelFilter::DEBUG));

        // all or nothing
        let err = tctl.setup_from_string("tracectl=error,unknown=info");
        assert_eq!(err, Err(TraceCtlError::UnknownTag("unknown".to_string())));
        assert_eq!(tctl.config().level_of("tracectl"), Some(LevelFilter::DEBUG));

        tctl.setup_from_string("tracectl=info,tracectl-custom=warn")
            .unwrap();
        let out = tctl.as_string().unwrap();
        assert!(out.contains("tracectl-custom"));
        let out = tctl.as_string_by_tag().unwrap();
        assert!(out.contains("tracectl-test"));
    }
}
