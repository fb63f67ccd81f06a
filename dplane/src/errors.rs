// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Error types of the dataplane provider framework

use crate::provider::ProviderState;
use crate::update::SeqNum;
use thiserror::Error;

/// Errors registering a provider. These are fatal to the activation of the provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("A provider named '{0}' is already registered")]
    Duplicate(String),
    #[error("Invalid provider name '{0}'")]
    InvalidName(String),
    #[error("Providers can only be registered before the framework starts")]
    NotReady,
}

/// Errors reported by a provider
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider can't be (re)started in state {0}")]
    BadState(ProviderState),
    #[error("Backend error: {0}")]
    Backend(#[from] crate::backend::BackendError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DplaneError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("Provider '{name}' failed to start: {reason}")]
    StartFailed { name: String, reason: String },
    #[error("Provider '{name}' can't {action} in state {state}")]
    LifecycleMisuse {
        name: String,
        action: &'static str,
        state: ProviderState,
    },
    #[error("Update queue is full: update {0} was not queued")]
    QueueFull(SeqNum),
    #[error("Framework is not running")]
    NotRunning,
    #[error("Framework has been finished")]
    Finished,
}
