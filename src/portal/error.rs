//! Error types for data portal dispatch.

use std::fmt;

use thiserror::Error;

use super::operation::{OperationKind, Scope};

/// Which activator phase failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationPhase {
    CreateInstance,
    InitializeInstance,
}

impl fmt::Display for ActivationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateInstance => f.write_str("create_instance"),
            Self::InitializeInstance => f.write_str("initialize_instance"),
        }
    }
}

/// Which interceptor hook failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptHook {
    Initialize,
    Complete,
}

impl fmt::Display for InterceptHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialize => f.write_str("initialize"),
            Self::Complete => f.write_str("complete"),
        }
    }
}

/// Errors raised by a dispatch.
///
/// Resolution and `CreateInstance` failures abort before any interceptor hook
/// fires. Handler failures are observed by `Interceptor::complete` first and then
/// surface here with the original error attached.
#[derive(Debug, Error)]
pub enum PortalError {
    /// The type was never registered with the portal's handler registry.
    #[error("type {type_name} is not registered with the data portal")]
    UnregisteredType { type_name: String },

    /// The type is registered but has no handler for the operation and criteria.
    #[error("no {scope} {operation} handler on {type_name} accepts criteria {criteria}")]
    HandlerNotFound {
        type_name: String,
        operation: OperationKind,
        scope: Scope,
        /// Shape of the supplied criteria, e.g. `(string)`.
        criteria: String,
    },

    /// The domain handler failed. `source` is the handler's own error, untouched.
    #[error("{scope} {operation} handler on {type_name} failed: {source}")]
    HandlerExecution {
        type_name: String,
        operation: OperationKind,
        scope: Scope,
        #[source]
        source: anyhow::Error,
    },

    #[error("activation of {type_name} failed in {phase}: {source}")]
    Activation {
        type_name: String,
        phase: ActivationPhase,
        #[source]
        source: anyhow::Error,
    },

    #[error("interceptor {hook} hook failed for {type_name}: {source}")]
    Interceptor {
        type_name: String,
        hook: InterceptHook,
        #[source]
        source: anyhow::Error,
    },

    /// An existing instance was passed to an allocating operation, or omitted
    /// from a mutating one.
    #[error("invalid target for {operation} on {type_name}: {reason}")]
    InvalidTarget {
        type_name: String,
        operation: OperationKind,
        reason: String,
    },

    #[error("expected {expected} from the data portal, got a different type")]
    TypeMismatch { expected: String },

    #[error("key not found in ambient context: {0}")]
    KeyNotFound(String),
}

impl PortalError {
    /// The handler's original error, if this is a handler failure.
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::HandlerExecution { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Unwrap into the handler's original error, or give the error back.
    pub fn into_handler_error(self) -> Result<anyhow::Error, Self> {
        match self {
            Self::HandlerExecution { source, .. } => Ok(source),
            other => Err(other),
        }
    }

    /// Errors only a dispatch can produce. A handler returning one of these is
    /// propagating a nested dispatch; anything else is the handler's own failure.
    pub fn is_dispatch_failure(&self) -> bool {
        !matches!(self, Self::KeyNotFound(_))
    }

    /// Resolution failures: nothing ran, no hooks fired.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::UnregisteredType { .. } | Self::HandlerNotFound { .. }
        )
    }
}

pub type PortalResult<T> = std::result::Result<T, PortalError>;
