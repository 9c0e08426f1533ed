//! Error types for the plugbridge core.
//!
//! Absence (no service, no operation) is not an error anywhere in the read
//! paths; these types only describe the failures that callers are expected to
//! tell apart.

use thiserror::Error;

// =============================================================================
// Conversion Errors
// =============================================================================

/// A single record value could not be converted into a field's type.
///
/// Conversion errors never abort a whole mapping: the mapper records them as
/// [`FieldIssue`](crate::mapper::FieldIssue)s and leaves the field at its
/// default.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The value is a blank string and the target is not textual.
    #[error("blank value")]
    Blank,

    /// The value has the wrong shape or does not parse.
    #[error("cannot convert '{value}' to {target}: {reason}")]
    Invalid {
        /// Textual form of the rejected value.
        value: String,
        /// Name of the target type.
        target: &'static str,
        /// Parser message.
        reason: String,
    },

    /// The target type has no conversion from a record value at all.
    #[error("no conversion into {target}")]
    Unsupported {
        /// Name of the target type.
        target: &'static str,
    },
}

impl ConversionError {
    /// Creates an [`Invalid`](Self::Invalid) error.
    pub fn invalid(
        value: impl Into<String>,
        target: &'static str,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::Invalid {
            value: value.into(),
            target,
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Mapping Errors
// =============================================================================

/// Whole-object mapping failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    /// The source record has no fields.
    #[error("cannot convert an empty record to {entity}")]
    EmptyRecord {
        /// Target entity name.
        entity: &'static str,
    },

    /// The target type could not be constructed.
    #[error("failed to instantiate {entity}: {reason}")]
    Instantiation {
        /// Target entity name.
        entity: &'static str,
        /// Why construction failed.
        reason: String,
    },
}

// =============================================================================
// Service Errors
// =============================================================================

/// Failure reported by a plugin's data service on a write.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// The service does not implement the operation.
    #[error("{operation} is not supported for entity '{entity}'")]
    Unsupported {
        /// Entity the service handles.
        entity: String,
        /// Operation name.
        operation: &'static str,
    },

    /// The service refused the data.
    #[error("{entity} rejected the write: {reason}")]
    Rejected {
        /// Entity the service handles.
        entity: String,
        /// Reason given by the service.
        reason: String,
    },

    /// The record could not be mapped onto the service's native type.
    #[error(transparent)]
    Mapping(#[from] MappingError),
}

impl ServiceError {
    /// Creates a [`Rejected`](Self::Rejected) error.
    pub fn rejected(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Bridge Errors
// =============================================================================

/// Hard failure of a write issued through the [`Bridge`](crate::bridge::Bridge).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// No plugin has registered a service for the entity.
    #[error("plugin service not available for entity: {entity}")]
    ServiceUnavailable {
        /// Requested entity name.
        entity: String,
    },

    /// The service exists but the write failed.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl BridgeError {
    /// Returns `true` for [`ServiceUnavailable`](Self::ServiceUnavailable).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }
}

// =============================================================================
// Proxy Errors
// =============================================================================

/// Failure of a dynamic invocation, reported through the return channel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProxyError {
    /// No operation with a compatible signature exists.
    #[error("operation '{operation}' not found in service '{service}'")]
    MethodNotFound {
        /// Service name.
        service: String,
        /// Operation name.
        operation: String,
    },

    /// An argument could not be converted into the parameter type.
    #[error("argument {index} of '{operation}': {reason}")]
    ArgumentMismatch {
        /// Operation name.
        operation: String,
        /// Zero-based argument position.
        index: usize,
        /// Conversion message.
        reason: String,
    },

    /// The operation returned an error or panicked.
    #[error("error calling {service}.{operation}: {reason}")]
    InvocationFailed {
        /// Service name.
        service: String,
        /// Operation name.
        operation: String,
        /// Error message or panic payload.
        reason: String,
    },

    /// The result does not have the shape the caller asked for.
    #[error("'{operation}' returned {found}, expected {expected}")]
    ReturnMismatch {
        /// Operation name.
        operation: String,
        /// Expected result type.
        expected: &'static str,
        /// Actual result kind.
        found: &'static str,
    },
}

// =============================================================================
// Tenant Errors
// =============================================================================

/// The current tenant could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenantError {
    /// No tenant context source returned a value.
    #[error("no tenant id available in the current context")]
    Missing,

    /// A tenant id was returned but it is blank.
    #[error("tenant id is blank")]
    Blank,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;

/// Result type for data service writes.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type for bridge writes.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Result type for dynamic invocations.
pub type ProxyResult<T> = Result<T, ProxyError>;
