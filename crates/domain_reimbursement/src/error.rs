//! Reimbursement domain errors

use thiserror::Error;

use core_kernel::{MoneyError, PortError};

use crate::nested::NestedRejection;
use crate::permissions::Role;
use crate::state::{ReimbursementEvent, ReimbursementState};

/// Errors that can occur in the reimbursement domain
///
/// Every error leaves previously committed state intact, except
/// `NestedUpdateRejected`: the sibling top-level fields and attachments of
/// that update were committed before it is returned.
#[derive(Debug, Error)]
pub enum ReimbursementError {
    /// The event has no edge from the current state; nothing changed
    #[error("Cannot {event} a reimbursement in state {state}")]
    TransitionNotAllowed {
        event: ReimbursementEvent,
        state: ReimbursementState,
    },

    /// The request/expense subtree was discarded
    #[error("Nested request update rejected: {0}")]
    NestedUpdateRejected(NestedRejection),

    /// The owning user could not be derived from the request
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A top-level key outside the writable attributes
    #[error("Attribute is not writable: {0}")]
    ProtectedAttribute(String),

    #[error("Role {role} cannot edit a reimbursement in state {state}")]
    NotEditable {
        role: Role,
        state: ReimbursementState,
    },

    /// The actor holds no role that may fire the event
    #[error("No role may {event} a reimbursement in state {state} for this actor")]
    EventNotPermitted {
        event: ReimbursementEvent,
        state: ReimbursementState,
    },

    /// The actor holds no role that may edit in the current state
    #[error("No editing role for reimbursement in state {0}")]
    NoEditingRole(ReimbursementState),

    #[error("Malformed update payload: {0}")]
    MalformedPayload(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A concurrent write committed first
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Amount error: {0}")]
    Money(#[from] MoneyError),

    #[error("Storage error: {0}")]
    Port(PortError),
}

impl ReimbursementError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ReimbursementError::MalformedPayload(message.into())
    }

    /// Returns true if retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ReimbursementError::Conflict(_) => true,
            ReimbursementError::Port(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<PortError> for ReimbursementError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { .. } => ReimbursementError::NotFound(err.to_string()),
            PortError::Conflict { message } => ReimbursementError::Conflict(message),
            other => ReimbursementError::Port(other),
        }
    }
}
