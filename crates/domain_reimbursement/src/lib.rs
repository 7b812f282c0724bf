//! Reimbursement Workflow Domain
//!
//! This crate implements the lifecycle of a reimbursement claim from
//! submission through technical-support (TSP) review, approval, payment
//! authorization and settlement, together with the mutation gate deciding
//! which fields may be written, by whom, and when.
//!
//! # Lifecycle
//!
//! ```text
//! Incomplete -> TspPending -> TspApproved -> PaymentPending -> Payed -> Completed
//!                                                          \-> Completed
//! TspPending  -> Incomplete   (reject)
//! TspApproved -> TspPending   (reject)
//! Incomplete | TspPending -> Canceled
//! ```
//!
//! # Components
//!
//! - [`state`]: states, events and the transition table
//! - [`permissions`]: which role may edit in which state
//! - [`attributes`]: statically declared writable attributes per entity
//! - [`nested`]: the fail-closed filter for the request/expense subtree
//! - [`update`]: parsing of update payloads into typed changes
//! - [`service`]: the workflow service composing all of the above over ports

pub mod state;
pub mod permissions;
pub mod attributes;
pub mod nested;
pub mod update;
pub mod request;
pub mod attachment;
pub mod reimbursement;
pub mod ports;
pub mod service;
pub mod error;

pub use state::{ReimbursementState, ReimbursementEvent, transition, available_events};
pub use permissions::{Role, editable_by, event_editable, may_fire};
pub use attributes::{AccessibleAttributes, ACCESSIBLE_ATTRIBUTES};
pub use nested::{NestedUpdateFilter, NestedRejection, RejectionReason, ExpenseChange};
pub use update::{UpdatePayload, FieldChanges, AttachmentChange};
pub use request::{Request, Expense, ExpenseAmount};
pub use attachment::Attachment;
pub use reimbursement::{Reimbursement, StateTimestamps};
pub use ports::{ReimbursementStore, RequestPort, RoleResolver, Actor, OwnershipRoleResolver};
pub use service::WorkflowService;
pub use error::ReimbursementError;
