//! Core Kernel - Foundational types for the reimbursement system
//!
//! This crate provides the building blocks shared by the domain and API layers:
//! - Strongly-typed identifiers for reimbursements, requests, expenses and users
//! - Money types with precise decimal arithmetic
//! - A clock abstraction so lifecycle timestamps are deterministic in tests
//! - Port error vocabulary for storage and lookup adapters

pub mod money;
pub mod clock;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use clock::{Clock, SystemClock, FixedClock, SteppingClock};
pub use identifiers::{
    ReimbursementId, RequestId, ExpenseId, AttachmentId, UserId, EventId,
};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
};
