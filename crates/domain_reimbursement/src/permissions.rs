//! Role-based edit permissions
//!
//! Each reviewing role owns exactly one lifecycle state in which it may edit
//! the reimbursement, and a fixed set of events it may fire. Which role the
//! current actor holds is decided by a
//! [`RoleResolver`](crate::ports::RoleResolver).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::state::{ReimbursementEvent, ReimbursementState};

/// Role categories taking part in the reimbursement workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The user the reimbursement belongs to
    Requester,
    /// Technical support reviewer
    Tsp,
    /// Administrative staff handling payment
    Administrative,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Requester, Role::Tsp, Role::Administrative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Requester => "requester",
            Role::Tsp => "tsp",
            Role::Administrative => "administrative",
        }
    }

    /// The only state in which this role may edit
    pub fn editable_state(&self) -> ReimbursementState {
        match self {
            Role::Requester => ReimbursementState::Incomplete,
            Role::Tsp => ReimbursementState::TspPending,
            Role::Administrative => ReimbursementState::TspApproved,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role: {}", s))
    }
}

/// Returns true if `role` may edit a reimbursement in `state`
pub fn editable_by(role: Role, state: ReimbursementState) -> bool {
    role.editable_state() == state
}

/// Fixed capability table: review actions still counted as edits
///
/// Only `reject` and `approve` qualify. Independent of the current state.
pub fn event_editable(event: ReimbursementEvent) -> bool {
    matches!(event, ReimbursementEvent::Reject | ReimbursementEvent::Approve)
}

/// Returns true if `role` may fire `event` while the reimbursement is in `state`
///
/// | Role | Events |
/// |---|---|
/// | requester | submit, cancel |
/// | tsp | approve, reject from `tsp_pending` |
/// | administrative | authorize, confirm, complete, reject from `tsp_approved` |
///
/// Whether the transition itself exists is a separate question answered by
/// [`transition`](crate::state::transition).
pub fn may_fire(role: Role, event: ReimbursementEvent, state: ReimbursementState) -> bool {
    use ReimbursementEvent as E;
    match event {
        E::Submit | E::Cancel => role == Role::Requester,
        E::Approve => role == Role::Tsp,
        E::Reject => role != Role::Requester && editable_by(role, state),
        E::Authorize | E::Confirm | E::Complete => role == Role::Administrative,
    }
}
