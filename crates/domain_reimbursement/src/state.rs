//! Reimbursement lifecycle states and events
//!
//! The lifecycle is a fixed transition table. Firing an event is a pure
//! lookup of `(state, event)`; the only side effect of a legal transition
//! (recording the entry instant of the destination state) is applied by
//! [`Reimbursement::fire`](crate::reimbursement::Reimbursement::fire).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle states of a reimbursement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReimbursementState {
    /// Being filled in by the requester (initial)
    Incomplete,
    /// Submitted, waiting for technical-support review
    TspPending,
    /// Approved by technical support, waiting for administration
    TspApproved,
    /// Payment authorized, waiting for the transfer
    PaymentPending,
    /// Transfer confirmed
    Payed,
    /// Settled (terminal)
    Completed,
    /// Withdrawn before approval (terminal)
    Canceled,
}

impl ReimbursementState {
    /// All states, in lifecycle order
    pub const ALL: [ReimbursementState; 7] = [
        ReimbursementState::Incomplete,
        ReimbursementState::TspPending,
        ReimbursementState::TspApproved,
        ReimbursementState::PaymentPending,
        ReimbursementState::Payed,
        ReimbursementState::Completed,
        ReimbursementState::Canceled,
    ];

    /// The state every reimbursement starts in
    pub const INITIAL: ReimbursementState = ReimbursementState::Incomplete;

    /// Returns the snake_case name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ReimbursementState::Incomplete => "incomplete",
            ReimbursementState::TspPending => "tsp_pending",
            ReimbursementState::TspApproved => "tsp_approved",
            ReimbursementState::PaymentPending => "payment_pending",
            ReimbursementState::Payed => "payed",
            ReimbursementState::Completed => "completed",
            ReimbursementState::Canceled => "canceled",
        }
    }

    /// Returns true if no event leaves this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReimbursementState::Completed | ReimbursementState::Canceled)
    }
}

impl fmt::Display for ReimbursementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReimbursementState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReimbursementState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown state: {}", s))
    }
}

/// Events that move a reimbursement between states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReimbursementEvent {
    Submit,
    Approve,
    Authorize,
    Confirm,
    Complete,
    Reject,
    Cancel,
}

impl ReimbursementEvent {
    pub const ALL: [ReimbursementEvent; 7] = [
        ReimbursementEvent::Submit,
        ReimbursementEvent::Approve,
        ReimbursementEvent::Authorize,
        ReimbursementEvent::Confirm,
        ReimbursementEvent::Complete,
        ReimbursementEvent::Reject,
        ReimbursementEvent::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReimbursementEvent::Submit => "submit",
            ReimbursementEvent::Approve => "approve",
            ReimbursementEvent::Authorize => "authorize",
            ReimbursementEvent::Confirm => "confirm",
            ReimbursementEvent::Complete => "complete",
            ReimbursementEvent::Reject => "reject",
            ReimbursementEvent::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ReimbursementEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReimbursementEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReimbursementEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| format!("unknown event: {}", s))
    }
}

/// Every legal edge of the lifecycle as `(event, from, to)`
///
/// No row starts from `Completed` or `Canceled`.
pub const TRANSITIONS: &[(ReimbursementEvent, ReimbursementState, ReimbursementState)] = {
    use ReimbursementEvent as E;
    use ReimbursementState as S;
    &[
        (E::Submit, S::Incomplete, S::TspPending),
        (E::Approve, S::TspPending, S::TspApproved),
        (E::Authorize, S::TspApproved, S::PaymentPending),
        (E::Confirm, S::PaymentPending, S::Payed),
        (E::Complete, S::PaymentPending, S::Completed),
        (E::Complete, S::Payed, S::Completed),
        (E::Reject, S::TspPending, S::Incomplete),
        (E::Reject, S::TspApproved, S::TspPending),
        (E::Cancel, S::Incomplete, S::Canceled),
        (E::Cancel, S::TspPending, S::Canceled),
    ]
};

/// Looks up the destination of firing `event` from `state`
///
/// Returns `None` when the table has no such edge.
pub fn transition(
    state: ReimbursementState,
    event: ReimbursementEvent,
) -> Option<ReimbursementState> {
    TRANSITIONS
        .iter()
        .find(|(e, from, _)| *e == event && *from == state)
        .map(|(_, _, to)| *to)
}

/// Lists the events that would succeed from `state`, in table order
pub fn available_events(state: ReimbursementState) -> Vec<ReimbursementEvent> {
    let mut events = Vec::new();
    for (event, from, _) in TRANSITIONS {
        if *from == state && !events.contains(event) {
            events.push(*event);
        }
    }
    events
}
