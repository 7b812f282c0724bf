//! Reimbursement aggregate
//!
//! # Invariants
//!
//! - `user_id` always equals the owner of the referenced request
//! - `state` only changes along an edge of the transition table
//! - a state's entry timestamp is set once the reimbursement has been in
//!   that state and is `None` before; re-entry overwrites it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use core_kernel::{ReimbursementId, RequestId, UserId};

use crate::attachment::Attachment;
use crate::error::ReimbursementError;
use crate::permissions::{editable_by, Role};
use crate::request::Request;
use crate::state::{available_events, transition, ReimbursementEvent, ReimbursementState};
use crate::update::{AttachmentChange, FieldChanges};

/// Entry instant of each lifecycle state
///
/// Holds the last entry only; re-entering a state after `reject` replaces
/// the earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTimestamps {
    pub incomplete_since: Option<DateTime<Utc>>,
    pub tsp_pending_since: Option<DateTime<Utc>>,
    pub tsp_approved_since: Option<DateTime<Utc>>,
    pub payment_pending_since: Option<DateTime<Utc>>,
    pub payed_since: Option<DateTime<Utc>>,
    pub completed_since: Option<DateTime<Utc>>,
    pub canceled_since: Option<DateTime<Utc>>,
}

impl StateTimestamps {
    fn slot(&mut self, state: ReimbursementState) -> &mut Option<DateTime<Utc>> {
        match state {
            ReimbursementState::Incomplete => &mut self.incomplete_since,
            ReimbursementState::TspPending => &mut self.tsp_pending_since,
            ReimbursementState::TspApproved => &mut self.tsp_approved_since,
            ReimbursementState::PaymentPending => &mut self.payment_pending_since,
            ReimbursementState::Payed => &mut self.payed_since,
            ReimbursementState::Completed => &mut self.completed_since,
            ReimbursementState::Canceled => &mut self.canceled_since,
        }
    }

    /// Returns when `state` was last entered
    pub fn get(&self, state: ReimbursementState) -> Option<DateTime<Utc>> {
        match state {
            ReimbursementState::Incomplete => self.incomplete_since,
            ReimbursementState::TspPending => self.tsp_pending_since,
            ReimbursementState::TspApproved => self.tsp_approved_since,
            ReimbursementState::PaymentPending => self.payment_pending_since,
            ReimbursementState::Payed => self.payed_since,
            ReimbursementState::Completed => self.completed_since,
            ReimbursementState::Canceled => self.canceled_since,
        }
    }

    /// Records `at` as the entry instant of `state`, replacing any earlier one
    pub fn record(&mut self, state: ReimbursementState, at: DateTime<Utc>) {
        *self.slot(state) = Some(at);
    }
}

/// Reimbursement of one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reimbursement {
    pub id: ReimbursementId,
    /// The request being reimbursed; fixed at creation
    pub request_id: RequestId,
    /// Mirror of the request's owner, never set independently
    user_id: UserId,
    state: ReimbursementState,
    pub description: Option<String>,
    pub requester_notes: Option<String>,
    pub tsp_notes: Option<String>,
    pub administrative_notes: Option<String>,
    pub attachments: Vec<Attachment>,
    timestamps: StateTimestamps,
    /// Optimistic concurrency version, bumped by the store on every commit
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reimbursement {
    /// Creates a reimbursement for `request` in the initial state
    pub fn new(request: &Request, now: DateTime<Utc>) -> Self {
        let mut timestamps = StateTimestamps::default();
        timestamps.record(ReimbursementState::INITIAL, now);

        Self {
            id: ReimbursementId::new_v7(),
            request_id: request.id,
            user_id: request.user_id,
            state: ReimbursementState::INITIAL,
            description: None,
            requester_notes: None,
            tsp_notes: None,
            administrative_notes: None,
            attachments: Vec::new(),
            timestamps,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> ReimbursementState {
        self.state
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn timestamps(&self) -> &StateTimestamps {
        &self.timestamps
    }

    /// Returns true if `event` has an edge from the current state
    pub fn can_fire(&self, event: ReimbursementEvent) -> bool {
        transition(self.state, event).is_some()
    }

    /// Events that would currently succeed
    pub fn available_events(&self) -> Vec<ReimbursementEvent> {
        available_events(self.state)
    }

    /// Fires `event`, recording `at` as the destination's entry instant
    ///
    /// # Errors
    ///
    /// `TransitionNotAllowed` if the table has no edge; state and
    /// timestamps are left untouched.
    pub fn fire(
        &mut self,
        event: ReimbursementEvent,
        at: DateTime<Utc>,
    ) -> Result<ReimbursementState, ReimbursementError> {
        let to = transition(self.state, event).ok_or(ReimbursementError::TransitionNotAllowed {
            event,
            state: self.state,
        })?;

        let from = self.state;
        self.state = to;
        self.timestamps.record(to, at);
        self.updated_at = at;

        info!(
            reimbursement_id = %self.id,
            %event,
            %from,
            %to,
            "Reimbursement transitioned"
        );
        Ok(to)
    }

    pub fn editable_by(&self, role: Role) -> bool {
        editable_by(role, self.state)
    }

    pub fn editable_by_requester(&self) -> bool {
        self.editable_by(Role::Requester)
    }

    pub fn editable_by_tsp(&self) -> bool {
        self.editable_by(Role::Tsp)
    }

    pub fn editable_by_administrative(&self) -> bool {
        self.editable_by(Role::Administrative)
    }

    /// Re-derives the owning user from the referenced request
    ///
    /// # Errors
    ///
    /// `InvariantViolation` if `request` is not the referenced request.
    pub fn sync_user(&mut self, request: &Request) -> Result<(), ReimbursementError> {
        if request.id != self.request_id {
            return Err(ReimbursementError::InvariantViolation(format!(
                "reimbursement {} references request {}, got {}",
                self.id, self.request_id, request.id
            )));
        }
        self.user_id = request.user_id;
        Ok(())
    }

    /// Applies text field changes
    pub fn apply_fields(&mut self, changes: &FieldChanges) {
        if let Some(description) = &changes.description {
            self.description = description.clone();
        }
        if let Some(notes) = &changes.requester_notes {
            self.requester_notes = notes.clone();
        }
        if let Some(notes) = &changes.tsp_notes {
            self.tsp_notes = notes.clone();
        }
        if let Some(notes) = &changes.administrative_notes {
            self.administrative_notes = notes.clone();
        }
    }

    /// Applies attachment additions, edits and removals
    ///
    /// All referenced ids are checked before anything is changed.
    ///
    /// # Errors
    ///
    /// `MalformedPayload` if a change names an attachment that does not exist.
    pub fn apply_attachments(
        &mut self,
        changes: &[AttachmentChange],
        now: DateTime<Utc>,
    ) -> Result<(), ReimbursementError> {
        for change in changes {
            let id = match change {
                AttachmentChange::Update { id, .. } | AttachmentChange::Remove { id } => id,
                AttachmentChange::Add { .. } => continue,
            };
            if !self.attachments.iter().any(|a| a.id == *id) {
                return Err(ReimbursementError::malformed(format!("unknown attachment {}", id)));
            }
        }

        for change in changes {
            match change {
                AttachmentChange::Add { title, file_name } => {
                    self.attachments
                        .push(Attachment::new(title.clone(), file_name.clone(), now));
                }
                AttachmentChange::Update { id, title, file_name } => {
                    if let Some(attachment) = self.attachments.iter_mut().find(|a| a.id == *id) {
                        if let Some(title) = title {
                            attachment.title = title.clone();
                        }
                        if let Some(file_name) = file_name {
                            attachment.file_name = file_name.clone();
                        }
                    }
                }
                AttachmentChange::Remove { id } => {
                    self.attachments.retain(|a| a.id != *id);
                }
            }
        }
        Ok(())
    }
}
