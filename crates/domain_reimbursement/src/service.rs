//! Reimbursement workflow service
//!
//! Composes the state machine, the permission evaluator and the update
//! filters over the storage, request and clock ports. Every operation is a
//! single load, decide, commit step; the store's version check serializes
//! concurrent writers on the same reimbursement.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};

use core_kernel::{Clock, EventId, Money, PortError, ReimbursementId, RequestId, UserId};

use crate::attributes::{AccessibleAttributes, ACCESSIBLE_ATTRIBUTES};
use crate::error::ReimbursementError;
use crate::nested::{ExpenseChange, NestedRejection, NestedUpdateFilter};
use crate::permissions::{editable_by, may_fire, Role};
use crate::ports::{Actor, OwnershipRoleResolver, ReimbursementStore, RequestPort, RoleResolver};
use crate::reimbursement::Reimbursement;
use crate::request::{ExpenseAmount, Request};
use crate::state::ReimbursementEvent;
use crate::update::UpdatePayload;

/// Workflow service for reimbursements
pub struct WorkflowService {
    store: Arc<dyn ReimbursementStore>,
    requests: Arc<dyn RequestPort>,
    clock: Arc<dyn Clock>,
    attributes: AccessibleAttributes,
    filter: NestedUpdateFilter,
    roles: Arc<dyn RoleResolver>,
}

impl WorkflowService {
    /// Creates a service with the default attribute table and ownership-based roles
    pub fn new(
        store: Arc<dyn ReimbursementStore>,
        requests: Arc<dyn RequestPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            requests,
            clock,
            attributes: ACCESSIBLE_ATTRIBUTES,
            filter: NestedUpdateFilter::new(ACCESSIBLE_ATTRIBUTES),
            roles: Arc::new(OwnershipRoleResolver),
        }
    }

    /// Replaces the writable attribute table used by updates
    pub fn with_attributes(mut self, attributes: AccessibleAttributes) -> Self {
        self.attributes = attributes;
        self.filter = NestedUpdateFilter::new(attributes);
        self
    }

    pub fn with_role_resolver(mut self, roles: Arc<dyn RoleResolver>) -> Self {
        self.roles = roles;
        self
    }

    pub fn store(&self) -> &Arc<dyn ReimbursementStore> {
        &self.store
    }

    pub fn requests(&self) -> &Arc<dyn RequestPort> {
        &self.requests
    }

    // ------------------------------------------------------------------
    // Creation and reads
    // ------------------------------------------------------------------

    /// Creates the reimbursement of a request in `incomplete`
    ///
    /// # Errors
    ///
    /// - `NotFound` if the request does not exist
    /// - `Conflict` if the request already has a reimbursement
    #[instrument(skip(self), fields(request_id = %request_id))]
    pub async fn create(&self, request_id: RequestId) -> Result<Reimbursement, ReimbursementError> {
        let request = self.requests.get_request(request_id).await?;
        let reimbursement = Reimbursement::new(&request, self.clock.now());
        let stored = self.store.insert(&reimbursement).await?;

        info!(
            reimbursement_id = %stored.id,
            user_id = %stored.user_id(),
            "Reimbursement created"
        );
        Ok(stored)
    }

    pub async fn get(&self, id: ReimbursementId) -> Result<Reimbursement, ReimbursementError> {
        Ok(self.store.load(id).await?)
    }

    /// Reimbursements owned by a user, oldest first
    pub async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Reimbursement>, ReimbursementError> {
        Ok(self.store.list_for_user(user_id).await?)
    }

    /// The reimbursed request, with its expenses
    pub async fn request_of(&self, id: ReimbursementId) -> Result<Request, ReimbursementError> {
        let reimbursement = self.store.load(id).await?;
        self.load_request(&reimbursement).await
    }

    /// The event (trip, conference) the reimbursed request belongs to
    pub async fn event_of(&self, id: ReimbursementId) -> Result<EventId, ReimbursementError> {
        Ok(self.request_of(id).await?.event_id)
    }

    /// Sums one kind of expense amount of the reimbursed request, per currency
    pub async fn expenses_sum(
        &self,
        id: ReimbursementId,
        kind: ExpenseAmount,
    ) -> Result<Vec<Money>, ReimbursementError> {
        Ok(self.request_of(id).await?.expenses_sum(kind)?)
    }

    /// Events that would currently succeed
    pub async fn available_events(
        &self,
        id: ReimbursementId,
    ) -> Result<Vec<ReimbursementEvent>, ReimbursementError> {
        Ok(self.store.load(id).await?.available_events())
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Fires `event` and commits the new state
    ///
    /// The owning user is re-derived from the request first.
    ///
    /// # Errors
    ///
    /// - `TransitionNotAllowed` if the current state has no edge for `event`
    /// - `InvariantViolation` if the request is gone
    /// - `Conflict` if another writer committed in between
    ///
    /// On error nothing is committed.
    #[instrument(skip(self), fields(reimbursement_id = %id, event = %event))]
    pub async fn fire(
        &self,
        id: ReimbursementId,
        event: ReimbursementEvent,
    ) -> Result<Reimbursement, ReimbursementError> {
        self.fire_checked(id, event, None).await
    }

    /// Fires `event` on behalf of `actor`
    ///
    /// The actor must hold a role that may fire the event in the current
    /// state (see [`may_fire`]); ownership is judged after the user resync.
    ///
    /// # Errors
    ///
    /// `EventNotPermitted` if no such role is held; otherwise as
    /// [`fire`](Self::fire).
    #[instrument(skip(self, actor), fields(reimbursement_id = %id, event = %event, user_id = %actor.user_id))]
    pub async fn fire_as(
        &self,
        id: ReimbursementId,
        actor: &Actor,
        event: ReimbursementEvent,
    ) -> Result<Reimbursement, ReimbursementError> {
        self.fire_checked(id, event, Some(actor)).await
    }

    async fn fire_checked(
        &self,
        id: ReimbursementId,
        event: ReimbursementEvent,
        actor: Option<&Actor>,
    ) -> Result<Reimbursement, ReimbursementError> {
        let current = self.store.load(id).await?;
        let request = self.load_request(&current).await?;

        let mut next = current.clone();
        next.sync_user(&request)?;

        if let Some(actor) = actor {
            let roles = self.roles.roles_for(actor, &next);
            if !roles.iter().any(|role| may_fire(*role, event, current.state())) {
                warn!(state = %current.state(), roles = ?roles, "Event refused for actor");
                return Err(ReimbursementError::EventNotPermitted {
                    event,
                    state: current.state(),
                });
            }
        }

        if let Err(e) = next.fire(event, self.clock.now()) {
            warn!(state = %current.state(), "Transition refused");
            return Err(e);
        }

        let committed = self.store.commit(&next, current.version).await?;
        info!(
            state = %committed.state(),
            version = committed.version,
            "Transition committed"
        );
        Ok(committed)
    }

    pub async fn submit(&self, id: ReimbursementId) -> Result<Reimbursement, ReimbursementError> {
        self.fire(id, ReimbursementEvent::Submit).await
    }

    pub async fn approve(&self, id: ReimbursementId) -> Result<Reimbursement, ReimbursementError> {
        self.fire(id, ReimbursementEvent::Approve).await
    }

    pub async fn authorize(&self, id: ReimbursementId) -> Result<Reimbursement, ReimbursementError> {
        self.fire(id, ReimbursementEvent::Authorize).await
    }

    pub async fn confirm(&self, id: ReimbursementId) -> Result<Reimbursement, ReimbursementError> {
        self.fire(id, ReimbursementEvent::Confirm).await
    }

    pub async fn complete(&self, id: ReimbursementId) -> Result<Reimbursement, ReimbursementError> {
        self.fire(id, ReimbursementEvent::Complete).await
    }

    pub async fn reject(&self, id: ReimbursementId) -> Result<Reimbursement, ReimbursementError> {
        self.fire(id, ReimbursementEvent::Reject).await
    }

    pub async fn cancel(&self, id: ReimbursementId) -> Result<Reimbursement, ReimbursementError> {
        self.fire(id, ReimbursementEvent::Cancel).await
    }

    // ------------------------------------------------------------------
    // Permissions
    // ------------------------------------------------------------------

    /// Returns true if `role` may edit the reimbursement in its current state
    pub async fn can_edit(&self, id: ReimbursementId, role: Role) -> Result<bool, ReimbursementError> {
        Ok(self.store.load(id).await?.editable_by(role))
    }

    pub async fn editable_by_requester(&self, id: ReimbursementId) -> Result<bool, ReimbursementError> {
        self.can_edit(id, Role::Requester).await
    }

    pub async fn editable_by_tsp(&self, id: ReimbursementId) -> Result<bool, ReimbursementError> {
        self.can_edit(id, Role::Tsp).await
    }

    pub async fn editable_by_administrative(
        &self,
        id: ReimbursementId,
    ) -> Result<bool, ReimbursementError> {
        self.can_edit(id, Role::Administrative).await
    }

    /// Roles `actor` holds on the reimbursement
    pub async fn roles_for(
        &self,
        id: ReimbursementId,
        actor: &Actor,
    ) -> Result<Vec<Role>, ReimbursementError> {
        let reimbursement = self.store.load(id).await?;
        Ok(self.roles.roles_for(actor, &reimbursement))
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    /// Applies an update payload without a permission check
    ///
    /// Top-level fields and attachments commit even when the
    /// `request_attributes` subtree is rejected; in that case the committed
    /// reimbursement is not returned and the result is
    /// `Err(NestedUpdateRejected)`. A protected top-level key, a malformed
    /// payload, a missing request or a failed expense write commits nothing.
    #[instrument(skip(self, payload), fields(reimbursement_id = %id))]
    pub async fn apply_update(
        &self,
        id: ReimbursementId,
        payload: &Value,
    ) -> Result<Reimbursement, ReimbursementError> {
        let current = self.store.load(id).await?;
        let request = self.load_request(&current).await?;
        self.apply_loaded(current, request, payload).await
    }

    /// Applies an update on behalf of `role`
    ///
    /// # Errors
    ///
    /// `NotEditable` if `role` may not edit in the current state; otherwise
    /// as [`apply_update`](Self::apply_update).
    #[instrument(skip(self, payload), fields(reimbursement_id = %id, role = %role))]
    pub async fn apply_update_with_role(
        &self,
        id: ReimbursementId,
        role: Role,
        payload: &Value,
    ) -> Result<Reimbursement, ReimbursementError> {
        let current = self.store.load(id).await?;
        if !editable_by(role, current.state()) {
            warn!(state = %current.state(), "Update refused for role");
            return Err(ReimbursementError::NotEditable {
                role,
                state: current.state(),
            });
        }
        let request = self.load_request(&current).await?;
        self.apply_loaded(current, request, payload).await
    }

    /// Applies an update on behalf of `actor`, using the first role the
    /// actor holds that may edit in the current state
    ///
    /// # Errors
    ///
    /// `NoEditingRole` if none of the actor's roles may edit; otherwise as
    /// [`apply_update`](Self::apply_update).
    #[instrument(skip(self, actor, payload), fields(reimbursement_id = %id, user_id = %actor.user_id))]
    pub async fn apply_update_as(
        &self,
        id: ReimbursementId,
        actor: &Actor,
        payload: &Value,
    ) -> Result<Reimbursement, ReimbursementError> {
        let current = self.store.load(id).await?;
        let request = self.load_request(&current).await?;

        // Ownership is judged against the resynced owner
        let mut synced = current.clone();
        synced.sync_user(&request)?;
        let roles = self.roles.roles_for(actor, &synced);
        let Some(role) = roles.iter().copied().find(|r| synced.editable_by(*r)) else {
            warn!(state = %current.state(), roles = ?roles, "Update refused for actor");
            return Err(ReimbursementError::NoEditingRole(current.state()));
        };

        info!(%role, "Applying update");
        self.apply_loaded(current, request, payload).await
    }

    async fn apply_loaded(
        &self,
        current: Reimbursement,
        request: Request,
        payload: &Value,
    ) -> Result<Reimbursement, ReimbursementError> {
        let update = match UpdatePayload::parse_with(payload, &self.attributes) {
            Ok(update) => update,
            Err(e) => {
                warn!(error = %e, "Update refused");
                return Err(e);
            }
        };

        let (expense_changes, rejection) = self.nested_changes(&update, &request);

        let now = self.clock.now();
        let mut next = current.clone();
        next.sync_user(&request)?;
        next.apply_fields(&update.fields);
        next.apply_attachments(&update.attachments, now)?;
        next.updated_at = now;

        // Expenses go first: a failed write there leaves the reimbursement untouched
        let changes: Vec<ExpenseChange> =
            expense_changes.into_iter().filter(|c| !c.is_noop()).collect();
        if !changes.is_empty() {
            self.write_expenses(&current, &changes).await?;
        }

        let committed = self.store.commit(&next, current.version).await?;

        info!(
            version = committed.version,
            fields = !update.fields.is_empty(),
            attachments = update.attachments.len(),
            expenses = changes.len(),
            "Update committed"
        );

        match rejection {
            Some(rejection) => Err(ReimbursementError::NestedUpdateRejected(rejection)),
            None => Ok(committed),
        }
    }

    fn nested_changes(
        &self,
        update: &UpdatePayload,
        request: &Request,
    ) -> (Vec<ExpenseChange>, Option<NestedRejection>) {
        let Some(request_attrs) = &update.request_attributes else {
            return (Vec::new(), None);
        };

        match self.filter.expense_changes(request_attrs, request) {
            Ok(changes) => (changes, None),
            Err(rejection) => {
                warn!(
                    path = %rejection.path,
                    keys = ?rejection.offending_keys(),
                    "Nested update rejected"
                );
                (Vec::new(), Some(rejection))
            }
        }
    }

    /// Writes accepted expense changes to the request system
    ///
    /// The changes were validated against an earlier read of the request; an
    /// expense that disappeared since then is reported as a concurrent
    /// modification, a vanished request as a broken invariant.
    async fn write_expenses(
        &self,
        reimbursement: &Reimbursement,
        changes: &[ExpenseChange],
    ) -> Result<(), ReimbursementError> {
        match self.requests.update_expenses(reimbursement.request_id, changes).await {
            Ok(_) => Ok(()),
            Err(PortError::NotFound { entity_type, id }) if entity_type == "Request" => {
                Err(ReimbursementError::InvariantViolation(format!(
                    "request {} of reimbursement {} is missing",
                    id, reimbursement.id
                )))
            }
            Err(PortError::NotFound { entity_type, id }) => {
                warn!(%entity_type, %id, "Expense changed while the update was prepared");
                Err(ReimbursementError::Conflict(format!(
                    "{} {} changed while the update was prepared",
                    entity_type, id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Loads the referenced request; a missing request breaks the ownership invariant
    async fn load_request(&self, reimbursement: &Reimbursement) -> Result<Request, ReimbursementError> {
        match self.requests.get_request(reimbursement.request_id).await {
            Ok(request) => Ok(request),
            Err(PortError::NotFound { .. }) => Err(ReimbursementError::InvariantViolation(format!(
                "request {} of reimbursement {} is missing",
                reimbursement.request_id, reimbursement.id
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::memory::{InMemoryReimbursementStore, InMemoryRequestPort};
    use chrono::{TimeZone, Utc};
    use crate::state::ReimbursementState;
    use core_kernel::FixedClock;

    async fn service_with_request() -> (WorkflowService, Request, Arc<InMemoryRequestPort>) {
        let request = Request::new(UserId::new(), EventId::new(), Utc::now());
        let requests = Arc::new(InMemoryRequestPort::with_requests(vec![request.clone()]).await);
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
        let service = WorkflowService::new(
            Arc::new(InMemoryReimbursementStore::new()),
            requests.clone(),
            Arc::new(clock),
        );
        (service, request, requests)
    }

    #[tokio::test]
    async fn test_create_and_fire() {
        let (service, request, _) = service_with_request().await;
        let r = service.create(request.id).await.unwrap();
        assert_eq!(r.state(), ReimbursementState::Incomplete);

        let r = service.submit(r.id).await.unwrap();
        assert_eq!(r.state(), ReimbursementState::TspPending);
        assert_eq!(r.version, 1);
    }

    #[tokio::test]
    async fn test_create_for_missing_request() {
        let (service, _, _) = service_with_request().await;
        let err = service.create(RequestId::new()).await.unwrap_err();
        assert!(matches!(err, ReimbursementError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_refused_transition_commits_nothing() {
        let (service, request, _) = service_with_request().await;
        let r = service.create(request.id).await.unwrap();

        let err = service.approve(r.id).await.unwrap_err();
        assert!(matches!(err, ReimbursementError::TransitionNotAllowed { .. }));

        let stored = service.get(r.id).await.unwrap();
        assert_eq!(stored.version, 0);
        assert_eq!(stored.state(), ReimbursementState::Incomplete);
    }

    #[tokio::test]
    async fn test_missing_request_is_invariant_violation() {
        let (service, request, requests) = service_with_request().await;
        let r = service.create(request.id).await.unwrap();
        requests.remove(request.id).await;

        let err = service.submit(r.id).await.unwrap_err();
        assert!(matches!(err, ReimbursementError::InvariantViolation(_)));
        assert_eq!(service.get(r.id).await.unwrap().state(), ReimbursementState::Incomplete);
    }

    #[tokio::test]
    async fn test_fire_as_checks_event_role() {
        let (service, request, _) = service_with_request().await;
        let r = service.create(request.id).await.unwrap();
        let owner = Actor::new(request.user_id);
        let reviewer = Actor::new(UserId::new()).with_role(Role::Tsp);

        let err = service
            .fire_as(r.id, &reviewer, ReimbursementEvent::Submit)
            .await
            .unwrap_err();
        assert!(matches!(err, ReimbursementError::EventNotPermitted { .. }));

        service.fire_as(r.id, &owner, ReimbursementEvent::Submit).await.unwrap();

        let err = service
            .fire_as(r.id, &owner, ReimbursementEvent::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, ReimbursementError::EventNotPermitted { .. }));
        assert_eq!(service.get(r.id).await.unwrap().state(), ReimbursementState::TspPending);

        let r = service
            .fire_as(r.id, &reviewer, ReimbursementEvent::Approve)
            .await
            .unwrap();
        assert_eq!(r.state(), ReimbursementState::TspApproved);
    }

    #[tokio::test]
    async fn test_role_gated_update() {
        let (service, request, _) = service_with_request().await;
        let r = service.create(request.id).await.unwrap();
        let payload = serde_json::json!({ "tsp_notes": "looks fine" });

        let err = service
            .apply_update_with_role(r.id, Role::Tsp, &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, ReimbursementError::NotEditable { role: Role::Tsp, .. }));

        let updated = service
            .apply_update_with_role(r.id, Role::Requester, &payload)
            .await
            .unwrap();
        assert_eq!(updated.tsp_notes.as_deref(), Some("looks fine"));
    }
}
