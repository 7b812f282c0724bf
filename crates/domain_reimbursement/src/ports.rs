//! Reimbursement Domain Ports
//!
//! The workflow service reaches storage and the request system only through
//! the traits in this module:
//!
//! - [`ReimbursementStore`]: persistence of reimbursements with optimistic
//!   concurrency on `version`
//! - [`RequestPort`]: read access to the reimbursed request, plus the single
//!   write the reimbursement may perform (expense amounts)
//! - [`RoleResolver`]: which roles an actor holds for a given reimbursement
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_reimbursement::ports::memory::{InMemoryReimbursementStore, InMemoryRequestPort};
//! use std::sync::Arc;
//!
//! let service = WorkflowService::new(
//!     Arc::new(InMemoryReimbursementStore::new()),
//!     Arc::new(InMemoryRequestPort::new()),
//!     Arc::new(SystemClock),
//! );
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{DomainPort, HealthCheckable, PortError, ReimbursementId, RequestId, UserId};

use crate::nested::ExpenseChange;
use crate::permissions::Role;
use crate::reimbursement::Reimbursement;
use crate::request::Request;

/// Storage port for reimbursements
#[async_trait]
pub trait ReimbursementStore: DomainPort + HealthCheckable {
    /// Stores a new reimbursement
    ///
    /// Fails with `Conflict` if the request already has a reimbursement.
    async fn insert(&self, reimbursement: &Reimbursement) -> Result<Reimbursement, PortError>;

    /// Loads a reimbursement, or `NotFound`
    async fn load(&self, id: ReimbursementId) -> Result<Reimbursement, PortError>;

    /// Finds the reimbursement of a request, if any
    async fn find_by_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<Reimbursement>, PortError>;

    /// Lists reimbursements owned by `user_id`
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Reimbursement>, PortError>;

    /// Replaces the stored reimbursement if its version still equals
    /// `expected_version`, and returns it with the version bumped
    ///
    /// Fails with `Conflict` if another commit got there first.
    async fn commit(
        &self,
        reimbursement: &Reimbursement,
        expected_version: u64,
    ) -> Result<Reimbursement, PortError>;
}

/// Port to the system that owns requests and expenses
#[async_trait]
pub trait RequestPort: DomainPort + HealthCheckable {
    /// Fetches a request with its expenses, or `NotFound`
    async fn get_request(&self, id: RequestId) -> Result<Request, PortError>;

    /// Applies accepted expense amount changes and returns the updated request
    ///
    /// Every change must name an existing expense of the request; otherwise
    /// nothing is written and `NotFound` is returned.
    async fn update_expenses(
        &self,
        id: RequestId,
        changes: &[ExpenseChange],
    ) -> Result<Request, PortError>;
}

/// Someone acting on a reimbursement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    /// Staff roles granted independently of ownership
    pub staff_roles: Vec<Role>,
}

impl Actor {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            staff_roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        if !self.staff_roles.contains(&role) {
            self.staff_roles.push(role);
        }
        self
    }
}

/// Resolves the roles an actor holds on a reimbursement
pub trait RoleResolver: Send + Sync {
    fn roles_for(&self, actor: &Actor, reimbursement: &Reimbursement) -> Vec<Role>;
}

/// The owner acts as `Requester`; staff roles apply to every reimbursement
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipRoleResolver;

impl RoleResolver for OwnershipRoleResolver {
    fn roles_for(&self, actor: &Actor, reimbursement: &Reimbursement) -> Vec<Role> {
        let mut roles = Vec::with_capacity(actor.staff_roles.len() + 1);
        if actor.user_id == reimbursement.user_id() {
            roles.push(Role::Requester);
        }
        for role in &actor.staff_roles {
            // Requester is only ever derived from ownership
            if *role != Role::Requester && !roles.contains(role) {
                roles.push(*role);
            }
        }
        roles
    }
}

/// In-memory adapters for tests and the standalone server
#[cfg(any(test, feature = "in-memory"))]
pub mod memory {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use core_kernel::{AdapterHealth, HealthCheckResult};

    fn healthy(adapter_id: &str) -> HealthCheckResult {
        HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Healthy,
            latency_ms: 0,
            message: Some("In-memory adapter".to_string()),
            checked_at: Utc::now(),
        }
    }

    /// Reimbursements kept in a map
    #[derive(Debug, Default, Clone)]
    pub struct InMemoryReimbursementStore {
        reimbursements: Arc<RwLock<HashMap<ReimbursementId, Reimbursement>>>,
    }

    impl InMemoryReimbursementStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn len(&self) -> usize {
            self.reimbursements.read().await.len()
        }
    }

    impl DomainPort for InMemoryReimbursementStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryReimbursementStore {
        async fn health_check(&self) -> HealthCheckResult {
            healthy("in-memory-reimbursement-store")
        }
    }

    #[async_trait]
    impl ReimbursementStore for InMemoryReimbursementStore {
        async fn insert(&self, reimbursement: &Reimbursement) -> Result<Reimbursement, PortError> {
            let mut reimbursements = self.reimbursements.write().await;
            if reimbursements
                .values()
                .any(|r| r.request_id == reimbursement.request_id)
            {
                return Err(PortError::conflict(format!(
                    "request {} already has a reimbursement",
                    reimbursement.request_id
                )));
            }
            reimbursements.insert(reimbursement.id, reimbursement.clone());
            Ok(reimbursement.clone())
        }

        async fn load(&self, id: ReimbursementId) -> Result<Reimbursement, PortError> {
            self.reimbursements
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Reimbursement", id))
        }

        async fn find_by_request(
            &self,
            request_id: RequestId,
        ) -> Result<Option<Reimbursement>, PortError> {
            Ok(self
                .reimbursements
                .read()
                .await
                .values()
                .find(|r| r.request_id == request_id)
                .cloned())
        }

        async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Reimbursement>, PortError> {
            let mut owned: Vec<_> = self
                .reimbursements
                .read()
                .await
                .values()
                .filter(|r| r.user_id() == user_id)
                .cloned()
                .collect();
            owned.sort_by_key(|r| r.created_at);
            Ok(owned)
        }

        async fn commit(
            &self,
            reimbursement: &Reimbursement,
            expected_version: u64,
        ) -> Result<Reimbursement, PortError> {
            let mut reimbursements = self.reimbursements.write().await;
            let stored = reimbursements
                .get_mut(&reimbursement.id)
                .ok_or_else(|| PortError::not_found("Reimbursement", reimbursement.id))?;

            if stored.version != expected_version {
                return Err(PortError::conflict(format!(
                    "reimbursement {} is at version {}, expected {}",
                    reimbursement.id, stored.version, expected_version
                )));
            }

            let mut next = reimbursement.clone();
            next.version = expected_version + 1;
            *stored = next.clone();
            Ok(next)
        }
    }

    /// Requests kept in a map
    #[derive(Debug, Default, Clone)]
    pub struct InMemoryRequestPort {
        requests: Arc<RwLock<HashMap<RequestId, Request>>>,
    }

    impl InMemoryRequestPort {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with requests
        pub async fn with_requests(requests: Vec<Request>) -> Self {
            let port = Self::new();
            for request in requests {
                port.put(request).await;
            }
            port
        }

        /// Inserts or replaces a request, standing in for the owning system
        pub async fn put(&self, request: Request) {
            self.requests.write().await.insert(request.id, request);
        }

        /// Removes a request, standing in for the owning system
        pub async fn remove(&self, id: RequestId) -> Option<Request> {
            self.requests.write().await.remove(&id)
        }
    }

    impl DomainPort for InMemoryRequestPort {}

    #[async_trait]
    impl HealthCheckable for InMemoryRequestPort {
        async fn health_check(&self) -> HealthCheckResult {
            healthy("in-memory-request-port")
        }
    }

    #[async_trait]
    impl RequestPort for InMemoryRequestPort {
        async fn get_request(&self, id: RequestId) -> Result<Request, PortError> {
            self.requests
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Request", id))
        }

        async fn update_expenses(
            &self,
            id: RequestId,
            changes: &[ExpenseChange],
        ) -> Result<Request, PortError> {
            let mut requests = self.requests.write().await;
            let stored = requests
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Request", id))?;

            if let Some(missing) = changes.iter().find(|c| stored.expense(c.id).is_none()) {
                return Err(PortError::not_found("Expense", missing.id));
            }

            for change in changes {
                if let Some(expense) = stored.expense_mut(change.id) {
                    change.apply_to(expense);
                }
            }
            Ok(stored.clone())
        }
    }
}
