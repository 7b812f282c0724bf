//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use core_kernel::{Clock, Currency, EventId, Money, SteppingClock, UserId};
use rust_decimal::Decimal;

use domain_reimbursement::ports::memory::{InMemoryReimbursementStore, InMemoryRequestPort};
use domain_reimbursement::{Expense, Reimbursement, Request, WorkflowService};

use crate::fixtures::{IdFixtures, MoneyFixtures, TemporalFixtures};

/// Builder for expense line items
pub struct ExpenseBuilder {
    subject: String,
    currency: Currency,
    estimated_amount: Option<Decimal>,
    total_amount: Option<Decimal>,
    authorized_amount: Option<Decimal>,
}

impl ExpenseBuilder {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            currency: Currency::EUR,
            estimated_amount: None,
            total_amount: None,
            authorized_amount: None,
        }
    }

    /// Sets the currency and the estimated amount from a money value
    pub fn estimated(mut self, money: Money) -> Self {
        self.currency = money.currency();
        self.estimated_amount = Some(money.amount());
        self
    }

    pub fn total(mut self, amount: Decimal) -> Self {
        self.total_amount = Some(amount);
        self
    }

    pub fn authorized(mut self, amount: Decimal) -> Self {
        self.authorized_amount = Some(amount);
        self
    }

    pub fn build(self) -> Expense {
        let mut expense = Expense::new(self.subject, self.currency);
        expense.estimated_amount = self.estimated_amount;
        expense.total_amount = self.total_amount;
        expense.authorized_amount = self.authorized_amount;
        expense
    }
}

/// Builder for requests
pub struct RequestBuilder {
    user_id: UserId,
    event_id: EventId,
    created_at: DateTime<Utc>,
    expenses: Vec<Expense>,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    /// Creates a request owned by the fixture requester, without expenses
    pub fn new() -> Self {
        Self {
            user_id: IdFixtures::requester_id(),
            event_id: IdFixtures::event_id(),
            created_at: TemporalFixtures::request_created(),
            expenses: Vec::new(),
        }
    }

    /// A request with an estimated flight and hotel
    pub fn conference_trip() -> Self {
        Self::new()
            .with_expense(ExpenseBuilder::new("Flight").estimated(MoneyFixtures::eur_flight()).build())
            .with_expense(ExpenseBuilder::new("Hotel").estimated(MoneyFixtures::eur_hotel()).build())
    }

    pub fn owned_by(mut self, user_id: UserId) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn for_event(mut self, event_id: EventId) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn with_expense(mut self, expense: Expense) -> Self {
        self.expenses.push(expense);
        self
    }

    pub fn build(self) -> Request {
        let mut request = Request::new(self.user_id, self.event_id, self.created_at);
        request.expenses = self.expenses;
        request
    }
}

/// A workflow service wired to in-memory adapters, with handles kept for
/// inspection
pub struct TestWorkflow {
    pub service: Arc<WorkflowService>,
    pub store: Arc<InMemoryReimbursementStore>,
    pub requests: Arc<InMemoryRequestPort>,
    pub clock: Arc<SteppingClock>,
}

impl TestWorkflow {
    /// Creates a service over empty adapters and a stepping clock
    pub fn new() -> Self {
        let store = Arc::new(InMemoryReimbursementStore::new());
        let requests = Arc::new(InMemoryRequestPort::new());
        let clock = Arc::new(SteppingClock::new(
            TemporalFixtures::workflow_start(),
            TemporalFixtures::clock_step(),
        ));
        let service = Arc::new(WorkflowService::new(
            store.clone(),
            requests.clone(),
            clock.clone() as Arc<dyn Clock>,
        ));

        Self {
            service,
            store,
            requests,
            clock,
        }
    }

    /// Stores `request` and creates its reimbursement
    pub async fn seed(&self, request: Request) -> Reimbursement {
        let request_id = request.id;
        self.requests.put(request).await;
        self.service
            .create(request_id)
            .await
            .expect("seeded request should accept a reimbursement")
    }

    /// Seeds the standard conference trip and returns it with its reimbursement
    pub async fn seed_conference_trip(&self) -> (Request, Reimbursement) {
        let request = RequestBuilder::conference_trip().build();
        let reimbursement = self.seed(request.clone()).await;
        (request, reimbursement)
    }
}

impl Default for TestWorkflow {
    fn default() -> Self {
        Self::new()
    }
}
