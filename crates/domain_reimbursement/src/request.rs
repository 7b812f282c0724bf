//! The underlying request and its expense line items
//!
//! Requests are owned by another part of the system; the reimbursement only
//! reads the owner and the event, and may change two amounts per expense.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use core_kernel::{Currency, EventId, ExpenseId, Money, MoneyError, RequestId, UserId};

/// Which amount of an expense to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseAmount {
    /// Amount estimated when the request was made
    Estimated,
    /// Amount actually spent, reported during reimbursement
    Total,
    /// Amount the administration agrees to pay
    Authorized,
}

/// One financial line item of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    /// Free text such as "Flight" or "Accommodation"
    pub subject: String,
    pub currency: Currency,
    pub estimated_amount: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub authorized_amount: Option<Decimal>,
}

impl Expense {
    pub fn new(subject: impl Into<String>, currency: Currency) -> Self {
        Self {
            id: ExpenseId::new_v7(),
            subject: subject.into(),
            currency,
            estimated_amount: None,
            total_amount: None,
            authorized_amount: None,
        }
    }

    /// Returns the requested amount as `Money`, if set
    pub fn amount(&self, kind: ExpenseAmount) -> Option<Money> {
        let value = match kind {
            ExpenseAmount::Estimated => self.estimated_amount,
            ExpenseAmount::Total => self.total_amount,
            ExpenseAmount::Authorized => self.authorized_amount,
        };
        value.map(|v| Money::new(v, self.currency))
    }
}

/// The request being reimbursed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    /// Owner of the request, and therefore of its reimbursement
    pub user_id: UserId,
    /// The trip or conference the request is for
    pub event_id: EventId,
    pub expenses: Vec<Expense>,
    pub created_at: DateTime<Utc>,
}

impl Request {
    pub fn new(user_id: UserId, event_id: EventId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: RequestId::new_v7(),
            user_id,
            event_id,
            expenses: Vec::new(),
            created_at,
        }
    }

    /// Finds an expense by id
    pub fn expense(&self, id: ExpenseId) -> Option<&Expense> {
        self.expenses.iter().find(|e| e.id == id)
    }

    pub fn expense_mut(&mut self, id: ExpenseId) -> Option<&mut Expense> {
        self.expenses.iter_mut().find(|e| e.id == id)
    }

    /// Sums one kind of amount over all expenses, grouped by currency
    ///
    /// Expenses without that amount are skipped. Currencies with no amount
    /// at all are omitted.
    pub fn expenses_sum(&self, kind: ExpenseAmount) -> Result<Vec<Money>, MoneyError> {
        let mut by_currency: BTreeMap<&'static str, (Currency, Vec<Money>)> = BTreeMap::new();
        for money in self.expenses.iter().filter_map(|e| e.amount(kind)) {
            by_currency
                .entry(money.currency().code())
                .or_insert_with(|| (money.currency(), Vec::new()))
                .1
                .push(money);
        }

        by_currency
            .into_values()
            .map(|(currency, amounts)| Money::sum(currency, &amounts))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn expense(subject: &str, currency: Currency, total: Option<Decimal>) -> Expense {
        let mut e = Expense::new(subject, currency);
        e.total_amount = total;
        e
    }

    #[test]
    fn test_expenses_sum_groups_by_currency() {
        let mut request = Request::new(UserId::new(), EventId::new(), Utc::now());
        request.expenses.push(expense("Flight", Currency::USD, Some(dec!(300))));
        request.expenses.push(expense("Hotel", Currency::EUR, Some(dec!(200))));
        request.expenses.push(expense("Taxi", Currency::EUR, Some(dec!(25.50))));
        request.expenses.push(expense("Meals", Currency::EUR, None));

        let sums = request.expenses_sum(ExpenseAmount::Total).unwrap();
        assert_eq!(sums.len(), 2);
        assert_eq!(sums[0], Money::new(dec!(225.50), Currency::EUR));
        assert_eq!(sums[1], Money::new(dec!(300), Currency::USD));
    }

    #[test]
    fn test_expenses_sum_empty_when_amount_unset() {
        let mut request = Request::new(UserId::new(), EventId::new(), Utc::now());
        request.expenses.push(expense("Flight", Currency::EUR, Some(dec!(300))));

        assert!(request.expenses_sum(ExpenseAmount::Authorized).unwrap().is_empty());
    }
}
