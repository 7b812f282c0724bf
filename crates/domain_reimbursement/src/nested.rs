//! Nested update filter for the request/expense subtree
//!
//! An update may reach through the reimbursement into its request, but only
//! to change `total_amount` and `authorized_amount` of existing expenses.
//! The filter is all-or-nothing: one disallowed key anywhere in the subtree
//! discards the whole subtree for that update. Deletion markers are not in
//! the expense whitelist, so expenses cannot be removed through this path.
//!
//! The filter does not look at the lifecycle state; callers check
//! [`editable_by`](crate::permissions::editable_by) first.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use core_kernel::{ExpenseId, RequestId};

use crate::attributes::{AccessibleAttributes, ACCESSIBLE_ATTRIBUTES};
use crate::request::{Expense, Request};

pub const REQUEST_ATTRIBUTES: &str = "request_attributes";
pub const EXPENSES_ATTRIBUTES: &str = "expenses_attributes";

/// Why a nested subtree was discarded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    /// Keys outside the whitelist (including `_destroy`)
    DisallowedKeys { keys: Vec<String> },
    /// A node that must be an object (or list of objects) was not
    NotAnObject,
    /// `id` names a request other than the reimbursement's own
    ForeignRequest { id: String },
    /// An expense entry without `id`; expenses cannot be created here
    MissingExpenseId,
    /// `id` names no expense of the request
    UnknownExpense { id: String },
    /// An amount that is neither a number, a numeric string nor null
    InvalidAmount { key: String, value: String },
}

/// A discarded nested subtree and the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NestedRejection {
    /// Dotted path of the offending node, e.g. `request_attributes.expenses_attributes.0`
    pub path: String,
    pub reason: RejectionReason,
}

impl NestedRejection {
    fn new(path: impl Into<String>, reason: RejectionReason) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }

    /// Keys that caused the rejection, for reporting back to the caller
    pub fn offending_keys(&self) -> Vec<String> {
        match &self.reason {
            RejectionReason::DisallowedKeys { keys } => keys.clone(),
            RejectionReason::InvalidAmount { key, .. } => vec![key.clone()],
            RejectionReason::ForeignRequest { .. } | RejectionReason::UnknownExpense { .. } => {
                vec!["id".to_string()]
            }
            RejectionReason::MissingExpenseId | RejectionReason::NotAnObject => Vec::new(),
        }
    }
}

impl fmt::Display for NestedRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            RejectionReason::DisallowedKeys { keys } => {
                write!(f, "{}: keys not allowed: {}", self.path, keys.join(", "))
            }
            RejectionReason::NotAnObject => write!(f, "{}: expected an object", self.path),
            RejectionReason::ForeignRequest { id } => {
                write!(f, "{}: request {} is not the reimbursed request", self.path, id)
            }
            RejectionReason::MissingExpenseId => {
                write!(f, "{}: expense id is required", self.path)
            }
            RejectionReason::UnknownExpense { id } => {
                write!(f, "{}: unknown expense {}", self.path, id)
            }
            RejectionReason::InvalidAmount { key, value } => {
                write!(f, "{}: invalid amount for {}: {}", self.path, key, value)
            }
        }
    }
}

/// Accepted change to one expense
///
/// `None` leaves the amount untouched, `Some(None)` clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseChange {
    pub id: ExpenseId,
    pub total_amount: Option<Option<Decimal>>,
    pub authorized_amount: Option<Option<Decimal>>,
}

impl ExpenseChange {
    pub fn apply_to(&self, expense: &mut Expense) {
        if let Some(total) = self.total_amount {
            expense.total_amount = total;
        }
        if let Some(authorized) = self.authorized_amount {
            expense.authorized_amount = authorized;
        }
    }

    pub fn is_noop(&self) -> bool {
        self.total_amount.is_none() && self.authorized_amount.is_none()
    }
}

/// Whitelist check over the request/expense subtree of an update payload
#[derive(Debug, Clone, Copy)]
pub struct NestedUpdateFilter {
    attributes: AccessibleAttributes,
}

impl Default for NestedUpdateFilter {
    fn default() -> Self {
        Self::new(ACCESSIBLE_ATTRIBUTES)
    }
}

impl NestedUpdateFilter {
    pub const fn new(attributes: AccessibleAttributes) -> Self {
        Self { attributes }
    }

    /// Checks the key sets of the request portion and every expense entry
    ///
    /// # Errors
    ///
    /// Returns the first offending node; the caller must drop the whole
    /// subtree.
    pub fn check(&self, request_attrs: &Value) -> Result<(), NestedRejection> {
        let request = as_object(request_attrs, REQUEST_ATTRIBUTES)?;

        let disallowed = AccessibleAttributes::disallowed_keys(self.attributes.request, request);
        if !disallowed.is_empty() {
            return Err(NestedRejection::new(
                REQUEST_ATTRIBUTES,
                RejectionReason::DisallowedKeys { keys: disallowed },
            ));
        }

        if let Some(expenses) = request.get(EXPENSES_ATTRIBUTES) {
            for (path, entry) in expense_entries(expenses)? {
                let entry = as_object(entry, &path)?;
                let disallowed =
                    AccessibleAttributes::disallowed_keys(self.attributes.expense, entry);
                if !disallowed.is_empty() {
                    return Err(NestedRejection::new(
                        path,
                        RejectionReason::DisallowedKeys { keys: disallowed },
                    ));
                }
            }
        }

        Ok(())
    }

    /// Returns true if [`check`](Self::check) passes
    pub fn accepts(&self, request_attrs: &Value) -> bool {
        self.check(request_attrs).is_ok()
    }

    /// Checks the subtree and resolves it against the reimbursed request
    ///
    /// Beyond the key check, the request `id` (when given) must be the
    /// reimbursed request and every expense entry must name an existing
    /// expense. Any failure rejects the whole subtree.
    pub fn expense_changes(
        &self,
        request_attrs: &Value,
        request: &Request,
    ) -> Result<Vec<ExpenseChange>, NestedRejection> {
        self.check(request_attrs)?;
        let attrs = as_object(request_attrs, REQUEST_ATTRIBUTES)?;

        if let Some(id) = attrs.get("id") {
            let matches = id_string(id)
                .and_then(|s| RequestId::from_str(&s).ok())
                .is_some_and(|parsed| parsed == request.id);
            if !matches {
                return Err(NestedRejection::new(
                    REQUEST_ATTRIBUTES,
                    RejectionReason::ForeignRequest { id: id.to_string() },
                ));
            }
        }

        let Some(expenses) = attrs.get(EXPENSES_ATTRIBUTES) else {
            return Ok(Vec::new());
        };

        let mut changes = Vec::new();
        for (path, entry) in expense_entries(expenses)? {
            let entry = as_object(entry, &path)?;
            let raw_id = entry
                .get("id")
                .ok_or_else(|| NestedRejection::new(path.clone(), RejectionReason::MissingExpenseId))?;
            let id = id_string(raw_id)
                .and_then(|s| ExpenseId::from_str(&s).ok())
                .filter(|id| request.expense(*id).is_some())
                .ok_or_else(|| {
                    NestedRejection::new(
                        path.clone(),
                        RejectionReason::UnknownExpense { id: raw_id.to_string() },
                    )
                })?;

            changes.push(ExpenseChange {
                id,
                total_amount: amount_field(entry, "total_amount", &path)?,
                authorized_amount: amount_field(entry, "authorized_amount", &path)?,
            });
        }

        debug!(
            request_id = %request.id,
            changes = changes.len(),
            "Nested expense update accepted"
        );
        Ok(changes)
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, NestedRejection> {
    value
        .as_object()
        .ok_or_else(|| NestedRejection::new(path, RejectionReason::NotAnObject))
}

/// Expense entries arrive either keyed by index (`{"0": {...}}`) or as a list
fn expense_entries(value: &Value) -> Result<Vec<(String, &Value)>, NestedRejection> {
    let base = format!("{}.{}", REQUEST_ATTRIBUTES, EXPENSES_ATTRIBUTES);
    match value {
        Value::Object(map) => Ok(map
            .iter()
            .map(|(key, entry)| (format!("{}.{}", base, key), entry))
            .collect()),
        Value::Array(items) => Ok(items
            .iter()
            .enumerate()
            .map(|(index, entry)| (format!("{}.{}", base, index), entry))
            .collect()),
        _ => Err(NestedRejection::new(base, RejectionReason::NotAnObject)),
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn amount_field(
    entry: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<Option<Decimal>>, NestedRejection> {
    let invalid = |value: &Value| {
        NestedRejection::new(
            path,
            RejectionReason::InvalidAmount {
                key: key.to_string(),
                value: value.to_string(),
            },
        )
    };

    match entry.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(value) => {
            let parsed = match value {
                Value::String(s) if s.trim().is_empty() => return Ok(Some(None)),
                Value::String(s) => parse_decimal(s.trim()),
                Value::Number(n) => parse_decimal(&n.to_string()),
                _ => None,
            };
            parsed.map(|d| Some(Some(d))).ok_or_else(|| invalid(value))
        }
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_kernel::{Currency, EventId, UserId};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn request_with_expense() -> (Request, ExpenseId) {
        let mut request = Request::new(UserId::new(), EventId::new(), Utc::now());
        let expense = Expense::new("Flight", Currency::EUR);
        let id = expense.id;
        request.expenses.push(expense);
        (request, id)
    }

    #[test]
    fn test_accepts_whitelisted_amounts() {
        let payload = json!({
            "id": 5,
            "expenses_attributes": { "0": { "id": 1, "total_amount": 100, "authorized_amount": 90 } }
        });
        assert!(NestedUpdateFilter::default().accepts(&payload));
    }

    #[test]
    fn test_rejects_request_level_field() {
        let payload = json!({ "id": 5, "description": "x" });
        let rejection = NestedUpdateFilter::default().check(&payload).unwrap_err();
        assert_eq!(rejection.path, "request_attributes");
        assert_eq!(rejection.offending_keys(), vec!["description".to_string()]);
    }

    #[test]
    fn test_rejects_destroy_marker() {
        let payload = json!({
            "id": 5,
            "expenses_attributes": { "0": { "id": 1, "_destroy": true } }
        });
        let rejection = NestedUpdateFilter::default().check(&payload).unwrap_err();
        assert_eq!(rejection.path, "request_attributes.expenses_attributes.0");
        assert_eq!(rejection.offending_keys(), vec!["_destroy".to_string()]);
    }

    #[test]
    fn test_list_form_is_checked_too() {
        let payload = json!({
            "expenses_attributes": [
                { "id": 1, "total_amount": 10 },
                { "id": 2, "subject": "Hotel" }
            ]
        });
        let rejection = NestedUpdateFilter::default().check(&payload).unwrap_err();
        assert_eq!(rejection.path, "request_attributes.expenses_attributes.1");
    }

    #[test]
    fn test_non_object_subtree_is_rejected() {
        let filter = NestedUpdateFilter::default();
        assert!(!filter.accepts(&json!("request")));
        assert!(!filter.accepts(&json!({ "expenses_attributes": 3 })));
        assert!(!filter.accepts(&json!({ "expenses_attributes": [1] })));
    }

    #[test]
    fn test_expense_changes_parses_amounts() {
        let (request, expense_id) = request_with_expense();
        let payload = json!({
            "id": request.id.to_string(),
            "expenses_attributes": {
                "0": { "id": expense_id.to_string(), "total_amount": "120.50", "authorized_amount": null }
            }
        });

        let changes = NestedUpdateFilter::default()
            .expense_changes(&payload, &request)
            .unwrap();
        assert_eq!(
            changes,
            vec![ExpenseChange {
                id: expense_id,
                total_amount: Some(Some(dec!(120.50))),
                authorized_amount: Some(None),
            }]
        );
    }

    #[test]
    fn test_expense_changes_rejects_foreign_request() {
        let (request, _) = request_with_expense();
        let payload = json!({ "id": RequestId::new().to_string() });

        let rejection = NestedUpdateFilter::default()
            .expense_changes(&payload, &request)
            .unwrap_err();
        assert!(matches!(rejection.reason, RejectionReason::ForeignRequest { .. }));
    }

    #[test]
    fn test_expense_changes_rejects_creation_and_unknown_ids() {
        let (request, _) = request_with_expense();
        let filter = NestedUpdateFilter::default();

        let create = json!({ "expenses_attributes": { "0": { "total_amount": 10 } } });
        assert_eq!(
            filter.expense_changes(&create, &request).unwrap_err().reason,
            RejectionReason::MissingExpenseId
        );

        let unknown = json!({ "expenses_attributes": { "0": { "id": ExpenseId::new().to_string() } } });
        assert!(matches!(
            filter.expense_changes(&unknown, &request).unwrap_err().reason,
            RejectionReason::UnknownExpense { .. }
        ));
    }

    #[test]
    fn test_expense_changes_rejects_bad_amount() {
        let (request, expense_id) = request_with_expense();
        let payload = json!({
            "expenses_attributes": { "0": { "id": expense_id.to_string(), "total_amount": "ten" } }
        });

        let rejection = NestedUpdateFilter::default()
            .expense_changes(&payload, &request)
            .unwrap_err();
        assert_eq!(rejection.offending_keys(), vec!["total_amount".to_string()]);
    }
}
