//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use core_kernel::{Currency, Money};
use domain_reimbursement::{ReimbursementEvent, ReimbursementState, Role};
use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::{json, Value};

/// Strategy for generating valid Currency values
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::EUR),
        Just(Currency::USD),
        Just(Currency::GBP),
        Just(Currency::CHF),
        Just(Currency::JPY),
    ]
}

/// Strategy for non-negative amounts with up to two decimals
pub fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

pub fn money_strategy() -> impl Strategy<Value = Money> {
    (amount_strategy(), currency_strategy()).prop_map(|(amount, currency)| Money::new(amount, currency))
}

pub fn state_strategy() -> impl Strategy<Value = ReimbursementState> {
    prop::sample::select(ReimbursementState::ALL.to_vec())
}

pub fn event_strategy() -> impl Strategy<Value = ReimbursementEvent> {
    prop::sample::select(ReimbursementEvent::ALL.to_vec())
}

pub fn role_strategy() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

/// Sequences of events to fire from the initial state
pub fn event_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<ReimbursementEvent>> {
    prop::collection::vec(event_strategy(), 0..max_len)
}

/// Keys outside the expense whitelist, including the deletion marker
pub fn disallowed_expense_key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("_destroy".to_string()),
        Just("subject".to_string()),
        Just("estimated_amount".to_string()),
        Just("currency".to_string()),
        "[a-z]{3,10}_note".prop_map(String::from),
    ]
}

/// An expense entry carrying only whitelisted keys
pub fn allowed_expense_entry_strategy(expense_id: String) -> impl Strategy<Value = Value> {
    (
        proptest::option::of(amount_strategy()),
        proptest::option::of(amount_strategy()),
    )
        .prop_map(move |(total, authorized)| {
            let mut entry = json!({ "id": expense_id.clone() });
            if let Some(total) = total {
                entry["total_amount"] = json!(total.to_string());
            }
            if let Some(authorized) = authorized {
                entry["authorized_amount"] = json!(authorized.to_string());
            }
            entry
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_reimbursement::NestedUpdateFilter;

    proptest! {
        #[test]
        fn prop_money_is_never_negative(money in money_strategy()) {
            prop_assert!(!money.is_negative());
        }

        #[test]
        fn prop_allowed_entries_pass_the_filter(entry in allowed_expense_entry_strategy("EXP-1".to_string())) {
            let subtree = json!({ "expenses_attributes": { "0": entry } });
            prop_assert!(NestedUpdateFilter::default().accepts(&subtree));
        }

        #[test]
        fn prop_disallowed_keys_fail_the_filter(key in disallowed_expense_key_strategy()) {
            let mut entry = json!({ "id": "EXP-1" });
            entry[key.as_str()] = json!(true);
            let subtree = json!({ "expenses_attributes": [entry] });
            prop_assert!(!NestedUpdateFilter::default().accepts(&subtree));
        }
    }
}
