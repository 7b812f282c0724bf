//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for domain types that give
//! more meaningful error messages than standard assertions.

use chrono::{DateTime, Utc};
use core_kernel::Money;
use domain_reimbursement::{
    Reimbursement, ReimbursementError, ReimbursementEvent, ReimbursementState,
};

/// Asserts the reimbursement is in `expected` and that its entry instant is recorded
pub fn assert_in_state(reimbursement: &Reimbursement, expected: ReimbursementState) {
    assert_eq!(
        reimbursement.state(),
        expected,
        "Reimbursement {} is in {}, expected {}",
        reimbursement.id,
        reimbursement.state(),
        expected
    );
    assert!(
        reimbursement.timestamps().get(expected).is_some(),
        "Reimbursement {} is in {} without an entry timestamp",
        reimbursement.id,
        expected
    );
}

/// Asserts `state` was last entered at `at`
pub fn assert_entered_at(
    reimbursement: &Reimbursement,
    state: ReimbursementState,
    at: DateTime<Utc>,
) {
    assert_eq!(
        reimbursement.timestamps().get(state),
        Some(at),
        "Unexpected entry timestamp for {} on {}",
        state,
        reimbursement.id
    );
}

/// Asserts a result is a refused transition for `event` from `state`
pub fn assert_transition_refused<T: std::fmt::Debug>(
    result: &Result<T, ReimbursementError>,
    event: ReimbursementEvent,
    state: ReimbursementState,
) {
    match result {
        Err(ReimbursementError::TransitionNotAllowed { event: e, state: s }) => {
            assert_eq!((*e, *s), (event, state), "Refused for a different edge");
        }
        other => panic!("Expected {} from {} to be refused, got {:?}", event, state, other),
    }
}

/// Asserts a result is a nested rejection naming exactly `keys`
pub fn assert_nested_rejected<T: std::fmt::Debug>(
    result: &Result<T, ReimbursementError>,
    keys: &[&str],
) {
    match result {
        Err(ReimbursementError::NestedUpdateRejected(rejection)) => {
            let mut actual = rejection.offending_keys();
            actual.sort();
            let mut expected: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
            expected.sort();
            assert_eq!(actual, expected, "Rejected for other keys ({})", rejection);
        }
        other => panic!("Expected a nested update rejection, got {:?}", other),
    }
}

/// Asserts that a set of Money parts sum to the total
pub fn assert_money_sum_equals(parts: &[Money], total: &Money) {
    let sum = Money::sum(total.currency(), parts).expect("Currency mismatch in parts");
    assert_eq!(
        sum.amount(),
        total.amount(),
        "Sum of parts ({}) doesn't equal total ({})",
        sum,
        total
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_kernel::{Currency, EventId, UserId};
    use domain_reimbursement::Request;
    use rust_decimal_macros::dec;

    fn fresh() -> Reimbursement {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        Reimbursement::new(&Request::new(UserId::new(), EventId::new(), at), at)
    }

    #[test]
    fn test_assert_in_state_passes_for_new() {
        let r = fresh();
        assert_in_state(&r, ReimbursementState::Incomplete);
        assert_entered_at(&r, ReimbursementState::Incomplete, r.created_at);
    }

    #[test]
    fn test_assert_transition_refused() {
        let mut r = fresh();
        let result = r.fire(ReimbursementEvent::Confirm, Utc::now());
        assert_transition_refused(&result, ReimbursementEvent::Confirm, ReimbursementState::Incomplete);
    }

    #[test]
    #[should_panic(expected = "Sum of parts")]
    fn test_assert_money_sum_equals_fails() {
        let parts = vec![
            Money::new(dec!(10), Currency::EUR),
            Money::new(dec!(5), Currency::EUR),
        ];
        assert_money_sum_equals(&parts, &Money::new(dec!(16), Currency::EUR));
    }
}
