//! Tests for core_kernel error types

use core_kernel::money::MoneyError;
use core_kernel::{Currency, Money, PortError};
use rust_decimal_macros::dec;

#[test]
fn test_money_error_names_both_currencies() {
    let eur = Money::new(dec!(10), Currency::EUR);
    let usd = Money::new(dec!(10), Currency::USD);

    let error = eur.checked_add(&usd).unwrap_err();
    assert!(matches!(error, MoneyError::CurrencyMismatch(_, _)));
    assert!(error.to_string().contains("EUR"));
    assert!(error.to_string().contains("USD"));
}

#[test]
fn test_port_error_validation_has_no_field() {
    let error = PortError::validation("expense id is required");

    match error {
        PortError::Validation { message, field } => {
            assert_eq!(message, "expense id is required");
            assert!(field.is_none());
        }
        _ => panic!("Expected Validation error"),
    }
}

#[test]
fn test_port_error_classification() {
    let missing = PortError::not_found("Request", "REQ-1");
    assert!(missing.is_not_found());
    assert!(!missing.is_conflict());

    let stale = PortError::conflict("stale version");
    assert!(stale.is_conflict());
    assert!(!stale.is_transient());

    let broken = PortError::internal("lock poisoned");
    assert!(!broken.is_transient());
    assert!(broken.to_string().contains("lock poisoned"));
}
