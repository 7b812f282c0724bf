//! Unit tests for the Money module
//!
//! Covers creation, checked arithmetic, summing and display of the amounts
//! carried by expense line items.

use core_kernel::{Money, Currency, MoneyError};
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_creates_money_with_correct_amount() {
        let m = Money::new(dec!(100.50), Currency::EUR);
        assert_eq!(m.amount(), dec!(100.50));
        assert_eq!(m.currency(), Currency::EUR);
    }

    #[test]
    fn test_zero_creates_zero_amount() {
        let m = Money::zero(Currency::USD);
        assert!(m.is_zero());
        assert!(!m.is_negative());
    }

    #[test]
    fn test_negative_amount() {
        let m = Money::new(dec!(-3.50), Currency::EUR);
        assert!(m.is_negative());
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_add_same_currency() {
        let a = Money::new(dec!(100.00), Currency::EUR);
        let b = Money::new(dec!(20.25), Currency::EUR);
        assert_eq!(a.checked_add(&b).unwrap().amount(), dec!(120.25));
    }

    #[test]
    fn test_checked_sub_can_go_negative() {
        let a = Money::new(dec!(10.00), Currency::EUR);
        let b = Money::new(dec!(12.00), Currency::EUR);
        assert_eq!(a.checked_sub(&b).unwrap().amount(), dec!(-2.00));
    }

    #[test]
    fn test_checked_sub_currency_mismatch() {
        let a = Money::new(dec!(10.00), Currency::EUR);
        let b = Money::new(dec!(12.00), Currency::GBP);
        assert_eq!(
            a.checked_sub(&b),
            Err(MoneyError::CurrencyMismatch("EUR".to_string(), "GBP".to_string()))
        );
    }
}

mod summing {
    use super::*;

    #[test]
    fn test_sum_of_empty_is_zero() {
        let total = Money::sum(Currency::EUR, &[]).unwrap();
        assert!(total.is_zero());
        assert_eq!(total.currency(), Currency::EUR);
    }

    #[test]
    fn test_sum_of_expenses() {
        let items = vec![
            Money::new(dec!(120.00), Currency::EUR),
            Money::new(dec!(35.40), Currency::EUR),
            Money::new(dec!(4.60), Currency::EUR),
        ];
        assert_eq!(Money::sum(Currency::EUR, &items).unwrap().amount(), dec!(160.00));
    }

    #[test]
    fn test_sum_rejects_mixed_currencies() {
        let items = vec![
            Money::new(dec!(120.00), Currency::EUR),
            Money::new(dec!(35.40), Currency::USD),
        ];
        assert!(Money::sum(Currency::EUR, &items).is_err());
    }
}

mod display {
    use super::*;

    #[test]
    fn test_display_uses_currency_places() {
        assert_eq!(Money::new(dec!(12.5), Currency::EUR).to_string(), "€ 12.50");
        assert_eq!(Money::new(dec!(1200), Currency::JPY).to_string(), "¥ 1200");
    }

    #[test]
    fn test_round_to_currency() {
        let m = Money::new(dec!(10.005), Currency::EUR).round_to_currency();
        assert_eq!(m.amount(), dec!(10.00));
    }
}
