//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for the reimbursement workflow.
//! These fixtures are designed to be consistent and predictable for unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use core_kernel::{Currency, EventId, Money, UserId};
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Typical flight cost
    pub fn eur_flight() -> Money {
        Money::new(dec!(389.90), Currency::EUR)
    }

    /// Typical hotel cost for three nights
    pub fn eur_hotel() -> Money {
        Money::new(dec!(297.00), Currency::EUR)
    }

    /// A USD amount for multi-currency requests
    pub fn usd_registration() -> Money {
        Money::new(dec!(150.00), Currency::USD)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// When the standard test request was made
    pub fn request_created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 8, 10, 0, 0).unwrap()
    }

    /// Start instant of test clocks
    pub fn workflow_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 13, 9, 0, 0).unwrap()
    }

    /// Step between consecutive reads of a stepping clock
    pub fn clock_step() -> Duration {
        Duration::minutes(15)
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    /// Deterministic requester
    pub fn requester_id() -> UserId {
        UserId::from_uuid(Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440001))
    }

    /// Deterministic TSP reviewer
    pub fn reviewer_id() -> UserId {
        UserId::from_uuid(Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440002))
    }

    /// Deterministic administrative staff member
    pub fn administrator_id() -> UserId {
        UserId::from_uuid(Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440003))
    }

    /// Deterministic event (conference)
    pub fn event_id() -> EventId {
        EventId::from_uuid(Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440004))
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    pub fn description() -> &'static str {
        "Travel to the annual developer conference"
    }

    pub fn requester_notes() -> &'static str {
        "Hotel invoice attached, taxi receipts follow"
    }

    pub fn tsp_notes() -> &'static str {
        "Amounts match the approved estimate"
    }

    /// Secret used to sign test tokens
    pub fn jwt_secret() -> &'static str {
        "test-secret-key-for-reimbursement-api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_fixtures_currencies() {
        assert_eq!(MoneyFixtures::eur_flight().currency(), Currency::EUR);
        assert_eq!(MoneyFixtures::usd_registration().currency(), Currency::USD);
    }

    #[test]
    fn test_temporal_fixtures_ordering() {
        assert!(TemporalFixtures::request_created() < TemporalFixtures::workflow_start());
        assert!(TemporalFixtures::clock_step() > Duration::zero());
    }

    #[test]
    fn test_id_fixtures_are_deterministic_and_distinct() {
        assert_eq!(IdFixtures::requester_id(), IdFixtures::requester_id());
        assert_ne!(IdFixtures::requester_id(), IdFixtures::reviewer_id());
    }
}
