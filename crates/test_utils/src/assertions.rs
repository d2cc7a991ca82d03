//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for domain types that give
//! more meaningful error messages than standard assertions.

use core_kernel::Money;
use domain_revenue::{AuditEvent, SplitResult};

/// Asserts that two Money values are identical, down to the minor unit
pub fn assert_money_eq(actual: &Money, expected: &Money) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );
    assert_eq!(
        actual.minor_units(),
        expected.minor_units(),
        "Money differs: actual={}, expected={}",
        actual,
        expected
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money);
}

/// Asserts both conservation identities of a split
///
/// # Panics
///
/// Panics with a breakdown of the split when either identity fails
pub fn assert_reconciled(result: &SplitResult) {
    let partners: i64 = result
        .partner_shares
        .iter()
        .map(|s| s.amount.minor_units())
        .sum();
    assert!(
        result.is_reconciled(),
        "Split {} does not reconcile: source={}, tax={}, fees={}, partners={}, merchant={}, \
         net={}, net_adjustment={}",
        result.id,
        result.source_amount,
        result.tax,
        result.fees,
        partners,
        result.merchant_share,
        result.net_amount,
        result.net_adjustment
    );
}

/// Asserts that no partner share is negative
pub fn assert_no_negative_shares(result: &SplitResult) {
    for share in &result.partner_shares {
        assert!(
            !share.amount.is_negative(),
            "Partner {} has negative share {}",
            share.partner_id,
            share.amount
        );
    }
    assert!(
        !result.merchant_share.is_negative(),
        "Merchant share is negative: {}",
        result.merchant_share
    );
}

/// Asserts that audit events are in non-decreasing timestamp order
/// with strictly increasing sequence numbers
pub fn assert_audit_ordered<'a>(events: impl IntoIterator<Item = &'a AuditEvent>) {
    let mut previous: Option<&AuditEvent> = None;
    for event in events {
        if let Some(prev) = previous {
            assert!(
                prev.timestamp <= event.timestamp,
                "Audit event {} at {} precedes event {} at {}",
                event.sequence,
                event.timestamp,
                prev.sequence,
                prev.timestamp
            );
            assert!(
                prev.sequence < event.sequence,
                "Audit sequence not increasing: {} then {}",
                prev.sequence,
                event.sequence
            );
        }
        previous = Some(event);
    }
}
