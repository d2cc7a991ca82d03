//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use chrono::{DateTime, Duration, TimeZone, Utc};
use core_kernel::{Currency, Money, PartnerId, Percentage};
use domain_revenue::{AdjustmentKind, SplitRule};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Strategy for non-negative source amounts in minor units
pub fn source_minor_strategy() -> impl Strategy<Value = i64> {
    0i64..10_000_000_000i64
}

/// Strategy for percentages with two decimal places (0% to 100%)
pub fn percentage_strategy() -> impl Strategy<Value = Decimal> {
    (0u32..=10_000u32).prop_map(|n| Decimal::new(n as i64, 2))
}

/// Strategy for a set of percentages whose total never exceeds 100%
///
/// Each entry is a share of a random weight vector scaled to `budget`
/// basis points and floored, so the sum stays within the budget.
pub fn percentage_split_strategy(max_partners: usize) -> impl Strategy<Value = Vec<Decimal>> {
    (
        proptest::collection::vec(1u32..1_000u32, 1..=max_partners),
        0u32..=10_000u32,
    )
        .prop_map(|(weights, budget)| {
            let total: u32 = weights.iter().sum();
            weights
                .into_iter()
                .map(|w| {
                    let basis_points = (w as u64 * budget as u64) / total as u64;
                    Decimal::new(basis_points as i64, 2)
                })
                .collect()
        })
}

/// Strategy for valid rule sets at `2024-01-01`
///
/// Mixes percentage rules with minimum guarantees. Partner ids are drawn
/// from a small pool so the same partner can hold several rules.
pub fn rules_strategy(max_partners: usize) -> impl Strategy<Value = Vec<SplitRule>> {
    (
        percentage_split_strategy(max_partners),
        proptest::collection::vec(
            (any::<bool>(), 0i64..5_000_000i64, 1u128..8u128, -3i32..3i32),
            max_partners,
        ),
    )
        .prop_map(|(percentages, shapes)| {
            let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            percentages
                .into_iter()
                .zip(shapes)
                .map(|(value, (guaranteed, minimum, partner, priority))| {
                    let partner_id = PartnerId::from_uuid(Uuid::from_u128(partner));
                    let percentage = Percentage::new(value).unwrap_or_else(|_| Percentage::zero());
                    let rule = if guaranteed {
                        SplitRule::minimum_guarantee(
                            partner_id,
                            Money::from_minor(minimum, Currency::USD),
                            start,
                        )
                        .with_nominal_percentage(percentage)
                    } else {
                        SplitRule::percentage(partner_id, percentage, start)
                    };
                    rule.with_priority(priority)
                })
                .collect()
        })
}

/// Strategy for adjustment kinds
pub fn adjustment_kind_strategy() -> impl Strategy<Value = AdjustmentKind> {
    prop_oneof![
        Just(AdjustmentKind::Correction),
        Just(AdjustmentKind::Bonus),
        Just(AdjustmentKind::Penalty),
        Just(AdjustmentKind::Refund),
    ]
}

/// Strategy for a kind together with an amount whose sign suits it
pub fn signed_adjustment_strategy() -> impl Strategy<Value = (AdjustmentKind, i64)> {
    (adjustment_kind_strategy(), 1i64..1_000_000i64, any::<bool>()).prop_map(
        |(kind, magnitude, negative)| {
            let amount = match kind {
                AdjustmentKind::Bonus => magnitude,
                AdjustmentKind::Penalty | AdjustmentKind::Refund => -magnitude,
                AdjustmentKind::Correction if negative => -magnitude,
                AdjustmentKind::Correction => magnitude,
            };
            (kind, amount)
        },
    )
}

/// Strategy for generating valid timestamps within 2024
pub fn timestamp_2024_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..365i64, 0i64..86_400i64).prop_map(|(days, seconds)| {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + Duration::days(days)
            + Duration::seconds(seconds)
    })
}
