//! Split Calculator Tests
//!
//! Covers the worked scenarios for percentage and minimum-guarantee rules,
//! remainder allocation, fee policies, and the conservation properties that
//! must hold for every computed split.
//!
//! # Test Organization
//!
//! - `scenarios` - Hand-computed splits
//! - `rule_selection` - Which rules take part in a computation
//! - `fee_policy` - Merchant-borne versus proportional fees
//! - `properties` - Property-based invariants

use chrono::Duration;
use domain_revenue::{FeePolicy, RevenueError, RuleKind, SplitCalculator, SplitRule};
use rust_decimal_macros::dec;
use test_utils::{
    assert_money_eq, assert_money_zero, assert_no_negative_shares, assert_reconciled, IdFixtures,
    MoneyFixtures, TemporalFixtures, TestRuleBuilder,
};

fn usd(minor: i64) -> core_kernel::Money {
    MoneyFixtures::usd(minor)
}

mod scenarios {
    use super::*;

    #[test]
    fn test_single_partner_thirty_percent() {
        let partner = IdFixtures::partner(1);
        let rules = [TestRuleBuilder::percentage(dec!(30)).for_partner(partner).build()];

        let result = SplitCalculator::default()
            .compute(usd(100_000), usd(0), usd(0), &rules, TemporalFixtures::mid_year())
            .unwrap();

        assert_money_eq(&result.share_for(partner).unwrap().amount, &usd(30_000));
        assert_money_eq(&result.merchant_share, &usd(70_000));
        assert_money_eq(&result.net_amount, &usd(70_000));
        assert_eq!(result.revision, 0);
        assert_reconciled(&result);
    }

    #[test]
    fn test_guarantee_exceeds_nominal_percentage() {
        let a = IdFixtures::partner(1);
        let b = IdFixtures::partner(2);
        let rules = [
            TestRuleBuilder::percentage(dec!(30)).for_partner(a).build(),
            TestRuleBuilder::guarantee(usd(5_000))
                .with_nominal_percentage(dec!(2))
                .for_partner(b)
                .build(),
        ];

        let result = SplitCalculator::default()
            .compute(usd(100_000), usd(0), usd(0), &rules, TemporalFixtures::mid_year())
            .unwrap();

        let b_share = result.share_for(b).unwrap();
        assert_eq!(b_share.kind, RuleKind::MinimumGuarantee);
        assert_money_eq(&b_share.amount, &usd(5_000));
        assert_money_eq(&b_share.guarantee_top_up, &usd(3_000));
        assert_money_eq(&result.share_for(a).unwrap().amount, &usd(30_000));
        assert_money_eq(&result.merchant_share, &usd(65_000));
        assert_reconciled(&result);
    }

    #[test]
    fn test_rounding_remainder_goes_to_lowest_partner() {
        let low = IdFixtures::partner(1);
        let high = IdFixtures::partner(2);
        // Listed high first so input order cannot decide the tie
        let rules = [
            TestRuleBuilder::percentage(dec!(33.33)).for_partner(high).build(),
            TestRuleBuilder::percentage(dec!(33.33)).for_partner(low).build(),
        ];

        let result = SplitCalculator::default()
            .compute(usd(333), usd(0), usd(0), &rules, TemporalFixtures::mid_year())
            .unwrap();

        assert_money_eq(&result.share_for(low).unwrap().amount, &usd(111));
        assert_money_eq(&result.share_for(high).unwrap().amount, &usd(110));
        assert_money_eq(&result.merchant_share, &usd(112));
        assert_eq!(
            result.partner_total().unwrap().minor_units() + result.merchant_share.minor_units(),
            333
        );
    }

    #[test]
    fn test_guarantee_paying_minimum_does_not_absorb_rounding_cent() {
        let guaranteed = IdFixtures::partner(1);
        let a = IdFixtures::partner(2);
        let b = IdFixtures::partner(3);
        // Exact entitlements 0.6, 100.5 and 100.5: the cent left over once the
        // minimum is paid belongs to the percentage partners
        let rules = [
            TestRuleBuilder::guarantee(usd(500))
                .with_nominal_percentage(dec!(0.06))
                .for_partner(guaranteed)
                .build(),
            TestRuleBuilder::percentage(dec!(10.05)).for_partner(b).build(),
            TestRuleBuilder::percentage(dec!(10.05)).for_partner(a).build(),
        ];

        let result = SplitCalculator::default()
            .compute(usd(1_000), usd(0), usd(0), &rules, TemporalFixtures::mid_year())
            .unwrap();

        let guarantee = result.share_for(guaranteed).unwrap();
        assert_money_eq(&guarantee.amount, &usd(500));
        assert_money_eq(&guarantee.guarantee_top_up, &usd(500));
        assert_money_eq(&result.share_for(a).unwrap().amount, &usd(101));
        assert_money_eq(&result.share_for(b).unwrap().amount, &usd(100));
        assert_money_eq(&result.merchant_share, &usd(299));
        assert_reconciled(&result);
    }

    #[test]
    fn test_guarantee_with_equal_fraction_leaves_percentage_partner_its_floor() {
        let guaranteed = IdFixtures::partner(1);
        let a = IdFixtures::partner(2);
        let rules = [
            TestRuleBuilder::guarantee(usd(200))
                .with_nominal_percentage(dec!(33.33))
                .for_partner(guaranteed)
                .build(),
            TestRuleBuilder::percentage(dec!(33.33)).for_partner(a).build(),
        ];

        let result = SplitCalculator::default()
            .compute(usd(333), usd(0), usd(0), &rules, TemporalFixtures::mid_year())
            .unwrap();

        // 110.9889 alone floors to 110; no cent is handed to the guarantee
        assert_money_eq(&result.share_for(guaranteed).unwrap().amount, &usd(200));
        assert_money_eq(&result.share_for(guaranteed).unwrap().guarantee_top_up, &usd(90));
        assert_money_eq(&result.share_for(a).unwrap().amount, &usd(110));
        assert_money_eq(&result.merchant_share, &usd(23));
    }

    #[test]
    fn test_tax_and_fees_flow_into_net_only() {
        let rules = [TestRuleBuilder::percentage(dec!(10)).build()];

        let result = SplitCalculator::default()
            .compute(usd(50_000), usd(4_000), usd(1_450), &rules, TemporalFixtures::mid_year())
            .unwrap();

        assert_money_eq(&result.partner_shares[0].amount, &usd(5_000));
        assert_money_eq(&result.merchant_share, &usd(45_000));
        assert_money_eq(&result.net_amount, &usd(47_550));
        assert_reconciled(&result);
    }

    #[test]
    fn test_zero_source_yields_zero_shares() {
        let rules = [TestRuleBuilder::percentage(dec!(40)).build()];

        let result = SplitCalculator::default()
            .compute(
                MoneyFixtures::usd_zero(),
                MoneyFixtures::usd_zero(),
                MoneyFixtures::usd_zero(),
                &rules,
                TemporalFixtures::mid_year(),
            )
            .unwrap();

        assert_money_zero(&result.partner_shares[0].amount);
        assert_money_zero(&result.merchant_share);
        assert_reconciled(&result);
    }

    #[test]
    fn test_full_allocation_leaves_merchant_nothing() {
        let rules = [
            TestRuleBuilder::percentage(dec!(60)).build(),
            TestRuleBuilder::percentage(dec!(40)).build(),
        ];

        let result = SplitCalculator::default()
            .compute(usd(12_345), usd(0), usd(0), &rules, TemporalFixtures::mid_year())
            .unwrap();

        assert_money_zero(&result.merchant_share);
        assert_money_eq(&result.partner_total().unwrap(), &usd(12_345));
    }

    #[test]
    fn test_guarantees_squeeze_percentage_rules() {
        let guaranteed = IdFixtures::partner(1);
        let percentage = IdFixtures::partner(2);
        let rules = [
            TestRuleBuilder::guarantee(usd(9_000)).for_partner(guaranteed).build(),
            TestRuleBuilder::percentage(dec!(50)).for_partner(percentage).build(),
        ];

        let result = SplitCalculator::default()
            .compute(usd(10_000), usd(0), usd(0), &rules, TemporalFixtures::mid_year())
            .unwrap();

        assert_money_eq(&result.share_for(guaranteed).unwrap().amount, &usd(9_000));
        assert_money_eq(&result.share_for(percentage).unwrap().amount, &usd(1_000));
        assert!(result.merchant_share.is_zero());
        assert_no_negative_shares(&result);
    }
}

mod rule_selection {
    use super::*;

    #[test]
    fn test_rules_outside_their_period_are_skipped() {
        let expired = TestRuleBuilder::percentage(dec!(20))
            .effective_to(TemporalFixtures::days_after_start(10))
            .build();
        let future = TestRuleBuilder::percentage(dec!(20))
            .effective_from(TemporalFixtures::mid_year() + Duration::days(1))
            .build();
        let current = TestRuleBuilder::percentage(dec!(15)).build();

        let result = SplitCalculator::default()
            .compute(
                usd(10_000),
                usd(0),
                usd(0),
                [&expired, &future, &current],
                TemporalFixtures::mid_year(),
            )
            .unwrap();

        assert_eq!(result.partner_shares.len(), 1);
        assert_eq!(result.partner_shares[0].rule_id, current.id);
    }

    #[test]
    fn test_split_before_any_rule_goes_to_merchant() {
        let rules = [TestRuleBuilder::percentage(dec!(30)).build()];

        let result = SplitCalculator::default()
            .compute(
                MoneyFixtures::usd_1000(),
                MoneyFixtures::usd_zero(),
                MoneyFixtures::usd_zero(),
                &rules,
                TemporalFixtures::before_rules(),
            )
            .unwrap();

        assert!(result.partner_shares.is_empty());
        assert_money_eq(&result.merchant_share, &MoneyFixtures::usd_1000());
        assert_reconciled(&result);
    }

    #[test]
    fn test_over_allocated_rules_are_rejected() {
        let rules = [
            TestRuleBuilder::percentage(dec!(70)).build(),
            TestRuleBuilder::percentage(dec!(40)).build(),
        ];

        let result = SplitCalculator::default().compute(
            usd(10_000),
            usd(0),
            usd(0),
            &rules,
            TemporalFixtures::mid_year(),
        );

        match result {
            Err(RevenueError::InvalidRuleSet { total, .. }) => assert_eq!(total, Some(dec!(110))),
            other => panic!("expected InvalidRuleSet, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_rule_is_rejected() {
        let mut rule = TestRuleBuilder::percentage(dec!(10)).build();
        rule.percentage = None;

        let result = SplitCalculator::default().compute(
            usd(10_000),
            usd(0),
            usd(0),
            [&rule],
            TemporalFixtures::mid_year(),
        );

        assert!(matches!(result, Err(RevenueError::InvalidRuleSet { .. })));
    }

    #[test]
    fn test_negative_source_is_rejected() {
        let result = SplitCalculator::default().compute(
            usd(-1),
            usd(0),
            usd(0),
            std::iter::empty::<&SplitRule>(),
            TemporalFixtures::mid_year(),
        );

        assert!(matches!(
            result,
            Err(RevenueError::NegativeAmount { ref field, .. }) if field == "source_amount"
        ));
    }

    #[test]
    fn test_priority_decides_who_is_capped() {
        let first = IdFixtures::partner(2);
        let second = IdFixtures::partner(1);
        let rules = [
            TestRuleBuilder::guarantee(usd(800)).for_partner(second).with_priority(5).build(),
            TestRuleBuilder::guarantee(usd(800)).for_partner(first).with_priority(1).build(),
        ];

        let result = SplitCalculator::default()
            .compute(usd(1_000), usd(0), usd(0), &rules, TemporalFixtures::mid_year())
            .unwrap();

        assert_money_eq(&result.share_for(first).unwrap().amount, &usd(800));
        assert_money_eq(&result.share_for(second).unwrap().amount, &usd(200));
    }
}

mod fee_policy {
    use super::*;

    #[test]
    fn test_merchant_borne_fees_leave_partners_whole() {
        let partner = IdFixtures::partner(1);
        let rules = [TestRuleBuilder::percentage(dec!(20)).for_partner(partner).build()];

        let result = SplitCalculator::new(FeePolicy::MerchantBorne)
            .compute(usd(10_000), usd(0), usd(500), &rules, TemporalFixtures::mid_year())
            .unwrap();

        let share = result.share_for(partner).unwrap();
        assert_money_eq(&share.amount, &usd(2_000));
        assert!(share.fee_deduction.is_zero());
        assert_money_eq(&result.net_amount, &usd(7_500));
    }

    #[test]
    fn test_proportional_fees_are_apportioned_exactly() {
        let a = IdFixtures::partner(1);
        let b = IdFixtures::partner(2);
        let rules = [
            TestRuleBuilder::percentage(dec!(33.33)).for_partner(a).build(),
            TestRuleBuilder::percentage(dec!(33.33)).for_partner(b).build(),
        ];

        let result = SplitCalculator::new(FeePolicy::ProportionalToPartners)
            .compute(usd(10_000), usd(0), usd(101), &rules, TemporalFixtures::mid_year())
            .unwrap();

        let deductions: i64 = result
            .partner_shares
            .iter()
            .map(|s| s.fee_deduction.minor_units())
            .sum();
        // 101 * 3333 / 10000 = 33.6633 each, floor of the total is 67
        assert_eq!(deductions, 67);
        assert_reconciled(&result);
    }

    #[test]
    fn test_policy_changes_the_split_id() {
        let rules = [TestRuleBuilder::percentage(dec!(20)).build()];
        let at = TemporalFixtures::mid_year();

        let merchant = SplitCalculator::new(FeePolicy::MerchantBorne)
            .compute(usd(10_000), usd(0), usd(100), &rules, at)
            .unwrap();
        let proportional = SplitCalculator::new(FeePolicy::ProportionalToPartners)
            .compute(usd(10_000), usd(0), usd(100), &rules, at)
            .unwrap();

        assert_ne!(merchant.id, proportional.id);
    }
}

mod properties {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::prelude::ToPrimitive;
    use test_utils::{rules_strategy, source_minor_strategy, timestamp_2024_strategy};

    proptest! {
        #[test]
        fn prop_shares_conserve_source(
            source in source_minor_strategy(),
            tax in 0i64..1_000_000,
            fees in 0i64..1_000_000,
            rules in rules_strategy(6),
            proportional in any::<bool>(),
        ) {
            let policy = if proportional {
                FeePolicy::ProportionalToPartners
            } else {
                FeePolicy::MerchantBorne
            };
            let result = SplitCalculator::new(policy)
                .compute(usd(source), usd(tax), usd(fees), &rules, TemporalFixtures::mid_year())
                .unwrap();

            let partners: i64 = result.partner_shares.iter().map(|s| s.amount.minor_units()).sum();
            prop_assert_eq!(result.merchant_share.minor_units() + partners, source);
            prop_assert!(result.is_reconciled());
            prop_assert!(result.partner_shares.iter().all(|s| !s.amount.is_negative()));
            prop_assert!(!result.merchant_share.is_negative());
        }

        #[test]
        fn prop_computation_is_deterministic(
            source in source_minor_strategy(),
            rules in rules_strategy(5),
            at in timestamp_2024_strategy(),
        ) {
            let calculator = SplitCalculator::default();
            let first = calculator.compute(usd(source), usd(0), usd(0), &rules, at).unwrap();
            let second = calculator.compute(usd(source), usd(0), usd(0), &rules, at).unwrap();
            let reversed = calculator
                .compute(usd(source), usd(0), usd(0), rules.iter().rev(), at)
                .unwrap();

            prop_assert_eq!(
                serde_json::to_vec(&first).unwrap(),
                serde_json::to_vec(&second).unwrap()
            );
            prop_assert_eq!(&first, &reversed);
        }

        #[test]
        fn prop_percentage_partners_receive_floor_of_entitlement(
            source in source_minor_strategy(),
            percentages in test_utils::percentage_split_strategy(6),
        ) {
            let rules: Vec<SplitRule> = percentages
                .iter()
                .map(|p| TestRuleBuilder::percentage(*p).build())
                .collect();
            let result = SplitCalculator::default()
                .compute(usd(source), usd(0), usd(0), &rules, TemporalFixtures::mid_year())
                .unwrap();

            let basis_points: i128 = percentages
                .iter()
                .map(|p| (p * dec!(100)).to_i128().unwrap())
                .sum();
            let expected = source as i128 * basis_points / 10_000;
            let partners: i128 = result
                .partner_shares
                .iter()
                .map(|s| s.amount.minor_units() as i128)
                .sum();
            prop_assert_eq!(partners, expected);
        }
    }
}
