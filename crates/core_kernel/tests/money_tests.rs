//! Unit tests for the Money module
//!
//! Tests cover money creation, checked arithmetic, percentages,
//! remainder apportionment and currency handling.

use core_kernel::{apportion, Currency, Money, MoneyError, Percentage};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_from_minor_keeps_exact_units() {
        let m = Money::from_minor(100_000, Currency::USD);
        assert_eq!(m.minor_units(), 100_000);
        assert_eq!(m.currency(), Currency::USD);
    }

    #[test]
    fn test_to_major_respects_currency_decimals() {
        assert_eq!(Money::from_minor(10050, Currency::USD).to_major(), dec!(100.50));
        assert_eq!(Money::from_minor(10000, Currency::JPY).to_major(), dec!(10000));
    }

    #[test]
    fn test_zero_creates_zero_amount() {
        let m = Money::zero(Currency::EUR);
        assert!(m.is_zero());
        assert_eq!(m.currency(), Currency::EUR);
    }

    #[test]
    fn test_negative_amounts_are_allowed() {
        let m = Money::from_minor(-500, Currency::USD);
        assert!(m.is_negative());
        assert!(!m.is_positive());
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_sub_can_go_negative() {
        let a = Money::from_minor(100, Currency::USD);
        let b = Money::from_minor(250, Currency::USD);
        assert_eq!(a.checked_sub(&b).unwrap().minor_units(), -150);
    }

    #[test]
    fn test_checked_neg_overflow() {
        let min = Money::from_minor(i64::MIN, Currency::USD);
        assert_eq!(min.checked_neg(), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_try_sum_rejects_mixed_currencies() {
        let amounts = [
            Money::from_minor(100, Currency::USD),
            Money::from_minor(100, Currency::GBP),
        ];
        let result = Money::try_sum(&amounts, Currency::USD);
        assert!(matches!(result, Err(MoneyError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn test_try_sum_of_empty_is_zero() {
        let total = Money::try_sum(&[], Currency::USD).unwrap();
        assert!(total.is_zero());
    }
}

mod display {
    use super::*;

    #[test]
    fn test_display_formats_major_units() {
        assert_eq!(Money::from_minor(100_000, Currency::USD).to_string(), "$ 1000.00");
        assert_eq!(Money::from_minor(5, Currency::USD).to_string(), "$ 0.05");
    }

    #[test]
    fn test_currency_parses_case_insensitively() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::USD);
        assert!(matches!("XYZ".parse::<Currency>(), Err(MoneyError::UnknownCurrency(_))));
    }
}

mod percentages {
    use super::*;

    #[test]
    fn test_thirty_percent_of_one_thousand_dollars() {
        let share = Percentage::new(dec!(30)).unwrap().of_minor(100_000).unwrap();
        assert_eq!(share.whole, 30_000);
        assert_eq!(share.fraction, Decimal::ZERO);
    }

    #[test]
    fn test_negative_base_is_rejected() {
        let result = Percentage::new(dec!(10)).unwrap().of_minor(-1);
        assert!(matches!(result, Err(MoneyError::InvalidAmount(_))));
    }

    #[test]
    fn test_percentage_serializes_as_decimal() {
        let p = Percentage::new(dec!(12.5)).unwrap();
        let json = serde_json::to_string(&p).unwrap();
        let back: Percentage = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn test_out_of_range_percentage_fails_deserialization() {
        let result: Result<Percentage, _> = serde_json::from_str("\"150\"");
        assert!(result.is_err());
    }
}

mod apportionment {
    use super::*;

    #[test]
    fn test_whole_entitlements_are_untouched() {
        let amounts = apportion(&[(1, dec!(300)), (2, dec!(200))]).unwrap();
        assert_eq!(amounts, vec![300, 200]);
    }

    #[test]
    fn test_largest_fraction_wins_extra_unit() {
        let amounts = apportion(&[(1, dec!(10.2)), (2, dec!(10.9)), (3, dec!(10.9))]).unwrap();
        // total 32.0 -> two extra units, both .9 entries get one
        assert_eq!(amounts, vec![10, 11, 11]);
    }

    #[test]
    fn test_negative_entitlement_is_rejected() {
        let result = apportion(&[(1, dec!(-1))]);
        assert!(matches!(result, Err(MoneyError::InvalidAmount(_))));
    }
}
