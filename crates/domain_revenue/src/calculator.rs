//! Split calculation
//!
//! Distributes a gross amount between partners and the merchant.
//!
//! # Algorithm
//!
//! 1. Percentages are always taken of the gross source amount (pre-tax,
//!    pre-fee).
//! 2. Minimum-guarantee rules are served first, by priority. A guaranteed
//!    partner receives `max(minimum, nominal percentage)`; the top-up comes
//!    out of the merchant's residual.
//! 3. Percentage rules follow, by priority, each drawn from whatever is
//!    still unallocated. A share the pool can no longer cover is capped.
//! 4. Rounding: partners paid from a percentage collectively receive the
//!    floor of their exact entitlements, the odd cents going to the largest
//!    fractional remainders (ties to the lowest partner id). Guarantees that
//!    pay their minimum take no part in the rounding.
//! 5. `merchant_share = source - Σ partner amounts`
//! 6. `net_amount = source + tax - fees - Σ partner amounts`

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use core_kernel::{
    apportion, Currency, Money, MoneyError, PartnerId, Percentage, PercentageShare, SplitResultId,
    SplitRuleId,
};
use crate::error::RevenueError;
use crate::rule::{RuleKind, SplitRule};

/// Who carries the processing fees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeePolicy {
    /// Fees only reduce the merchant's net amount
    #[default]
    MerchantBorne,
    /// Each partner carries fees in proportion to its share of the source
    ProportionalToPartners,
}

/// One partner's allocation under one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerShare {
    pub partner_id: PartnerId,
    pub rule_id: SplitRuleId,
    pub kind: RuleKind,
    pub amount: Money,
    /// Nominal percentage of the rule (zero for a pure guarantee)
    pub percentage: Percentage,
    /// Portion of `amount` paid beyond the straight percentage
    pub guarantee_top_up: Money,
    /// Fees charged against this share before payout
    pub fee_deduction: Money,
}

/// A reconciled split of one source amount
///
/// Results are immutable values. Adjustments produce a new revision with
/// the same `id`; earlier revisions are kept by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResult {
    pub id: SplitResultId,
    pub revision: u32,
    pub source_amount: Money,
    pub tax: Money,
    pub fees: Money,
    pub merchant_share: Money,
    pub partner_shares: Vec<PartnerShare>,
    /// Sum of merchant-level adjustments applied to `net_amount`
    pub net_adjustment: Money,
    pub net_amount: Money,
    pub computed_at: DateTime<Utc>,
    pub adjusted_at: Option<DateTime<Utc>>,
}

impl SplitResult {
    pub fn currency(&self) -> Currency {
        self.source_amount.currency()
    }

    /// Sum of all partner amounts
    pub fn partner_total(&self) -> Result<Money, RevenueError> {
        Ok(Money::try_sum(
            self.partner_shares.iter().map(|s| &s.amount),
            self.currency(),
        )?)
    }

    /// The first share allocated to `partner_id`
    pub fn share_for(&self, partner_id: PartnerId) -> Option<&PartnerShare> {
        self.partner_shares.iter().find(|s| s.partner_id == partner_id)
    }

    /// Binds the result to an external reference (invoice, transaction)
    ///
    /// Two sales with identical amounts at the same instant would otherwise
    /// share an id. The new id is still fully determined by the inputs.
    pub fn for_reference(mut self, reference: &str) -> Self {
        self.id = SplitResultId::derive(format!("{}|{}", reference, self.id).as_bytes());
        self
    }

    /// Checks both conservation identities exactly
    ///
    /// - `merchant_share + Σ partners == source_amount`
    /// - `net_amount == source + tax - fees - Σ partners + net_adjustment`
    pub fn is_reconciled(&self) -> bool {
        let partners: i128 = self
            .partner_shares
            .iter()
            .map(|s| s.amount.minor_units() as i128)
            .sum();
        let source = self.source_amount.minor_units() as i128;
        let expected_net = source + self.tax.minor_units() as i128
            - self.fees.minor_units() as i128
            - partners
            + self.net_adjustment.minor_units() as i128;

        self.merchant_share.minor_units() as i128 + partners == source
            && self.net_amount.minor_units() as i128 == expected_net
    }
}

/// Computes splits under a fee policy
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitCalculator {
    fee_policy: FeePolicy,
}

impl SplitCalculator {
    pub fn new(fee_policy: FeePolicy) -> Self {
        Self { fee_policy }
    }

    pub fn fee_policy(&self) -> FeePolicy {
        self.fee_policy
    }

    /// Computes the split of `source_amount` under `rules` at `timestamp`
    ///
    /// Rules not in effect at `timestamp` are ignored. The result is fully
    /// determined by the inputs, including its id.
    ///
    /// # Errors
    ///
    /// - `CurrencyMismatch` if tax or fees are in another currency
    /// - `NegativeAmount` if any input amount is negative
    /// - `InvalidRuleSet` if a rule is malformed or the active percentages
    ///   exceed 100%
    pub fn compute<'a, I>(
        &self,
        source_amount: Money,
        tax: Money,
        fees: Money,
        rules: I,
        timestamp: DateTime<Utc>,
    ) -> Result<SplitResult, RevenueError>
    where
        I: IntoIterator<Item = &'a SplitRule>,
    {
        let currency = source_amount.currency();
        for amount in [tax, fees] {
            if amount.currency() != currency {
                return Err(RevenueError::currency_mismatch(currency, amount.currency()));
            }
        }
        for (field, amount) in [("source_amount", source_amount), ("tax", tax), ("fees", fees)] {
            if amount.is_negative() {
                return Err(RevenueError::NegativeAmount {
                    field: field.to_string(),
                    amount,
                });
            }
        }

        let mut active: Vec<&SplitRule> = rules
            .into_iter()
            .filter(|rule| {
                let in_effect = rule.is_active_at(timestamp);
                if !in_effect {
                    debug!(rule_id = %rule.id, %timestamp, "Skipping rule not in effect");
                }
                in_effect
            })
            .collect();

        for rule in &active {
            rule.validate(currency).map_err(|err| {
                RevenueError::invalid_rule_set(format!("rule {}: {}", rule.id, err))
            })?;
        }

        let total: Decimal = active.iter().map(|r| r.percentage_value()).sum();
        if total > dec!(100) {
            return Err(RevenueError::InvalidRuleSet {
                reason: format!("active percentages total {}%, exceeding 100%", total),
                total: Some(total),
            });
        }

        active.sort_by_key(|r| (r.kind != RuleKind::MinimumGuarantee, r.priority, r.id));

        let base = source_amount.minor_units();
        let shares = active
            .iter()
            .map(|rule| {
                let share = rule.percentage.unwrap_or_else(Percentage::zero).of_minor(base)?;
                Ok((*rule, share, pays_minimum(rule, &share)))
            })
            .collect::<Result<Vec<_>, RevenueError>>()?;

        // Guarantees paying their minimum stay out of the rounding so the odd
        // cents land on shares that are paid from a percentage
        let entitlements: Vec<_> = shares
            .iter()
            .filter(|(_, _, minimum_paid)| !minimum_paid)
            .map(|(rule, share, _)| ((rule.partner_id, rule.id), share.exact()))
            .collect();
        let mut rounded = apportion(&entitlements)?.into_iter();

        let mut remaining = base;
        let mut partner_shares = Vec::with_capacity(shares.len());
        for (rule, share, minimum_paid) in &shares {
            let (entitled, percentage_amount) = if *minimum_paid {
                (rule.minimum_amount.map_or(0, |m| m.minor_units()), share.whole)
            } else {
                let amount = rounded.next().unwrap_or(share.whole);
                (amount, amount)
            };

            let amount = entitled.min(remaining);
            if amount < entitled {
                warn!(
                    rule_id = %rule.id,
                    partner_id = %rule.partner_id,
                    entitled,
                    allocated = amount,
                    "Share capped by remaining unallocated amount"
                );
            }
            remaining -= amount;

            partner_shares.push(PartnerShare {
                partner_id: rule.partner_id,
                rule_id: rule.id,
                kind: rule.kind,
                amount: Money::from_minor(amount, currency),
                percentage: rule.percentage.unwrap_or_else(Percentage::zero),
                guarantee_top_up: Money::from_minor((amount - percentage_amount).max(0), currency),
                fee_deduction: Money::zero(currency),
            });
        }

        if self.fee_policy == FeePolicy::ProportionalToPartners {
            charge_fees_to_partners(&mut partner_shares, source_amount, fees)?;
        }

        let partner_total = Money::try_sum(partner_shares.iter().map(|s| &s.amount), currency)?;
        let merchant_share = source_amount.checked_sub(&partner_total)?;
        let net_amount = source_amount
            .checked_add(&tax)?
            .checked_sub(&fees)?
            .checked_sub(&partner_total)?;

        let canonical =
            canonical_input(source_amount, tax, fees, &active, timestamp, self.fee_policy);
        let id = SplitResultId::derive(canonical.as_bytes());

        debug!(
            split_id = %id,
            source = %source_amount,
            partners = partner_shares.len(),
            merchant_share = %merchant_share,
            net_amount = %net_amount,
            "Split computed"
        );

        Ok(SplitResult {
            id,
            revision: 0,
            source_amount,
            tax,
            fees,
            merchant_share,
            partner_shares,
            net_adjustment: Money::zero(currency),
            net_amount,
            computed_at: timestamp,
            adjusted_at: None,
        })
    }
}

/// True when a guarantee rule pays its minimum rather than its percentage
///
/// A minimum at or above the exact percentage entitlement wins; below it,
/// the minimum is also at or below the floored percentage.
fn pays_minimum(rule: &SplitRule, share: &PercentageShare) -> bool {
    match (rule.kind, rule.minimum_amount) {
        (RuleKind::MinimumGuarantee, Some(minimum)) => {
            Decimal::from(minimum.minor_units()) >= share.exact()
        }
        _ => false,
    }
}

/// Deducts each partner's proportional part of the fees from its share
fn charge_fees_to_partners(
    shares: &mut [PartnerShare],
    source_amount: Money,
    fees: Money,
) -> Result<(), RevenueError> {
    if fees.is_zero() || source_amount.is_zero() {
        return Ok(());
    }

    // Integer division first keeps large amounts inside Decimal's range
    let source_minor = i128::from(source_amount.minor_units());
    let burdens = shares
        .iter()
        .map(|share| {
            let scaled = i128::from(fees.minor_units()) * i128::from(share.amount.minor_units());
            let whole = i64::try_from(scaled / source_minor).map_err(|_| MoneyError::Overflow)?;
            let remainder =
                i64::try_from(scaled % source_minor).map_err(|_| MoneyError::Overflow)?;
            let exact = Decimal::from(remainder)
                .checked_div(Decimal::from(source_amount.minor_units()))
                .and_then(|fraction| fraction.checked_add(Decimal::from(whole)))
                .ok_or(MoneyError::Overflow)?;
            Ok(((share.partner_id, share.rule_id), exact))
        })
        .collect::<Result<Vec<_>, RevenueError>>()?;

    for (share, burden) in shares.iter_mut().zip(apportion(&burdens)?) {
        let deduction = burden.min(share.amount.minor_units());
        let currency = share.amount.currency();
        share.amount = Money::from_minor(share.amount.minor_units() - deduction, currency);
        share.fee_deduction = Money::from_minor(deduction, currency);
    }

    Ok(())
}

/// Stable textual encoding of everything that influences a split
fn canonical_input(
    source_amount: Money,
    tax: Money,
    fees: Money,
    rules: &[&SplitRule],
    timestamp: DateTime<Utc>,
    fee_policy: FeePolicy,
) -> String {
    let mut encoded = format!(
        "{}|{}|{}|{}|{:?}|{}",
        source_amount.currency(),
        source_amount.minor_units(),
        tax.minor_units(),
        fees.minor_units(),
        fee_policy,
        timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
    );
    for rule in rules {
        encoded.push_str(&format!(
            "|{}:{}:{:?}:{}:{}:{}",
            rule.id,
            rule.partner_id,
            rule.kind,
            rule.percentage_value(),
            rule.minimum_amount.map_or(0, |m| m.minor_units()),
            rule.priority,
        ));
    }
    encoded
}
