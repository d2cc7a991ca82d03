//! Split rules
//!
//! A rule entitles one partner to part of a merchant's revenue, either as a
//! straight percentage of the gross amount or as a minimum guarantee that
//! tops up a (possibly zero) nominal percentage to a floor amount.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, EffectivePeriod, Money, PartnerId, Percentage, SplitRuleId};
use crate::error::RevenueError;

/// How a rule's entitlement is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Percentage,
    MinimumGuarantee,
}

/// A partner's entitlement to a share of revenue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRule {
    pub id: SplitRuleId,
    pub partner_id: PartnerId,
    pub kind: RuleKind,
    /// Required for percentage rules, optional nominal rate for guarantees
    pub percentage: Option<Percentage>,
    /// Required for minimum-guarantee rules
    pub minimum_amount: Option<Money>,
    /// Lower values are applied first
    pub priority: i32,
    pub effective_from: DateTime<Utc>,
    /// Exclusive end, None while the rule is open-ended
    pub effective_to: Option<DateTime<Utc>>,
    /// False once the rule has been withdrawn before it ever took effect
    pub active: bool,
}

impl SplitRule {
    /// Creates a percentage rule effective from the given instant
    pub fn percentage(
        partner_id: PartnerId,
        percentage: Percentage,
        effective_from: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SplitRuleId::new_v7(),
            partner_id,
            kind: RuleKind::Percentage,
            percentage: Some(percentage),
            minimum_amount: None,
            priority: 0,
            effective_from,
            effective_to: None,
            active: true,
        }
    }

    /// Creates a minimum-guarantee rule effective from the given instant
    pub fn minimum_guarantee(
        partner_id: PartnerId,
        minimum_amount: Money,
        effective_from: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SplitRuleId::new_v7(),
            partner_id,
            kind: RuleKind::MinimumGuarantee,
            percentage: None,
            minimum_amount: Some(minimum_amount),
            priority: 0,
            effective_from,
            effective_to: None,
            active: true,
        }
    }

    pub fn with_id(mut self, id: SplitRuleId) -> Self {
        self.id = id;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the nominal percentage a guarantee is compared against
    pub fn with_nominal_percentage(mut self, percentage: Percentage) -> Self {
        self.percentage = Some(percentage);
        self
    }

    pub fn effective_until(mut self, effective_to: DateTime<Utc>) -> Self {
        self.effective_to = Some(effective_to);
        self
    }

    /// The rule's effective interval, rejecting an empty or inverted one
    pub fn period(&self) -> Result<EffectivePeriod, RevenueError> {
        Ok(EffectivePeriod::new(self.effective_from, self.effective_to)?)
    }

    /// The rule's effective interval as stored, without validation
    pub fn span(&self) -> EffectivePeriod {
        EffectivePeriod {
            start: self.effective_from,
            end: self.effective_to,
        }
    }

    /// True when the rule applies at `timestamp`
    pub fn is_active_at(&self, timestamp: DateTime<Utc>) -> bool {
        self.active && self.span().contains(timestamp)
    }

    /// True when both rules are active over some common instant
    pub fn overlaps(&self, other: &SplitRule) -> bool {
        self.active && other.active && self.span().overlaps(&other.span())
    }

    /// The percentage counted against the 100% cap (zero when none)
    pub fn percentage_value(&self) -> Decimal {
        self.percentage.map_or(Decimal::ZERO, |p| p.value())
    }

    /// Sort key used everywhere rules are ordered
    pub fn ordering_key(&self) -> (i32, SplitRuleId) {
        (self.priority, self.id)
    }

    /// Checks the rule is well formed for a rule set in `currency`
    pub fn validate(&self, currency: Currency) -> Result<(), RevenueError> {
        match self.kind {
            RuleKind::Percentage => {
                if self.percentage.is_none() {
                    return Err(RevenueError::validation(
                        "percentage",
                        "percentage rule requires a percentage",
                    ));
                }
                if self.minimum_amount.is_some() {
                    return Err(RevenueError::validation(
                        "minimum_amount",
                        "percentage rule cannot carry a minimum amount",
                    ));
                }
            }
            RuleKind::MinimumGuarantee => {
                let minimum = self.minimum_amount.ok_or_else(|| {
                    RevenueError::validation(
                        "minimum_amount",
                        "minimum-guarantee rule requires a minimum amount",
                    )
                })?;
                if minimum.currency() != currency {
                    return Err(RevenueError::currency_mismatch(currency, minimum.currency()));
                }
                if minimum.is_negative() {
                    return Err(RevenueError::validation(
                        "minimum_amount",
                        format!("minimum amount must be non-negative, got {}", minimum),
                    ));
                }
            }
        }

        self.period()?;
        Ok(())
    }
}
