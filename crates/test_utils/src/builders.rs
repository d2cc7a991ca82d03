//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.

use chrono::{DateTime, Utc};
use core_kernel::{Currency, Money, PartnerId, Percentage, SplitRuleId};
use domain_revenue::{RuleKind, SplitRequest, SplitRule, SplitRuleSet};
use rust_decimal::Decimal;

use crate::fixtures::{IdFixtures, MoneyFixtures, TemporalFixtures};

/// Builder for split rules
pub struct TestRuleBuilder {
    id: Option<SplitRuleId>,
    partner_id: PartnerId,
    kind: RuleKind,
    percentage: Option<Percentage>,
    minimum_amount: Option<Money>,
    priority: i32,
    effective_from: DateTime<Utc>,
    effective_to: Option<DateTime<Utc>>,
}

impl TestRuleBuilder {
    /// A percentage rule for a fresh partner, effective from the standard start
    pub fn percentage(value: Decimal) -> Self {
        Self {
            id: None,
            partner_id: PartnerId::new(),
            kind: RuleKind::Percentage,
            percentage: Some(crate::fixtures::pct(value)),
            minimum_amount: None,
            priority: 0,
            effective_from: TemporalFixtures::rules_start(),
            effective_to: None,
        }
    }

    /// A minimum-guarantee rule for a fresh partner
    pub fn guarantee(minimum: Money) -> Self {
        Self {
            kind: RuleKind::MinimumGuarantee,
            percentage: None,
            minimum_amount: Some(minimum),
            ..Self::percentage(Decimal::ZERO)
        }
    }

    pub fn with_id(mut self, id: SplitRuleId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn for_partner(mut self, partner_id: PartnerId) -> Self {
        self.partner_id = partner_id;
        self
    }

    /// Uses the ordered fixture partner `n`
    pub fn for_fixture_partner(self, n: u128) -> Self {
        self.for_partner(IdFixtures::partner(n))
    }

    pub fn with_nominal_percentage(mut self, value: Decimal) -> Self {
        self.percentage = Some(crate::fixtures::pct(value));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn effective_from(mut self, from: DateTime<Utc>) -> Self {
        self.effective_from = from;
        self
    }

    pub fn effective_to(mut self, to: DateTime<Utc>) -> Self {
        self.effective_to = Some(to);
        self
    }

    pub fn build(self) -> SplitRule {
        let mut rule = match (self.kind, self.minimum_amount) {
            (RuleKind::MinimumGuarantee, Some(minimum)) => {
                SplitRule::minimum_guarantee(self.partner_id, minimum, self.effective_from)
            }
            _ => SplitRule::percentage(
                self.partner_id,
                self.percentage.unwrap_or_else(Percentage::zero),
                self.effective_from,
            ),
        };
        rule.percentage = self.percentage;
        rule.priority = self.priority;
        rule.effective_to = self.effective_to;
        if let Some(id) = self.id {
            rule.id = id;
        }
        rule
    }
}

/// Builder for split requests
pub struct TestSplitRequestBuilder {
    source_amount: Money,
    tax: Option<Money>,
    fees: Option<Money>,
    at: DateTime<Utc>,
    reference: Option<String>,
}

impl Default for TestSplitRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSplitRequestBuilder {
    /// $1000.00 at mid-year with no tax or fees
    pub fn new() -> Self {
        Self {
            source_amount: MoneyFixtures::usd_1000(),
            tax: None,
            fees: None,
            at: TemporalFixtures::mid_year(),
            reference: None,
        }
    }

    pub fn with_source(mut self, source: Money) -> Self {
        self.source_amount = source;
        self
    }

    pub fn with_tax(mut self, tax: Money) -> Self {
        self.tax = Some(tax);
        self
    }

    pub fn with_fees(mut self, fees: Money) -> Self {
        self.fees = Some(fees);
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn build(self) -> SplitRequest {
        let mut request = SplitRequest::new(self.source_amount, self.at);
        if let Some(tax) = self.tax {
            request = request.with_tax(tax);
        }
        if let Some(fees) = self.fees {
            request = request.with_fees(fees);
        }
        if let Some(reference) = self.reference {
            request = request.with_reference(reference);
        }
        request
    }
}

/// Creates an empty USD rule set for a fresh merchant
pub fn empty_rule_set() -> SplitRuleSet {
    SplitRuleSet::new(IdFixtures::merchant_id(), Currency::USD)
}
