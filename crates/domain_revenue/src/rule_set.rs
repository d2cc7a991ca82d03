//! Merchant rule sets
//!
//! A [`SplitRuleSet`] holds every rule a merchant has ever configured.
//! Rules are added and closed, never deleted, so the set doubles as the
//! history of how revenue was meant to be shared at any past instant.
//!
//! # Invariants
//!
//! - At every instant, the percentages of the rules active at that instant
//!   sum to at most 100
//! - Rules are stored sorted by (priority, id)
//! - Every successful mutation records exactly one audit event

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use core_kernel::{Currency, EffectivePeriod, MerchantId, SplitRuleId};
use crate::audit::{AuditAction, AuditEvent, AuditRecorder, EntityType, FieldChange};
use crate::error::RevenueError;
use crate::rule::SplitRule;

/// All split rules configured for one merchant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRuleSet {
    merchant_id: MerchantId,
    currency: Currency,
    rules: Vec<SplitRule>,
    /// Bumped on every mutation, for optimistic concurrency checks
    version: u64,
}

impl SplitRuleSet {
    pub fn new(merchant_id: MerchantId, currency: Currency) -> Self {
        Self {
            merchant_id,
            currency,
            rules: Vec::new(),
            version: 0,
        }
    }

    pub fn merchant_id(&self) -> MerchantId {
        self.merchant_id
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Every rule ever added, ordered by priority then id
    pub fn rules(&self) -> &[SplitRule] {
        &self.rules
    }

    pub fn rule(&self, id: SplitRuleId) -> Option<&SplitRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Rules in effect at `timestamp`, ordered by priority then id
    ///
    /// The iterator is lazy and can be cloned to restart it.
    pub fn active_rules_at(
        &self,
        timestamp: DateTime<Utc>,
    ) -> impl Iterator<Item = &SplitRule> + Clone + '_ {
        self.rules.iter().filter(move |rule| rule.is_active_at(timestamp))
    }

    /// Sum of the percentages of the rules in effect at `timestamp`
    pub fn total_percentage_at(&self, timestamp: DateTime<Utc>) -> Decimal {
        self.active_rules_at(timestamp)
            .map(SplitRule::percentage_value)
            .sum()
    }

    /// Highest total percentage reached at any instant inside `period`
    ///
    /// Totals only rise when a rule starts, so it is enough to look at the
    /// period start and at every rule start falling inside the period.
    pub fn peak_percentage_within(&self, period: &EffectivePeriod) -> Decimal {
        std::iter::once(period.start)
            .chain(
                self.rules
                    .iter()
                    .filter(|r| r.active && period.contains(r.effective_from))
                    .map(|r| r.effective_from),
            )
            .map(|instant| self.total_percentage_at(instant))
            .max()
            .unwrap_or(Decimal::ZERO)
    }

    /// Adds a rule to the set
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the rule is malformed, reuses an id, would
    /// push the active percentage above 100% at some instant of its period,
    /// or starts before an overlapping active rule for the same partner.
    /// The set and the audit log are untouched on failure.
    pub fn add_rule(
        &mut self,
        rule: SplitRule,
        actor: &str,
        at: DateTime<Utc>,
        recorder: &mut AuditRecorder,
    ) -> Result<&SplitRule, RevenueError> {
        rule.validate(self.currency)?;

        if self.rule(rule.id).is_some() {
            return Err(RevenueError::validation(
                "id",
                format!("rule {} already exists", rule.id),
            ));
        }

        if rule.active {
            if let Some(existing) = self.rules.iter().find(|r| {
                r.partner_id == rule.partner_id
                    && r.overlaps(&rule)
                    && rule.effective_from < r.effective_from
            }) {
                return Err(RevenueError::validation(
                    "effective_from",
                    format!(
                        "rule starts at {} before overlapping rule {} for partner {} (starts {})",
                        rule.effective_from, existing.id, rule.partner_id, existing.effective_from
                    ),
                ));
            }

            if !rule.percentage_value().is_zero() {
                let peak = self.peak_percentage_within(&rule.period()?);
                let total = peak + rule.percentage_value();
                if total > dec!(100) {
                    return Err(RevenueError::over_allocated(total));
                }
            }
        }

        let event = AuditEvent::new(
            EntityType::SplitRule,
            rule.id,
            AuditAction::Created,
            actor,
            at,
        )
        .with_changes([
            FieldChange::set("merchant_id", json!(self.merchant_id)),
            FieldChange::set("partner_id", json!(rule.partner_id)),
            FieldChange::set("kind", json!(rule.kind)),
            FieldChange::set("percentage", json!(rule.percentage)),
            FieldChange::set("minimum_amount", json!(rule.minimum_amount)),
            FieldChange::set("priority", json!(rule.priority)),
            FieldChange::set("effective_from", json!(rule.effective_from)),
            FieldChange::set("effective_to", json!(rule.effective_to)),
            FieldChange::set("active", json!(rule.active)),
        ]);
        recorder.record(event)?;

        info!(
            merchant_id = %self.merchant_id,
            rule_id = %rule.id,
            partner_id = %rule.partner_id,
            kind = ?rule.kind,
            "Split rule added"
        );

        let key = rule.ordering_key();
        let position = self.rules.partition_point(|r| r.ordering_key() < key);
        self.rules.insert(position, rule);
        self.version += 1;

        Ok(&self.rules[position])
    }

    /// Ends a rule's effect at `effective_to`
    ///
    /// The rule stays in the set so past splits remain explainable. Closing
    /// a rule at or before its start withdraws it entirely.
    ///
    /// # Errors
    ///
    /// - `RuleNotFound` if the rule does not exist
    /// - `Validation` if the rule is already withdrawn or already ends at or
    ///   before `effective_to`
    pub fn deactivate_rule(
        &mut self,
        rule_id: SplitRuleId,
        effective_to: DateTime<Utc>,
        actor: &str,
        at: DateTime<Utc>,
        recorder: &mut AuditRecorder,
    ) -> Result<&SplitRule, RevenueError> {
        let index = self
            .rules
            .iter()
            .position(|r| r.id == rule_id)
            .ok_or(RevenueError::RuleNotFound(rule_id))?;
        let rule = &self.rules[index];

        if !rule.active {
            return Err(RevenueError::validation(
                "active",
                format!("rule {} is already inactive", rule_id),
            ));
        }
        if let Some(current_end) = rule.effective_to {
            if current_end <= effective_to {
                return Err(RevenueError::validation(
                    "effective_to",
                    format!("rule {} already ends at {}", rule_id, current_end),
                ));
            }
        }

        let withdrawn = effective_to <= rule.effective_from;
        let closed_end = if withdrawn {
            Some(effective_to)
        } else {
            let mut period = rule.period()?;
            period.close_at(effective_to)?;
            period.end
        };
        let event = AuditEvent::new(
            EntityType::SplitRule,
            rule_id,
            AuditAction::Updated,
            actor,
            at,
        )
        .with_changes([
            FieldChange::new("effective_to", json!(rule.effective_to), json!(closed_end)),
            FieldChange::new("active", json!(rule.active), json!(!withdrawn)),
        ]);
        recorder.record(event)?;

        let rule = &mut self.rules[index];
        rule.effective_to = closed_end;
        if withdrawn {
            rule.active = false;
        }
        self.version += 1;

        info!(
            merchant_id = %self.merchant_id,
            rule_id = %rule_id,
            effective_to = %effective_to,
            withdrawn,
            "Split rule deactivated"
        );

        Ok(&self.rules[index])
    }
}
