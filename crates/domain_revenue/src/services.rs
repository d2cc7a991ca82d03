//! Revenue split service
//!
//! Orchestrates rule sets, the calculator, the ledger and the audit log for
//! many merchants. Every entry point checks the caller's capability first,
//! then delegates to the core.
//!
//! The service is a plain value with no interior locking. Callers that
//! share it across threads must serialize mutations per merchant, or use
//! the `expected_version` check on rule set mutations to detect a lost
//! update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;

use core_kernel::{Currency, MerchantId, Money, SplitResultId, SplitRuleId};
use crate::adjustment::{Adjustment, SplitLedger};
use crate::audit::{AuditEvent, AuditQuery, AuditRecorder};
use crate::calculator::{SplitCalculator, SplitResult};
use crate::capability::{Actor, Capability, CapabilityCheck, RoleCapabilities};
use crate::config::SplitEngineConfig;
use crate::error::RevenueError;
use crate::rule::SplitRule;
use crate::rule_set::SplitRuleSet;

/// Inputs for splitting one transaction or period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRequest {
    pub source_amount: Money,
    pub tax: Money,
    pub fees: Money,
    /// Instant used to pick the rules in effect
    pub at: DateTime<Utc>,
    /// External reference (invoice or transaction number)
    pub reference: Option<String>,
}

impl SplitRequest {
    pub fn new(source_amount: Money, at: DateTime<Utc>) -> Self {
        let currency = source_amount.currency();
        Self {
            source_amount,
            tax: Money::zero(currency),
            fees: Money::zero(currency),
            at,
            reference: None,
        }
    }

    pub fn with_tax(mut self, tax: Money) -> Self {
        self.tax = tax;
        self
    }

    pub fn with_fees(mut self, fees: Money) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Entry point for callers of the split engine
#[derive(Debug)]
pub struct RevenueSplitService<C = RoleCapabilities> {
    config: SplitEngineConfig,
    calculator: SplitCalculator,
    capabilities: C,
    rule_sets: HashMap<MerchantId, SplitRuleSet>,
    ledger: SplitLedger,
    audit: AuditRecorder,
}

impl RevenueSplitService<RoleCapabilities> {
    /// Creates a service using the standard role matrix
    pub fn with_config(config: SplitEngineConfig) -> Self {
        Self::new(config, RoleCapabilities)
    }
}

impl<C: CapabilityCheck> RevenueSplitService<C> {
    pub fn new(config: SplitEngineConfig, capabilities: C) -> Self {
        Self {
            calculator: SplitCalculator::new(config.fee_policy),
            config,
            capabilities,
            rule_sets: HashMap::new(),
            ledger: SplitLedger::new(),
            audit: AuditRecorder::new(),
        }
    }

    pub fn config(&self) -> &SplitEngineConfig {
        &self.config
    }

    /// Opens (or returns the existing) rule set for a merchant
    pub fn open_rule_set(
        &mut self,
        actor: &Actor,
        merchant_id: MerchantId,
        currency: Option<Currency>,
    ) -> Result<&SplitRuleSet, RevenueError> {
        self.capabilities.authorize(actor, Capability::ManageRules)?;

        let currency = currency.unwrap_or(self.config.default_currency);
        let rule_set = self
            .rule_sets
            .entry(merchant_id)
            .or_insert_with(|| SplitRuleSet::new(merchant_id, currency));
        if rule_set.currency() != currency {
            return Err(RevenueError::currency_mismatch(rule_set.currency(), currency));
        }
        Ok(rule_set)
    }

    #[instrument(skip(self, rule), fields(actor_id = %actor.id, rule_id = %rule.id))]
    pub fn add_rule(
        &mut self,
        actor: &Actor,
        merchant_id: MerchantId,
        rule: SplitRule,
        expected_version: Option<u64>,
    ) -> Result<&SplitRule, RevenueError> {
        self.capabilities.authorize(actor, Capability::ManageRules)?;
        let at = self.now();

        let rule_set =
            Self::rule_set_for_update(&mut self.rule_sets, merchant_id, expected_version)?;
        rule_set.add_rule(rule, &actor.id, at, &mut self.audit)
    }

    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub fn deactivate_rule(
        &mut self,
        actor: &Actor,
        merchant_id: MerchantId,
        rule_id: SplitRuleId,
        effective_to: DateTime<Utc>,
        expected_version: Option<u64>,
    ) -> Result<&SplitRule, RevenueError> {
        self.capabilities.authorize(actor, Capability::ManageRules)?;
        let at = self.now();

        let rule_set =
            Self::rule_set_for_update(&mut self.rule_sets, merchant_id, expected_version)?;
        rule_set.deactivate_rule(rule_id, effective_to, &actor.id, at, &mut self.audit)
    }

    /// Computes a split without recording it
    pub fn preview_split(
        &self,
        actor: &Actor,
        merchant_id: MerchantId,
        request: &SplitRequest,
    ) -> Result<SplitResult, RevenueError> {
        self.capabilities.authorize(actor, Capability::ComputeSplits)?;

        let rule_set = self
            .rule_sets
            .get(&merchant_id)
            .ok_or(RevenueError::UnknownMerchant(merchant_id))?;
        if request.source_amount.currency() != rule_set.currency() {
            return Err(RevenueError::currency_mismatch(
                rule_set.currency(),
                request.source_amount.currency(),
            ));
        }

        let result = self.calculator.compute(
            request.source_amount,
            request.tax,
            request.fees,
            rule_set.active_rules_at(request.at),
            request.at,
        )?;
        Ok(match &request.reference {
            Some(reference) => result.for_reference(reference),
            None => result,
        })
    }

    /// Computes a split and records it in the ledger
    #[instrument(
        skip(self, request),
        fields(actor_id = %actor.id, source = %request.source_amount)
    )]
    pub fn compute_split(
        &mut self,
        actor: &Actor,
        merchant_id: MerchantId,
        request: &SplitRequest,
    ) -> Result<&SplitResult, RevenueError> {
        let result = self.preview_split(actor, merchant_id, request)?;
        let at = self.now();
        self.ledger.record_computed(result, &actor.id, at, &mut self.audit)
    }

    /// Applies an adjustment on behalf of `actor`
    #[instrument(
        skip(self, adjustment),
        fields(actor_id = %actor.id, adjustment_id = %adjustment.id)
    )]
    pub fn apply_adjustment(
        &mut self,
        actor: &Actor,
        split_result_id: SplitResultId,
        mut adjustment: Adjustment,
    ) -> Result<&SplitResult, RevenueError> {
        self.capabilities.authorize(actor, Capability::ApplyAdjustments)?;

        adjustment.applied_by = actor.id.clone();
        adjustment.applied_at = self.now();
        self.ledger.apply_adjustment(split_result_id, adjustment, &mut self.audit)
    }

    /// Marks a split as paid out
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub fn finalize(
        &mut self,
        actor: &Actor,
        split_result_id: SplitResultId,
    ) -> Result<&SplitResult, RevenueError> {
        self.capabilities.authorize(actor, Capability::FinalizeSplits)?;
        let at = self.now();
        self.ledger.finalize(split_result_id, &actor.id, at, &mut self.audit)
    }

    /// Reads the audit trail
    pub fn audit_trail<'a>(
        &'a self,
        actor: &Actor,
        query: &AuditQuery,
    ) -> Result<impl Iterator<Item = &'a AuditEvent> + Clone + 'a, RevenueError> {
        self.capabilities.authorize(actor, Capability::ViewAudit)?;
        Ok(self.audit.query(query))
    }

    pub fn rule_set(&self, merchant_id: MerchantId) -> Option<&SplitRuleSet> {
        self.rule_sets.get(&merchant_id)
    }

    pub fn split(&self, split_result_id: SplitResultId) -> Option<&SplitResult> {
        self.ledger.current(split_result_id)
    }

    pub fn ledger(&self) -> &SplitLedger {
        &self.ledger
    }

    /// Current time, never earlier than the last audit event
    fn now(&self) -> DateTime<Utc> {
        let now = Utc::now();
        self.audit.last_timestamp().map_or(now, |last| now.max(last))
    }

    fn rule_set_for_update(
        rule_sets: &mut HashMap<MerchantId, SplitRuleSet>,
        merchant_id: MerchantId,
        expected_version: Option<u64>,
    ) -> Result<&mut SplitRuleSet, RevenueError> {
        let rule_set = rule_sets
            .get_mut(&merchant_id)
            .ok_or(RevenueError::UnknownMerchant(merchant_id))?;
        if let Some(expected) = expected_version {
            if rule_set.version() != expected {
                return Err(RevenueError::VersionConflict {
                    expected,
                    actual: rule_set.version(),
                });
            }
        }
        Ok(rule_set)
    }
}
