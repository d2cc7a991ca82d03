//! Adjustments and the split ledger
//!
//! The ledger keeps every revision of every recorded split. Adjustments
//! never modify a revision in place: each one derives the next revision
//! from the current one and appends it.
//!
//! # Lifecycle
//!
//! `Computed -> (Adjusted)* -> Finalized`. Finalized is terminal; a split is
//! finalized once its payout has been processed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use tracing::info;

use core_kernel::{AdjustmentId, Money, PartnerId, SplitResultId};
use crate::audit::{AuditAction, AuditEvent, AuditRecorder, EntityType, FieldChange};
use crate::calculator::SplitResult;
use crate::error::RevenueError;

/// Why an adjustment is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Fixes a mistake; either sign
    Correction,
    /// Extra payout; positive
    Bonus,
    /// Deduction; negative
    Penalty,
    /// Money returned to the customer; negative
    Refund,
}

impl AdjustmentKind {
    /// Checks the sign convention for this kind
    pub fn accepts(&self, amount: &Money) -> bool {
        match self {
            AdjustmentKind::Correction => !amount.is_zero(),
            AdjustmentKind::Bonus => amount.is_positive(),
            AdjustmentKind::Penalty | AdjustmentKind::Refund => amount.is_negative(),
        }
    }
}

/// A signed, post-hoc change to a computed split
///
/// Without a partner the amount moves the merchant's net payout. With a
/// partner it moves that partner's share and the merchant's residual
/// moves the opposite way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: AdjustmentId,
    pub split_result_id: SplitResultId,
    pub kind: AdjustmentKind,
    pub amount: Money,
    pub partner_id: Option<PartnerId>,
    pub reason: String,
    pub applied_at: DateTime<Utc>,
    pub applied_by: String,
}

impl Adjustment {
    pub fn new(
        split_result_id: SplitResultId,
        kind: AdjustmentKind,
        amount: Money,
        reason: impl Into<String>,
        applied_by: impl Into<String>,
        applied_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AdjustmentId::new_v7(),
            split_result_id,
            kind,
            amount,
            partner_id: None,
            reason: reason.into(),
            applied_at,
            applied_by: applied_by.into(),
        }
    }

    pub fn with_id(mut self, id: AdjustmentId) -> Self {
        self.id = id;
        self
    }

    pub fn for_partner(mut self, partner_id: PartnerId) -> Self {
        self.partner_id = Some(partner_id);
        self
    }
}

/// Where a split stands in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStatus {
    Computed,
    Adjusted,
    Finalized,
}

#[derive(Debug)]
struct LedgerEntry {
    /// Oldest first; never empty
    revisions: Vec<SplitResult>,
    adjustments: Vec<Adjustment>,
    status: SplitStatus,
}

impl LedgerEntry {
    fn current(&self) -> &SplitResult {
        &self.revisions[self.revisions.len() - 1]
    }
}

/// Recorded splits with their full revision history
#[derive(Debug, Default)]
pub struct SplitLedger {
    entries: HashMap<SplitResultId, LedgerEntry>,
    applied: HashSet<AdjustmentId>,
}

impl SplitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a freshly computed split
    ///
    /// Recording the same result twice is a no-op returning the stored
    /// revision, so recomputation is idempotent.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a different split is already stored under
    /// the same id, or if the result is not a first revision.
    pub fn record_computed(
        &mut self,
        result: SplitResult,
        actor: &str,
        at: DateTime<Utc>,
        recorder: &mut AuditRecorder,
    ) -> Result<&SplitResult, RevenueError> {
        let id = result.id;
        match self.entries.get(&id).map(|e| e.revisions[0] == result) {
            Some(true) => {
                return self
                    .current(id)
                    .ok_or(RevenueError::UnknownSplitResult(id));
            }
            Some(false) => {
                return Err(RevenueError::validation(
                    "id",
                    format!("a different split is already recorded as {}", id),
                ));
            }
            None => {}
        }
        if result.revision != 0 {
            return Err(RevenueError::validation(
                "revision",
                "only first revisions can be recorded as computed",
            ));
        }

        let event = AuditEvent::new(EntityType::SplitResult, id, AuditAction::Created, actor, at)
            .with_changes([
                FieldChange::set("source_amount", json!(result.source_amount)),
                FieldChange::set("tax", json!(result.tax)),
                FieldChange::set("fees", json!(result.fees)),
                FieldChange::set("merchant_share", json!(result.merchant_share)),
                FieldChange::set("partner_shares", json!(result.partner_shares)),
                FieldChange::set("net_amount", json!(result.net_amount)),
                FieldChange::set("status", json!(SplitStatus::Computed)),
            ]);
        recorder.record(event)?;

        info!(split_id = %id, net_amount = %result.net_amount, "Split recorded");

        let entry = self.entries.entry(id).or_insert(LedgerEntry {
            revisions: vec![result],
            adjustments: Vec::new(),
            status: SplitStatus::Computed,
        });
        Ok(entry.current())
    }

    /// Applies an adjustment, producing the split's next revision
    ///
    /// # Errors
    ///
    /// - `UnknownSplitResult` if no split is recorded under the id
    /// - `AlreadyApplied` if an adjustment with this id was applied before
    /// - `FinalizedResult` if the split is finalized
    /// - `CurrencyMismatch` if the amount is in another currency
    /// - `Validation` for a sign that does not fit the kind, a partner absent
    ///   from the split, or a share that would turn negative
    ///
    /// On error neither the ledger nor the audit log changes.
    pub fn apply_adjustment(
        &mut self,
        split_result_id: SplitResultId,
        adjustment: Adjustment,
        recorder: &mut AuditRecorder,
    ) -> Result<&SplitResult, RevenueError> {
        let entry = self
            .entries
            .get(&split_result_id)
            .ok_or(RevenueError::UnknownSplitResult(split_result_id))?;

        if self.applied.contains(&adjustment.id) {
            return Err(RevenueError::AlreadyApplied(adjustment.id));
        }
        if entry.status == SplitStatus::Finalized {
            return Err(RevenueError::FinalizedResult(split_result_id));
        }
        if adjustment.split_result_id != split_result_id {
            return Err(RevenueError::validation(
                "split_result_id",
                format!(
                    "adjustment targets {} but was applied to {}",
                    adjustment.split_result_id, split_result_id
                ),
            ));
        }

        let current = entry.current();
        if adjustment.amount.currency() != current.currency() {
            return Err(RevenueError::currency_mismatch(
                current.currency(),
                adjustment.amount.currency(),
            ));
        }
        if !adjustment.kind.accepts(&adjustment.amount) {
            return Err(RevenueError::validation(
                "amount",
                format!("{} is not a valid {:?} amount", adjustment.amount, adjustment.kind),
            ));
        }

        let mut next = current.clone();
        next.revision += 1;
        next.adjusted_at = Some(adjustment.applied_at);

        let mut changes = vec![
            FieldChange::set("adjustment_id", json!(adjustment.id)),
            FieldChange::set("kind", json!(adjustment.kind)),
            FieldChange::set("amount", json!(adjustment.amount)),
            FieldChange::set("reason", json!(adjustment.reason)),
        ];

        match adjustment.partner_id {
            None => {
                next.net_adjustment = next.net_adjustment.checked_add(&adjustment.amount)?;
                next.net_amount = next.net_amount.checked_add(&adjustment.amount)?;
            }
            Some(partner_id) => {
                let index = next
                    .partner_shares
                    .iter()
                    .position(|s| s.partner_id == partner_id)
                    .ok_or_else(|| {
                        RevenueError::validation(
                            "partner_id",
                            format!(
                                "partner {} has no share in split {}",
                                partner_id, split_result_id
                            ),
                        )
                    })?;
                let old_share = next.partner_shares[index].amount;
                let new_share = old_share.checked_add(&adjustment.amount)?;
                if new_share.is_negative() {
                    return Err(RevenueError::validation(
                        "amount",
                        format!("share of partner {} would become {}", partner_id, new_share),
                    ));
                }
                next.partner_shares[index].amount = new_share;

                let partner_total = next.partner_total()?;
                next.merchant_share = next.source_amount.checked_sub(&partner_total)?;
                next.net_amount = next
                    .source_amount
                    .checked_add(&next.tax)?
                    .checked_sub(&next.fees)?
                    .checked_sub(&partner_total)?
                    .checked_add(&next.net_adjustment)?;

                changes.push(FieldChange::new(
                    format!("partner_shares.{}", partner_id),
                    json!(old_share),
                    json!(new_share),
                ));
                changes.push(FieldChange::new(
                    "merchant_share",
                    json!(current.merchant_share),
                    json!(next.merchant_share),
                ));
            }
        }

        changes.push(FieldChange::new(
            "net_amount",
            json!(current.net_amount),
            json!(next.net_amount),
        ));
        changes.push(FieldChange::new(
            "revision",
            json!(current.revision),
            json!(next.revision),
        ));

        let event = AuditEvent::new(
            EntityType::SplitResult,
            split_result_id,
            AuditAction::Adjusted,
            adjustment.applied_by.as_str(),
            adjustment.applied_at,
        )
        .with_changes(changes);
        recorder.record(event)?;

        info!(
            split_id = %split_result_id,
            adjustment_id = %adjustment.id,
            kind = ?adjustment.kind,
            amount = %adjustment.amount,
            revision = next.revision,
            "Adjustment applied"
        );

        self.applied.insert(adjustment.id);
        let entry = self
            .entries
            .get_mut(&split_result_id)
            .ok_or(RevenueError::UnknownSplitResult(split_result_id))?;
        entry.revisions.push(next);
        entry.adjustments.push(adjustment);
        entry.status = SplitStatus::Adjusted;

        Ok(entry.current())
    }

    /// Marks a split as paid out; no further adjustments are accepted
    pub fn finalize(
        &mut self,
        split_result_id: SplitResultId,
        actor: &str,
        at: DateTime<Utc>,
        recorder: &mut AuditRecorder,
    ) -> Result<&SplitResult, RevenueError> {
        let entry = self
            .entries
            .get_mut(&split_result_id)
            .ok_or(RevenueError::UnknownSplitResult(split_result_id))?;
        if entry.status == SplitStatus::Finalized {
            return Err(RevenueError::FinalizedResult(split_result_id));
        }

        let event = AuditEvent::new(
            EntityType::SplitResult,
            split_result_id,
            AuditAction::Approved,
            actor,
            at,
        )
        .with_change(FieldChange::new(
            "status",
            json!(entry.status),
            json!(SplitStatus::Finalized),
        ));
        recorder.record(event)?;

        entry.status = SplitStatus::Finalized;
        info!(split_id = %split_result_id, "Split finalized");

        Ok(entry.current())
    }

    /// The latest revision of a split
    pub fn current(&self, split_result_id: SplitResultId) -> Option<&SplitResult> {
        self.entries.get(&split_result_id).map(LedgerEntry::current)
    }

    /// Every revision of a split, oldest first
    pub fn history(&self, split_result_id: SplitResultId) -> Option<&[SplitResult]> {
        self.entries
            .get(&split_result_id)
            .map(|e| e.revisions.as_slice())
    }

    pub fn status(&self, split_result_id: SplitResultId) -> Option<SplitStatus> {
        self.entries.get(&split_result_id).map(|e| e.status)
    }

    /// Adjustments applied to a split, in application order
    pub fn adjustments(&self, split_result_id: SplitResultId) -> Option<&[Adjustment]> {
        self.entries
            .get(&split_result_id)
            .map(|e| e.adjustments.as_slice())
    }

    pub fn is_applied(&self, adjustment_id: AdjustmentId) -> bool {
        self.applied.contains(&adjustment_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use core_kernel::{Currency, Percentage};
    use rust_decimal_macros::dec;

    use crate::calculator::SplitCalculator;
    use crate::rule::SplitRule;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn usd(minor: i64) -> Money {
        Money::from_minor(minor, Currency::USD)
    }

    fn recorded(partner: PartnerId) -> (SplitLedger, AuditRecorder, SplitResultId) {
        let rules = [SplitRule::percentage(partner, Percentage::new(dec!(30)).unwrap(), at())];
        let result = SplitCalculator::default()
            .compute(usd(100_000), usd(0), usd(0), &rules, at())
            .unwrap();
        let id = result.id;

        let mut ledger = SplitLedger::new();
        let mut audit = AuditRecorder::new();
        ledger.record_computed(result, "system", at(), &mut audit).unwrap();
        (ledger, audit, id)
    }

    #[test]
    fn test_merchant_level_bonus_moves_net_only() {
        let partner = PartnerId::new();
        let (mut ledger, mut audit, id) = recorded(partner);

        let bonus =
            Adjustment::new(id, AdjustmentKind::Bonus, usd(1_000), "promo", "finance", at());
        let next = ledger.apply_adjustment(id, bonus, &mut audit).unwrap();

        assert_eq!(next.revision, 1);
        assert_eq!(next.net_amount, usd(71_000));
        assert_eq!(next.merchant_share, usd(70_000));
        assert!(next.is_reconciled());
        assert_eq!(ledger.status(id), Some(SplitStatus::Adjusted));
        assert_eq!(ledger.history(id).unwrap().len(), 2);
    }

    #[test]
    fn test_partner_correction_rebalances_merchant_share() {
        let partner = PartnerId::new();
        let (mut ledger, mut audit, id) = recorded(partner);

        let correction =
            Adjustment::new(id, AdjustmentKind::Correction, usd(-500), "overpaid", "finance", at())
                .for_partner(partner);
        let next = ledger.apply_adjustment(id, correction, &mut audit).unwrap();

        assert_eq!(next.share_for(partner).unwrap().amount, usd(29_500));
        assert_eq!(next.merchant_share, usd(70_500));
        assert_eq!(next.net_amount, usd(70_500));
        assert!(next.is_reconciled());

        let event = audit.events().last().unwrap();
        assert_eq!(event.action, AuditAction::Adjusted);
        assert_eq!(event.change("net_amount").unwrap().old_value, Some(json!(usd(70_000))));
    }

    #[test]
    fn test_same_adjustment_twice_is_rejected() {
        let (mut ledger, mut audit, id) = recorded(PartnerId::new());
        let bonus = Adjustment::new(id, AdjustmentKind::Bonus, usd(100), "promo", "finance", at());

        ledger.apply_adjustment(id, bonus.clone(), &mut audit).unwrap();
        let events_before = audit.len();
        let second = ledger.apply_adjustment(id, bonus.clone(), &mut audit);

        assert_eq!(second.unwrap_err(), RevenueError::AlreadyApplied(bonus.id));
        assert_eq!(audit.len(), events_before);
        assert_eq!(ledger.history(id).unwrap().len(), 2);
    }

    #[test]
    fn test_sign_conventions() {
        let (mut ledger, mut audit, id) = recorded(PartnerId::new());
        let penalty =
            Adjustment::new(id, AdjustmentKind::Penalty, usd(100), "late", "finance", at());

        let result = ledger.apply_adjustment(id, penalty, &mut audit);
        assert!(matches!(result, Err(RevenueError::Validation { .. })));
    }

    #[test]
    fn test_partner_share_cannot_go_negative() {
        let partner = PartnerId::new();
        let (mut ledger, mut audit, id) = recorded(partner);
        let refund =
            Adjustment::new(id, AdjustmentKind::Refund, usd(-30_001), "refund", "finance", at())
                .for_partner(partner);

        let result = ledger.apply_adjustment(id, refund, &mut audit);
        assert!(matches!(result, Err(RevenueError::Validation { .. })));
        assert_eq!(ledger.status(id), Some(SplitStatus::Computed));
    }

    #[test]
    fn test_finalize_is_terminal() {
        let (mut ledger, mut audit, id) = recorded(PartnerId::new());
        ledger.finalize(id, "payout-job", at() + Duration::hours(1), &mut audit).unwrap();

        assert_eq!(
            ledger.finalize(id, "payout-job", at() + Duration::hours(2), &mut audit).unwrap_err(),
            RevenueError::FinalizedResult(id)
        );
        assert_eq!(audit.events().last().unwrap().action, AuditAction::Approved);
    }

    #[test]
    fn test_recording_same_result_twice_is_idempotent() {
        let partner = PartnerId::new();
        let (mut ledger, mut audit, id) = recorded(partner);
        let again = ledger.current(id).unwrap().clone();

        ledger.record_computed(again, "system", at(), &mut audit).unwrap();

        assert_eq!(audit.len(), 1);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_unknown_split() {
        let mut ledger = SplitLedger::new();
        let mut audit = AuditRecorder::new();
        let id = SplitResultId::new();
        let bonus = Adjustment::new(id, AdjustmentKind::Bonus, usd(100), "promo", "finance", at());

        assert_eq!(
            ledger.apply_adjustment(id, bonus, &mut audit).unwrap_err(),
            RevenueError::UnknownSplitResult(id)
        );
    }
}
