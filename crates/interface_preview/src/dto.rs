//! Preview input and output documents

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, MerchantId, Money, PartnerId, Percentage};
use domain_revenue::{
    Actor, AdjustmentKind, AuditEvent, Role, RuleKind, SplitRequest, SplitResult, SplitRule,
    SplitStatus,
};

use crate::error::PreviewError;

/// One rule as written in the input document
///
/// Amounts are minor units of the document currency.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleInput {
    pub partner_id: PartnerId,
    pub kind: RuleKind,
    #[serde(default)]
    pub percentage: Option<Decimal>,
    #[serde(default)]
    pub minimum_minor: Option<i64>,
    #[serde(default)]
    pub priority: i32,
    pub effective_from: DateTime<Utc>,
    #[serde(default)]
    pub effective_to: Option<DateTime<Utc>>,
}

impl RuleInput {
    pub fn into_rule(self, currency: Currency) -> Result<SplitRule, PreviewError> {
        let percentage = self
            .percentage
            .map(Percentage::new)
            .transpose()
            .map_err(|err| PreviewError::field("percentage", err.to_string()))?;

        let mut rule = match self.kind {
            RuleKind::Percentage => SplitRule::percentage(
                self.partner_id,
                percentage.ok_or_else(|| {
                    PreviewError::field("percentage", "percentage rules need a percentage")
                })?,
                self.effective_from,
            ),
            RuleKind::MinimumGuarantee => {
                let minimum = self.minimum_minor.ok_or_else(|| {
                    PreviewError::field("minimum_minor", "minimum-guarantee rules need a minimum")
                })?;
                let rule = SplitRule::minimum_guarantee(
                    self.partner_id,
                    Money::from_minor(minimum, currency),
                    self.effective_from,
                );
                match percentage {
                    Some(p) => rule.with_nominal_percentage(p),
                    None => rule,
                }
            }
        };
        rule.priority = self.priority;
        rule.effective_to = self.effective_to;
        Ok(rule)
    }
}

/// The sale being split
#[derive(Debug, Clone, Deserialize)]
pub struct SaleInput {
    pub source_minor: i64,
    #[serde(default)]
    pub tax_minor: i64,
    #[serde(default)]
    pub fees_minor: i64,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub reference: Option<String>,
}

impl SaleInput {
    pub fn to_request(&self, currency: Currency) -> SplitRequest {
        let request = SplitRequest::new(Money::from_minor(self.source_minor, currency), self.at)
            .with_tax(Money::from_minor(self.tax_minor, currency))
            .with_fees(Money::from_minor(self.fees_minor, currency));
        match &self.reference {
            Some(reference) => request.with_reference(reference.clone()),
            None => request,
        }
    }
}

/// An adjustment to apply after the split is computed
#[derive(Debug, Clone, Deserialize)]
pub struct AdjustmentInput {
    pub kind: AdjustmentKind,
    pub amount_minor: i64,
    #[serde(default)]
    pub partner_id: Option<PartnerId>,
    pub reason: String,
}

/// A complete preview document
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub merchant_id: Option<MerchantId>,
    #[serde(default)]
    pub currency: Option<Currency>,
    /// Who the preview runs as; a merchant owner when omitted
    #[serde(default)]
    pub actor: Option<Actor>,
    pub rules: Vec<RuleInput>,
    pub sale: SaleInput,
    #[serde(default)]
    pub adjustments: Vec<AdjustmentInput>,
    #[serde(default)]
    pub finalize: bool,
}

impl PreviewRequest {
    pub fn actor(&self) -> Actor {
        self.actor
            .clone()
            .unwrap_or_else(|| Actor::new("split-preview", Role::MerchantOwner))
    }
}

/// What the preview prints
#[derive(Debug, Clone, Serialize)]
pub struct PreviewResponse {
    pub merchant_id: MerchantId,
    pub status: SplitStatus,
    /// Latest revision
    pub split: SplitResult,
    /// Every revision, oldest first
    pub revisions: Vec<SplitResult>,
    pub audit: Vec<AuditEvent>,
}
