//! Split Preview
//!
//! Runs a rule set and a single sale through the split engine, applies any
//! adjustments, and reports the outcome together with its audit trail.
//!
//! The input is a JSON [`PreviewRequest`](dto::PreviewRequest):
//!
//! ```json
//! {
//!   "currency": "USD",
//!   "rules": [
//!     { "partner_id": "6f9619ff-8b86-d011-b42d-00c04fc964ff", "kind": "percentage",
//!       "percentage": "30", "effective_from": "2024-01-01T00:00:00Z" }
//!   ],
//!   "sale": { "source_minor": 100000, "at": "2024-06-01T00:00:00Z" }
//! }
//! ```

pub mod config;
pub mod dto;
pub mod error;

use tracing::info;

use core_kernel::MerchantId;
use domain_revenue::{Adjustment, AuditQuery, RevenueSplitService, SplitEngineConfig, SplitStatus};

use crate::dto::{PreviewRequest, PreviewResponse};
use crate::error::PreviewError;

/// Runs one preview document through a fresh engine
///
/// # Errors
///
/// Returns `Field` for malformed rule inputs and `Revenue` for anything
/// the engine rejects (over-allocation, negative amounts, sign rules).
pub fn run_preview(
    request: PreviewRequest,
    engine: SplitEngineConfig,
) -> Result<PreviewResponse, PreviewError> {
    let actor = request.actor();
    let merchant_id = request.merchant_id.unwrap_or_else(MerchantId::new);
    let currency = request.currency.unwrap_or(engine.default_currency);
    let mut service = RevenueSplitService::with_config(engine);

    service.open_rule_set(&actor, merchant_id, Some(currency))?;
    for input in request.rules {
        let rule = input.into_rule(currency)?;
        service.add_rule(&actor, merchant_id, rule, None)?;
    }

    let split_id = service
        .compute_split(&actor, merchant_id, &request.sale.to_request(currency))?
        .id;

    for input in request.adjustments {
        let mut adjustment = Adjustment::new(
            split_id,
            input.kind,
            core_kernel::Money::from_minor(input.amount_minor, currency),
            input.reason,
            actor.id.clone(),
            request.sale.at,
        );
        if let Some(partner_id) = input.partner_id {
            adjustment = adjustment.for_partner(partner_id);
        }
        service.apply_adjustment(&actor, split_id, adjustment)?;
    }

    if request.finalize {
        service.finalize(&actor, split_id)?;
    }

    let ledger = service.ledger();
    let revisions = ledger.history(split_id).map(<[_]>::to_vec).unwrap_or_default();
    let split = revisions
        .last()
        .cloned()
        .ok_or(domain_revenue::RevenueError::UnknownSplitResult(split_id))?;
    let status = ledger.status(split_id).unwrap_or(SplitStatus::Computed);
    let audit = service
        .audit_trail(&actor, &AuditQuery::all())?
        .cloned()
        .collect();

    info!(
        split_id = %split_id,
        revision = split.revision,
        merchant_share = %split.merchant_share,
        net_amount = %split.net_amount,
        "Preview complete"
    );

    Ok(PreviewResponse {
        merchant_id,
        status,
        split,
        revisions,
        audit,
    })
}

/// Parses a preview document and runs it
pub fn run_preview_json(
    input: &str,
    engine: SplitEngineConfig,
) -> Result<PreviewResponse, PreviewError> {
    let request: PreviewRequest = serde_json::from_str(input)?;
    run_preview(request, engine)
}
