//! Engine configuration

use serde::Deserialize;

use core_kernel::Currency;
use crate::calculator::FeePolicy;

/// Settings that shape how splits are computed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SplitEngineConfig {
    /// Who carries processing fees
    pub fee_policy: FeePolicy,
    /// Currency for rule sets opened without an explicit one
    pub default_currency: Currency,
}

impl Default for SplitEngineConfig {
    fn default() -> Self {
        Self {
            fee_policy: FeePolicy::MerchantBorne,
            default_currency: Currency::USD,
        }
    }
}
