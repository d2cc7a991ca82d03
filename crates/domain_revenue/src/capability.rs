//! Capability checks
//!
//! The split engine itself never looks at roles. The service asks a single
//! [`CapabilityCheck`] collaborator before any mutation reaches the core.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RevenueError;

/// Operations that require permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ManageRules,
    ComputeSplits,
    ApplyAdjustments,
    FinalizeSplits,
    ViewAudit,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::ManageRules => "manage split rules",
            Capability::ComputeSplits => "compute splits",
            Capability::ApplyAdjustments => "apply adjustments",
            Capability::FinalizeSplits => "finalize splits",
            Capability::ViewAudit => "view the audit trail",
        };
        write!(f, "{}", name)
    }
}

/// Dashboard roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    MerchantOwner,
    FinanceManager,
    Partner,
    Viewer,
}

/// An already-authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }
}

/// Decides whether an actor may exercise a capability
pub trait CapabilityCheck {
    fn authorize(&self, actor: &Actor, capability: Capability) -> Result<(), RevenueError>;
}

/// Static role matrix used by the dashboard
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleCapabilities;

impl RoleCapabilities {
    pub fn allows(role: Role, capability: Capability) -> bool {
        match role {
            Role::MerchantOwner => true,
            Role::FinanceManager => !matches!(capability, Capability::ManageRules),
            Role::Partner | Role::Viewer => matches!(capability, Capability::ViewAudit),
        }
    }
}

impl CapabilityCheck for RoleCapabilities {
    fn authorize(&self, actor: &Actor, capability: Capability) -> Result<(), RevenueError> {
        if Self::allows(actor.role, capability) {
            Ok(())
        } else {
            Err(RevenueError::Unauthorized {
                actor: actor.id.clone(),
                capability: capability.to_string(),
            })
        }
    }
}

/// Permits everything; for batch jobs that run after their own checks
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl CapabilityCheck for AllowAll {
    fn authorize(&self, _actor: &Actor, _capability: Capability) -> Result<(), RevenueError> {
        Ok(())
    }
}
