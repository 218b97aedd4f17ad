//! Tier limiter: maps (tool, tier) to numeric resource caps.
//!
//! The limiter never fails. Unknown tools fall back to the tier's `default`
//! entry, and unknown tiers or tables with no entry at all fall back to
//! [`ToolLimits::FLOOR`]. Callers clamp requested bounds with [`Clamped`] and
//! report the outcome as metadata, never as an error.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::LimitsConfig;

/// Subscription tier of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Community,
    Pro,
    Enterprise,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Community => "community",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// Parse from string representation, falling back to the most restrictive tier
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pro" | "professional" => Self::Pro,
            "enterprise" | "ent" => Self::Enterprise,
            _ => Self::Community,
        }
    }
}

/// Operation a limit applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Neighborhood,
    Chains,
    Query,
    Analysis,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neighborhood => "neighborhood",
            Self::Chains => "chains",
            Self::Query => "query",
            Self::Analysis => "analysis",
        }
    }
}

/// Numeric caps for one (tool, tier) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolLimits {
    pub max_depth: usize,
    pub max_nodes: usize,
    pub max_chains: usize,
}

impl ToolLimits {
    /// Used only when the injected table has nothing for a tier.
    pub const FLOOR: ToolLimits = ToolLimits {
        max_depth: 1,
        max_nodes: 25,
        max_chains: 5,
    };

    pub fn new(max_depth: usize, max_nodes: usize, max_chains: usize) -> Self {
        Self {
            max_depth,
            max_nodes,
            max_chains,
        }
    }
}

/// Capability consumed by every bounded operation.
///
/// Implementations must be pure: same inputs, same caps, no side effects.
pub trait TierLimiter: Send + Sync {
    fn limits_for(&self, tool: ToolKind, tier: Tier) -> ToolLimits;
}

/// Limiter backed by the `[limits]` table of the engine configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigTierLimiter {
    table: HashMap<String, HashMap<String, ToolLimits>>,
}

impl ConfigTierLimiter {
    pub fn new(config: &LimitsConfig) -> Self {
        Self {
            table: config.tiers.clone(),
        }
    }
}

impl TierLimiter for ConfigTierLimiter {
    fn limits_for(&self, tool: ToolKind, tier: Tier) -> ToolLimits {
        let Some(tools) = self.table.get(tier.as_str()) else {
            return ToolLimits::FLOOR;
        };
        tools
            .get(tool.as_str())
            .or_else(|| tools.get("default"))
            .copied()
            .unwrap_or(ToolLimits::FLOOR)
    }
}

/// A requested bound after clamping to a cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Clamped {
    pub requested: usize,
    pub effective: usize,
    pub clamped: bool,
}

impl Clamped {
    pub fn apply(requested: usize, cap: usize) -> Self {
        let effective = requested.min(cap);
        Self {
            requested,
            effective,
            clamped: effective < requested,
        }
    }

    /// Bound that was not requested explicitly; the cap is used as-is.
    pub fn cap_only(cap: usize) -> Self {
        Self {
            requested: cap,
            effective: cap,
            clamped: false,
        }
    }
}

/// Limits actually applied to a request, echoed in every response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedLimits {
    pub tier: Tier,
    pub tool: ToolKind,
    pub depth: Clamped,
    pub nodes: Clamped,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chains: Option<Clamped>,
}

impl AppliedLimits {
    /// True when any requested bound was reduced
    pub fn any_clamped(&self) -> bool {
        self.depth.clamped || self.nodes.clamped || self.chains.map(|c| c.clamped).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    #[test]
    fn test_default_table_is_monotonic_by_tier() {
        let limiter = ConfigTierLimiter::new(&EngineConfig::default().limits);
        let c = limiter.limits_for(ToolKind::Neighborhood, Tier::Community);
        let p = limiter.limits_for(ToolKind::Neighborhood, Tier::Pro);
        let e = limiter.limits_for(ToolKind::Neighborhood, Tier::Enterprise);
        assert!(c.max_depth <= p.max_depth && p.max_depth <= e.max_depth);
        assert!(c.max_nodes <= p.max_nodes && p.max_nodes <= e.max_nodes);
    }

    #[test]
    fn test_missing_tier_falls_back_to_floor() {
        let limiter = ConfigTierLimiter::default();
        assert_eq!(
            limiter.limits_for(ToolKind::Query, Tier::Enterprise),
            ToolLimits::FLOOR
        );
    }

    #[test]
    fn test_tool_entry_overrides_default() {
        let mut config = LimitsConfig::default();
        config
            .tiers
            .entry("pro".to_string())
            .or_default()
            .insert("chains".to_string(), ToolLimits::new(9, 9, 9));
        let limiter = ConfigTierLimiter::new(&config);
        assert_eq!(
            limiter.limits_for(ToolKind::Chains, Tier::Pro),
            ToolLimits::new(9, 9, 9)
        );
        assert_ne!(
            limiter.limits_for(ToolKind::Query, Tier::Pro),
            ToolLimits::new(9, 9, 9)
        );
    }

    #[test]
    fn test_clamp() {
        let c = Clamped::apply(50, 3);
        assert!(c.clamped);
        assert_eq!(c.effective, 3);
        assert_eq!(c.requested, 50);

        let c = Clamped::apply(2, 3);
        assert!(!c.clamped);
        assert_eq!(c.effective, 2);
    }

    #[test]
    fn test_tier_from_str() {
        assert_eq!(Tier::from_str("PRO"), Tier::Pro);
        assert_eq!(Tier::from_str("enterprise"), Tier::Enterprise);
        assert_eq!(Tier::from_str("bogus"), Tier::Community);
    }
}
