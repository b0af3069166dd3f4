//! Reward strategies and the registry that maps action types to them.
//!
//! The registry is built once at startup (from `RewardsConfig` or the
//! built-in table) and shared read-only afterwards; there is no way to add a
//! strategy to a registry that is already in use.

use crate::config::{strategy_problem, RewardsConfig, StrategyConfig};
use crate::error::{LedgerError, Result};
use crate::types::ActionType;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// RewardStrategy
// ---------------------------------------------------------------------------

/// Pure function from an action's reported impact to its base token amount.
pub trait RewardStrategy: Send + Sync {
    fn base_tokens(&self, impact: Option<f64>) -> i64;

    /// Short human description, e.g. `fixed 10`.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedReward {
    pub tokens: i64,
}

impl RewardStrategy for FixedReward {
    fn base_tokens(&self, _impact: Option<f64>) -> i64 {
        self.tokens
    }

    fn describe(&self) -> String {
        format!("fixed {}", self.tokens)
    }
}

/// `tokens_per_unit` per whole `unit_size` of impact, floored at `min_tokens`.
/// A missing impact earns `min_tokens`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactScaledReward {
    pub tokens_per_unit: i64,
    pub unit_size: f64,
    pub min_tokens: i64,
}

impl RewardStrategy for ImpactScaledReward {
    fn base_tokens(&self, impact: Option<f64>) -> i64 {
        let Some(impact) = impact.filter(|v| v.is_finite() && *v > 0.0) else {
            return self.min_tokens;
        };
        let units = (impact / self.unit_size).floor();
        let scaled = (units * self.tokens_per_unit as f64).min(i64::MAX as f64) as i64;
        scaled.max(self.min_tokens)
    }

    fn describe(&self) -> String {
        format!(
            "{} per {} impact (min {})",
            self.tokens_per_unit, self.unit_size, self.min_tokens
        )
    }
}

/// Savings against a consumption baseline. The reported impact is the
/// reading; anything over the baseline, or no reading at all, earns 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsumptionSavingReward {
    pub baseline: f64,
    pub tokens_per_unit: i64,
}

impl RewardStrategy for ConsumptionSavingReward {
    fn base_tokens(&self, impact: Option<f64>) -> i64 {
        let Some(consumption) = impact.filter(|v| v.is_finite() && *v >= 0.0) else {
            return 0;
        };
        if consumption > self.baseline {
            return 0;
        }
        let saved = self.baseline - consumption;
        (saved * self.tokens_per_unit as f64).min(i64::MAX as f64) as i64
    }

    fn describe(&self) -> String {
        format!(
            "{} per unit under baseline {}",
            self.tokens_per_unit, self.baseline
        )
    }
}

impl StrategyConfig {
    fn build(&self) -> Box<dyn RewardStrategy> {
        match *self {
            StrategyConfig::Fixed { tokens } => Box::new(FixedReward { tokens }),
            StrategyConfig::ImpactScaled {
                tokens_per_unit,
                unit_size,
                min_tokens,
            } => Box::new(ImpactScaledReward {
                tokens_per_unit,
                unit_size,
                min_tokens,
            }),
            StrategyConfig::ConsumptionSaving {
                baseline,
                tokens_per_unit,
            } => Box::new(ConsumptionSavingReward {
                baseline,
                tokens_per_unit,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// StrategyRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct StrategyRegistry {
    strategies: HashMap<ActionType, Box<dyn RewardStrategy>>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table: recycling 10, public transport 15, resource
    /// saving 20, proper disposal 15, tree planting 25.
    pub fn standard() -> Self {
        Self::empty()
            .with(ActionType::Recycling, FixedReward { tokens: 10 })
            .with(ActionType::PublicTransport, FixedReward { tokens: 15 })
            .with(ActionType::ResourceSaving, FixedReward { tokens: 20 })
            .with(ActionType::ProperDisposal, FixedReward { tokens: 15 })
            .with(ActionType::TreePlanting, FixedReward { tokens: 25 })
    }

    pub fn from_config(rewards: &RewardsConfig) -> Result<Self> {
        let mut strategies: HashMap<ActionType, Box<dyn RewardStrategy>> = HashMap::new();
        for (key, cfg) in &rewards.strategies {
            let action: ActionType = key.parse().map_err(|_| {
                LedgerError::InvalidConfig(format!("invalid action type '{key}' in strategies"))
            })?;
            if let Some(problem) = strategy_problem(cfg) {
                return Err(LedgerError::InvalidConfig(format!(
                    "strategy for '{key}' {problem}"
                )));
            }
            if strategies.insert(action.clone(), cfg.build()).is_some() {
                return Err(LedgerError::InvalidConfig(format!(
                    "more than one strategy configured for '{action}'"
                )));
            }
        }
        Ok(Self { strategies })
    }

    /// Register a strategy while building the registry.
    pub fn with(mut self, action: ActionType, strategy: impl RewardStrategy + 'static) -> Self {
        self.strategies.insert(action, Box::new(strategy));
        self
    }

    pub fn resolve(&self, action: &ActionType) -> Result<&dyn RewardStrategy> {
        self.strategies
            .get(action)
            .map(|s| s.as_ref())
            .ok_or_else(|| LedgerError::UnknownActionType(action.to_string()))
    }

    /// Base tokens for `action`. Unknown types earn 0 rather than failing.
    pub fn base_tokens(&self, action: &ActionType, impact: Option<f64>) -> i64 {
        match self.resolve(action) {
            Ok(strategy) => strategy.base_tokens(impact),
            Err(e) => {
                tracing::warn!(action_type = %action, "{e}; awarding 0 tokens");
                0
            }
        }
    }

    /// `(action type, strategy description)` pairs sorted by action type.
    pub fn table(&self) -> Vec<(ActionType, String)> {
        let mut rows: Vec<(ActionType, String)> = self
            .strategies
            .iter()
            .map(|(action, s)| (action.clone(), s.describe()))
            .collect();
        rows.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        rows
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_matches_reference_amounts() {
        let registry = StrategyRegistry::standard();
        let cases = [
            (ActionType::Recycling, 10),
            (ActionType::PublicTransport, 15),
            (ActionType::ResourceSaving, 20),
            (ActionType::ProperDisposal, 15),
            (ActionType::TreePlanting, 25),
        ];
        for (action, tokens) in cases {
            assert_eq!(registry.base_tokens(&action, None), tokens, "{action}");
        }
    }

    #[test]
    fn unknown_action_type_yields_zero_without_error() {
        let registry = StrategyRegistry::standard();
        let unknown: ActionType = "Unknown".parse().unwrap();
        assert_eq!(registry.base_tokens(&unknown, None), 0);
        assert!(matches!(
            registry.resolve(&unknown),
            Err(LedgerError::UnknownActionType(tag)) if tag == "unknown"
        ));
    }

    #[test]
    fn legacy_tag_resolves_through_parsing() {
        let registry = StrategyRegistry::standard();
        let planting: ActionType = "PlantioArvore".parse().unwrap();
        assert_eq!(registry.base_tokens(&planting, None), 25);
    }

    #[test]
    fn impact_scaled_counts_whole_units() {
        let per_half_kg = ImpactScaledReward {
            tokens_per_unit: 1,
            unit_size: 0.5,
            min_tokens: 0,
        };
        assert_eq!(per_half_kg.base_tokens(Some(5.0)), 10);
        assert_eq!(per_half_kg.base_tokens(Some(1.2)), 2);
        assert_eq!(per_half_kg.base_tokens(None), 0);
    }

    #[test]
    fn impact_scaled_respects_minimum() {
        let strategy = ImpactScaledReward {
            tokens_per_unit: 2,
            unit_size: 10.0,
            min_tokens: 3,
        };
        assert_eq!(strategy.base_tokens(Some(4.0)), 3);
        assert_eq!(strategy.base_tokens(Some(f64::NAN)), 3);
        assert_eq!(strategy.base_tokens(Some(25.0)), 4);
    }

    #[test]
    fn consumption_saving_pays_for_units_under_baseline() {
        let energy = ConsumptionSavingReward {
            baseline: 300.0,
            tokens_per_unit: 10,
        };
        assert_eq!(energy.base_tokens(Some(280.0)), 200);
        assert_eq!(energy.base_tokens(Some(300.0)), 0);
        assert_eq!(energy.base_tokens(Some(320.0)), 0);
        assert_eq!(energy.base_tokens(Some(299.95)), 0);
        assert_eq!(energy.base_tokens(None), 0);
        assert_eq!(energy.base_tokens(Some(-5.0)), 0);
    }

    #[test]
    fn from_config_builds_consumption_saving() {
        let mut rewards = RewardsConfig::default();
        let water: StrategyConfig =
            serde_yaml::from_str("type: consumption_saving\nbaseline: 15000\n").unwrap();
        rewards.strategies.insert("water_saving".to_string(), water);
        let registry = StrategyRegistry::from_config(&rewards).unwrap();
        let action: ActionType = "water_saving".parse().unwrap();
        assert_eq!(registry.base_tokens(&action, Some(14_000.0)), 10_000);
        assert_eq!(registry.base_tokens(&action, Some(16_000.0)), 0);
    }

    #[test]
    fn from_config_defaults_equal_standard() {
        let registry = StrategyRegistry::from_config(&RewardsConfig::default()).unwrap();
        let standard = StrategyRegistry::standard();
        assert_eq!(registry.table(), standard.table());
    }

    #[test]
    fn from_config_accepts_custom_action_type() {
        let mut rewards = RewardsConfig::default();
        rewards
            .strategies
            .insert("composting".to_string(), StrategyConfig::Fixed { tokens: 8 });
        let registry = StrategyRegistry::from_config(&rewards).unwrap();
        let composting: ActionType = "Composting".parse().unwrap();
        assert_eq!(registry.base_tokens(&composting, None), 8);
        assert_eq!(registry.table().len(), 6);
    }

    #[test]
    fn from_config_rejects_invalid_strategy() {
        let mut rewards = RewardsConfig::default();
        rewards
            .strategies
            .insert("recycling".to_string(), StrategyConfig::Fixed { tokens: -5 });
        assert!(matches!(
            StrategyRegistry::from_config(&rewards),
            Err(LedgerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn from_config_rejects_alias_collision() {
        let mut rewards = RewardsConfig::default();
        rewards
            .strategies
            .insert("Reciclagem".to_string(), StrategyConfig::Fixed { tokens: 12 });
        assert!(StrategyRegistry::from_config(&rewards).is_err());
    }

    #[test]
    fn table_is_sorted_and_descriptive() {
        let table = StrategyRegistry::standard().table();
        assert_eq!(table.len(), 5);
        assert_eq!(table[0].0, ActionType::ProperDisposal);
        assert_eq!(table[0].1, "fixed 15");
    }
}
