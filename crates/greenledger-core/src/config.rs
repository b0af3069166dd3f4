use crate::error::{LedgerError, Result};
use crate::paths;
use crate::types::ActionType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// StrategyConfig
// ---------------------------------------------------------------------------

/// How the base token amount for one action type is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Same amount for every action of this type.
    Fixed { tokens: i64 },
    /// `tokens_per_unit` for every whole `unit_size` of reported impact,
    /// never less than `min_tokens`.
    ImpactScaled {
        tokens_per_unit: i64,
        #[serde(default = "default_unit_size")]
        unit_size: f64,
        #[serde(default)]
        min_tokens: i64,
    },
    /// Reported impact is a consumption reading (litres, kWh, ...). Readings
    /// at or under `baseline` earn `tokens_per_unit` per unit saved.
    ConsumptionSaving {
        baseline: f64,
        #[serde(default = "default_saving_tokens_per_unit")]
        tokens_per_unit: i64,
    },
}

fn default_unit_size() -> f64 {
    1.0
}

fn default_saving_tokens_per_unit() -> i64 {
    10
}

fn default_strategies() -> BTreeMap<String, StrategyConfig> {
    let mut m = BTreeMap::new();
    m.insert("recycling".to_string(), StrategyConfig::Fixed { tokens: 10 });
    m.insert(
        "public_transport".to_string(),
        StrategyConfig::Fixed { tokens: 15 },
    );
    m.insert(
        "resource_saving".to_string(),
        StrategyConfig::Fixed { tokens: 20 },
    );
    m.insert(
        "proper_disposal".to_string(),
        StrategyConfig::Fixed { tokens: 15 },
    );
    m.insert(
        "tree_planting".to_string(),
        StrategyConfig::Fixed { tokens: 25 },
    );
    m
}

// ---------------------------------------------------------------------------
// BonusConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusConfig {
    #[serde(default = "default_bonus_enabled")]
    pub enabled: bool,
    /// Base awards at or above this amount earn the bonus.
    #[serde(default = "default_bonus_threshold")]
    pub threshold: i64,
    #[serde(default = "default_bonus_amount")]
    pub amount: i64,
}

fn default_bonus_enabled() -> bool {
    true
}

fn default_bonus_threshold() -> i64 {
    20
}

fn default_bonus_amount() -> i64 {
    5
}

impl Default for BonusConfig {
    fn default() -> Self {
        Self {
            enabled: default_bonus_enabled(),
            threshold: default_bonus_threshold(),
            amount: default_bonus_amount(),
        }
    }
}

// ---------------------------------------------------------------------------
// RewardsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsConfig {
    /// Keyed by action type tag; legacy tags are accepted.
    #[serde(default = "default_strategies")]
    pub strategies: BTreeMap<String, StrategyConfig>,
    #[serde(default)]
    pub bonus: BonusConfig,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            bonus: BonusConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Logging,
    Bonus,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Logging => "logging",
            StageKind::Bonus => "bonus",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Outermost stage first.
    #[serde(default = "default_stages")]
    pub stages: Vec<StageKind>,
}

fn default_stages() -> Vec<StageKind> {
    vec![StageKind::Logging, StageKind::Bonus]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stages: default_stages(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub rewards: RewardsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
                description: None,
            },
            rewards: RewardsConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(LedgerError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        crate::io::atomic_write(&path, self.to_yaml()?.as_bytes())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut seen: HashMap<ActionType, &str> = HashMap::new();

        // 1. Strategy keys must parse, and two keys must not name the same type
        for (key, strategy) in &self.rewards.strategies {
            match key.parse::<ActionType>() {
                Ok(action) => {
                    if let Some(previous) = seen.insert(action.clone(), key) {
                        warnings.push(ConfigWarning {
                            level: WarnLevel::Error,
                            message: format!(
                                "rewards.strategies keys '{previous}' and '{key}' both name action type '{action}'"
                            ),
                        });
                    }
                }
                Err(_) => warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("invalid action type '{key}' in rewards.strategies"),
                }),
            }

            // 2. Strategy parameters
            if let Some(problem) = strategy_problem(strategy) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("strategy for '{key}' {problem}"),
                });
            }
        }

        // 3. Built-in types without a strategy earn nothing
        for action in ActionType::known() {
            if !seen.contains_key(action) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "no strategy for built-in action type '{action}'; it will earn 0 tokens"
                    ),
                });
            }
        }

        // 4. Bonus settings
        let bonus = &self.rewards.bonus;
        if bonus.enabled {
            if bonus.amount <= 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("rewards.bonus.amount must be positive, got {}", bonus.amount),
                });
            }
            if bonus.threshold <= 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "rewards.bonus.threshold={} grants a bonus for every action",
                        bonus.threshold
                    ),
                });
            }
        }

        // 5. Pipeline stages
        let mut stages_seen = Vec::new();
        for stage in &self.pipeline.stages {
            if stages_seen.contains(stage) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "pipeline stage '{}' is listed more than once",
                        stage.as_str()
                    ),
                });
            }
            stages_seen.push(*stage);
        }
        if stages_seen.contains(&StageKind::Bonus) && !bonus.enabled {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "pipeline lists the bonus stage but rewards.bonus.enabled is false"
                    .to_string(),
            });
        }

        warnings
    }
}

/// Describe what is wrong with a strategy's parameters, if anything.
pub(crate) fn strategy_problem(strategy: &StrategyConfig) -> Option<String> {
    match strategy {
        StrategyConfig::Fixed { tokens } if *tokens < 0 => {
            Some(format!("has negative tokens ({tokens})"))
        }
        StrategyConfig::ImpactScaled {
            tokens_per_unit,
            unit_size,
            min_tokens,
        } => {
            if *tokens_per_unit < 0 {
                Some(format!("has negative tokens_per_unit ({tokens_per_unit})"))
            } else if !unit_size.is_finite() || *unit_size <= 0.0 {
                Some(format!("has non-positive unit_size ({unit_size})"))
            } else if *min_tokens < 0 {
                Some(format!("has negative min_tokens ({min_tokens})"))
            } else {
                None
            }
        }
        StrategyConfig::ConsumptionSaving {
            baseline,
            tokens_per_unit,
        } => {
            if !baseline.is_finite() || *baseline < 0.0 {
                Some(format!("has invalid baseline ({baseline})"))
            } else if *tokens_per_unit < 0 {
                Some(format!("has negative tokens_per_unit ({tokens_per_unit})"))
            } else {
                None
            }
        }
        StrategyConfig::Fixed { .. } => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
