use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ActionType
// ---------------------------------------------------------------------------

/// Kind of sustainable action being reported.
///
/// Tags that don't match a known kind are kept as `Other` so a new action type
/// can flow through the pipeline before a strategy exists for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ActionType {
    Recycling,
    PublicTransport,
    ResourceSaving,
    ProperDisposal,
    TreePlanting,
    Other(String),
}

impl ActionType {
    pub fn known() -> &'static [ActionType] {
        &[
            ActionType::Recycling,
            ActionType::PublicTransport,
            ActionType::ResourceSaving,
            ActionType::ProperDisposal,
            ActionType::TreePlanting,
        ]
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionType::Recycling => "recycling",
            ActionType::PublicTransport => "public_transport",
            ActionType::ResourceSaving => "resource_saving",
            ActionType::ProperDisposal => "proper_disposal",
            ActionType::TreePlanting => "tree_planting",
            ActionType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionType {
    type Err = crate::error::LedgerError;

    /// Accepts snake_case names and the legacy CamelCase tags
    /// (`Reciclagem`, `PlantioArvore`, ...), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        if normalized.is_empty() {
            return Err(crate::error::LedgerError::InvalidRequest(
                "action type must not be empty".to_string(),
            ));
        }
        let action = match normalized.as_str() {
            "recycling" | "reciclagem" => ActionType::Recycling,
            "public_transport" | "transport" | "transporte" => ActionType::PublicTransport,
            "resource_saving" | "economiarecursos" | "economia_recursos" => {
                ActionType::ResourceSaving
            }
            "proper_disposal" | "descartecorreto" | "descarte_correto" => {
                ActionType::ProperDisposal
            }
            "tree_planting" | "plantioarvore" | "plantio_arvore" => ActionType::TreePlanting,
            _ => ActionType::Other(normalized),
        };
        Ok(action)
    }
}

impl TryFrom<String> for ActionType {
    type Error = crate::error::LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ActionType> for String {
    fn from(value: ActionType) -> Self {
        value.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// EntryKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Credit,
    Debit,
}

impl EntryKind {
    /// Kind implied by the sign of a signed amount. Zero counts as a credit.
    pub fn for_amount(amount: i64) -> Self {
        if amount < 0 {
            EntryKind::Debit
        } else {
            EntryKind::Credit
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Credit => "credit",
            EntryKind::Debit => "debit",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EntrySource
// ---------------------------------------------------------------------------

/// Where a ledger entry's tokens came from (or went to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    Action,
    Reward,
    Bonus,
    Admin,
}

impl EntrySource {
    pub fn as_str(self) -> &'static str {
        match self {
            EntrySource::Action => "action",
            EntrySource::Reward => "reward",
            EntrySource::Bonus => "bonus",
            EntrySource::Admin => "admin",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntrySource::Action => "sustainable action",
            EntrySource::Reward => "reward redemption",
            EntrySource::Bonus => "bonus",
            EntrySource::Admin => "administrative adjustment",
        }
    }
}

impl fmt::Display for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
