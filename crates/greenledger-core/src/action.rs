//! The unit of work flowing through the reward pipeline.
//!
//! An `ActionRequest` is built once by the caller and never mutated. Its
//! `DedupKey` is the fingerprint the gate and ledger use to guarantee that the
//! same logical action is rewarded at most once.

use crate::error::{LedgerError, Result};
use crate::types::ActionType;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

// ---------------------------------------------------------------------------
// ActionRequest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub actor_id: String,
    pub action_type: ActionType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<f64>,
    /// Amount the caller expected to earn. Informational: the strategy
    /// registry is authoritative for the credited amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_tokens: Option<i64>,
    /// Caller-supplied idempotency token. When set it replaces
    /// `(action_type, description)` as the dedup fingerprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_token: Option<String>,
}

impl ActionRequest {
    pub fn new(
        actor_id: impl Into<String>,
        action_type: ActionType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            action_type,
            description: description.into(),
            impact: None,
            requested_tokens: None,
            idempotency_token: None,
        }
    }

    pub fn with_impact(mut self, impact: f64) -> Self {
        self.impact = Some(impact);
        self
    }

    pub fn with_requested_tokens(mut self, tokens: i64) -> Self {
        self.requested_tokens = Some(tokens);
        self
    }

    pub fn with_idempotency_token(mut self, token: impl Into<String>) -> Self {
        self.idempotency_token = Some(token.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.action_type.as_str().trim().is_empty() {
            return Err(LedgerError::InvalidRequest(
                "action type must not be empty".to_string(),
            ));
        }
        if self.description.trim().is_empty() {
            return Err(LedgerError::InvalidRequest(
                "description must not be empty".to_string(),
            ));
        }
        if let Some(impact) = self.impact {
            if !impact.is_finite() || impact < 0.0 {
                return Err(LedgerError::InvalidRequest(format!(
                    "impact must be a non-negative number, got {impact}"
                )));
            }
        }
        if let Some(token) = &self.idempotency_token {
            if token.trim().is_empty() {
                return Err(LedgerError::InvalidRequest(
                    "idempotency token must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn dedup_key(&self) -> DedupKey {
        match &self.idempotency_token {
            Some(token) => DedupKey::from_token(&self.actor_id, token),
            None => DedupKey::derive(&self.actor_id, &self.action_type, &self.description),
        }
    }
}

// ---------------------------------------------------------------------------
// DedupKey
// ---------------------------------------------------------------------------

/// Deterministic fingerprint of a logical action.
///
/// Hex-encoded SHA-256 over the actor id plus either the
/// `(action_type, description)` pair or the caller's idempotency token. The
/// two forms are domain-separated so a token can never collide with a
/// description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

const FIELD_SEPARATOR: &[u8] = &[0x1f];

impl DedupKey {
    pub fn derive(actor_id: &str, action_type: &ActionType, description: &str) -> Self {
        Self::digest(&[
            "action",
            actor_id,
            action_type.as_str(),
            description.trim(),
        ])
    }

    pub fn from_token(actor_id: &str, token: &str) -> Self {
        Self::digest(&["token", actor_id, token.trim()])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn digest(parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                hasher.update(FIELD_SEPARATOR);
            }
            hasher.update(part.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn recycling(desc: &str) -> ActionRequest {
        ActionRequest::new("alice", ActionType::Recycling, desc)
    }

    #[test]
    fn same_tuple_gives_same_key() {
        assert_eq!(
            recycling("5kg plastic").dedup_key(),
            recycling("5kg plastic").dedup_key()
        );
    }

    #[test]
    fn key_differs_per_actor_type_and_description() {
        let base = recycling("5kg plastic").dedup_key();
        let other_actor =
            ActionRequest::new("bob", ActionType::Recycling, "5kg plastic").dedup_key();
        let other_type =
            ActionRequest::new("alice", ActionType::TreePlanting, "5kg plastic").dedup_key();
        let other_desc = recycling("6kg plastic").dedup_key();
        assert_ne!(base, other_actor);
        assert_ne!(base, other_type);
        assert_ne!(base, other_desc);
    }

    #[test]
    fn surrounding_whitespace_does_not_change_key() {
        assert_eq!(
            recycling("5kg plastic").dedup_key(),
            recycling("  5kg plastic\n").dedup_key()
        );
    }

    #[test]
    fn idempotency_token_replaces_description_fingerprint() {
        let a = recycling("first wording").with_idempotency_token("req-1");
        let b = recycling("second wording").with_idempotency_token("req-1");
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_ne!(a.dedup_key(), recycling("first wording").dedup_key());
    }

    #[test]
    fn key_is_hex_sha256() {
        let key = recycling("5kg plastic").dedup_key();
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn validate_rejects_blank_description() {
        let err = recycling("   ").validate().unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));
    }

    #[test]
    fn validate_rejects_negative_or_nan_impact() {
        assert!(recycling("x").with_impact(-1.0).validate().is_err());
        assert!(recycling("x").with_impact(f64::NAN).validate().is_err());
        assert!(recycling("x").with_impact(0.5).validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_token() {
        assert!(recycling("x").with_idempotency_token(" ").validate().is_err());
    }
}
