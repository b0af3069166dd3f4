//! The registration gate: the one entry point for "register this action and
//! reward it".
//!
//! Order of checks for every request:
//!
//! 1. request shape (non-empty type and description)
//! 2. actor lookup and authorization, before anything is read or written
//! 3. balance-update capability on the actor store
//! 4. under the dedup-key lock: look for a prior `Action` entry and replay it,
//!    or build the registrar (first time only), register, and run the
//!    reward pipeline
//!
//! A rejected or duplicate request never constructs the registrar and never
//! appends to the ledger.

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::action::{ActionRequest, DedupKey};
use crate::actor::{ActorDirectory, BalanceProjection};
use crate::error::{LedgerError, Result};
use crate::ledger::{Ledger, LedgerEntry};
use crate::pipeline::{AwardContext, Pipeline};
use crate::registrar::ActionRegistrar;
use crate::strategy::StrategyRegistry;
use crate::types::EntrySource;

/// Builds the registrar on the first admitted request.
pub type RegistrarFactory = Box<dyn Fn() -> Result<ActionRegistrar> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResult {
    pub actor_id: String,
    /// Confirmation text from the registrar. Replayed verbatim for duplicates.
    pub confirmation: String,
    /// Base amount the action earned. Same value on every resubmission.
    pub tokens_awarded: i64,
    /// Tokens added to the balance by this call, bonus included. Zero for
    /// duplicates.
    pub tokens_credited: i64,
    pub bonus_awarded: i64,
    pub balance_after: i64,
    pub duplicate: bool,
    pub dedup_key: String,
}

pub struct RegistrationGate {
    actors: Arc<dyn ActorDirectory>,
    ledger: Arc<Ledger>,
    strategies: Arc<StrategyRegistry>,
    pipeline: Pipeline,
    factory: RegistrarFactory,
    registrar: OnceLock<ActionRegistrar>,
}

impl RegistrationGate {
    pub fn new(
        actors: Arc<dyn ActorDirectory>,
        ledger: Arc<Ledger>,
        strategies: Arc<StrategyRegistry>,
        pipeline: Pipeline,
        factory: impl Fn() -> Result<ActionRegistrar> + Send + Sync + 'static,
    ) -> Self {
        Self {
            actors,
            ledger,
            strategies,
            pipeline,
            factory: Box::new(factory),
            registrar: OnceLock::new(),
        }
    }

    /// Whether the registrar has been built yet.
    pub fn registrar_initialized(&self) -> bool {
        self.registrar.get().is_some()
    }

    pub fn register(&self, request: &ActionRequest) -> Result<RegistrationResult> {
        request.validate()?;

        let actor = self.actors.lookup(&request.actor_id)?;
        if !actor.authorized {
            tracing::warn!(actor = %actor.id, "unauthorized registration attempt");
            return Err(LedgerError::AccessDenied(actor.id));
        }

        let projection = self.actors.balance_projection().ok_or_else(|| {
            LedgerError::RegistrationFailed(
                "actor store has no balance-update capability".to_string(),
            )
        })?;

        let key = request.dedup_key();
        self.ledger.with_key_guard(&key, || {
            if let Some(prior) = self.ledger.find_action(&request.actor_id, &key)? {
                return self.replay(prior, &key);
            }
            match self.admit(request, &key, projection) {
                Err(LedgerError::DuplicateAction(reference)) => {
                    // Another writer recorded the same action between our
                    // check and our append.
                    match self.ledger.find_action(&request.actor_id, &key)? {
                        Some(prior) => self.replay(prior, &key),
                        None => Err(LedgerError::DuplicateAction(reference)),
                    }
                }
                other => other,
            }
        })
    }

    fn admit(
        &self,
        request: &ActionRequest,
        key: &DedupKey,
        projection: &dyn BalanceProjection,
    ) -> Result<RegistrationResult> {
        let confirmation = self.registrar()?.register(
            &request.actor_id,
            &request.action_type,
            &request.description,
            request.impact,
        )?;

        let ctx = AwardContext::new(
            &self.ledger,
            projection,
            &self.strategies,
            key,
            &confirmation,
        );
        let tokens = self.pipeline.run(&ctx, request)?;
        let appended = ctx.into_appended();

        let bonus: i64 = appended
            .iter()
            .filter(|e| e.source == EntrySource::Bonus)
            .map(|e| e.amount)
            .sum();
        let credited: i64 = appended.iter().map(|e| e.amount).sum();
        let balance_after = match appended.last() {
            Some(entry) => entry.balance_after,
            None => self.ledger.balance_of(&request.actor_id)?,
        };

        tracing::info!(
            target: "greenledger::audit",
            actor = %request.actor_id,
            action_type = %request.action_type,
            tokens,
            bonus,
            balance_after,
            "action rewarded"
        );

        Ok(RegistrationResult {
            actor_id: request.actor_id.clone(),
            confirmation,
            tokens_awarded: tokens,
            tokens_credited: credited,
            bonus_awarded: bonus,
            balance_after,
            duplicate: false,
            dedup_key: key.to_string(),
        })
    }

    fn replay(&self, prior: LedgerEntry, key: &DedupKey) -> Result<RegistrationResult> {
        tracing::debug!(
            actor = %prior.actor_id,
            seq = prior.seq,
            "duplicate submission; replaying original result"
        );
        let balance_after = self.ledger.balance_of(&prior.actor_id)?;
        Ok(RegistrationResult {
            actor_id: prior.actor_id,
            confirmation: prior.description,
            tokens_awarded: prior.amount,
            tokens_credited: 0,
            bonus_awarded: 0,
            balance_after,
            duplicate: true,
            dedup_key: key.to_string(),
        })
    }

    fn registrar(&self) -> Result<&ActionRegistrar> {
        if let Some(registrar) = self.registrar.get() {
            return Ok(registrar);
        }
        let built = (self.factory)().map_err(|e| match e {
            LedgerError::RegistrationFailed(_) => e,
            other => LedgerError::RegistrationFailed(format!("cannot build registrar: {other}")),
        })?;
        tracing::debug!("action registrar constructed");
        Ok(self.registrar.get_or_init(|| built))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, MemoryActors};
    use crate::registrar::{ActionRecord, ActionStore, MemoryActionStore};

    struct Fixture {
        gate: RegistrationGate,
        actors: Arc<MemoryActors>,
        ledger: Arc<Ledger>,
        store: Arc<MemoryActionStore>,
    }

    fn gate_with(actors: Arc<MemoryActors>, ledger: Arc<Ledger>) -> Fixture {
        let store = Arc::new(MemoryActionStore::new());
        let factory_store = Arc::clone(&store);
        let gate = RegistrationGate::new(
            actors.clone(),
            Arc::clone(&ledger),
            Arc::new(StrategyRegistry::standard()),
            Pipeline::standard(),
            move || Ok(ActionRegistrar::new(factory_store.clone())),
        );
        Fixture {
            gate,
            actors,
            ledger,
            store,
        }
    }

    fn fixture() -> Fixture {
        let actors = Arc::new(MemoryActors::with([
            Actor::authorized("alice"),
            Actor::unauthorized("mallory"),
        ]));
        gate_with(actors, Arc::new(Ledger::in_memory()))
    }

    fn request(actor: &str, tag: &str, desc: &str) -> ActionRequest {
        ActionRequest::new(actor, tag.parse().unwrap(), desc)
    }

    #[test]
    fn reference_scenario() {
        let f = fixture();

        let first = f
            .gate
            .register(&request("alice", "Reciclagem", "5kg plastic"))
            .unwrap();
        assert_eq!(first.tokens_awarded, 10);
        assert_eq!(first.balance_after, 10);
        assert!(!first.duplicate);

        let second = f
            .gate
            .register(&request("alice", "PlantioArvore", "1 sapling"))
            .unwrap();
        assert_eq!(second.tokens_awarded, 25);
        assert_eq!(second.bonus_awarded, 5);
        assert_eq!(second.tokens_credited, 30);
        assert_eq!(second.balance_after, 40);

        let again = f
            .gate
            .register(&request("alice", "Reciclagem", "5kg plastic"))
            .unwrap();
        assert!(again.duplicate);
        assert_eq!(again.confirmation, first.confirmation);
        assert_eq!(again.balance_after, 40);

        let sources: Vec<_> = f
            .ledger
            .history("alice")
            .unwrap()
            .iter()
            .map(|e| (e.amount, e.source))
            .collect();
        assert_eq!(
            sources,
            vec![
                (10, EntrySource::Action),
                (25, EntrySource::Action),
                (5, EntrySource::Bonus),
            ]
        );
        assert_eq!(f.actors.lookup("alice").unwrap().balance, 40);
    }

    #[test]
    fn resubmission_is_idempotent() {
        let f = fixture();
        let req = request("alice", "recycling", "5kg plastic");
        let first = f.gate.register(&req).unwrap();
        let second = f.gate.register(&req).unwrap();

        assert_eq!(first.tokens_awarded, second.tokens_awarded);
        assert_eq!(first.tokens_credited, 10);
        assert_eq!(second.tokens_credited, 0);
        assert_eq!(first.dedup_key, second.dedup_key);
        assert_eq!(f.ledger.history("alice").unwrap().len(), 1);
        assert_eq!(f.store.records().len(), 1);
    }

    #[test]
    fn description_whitespace_does_not_defeat_dedup() {
        let f = fixture();
        f.gate
            .register(&request("alice", "recycling", "5kg plastic"))
            .unwrap();
        let again = f
            .gate
            .register(&request("alice", "recycling", "  5kg plastic "))
            .unwrap();
        assert!(again.duplicate);
    }

    #[test]
    fn idempotency_token_overrides_description() {
        let f = fixture();
        let a = request("alice", "recycling", "morning run").with_idempotency_token("req-1");
        let b = request("alice", "recycling", "evening run").with_idempotency_token("req-1");
        f.gate.register(&a).unwrap();
        let second = f.gate.register(&b).unwrap();
        assert!(second.duplicate);
        assert_eq!(f.ledger.balance_of("alice").unwrap(), 10);
    }

    #[test]
    fn access_denied_leaves_no_trace() {
        let f = fixture();
        let err = f
            .gate
            .register(&request("mallory", "tree_planting", "1 sapling"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccessDenied(id) if id == "mallory"));
        assert!(f.ledger.history("mallory").unwrap().is_empty());
        assert_eq!(f.actors.lookup("mallory").unwrap().balance, 0);
        assert!(!f.gate.registrar_initialized());
        assert!(f.store.records().is_empty());
    }

    #[test]
    fn registrar_is_built_lazily_once() {
        let f = fixture();
        assert!(!f.gate.registrar_initialized());
        f.gate
            .register(&request("alice", "recycling", "a"))
            .unwrap();
        assert!(f.gate.registrar_initialized());
        f.gate
            .register(&request("alice", "recycling", "b"))
            .unwrap();
        assert_eq!(f.store.records().len(), 2);
    }

    #[test]
    fn duplicate_path_never_builds_registrar() {
        let actors = Arc::new(MemoryActors::with([Actor::authorized("alice")]));
        let ledger = Arc::new(Ledger::in_memory());
        let first = gate_with(actors.clone(), Arc::clone(&ledger));
        first
            .gate
            .register(&request("alice", "recycling", "a"))
            .unwrap();

        let second = gate_with(actors, ledger);
        let replay = second
            .gate
            .register(&request("alice", "recycling", "a"))
            .unwrap();
        assert!(replay.duplicate);
        assert!(!second.gate.registrar_initialized());
    }

    #[test]
    fn unknown_actor_is_not_found() {
        let f = fixture();
        let err = f
            .gate
            .register(&request("nobody", "recycling", "a"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::ActorNotFound(_)));
    }

    #[test]
    fn empty_description_is_invalid() {
        let f = fixture();
        let err = f
            .gate
            .register(&request("alice", "recycling", "   "))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));
        assert!(!f.gate.registrar_initialized());
    }

    #[test]
    fn unknown_action_type_earns_zero() {
        let f = fixture();
        let result = f
            .gate
            .register(&request("alice", "Unknown", "mystery deed"))
            .unwrap();
        assert_eq!(result.tokens_awarded, 0);
        assert_eq!(result.balance_after, 0);
        let history = f.ledger.history("alice").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].source, EntrySource::Action);
    }

    struct NoProjection(MemoryActors);

    impl ActorDirectory for NoProjection {
        fn lookup(&self, actor_id: &str) -> Result<Actor> {
            self.0.lookup(actor_id)
        }
    }

    #[test]
    fn missing_projection_is_registration_failed() {
        let ledger = Arc::new(Ledger::in_memory());
        let gate = RegistrationGate::new(
            Arc::new(NoProjection(MemoryActors::with([Actor::authorized("alice")]))),
            Arc::clone(&ledger),
            Arc::new(StrategyRegistry::standard()),
            Pipeline::standard(),
            || Ok(ActionRegistrar::new(Arc::new(MemoryActionStore::new()))),
        );
        let err = gate
            .register(&request("alice", "recycling", "a"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::RegistrationFailed(_)));
        assert!(ledger.history("alice").unwrap().is_empty());
        assert!(!gate.registrar_initialized());
    }

    struct BrokenStore;

    impl ActionStore for BrokenStore {
        fn persist(&self, _record: &ActionRecord) -> Result<()> {
            Err(LedgerError::Io(std::io::Error::other("store offline")))
        }
    }

    #[test]
    fn registrar_failure_propagates_without_credit() {
        let ledger = Arc::new(Ledger::in_memory());
        let gate = RegistrationGate::new(
            Arc::new(MemoryActors::with([Actor::authorized("alice")])),
            Arc::clone(&ledger),
            Arc::new(StrategyRegistry::standard()),
            Pipeline::standard(),
            || Ok(ActionRegistrar::new(Arc::new(BrokenStore))),
        );
        let err = gate
            .register(&request("alice", "recycling", "a"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::RegistrationFailed(msg) if msg.contains("store offline")));
        assert!(ledger.history("alice").unwrap().is_empty());
    }

    #[test]
    fn factory_failure_is_registration_failed() {
        let gate = RegistrationGate::new(
            Arc::new(MemoryActors::with([Actor::authorized("alice")])),
            Arc::new(Ledger::in_memory()),
            Arc::new(StrategyRegistry::standard()),
            Pipeline::bare(),
            || Err(LedgerError::NotInitialized),
        );
        let err = gate
            .register(&request("alice", "recycling", "a"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::RegistrationFailed(_)));
        assert!(!gate.registrar_initialized());
    }

    #[test]
    fn concurrent_duplicates_credit_once() {
        let f = fixture();
        let gate = Arc::new(f.gate);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                std::thread::spawn(move || {
                    gate.register(&request("alice", "tree_planting", "1 sapling"))
                        .unwrap()
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| !r.duplicate).count(), 1);
        assert!(results.iter().all(|r| r.tokens_awarded == 25));
        assert_eq!(f.ledger.balance_of("alice").unwrap(), 30);
        assert_eq!(f.ledger.history("alice").unwrap().len(), 2);
        assert_eq!(f.store.records().len(), 1);
    }

    #[test]
    fn balance_matches_sum_after_mixed_activity() {
        let f = fixture();
        for (tag, desc) in [
            ("recycling", "a"),
            ("public_transport", "b"),
            ("resource_saving", "c"),
            ("recycling", "a"),
            ("proper_disposal", "d"),
        ] {
            f.gate.register(&request("alice", tag, desc)).unwrap();
        }
        let sum: i64 = f
            .ledger
            .history("alice")
            .unwrap()
            .iter()
            .map(|e| e.amount)
            .sum();
        assert_eq!(sum, 10 + 15 + 20 + 5 + 15);
        assert_eq!(f.ledger.balance_of("alice").unwrap(), sum);
        assert!(f.ledger.verify("alice").unwrap().is_consistent());
    }

    #[test]
    fn different_actors_same_description_both_credited() {
        let actors = Arc::new(MemoryActors::with([
            Actor::authorized("alice"),
            Actor::authorized("bob"),
        ]));
        let f = gate_with(actors, Arc::new(Ledger::in_memory()));
        f.gate
            .register(&request("alice", "recycling", "5kg plastic"))
            .unwrap();
        let bob = f
            .gate
            .register(&request("bob", "recycling", "5kg plastic"))
            .unwrap();
        assert!(!bob.duplicate);
        assert_eq!(bob.balance_after, 10);
    }
}
