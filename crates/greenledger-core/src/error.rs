use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("not initialized: run 'greenledger init'")]
    NotInitialized,

    #[error("access denied: actor '{0}' is not authorized to register actions")]
    AccessDenied(String),

    #[error("registration failed: {0}")]
    RegistrationFailed(String),

    #[error("no reward strategy registered for action type '{0}'")]
    UnknownActionType(String),

    #[error("insufficient balance for actor '{actor}': balance {balance}, debit {requested}")]
    InsufficientBalance {
        actor: String,
        balance: i64,
        requested: u64,
    },

    #[error("action already rewarded (reference {0})")]
    DuplicateAction(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid actor id '{0}': must be lowercase alphanumeric with '-', '_' or '.'")]
    InvalidActorId(String),

    #[error("actor not found: {0}")]
    ActorNotFound(String),

    #[error("actor already exists: {0}")]
    ActorExists(String),

    #[error("reward not found: {0}")]
    RewardNotFound(String),

    #[error("reward already exists: {0}")]
    RewardExists(String),

    #[error("reward '{0}' is not available (inactive or out of stock)")]
    RewardUnavailable(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("ledger database error: {0}")]
    LedgerDb(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
