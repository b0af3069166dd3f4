pub mod action;
pub mod actor;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gate;
pub mod io;
pub mod ledger;
pub mod paths;
pub mod pipeline;
pub mod registrar;
pub mod strategy;
pub mod types;

pub use error::{LedgerError, Result};
pub use gate::{RegistrationGate, RegistrationResult};
