//! # Smart Filters
//!
//! Local filter-rule engine for a Gmail management client: a small rule
//! language (conditions + actions), local evaluation against loaded email,
//! durable storage of the rule set, and the lifecycle that mirrors a rule
//! into Gmail through the backend's `/api/filters` endpoints.

pub mod config;
pub mod filters;
pub mod service;
pub mod store;
pub mod sync;

pub use config::ClientConfig;
pub use filters::{
    Action, ActionType, Condition, ConditionField, ConditionOperator, Email, Filter, FilterDraft,
    FilterMatcher, FilterPatch, RemoteState, ValidationError,
};
pub use service::{InitError, SmartFilters};
pub use store::{FilterPersistence, FilterStore, JsonFileStore, MemoryStore, StoreError};
pub use sync::{
    ApplyResult, DeclineReauth, DeleteOutcome, FilterApi, FilterApiClient, FilterOperation,
    FilterTestResult, ReauthHandler, SyncError,
};

/// Initialize logging from `RUST_LOG`, defaulting to `info`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init()
        .ok();
}
