//! Sync Module - Gmail-side counterparts of local filters
//!
//! Provides:
//! - REST client for the `/api/filters` endpoints
//! - Draft -> Synced lifecycle with permission-error recovery
//! - Dry-run tests and retroactive apply
//! - Per-filter operation state so remote calls never overlap
//!
//! Nothing here retries on its own; every failure is returned to the caller
//! with the filter back in `Idle`.

pub mod api;
pub mod coordinator;
pub mod models;
pub mod runner;
pub mod state;

#[cfg(test)]
pub(crate) mod mock;


pub use api::{FilterApi, FilterApiClient, FilterApiError};
pub use coordinator::{
    DeclineReauth, DeleteOutcome, ReauthHandler, SyncCoordinator, SyncError, SyncResult,
};
pub use models::{ApplyResult, FilterTestResult};
pub use runner::{ApplyExecutor, TestRunner};
pub use state::{FilterOperation, OperationTracker};
