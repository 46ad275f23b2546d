pub mod config;
mod http;
mod memory;
mod orchestrator;
pub mod retry;
pub mod sync;
mod traits;

pub use config::SyncConfig;
pub use http::{HttpBackend, IDEMPOTENCY_HEADER};
pub use memory::{BackendOp, MemoryBackend, RecordedCall};
pub use orchestrator::{Orchestrator, PlanOutcome};
pub use retry::{RetryDecision, RetryPolicy};
pub use sync::{CancelHandle, CancelToken, SyncClient, SyncReport, SyncSession};
pub use traits::{BackendError, NewRemoteTask, RemoteComment, RemoteTask, TaskBackend};
