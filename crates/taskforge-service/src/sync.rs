use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use taskforge_core::plan::WorkflowPlan;
use taskforge_core::remote::{ColumnState, RemoteTaskRef};
use taskforge_core::specialist::SpecialistId;
use taskforge_core::TaskforgeError;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::retry::{self, RetryPolicy};
use crate::traits::{BackendError, NewRemoteTask, RemoteTask, TaskBackend};

pub const ABANDONED_COMMENT: &str =
    "Marked abandoned: the orchestration call that created this task was cancelled.";

/// Truncated SHA-256 of a task's title and description, hex encoded.
pub fn fingerprint(title: &str, description: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(description.as_bytes());
    let digest = hasher.finalize();
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

/// Requests cancellation of the sessions holding the paired token.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn pair() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelToken { rx })
    }

    /// A token nobody can cancel.
    pub fn never() -> Self {
        Self::pair().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Pending forever for a token whose handle
    /// was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

/// Remote references produced by persisting one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub session_id: Uuid,
    pub parent: RemoteTaskRef,
    /// Same order as the plan's subtasks.
    pub subtasks: Vec<RemoteTaskRef>,
}

/// Shared, immutable handle on the backend and its configuration.
#[derive(Clone)]
pub struct SyncClient {
    backend: Arc<dyn TaskBackend>,
    config: Arc<SyncConfig>,
    policy: RetryPolicy,
}

impl SyncClient {
    pub fn new(backend: Arc<dyn TaskBackend>, config: Arc<SyncConfig>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            config,
            policy,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Start a session for one orchestration call.
    pub fn session(&self, cancel: CancelToken) -> SyncSession {
        SyncSession {
            id: Uuid::new_v4(),
            client: self.clone(),
            cancel,
            intents: HashMap::new(),
            refs: HashMap::new(),
            comments: HashSet::new(),
            created: Vec::new(),
            abandoned: false,
        }
    }
}

/// Per-call sync state: the create-intent cache, the cached task
/// projections, and the tasks this session created.
///
/// Re-running an operation on the same session never creates a task or
/// posts a comment twice.
pub struct SyncSession {
    id: Uuid,
    client: SyncClient,
    cancel: CancelToken,
    /// Fingerprint -> external id of the created task.
    intents: HashMap<String, String>,
    refs: HashMap<String, RemoteTaskRef>,
    /// (external id, body fingerprint) of comments already posted.
    comments: HashSet<(String, String)>,
    created: Vec<String>,
    abandoned: bool,
}

impl SyncSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created(&self) -> &[String] {
        &self.created
    }

    pub fn cached(&self, external_id: &str) -> Option<&RemoteTaskRef> {
        self.refs.get(external_id)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn idempotency_key(&self, fingerprint: &str) -> String {
        format!("{}-{fingerprint}", self.id.simple())
    }

    fn to_ref(&self, task: &RemoteTask) -> Result<RemoteTaskRef, TaskforgeError> {
        let column_state = self
            .client
            .config
            .column_state(&task.column_id)
            .ok_or_else(|| {
                TaskforgeError::ValidationRejected(format!(
                    "task {} is in unmapped column '{}'",
                    task.id, task.column_id
                ))
            })?;
        Ok(RemoteTaskRef {
            external_id: task.id.clone(),
            column_state,
            owner_specialist_id: task
                .owner
                .as_deref()
                .and_then(|m| self.client.config.owner_for_marker(m)),
            synced_at: Utc::now(),
        })
    }

    /// Cache the result of a call on `external_id`, or drop the stale
    /// projection when the call failed.
    fn apply(
        &mut self,
        external_id: &str,
        result: Result<RemoteTask, TaskforgeError>,
    ) -> Result<RemoteTaskRef, TaskforgeError> {
        match result.and_then(|task| self.to_ref(&task)) {
            Ok(remote) => {
                self.refs.insert(remote.external_id.clone(), remote.clone());
                Ok(remote)
            }
            Err(err) => {
                self.refs.remove(external_id);
                Err(err)
            }
        }
    }

    /// Fail with `Cancelled` if the caller gave up. Tasks already created
    /// get a compensating comment first.
    async fn checkpoint(&mut self) -> Result<(), TaskforgeError> {
        if !self.cancel.is_cancelled() {
            return Ok(());
        }
        if self.created.is_empty() {
            info!(session = %self.id, "cancelled before any remote change");
            return Err(TaskforgeError::Cancelled(
                "cancelled before any remote change".into(),
            ));
        }
        self.abandon().await;
        Err(TaskforgeError::Cancelled(format!(
            "cancelled after creating {} task(s); marked abandoned",
            self.created.len()
        )))
    }

    /// One retried backend call that stops early once the session is
    /// cancelled. A cancelled call still compensates for earlier creates.
    async fn call<T, F, Fut>(&mut self, operation: &str, op: F) -> Result<T, TaskforgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let policy = self.client.policy;
        let result = retry::run_backend_until(&policy, operation, &self.cancel, op).await;
        if matches!(result, Err(TaskforgeError::Cancelled(_))) {
            self.checkpoint().await?;
        }
        result
    }

    async fn abandon(&mut self) {
        if self.abandoned {
            return;
        }
        self.abandoned = true;
        let backend = self.client.backend.clone();
        let policy = self.client.policy;
        for id in self.created.clone() {
            let result = retry::run_backend(&policy, "add_comment", || {
                backend.add_comment(&id, ABANDONED_COMMENT)
            })
            .await;
            match result {
                Ok(_) => info!(session = %self.id, task = %id, "marked abandoned"),
                Err(e) => warn!(session = %self.id, task = %id, error = %e, "failed to mark abandoned"),
            }
        }
    }

    /// Read a task from the backend and refresh its cached projection.
    pub async fn refresh(&mut self, external_id: &str) -> Result<RemoteTaskRef, TaskforgeError> {
        let backend = self.client.backend.clone();
        let result = self
            .call("get_task", || backend.get_task(external_id))
            .await;
        self.apply(external_id, result)
    }

    /// Create a task in the Backlog column, at most once per session for
    /// the same title and description.
    pub async fn create_task(
        &mut self,
        title: &str,
        description: &str,
    ) -> Result<RemoteTaskRef, TaskforgeError> {
        let fingerprint = fingerprint(title, description);
        if let Some(existing) = self.intents.get(&fingerprint).cloned() {
            debug!(session = %self.id, task = %existing, "create already done in this session");
            return match self.refs.get(&existing) {
                Some(cached) => Ok(cached.clone()),
                None => self.refresh(&existing).await,
            };
        }

        self.checkpoint().await?;
        let new_task = NewRemoteTask {
            title: title.to_string(),
            description: description.to_string(),
            column_id: self.client.config.column_id(ColumnState::Backlog)?.to_string(),
        };
        let key = self.idempotency_key(&fingerprint);
        let backend = self.client.backend.clone();
        let project_id = self.client.config.project_id.clone();
        let task = self
            .call("create_task", || {
                backend.create_task(&project_id, &new_task, &key)
            })
            .await?;

        self.intents.insert(fingerprint, task.id.clone());
        self.created.push(task.id.clone());
        info!(session = %self.id, task = %task.id, title, "created remote task");
        let id = task.id.clone();
        self.apply(&id, Ok(task))
    }

    pub async fn update_owner(
        &mut self,
        external_id: &str,
        specialist: SpecialistId,
    ) -> Result<RemoteTaskRef, TaskforgeError> {
        if let Some(cached) = self.refs.get(external_id) {
            if cached.owner_specialist_id == Some(specialist) {
                return Ok(cached.clone());
            }
        }
        self.checkpoint().await?;
        let marker = self.client.config.owner_marker(specialist)?.to_string();
        let backend = self.client.backend.clone();
        let result = self
            .call("update_owner", || backend.update_owner(external_id, &marker))
            .await;
        self.apply(external_id, result)
    }

    /// Move a task along the board. Invalid transitions are rejected
    /// before any mutating call; an uncached task is read first.
    pub async fn move_task(
        &mut self,
        external_id: &str,
        target: ColumnState,
        allow_revert: bool,
    ) -> Result<RemoteTaskRef, TaskforgeError> {
        let reachable = ColumnState::ALL
            .iter()
            .any(|from| from.can_transition_to(target, allow_revert));
        if !reachable {
            return Err(TaskforgeError::ValidationRejected(format!(
                "no valid move into {target} for task {external_id}{}",
                if allow_revert { "" } else { " without the revert flag" }
            )));
        }

        let current = match self.refs.get(external_id) {
            Some(cached) => cached.clone(),
            None => self.refresh(external_id).await?,
        };
        if !current.column_state.can_transition_to(target, allow_revert) {
            return Err(TaskforgeError::ValidationRejected(format!(
                "cannot move task {external_id} from {} to {target}",
                current.column_state
            )));
        }

        self.checkpoint().await?;
        let column_id = self.client.config.column_id(target)?.to_string();
        let backend = self.client.backend.clone();
        let result = self
            .call("move_column", || backend.move_column(external_id, &column_id))
            .await;
        let moved = self.apply(external_id, result)?;
        info!(session = %self.id, task = external_id, from = %current.column_state, to = %target, "moved task");
        Ok(moved)
    }

    /// Post a comment, at most once per session for the same task and body.
    pub async fn add_comment(&mut self, external_id: &str, body: &str) -> Result<(), TaskforgeError> {
        if body.trim().is_empty() {
            return Err(TaskforgeError::InvalidArgument("comment must not be empty".into()));
        }
        let key = (external_id.to_string(), fingerprint("", body));
        if self.comments.contains(&key) {
            return Ok(());
        }
        self.checkpoint().await?;
        let backend = self.client.backend.clone();
        let result = self
            .call("add_comment", || backend.add_comment(external_id, body))
            .await;
        match result {
            Ok(_) => {
                self.comments.insert(key);
                Ok(())
            }
            Err(err) => {
                self.refs.remove(external_id);
                Err(err)
            }
        }
    }

    /// Persist a plan: parent task, owner and assessment summary, then one
    /// task per subtask, then dependency comments once every subtask
    /// exists. Safe to call again on the same session after a failure.
    pub async fn persist_plan(&mut self, plan: &WorkflowPlan) -> Result<SyncReport, TaskforgeError> {
        let task = &plan.original_task;
        let parent = self.create_task(&task.title, &task.description).await?;
        let parent = self
            .update_owner(&parent.external_id, plan.assigned_specialist)
            .await?;
        self.add_comment(&parent.external_id, &plan.assessment.summary())
            .await?;

        let mut subtasks = Vec::with_capacity(plan.subtasks.len());
        for subtask in &plan.subtasks {
            let created = self.create_task(&subtask.title, &subtask.description).await?;
            let owned = self
                .update_owner(&created.external_id, subtask.assigned_specialist)
                .await?;
            subtasks.push(owned);
        }

        for (i, subtask) in plan.subtasks.iter().enumerate() {
            if let Some(dep) = subtask.depends_on {
                let body = format!(
                    "Depends on: {} ({})",
                    plan.subtasks[dep].title, subtasks[dep].external_id
                );
                self.add_comment(&subtasks[i].external_id, &body).await?;
            }
        }
        if !subtasks.is_empty() {
            let graph = graph_comment(plan, &subtasks);
            self.add_comment(&parent.external_id, &graph).await?;
        }

        info!(
            session = %self.id,
            parent = %parent.external_id,
            subtasks = subtasks.len(),
            "persisted plan"
        );
        Ok(SyncReport {
            session_id: self.id,
            parent,
            subtasks,
        })
    }
}

fn graph_comment(plan: &WorkflowPlan, refs: &[RemoteTaskRef]) -> String {
    let mut out = String::from("Workflow:");
    for (i, (subtask, remote)) in plan.subtasks.iter().zip(refs).enumerate() {
        out.push_str(&format!(
            "\n{}. {} [{}] -> {} ({:.1}h)",
            i + 1,
            subtask.title,
            remote.external_id,
            subtask.assigned_specialist,
            subtask.estimated_hours
        ));
        if let Some(dep) = subtask.depends_on {
            out.push_str(&format!(", after {}", dep + 1));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_separated() {
        assert_eq!(fingerprint("a", "b"), fingerprint("a", "b"));
        assert_eq!(fingerprint("a", "b").len(), 32);
        assert_ne!(fingerprint("ab", ""), fingerprint("a", "b"));
    }

    #[test]
    fn test_cancel_token() {
        let (handle, token) = CancelToken::pair();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
        assert!(!CancelToken::never().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let (handle, token) = CancelToken::pair();
        let waiter = tokio::spawn({
            let token = token.clone();
            async move { token.cancelled().await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        handle.cancel();
        waiter.await.unwrap();

        // Cancelled before the handle went away still counts.
        let (handle, token) = CancelToken::pair();
        handle.cancel();
        drop(handle);
        token.cancelled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_token_stays_pending() {
        let never = CancelToken::never();
        let waited =
            tokio::time::timeout(std::time::Duration::from_secs(60), never.cancelled()).await;
        assert!(waited.is_err());
    }
}
