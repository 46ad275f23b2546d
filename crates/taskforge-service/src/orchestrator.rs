use std::sync::Arc;

use taskforge_core::assessment::ComplexityAssessment;
use taskforge_core::plan::WorkflowPlan;
use taskforge_core::remote::{ColumnState, RemoteTaskRef};
use taskforge_core::specialist::MatchResult;
use taskforge_core::task::TaskInput;
use taskforge_core::TaskforgeError;
use taskforge_engine::{Engine, PlanOptions};
use tracing::{info, warn};

use crate::sync::{CancelToken, SyncClient, SyncReport, SyncSession};

/// A plan and the outcome of persisting it, kept apart so persistence can
/// be retried without planning again.
pub struct PlanOutcome {
    pub plan: WorkflowPlan,
    pub sync: Result<SyncReport, TaskforgeError>,
    session: SyncSession,
}

impl PlanOutcome {
    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    pub fn is_synced(&self) -> bool {
        self.sync.is_ok()
    }
}

/// Entry point for the CLI and server: pure planning through the engine,
/// side effects through the sync client.
#[derive(Clone)]
pub struct Orchestrator {
    engine: Arc<Engine>,
    sync: Option<SyncClient>,
}

impl Orchestrator {
    /// Planning only; every backend operation fails with
    /// `ConfigurationMissing`.
    pub fn offline(engine: Arc<Engine>) -> Self {
        Self { engine, sync: None }
    }

    /// Fails when the sync config does not cover the engine's roster.
    pub fn new(engine: Arc<Engine>, sync: SyncClient) -> Result<Self, TaskforgeError> {
        sync.config().validate(&engine.registry().ids())?;
        Ok(Self {
            engine,
            sync: Some(sync),
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn sync_client(&self) -> Result<&SyncClient, TaskforgeError> {
        self.sync.as_ref().ok_or_else(|| {
            TaskforgeError::ConfigurationMissing("no task backend configured".into())
        })
    }

    /// Blank text is not an error: it simply matches nobody.
    pub fn suggest(&self, title: &str, description: &str) -> Result<Vec<MatchResult>, TaskforgeError> {
        let input = TaskInput::for_matching(title, description)?;
        Ok(self.engine.suggest(&input))
    }

    /// Blank text yields the fallback assessment.
    pub fn analyze(&self, title: &str, description: &str) -> Result<ComplexityAssessment, TaskforgeError> {
        let input = TaskInput::for_matching(title, description)?;
        Ok(self.engine.analyze(&input))
    }

    pub fn plan(
        &self,
        title: &str,
        description: &str,
        options: &PlanOptions,
    ) -> Result<WorkflowPlan, TaskforgeError> {
        let input = TaskInput::new(title, description)?;
        self.engine.plan(&input, options)
    }

    /// Plan, then persist. Only input and configuration problems are
    /// returned as `Err`; backend failures land in `PlanOutcome::sync`.
    pub async fn plan_and_sync(
        &self,
        title: &str,
        description: &str,
        options: &PlanOptions,
        cancel: CancelToken,
    ) -> Result<PlanOutcome, TaskforgeError> {
        let client = self.sync_client()?;
        let plan = self.plan(title, description, options)?;
        let mut session = client.session(cancel);
        info!(session = %session.id(), tier = %plan.assessment.tier, "syncing plan");
        let sync = session.persist_plan(&plan).await;
        if let Err(e) = &sync {
            warn!(session = %session.id(), error = %e, "plan computed but not persisted");
        }
        Ok(PlanOutcome {
            plan,
            sync,
            session,
        })
    }

    /// Resume persistence on the outcome's own session. Tasks it already
    /// created are reused, not created again.
    pub async fn retry_sync(&self, outcome: &mut PlanOutcome) -> Result<SyncReport, TaskforgeError> {
        if outcome.sync.is_err() {
            info!(session = %outcome.session.id(), "retrying plan persistence");
            outcome.sync = outcome.session.persist_plan(&outcome.plan).await;
        }
        outcome.sync.clone()
    }

    pub async fn move_task(
        &self,
        external_id: &str,
        target: ColumnState,
        allow_revert: bool,
        cancel: CancelToken,
    ) -> Result<RemoteTaskRef, TaskforgeError> {
        let id = require_id(external_id)?;
        let mut session = self.sync_client()?.session(cancel);
        session.move_task(id, target, allow_revert).await
    }

    pub async fn add_comment(
        &self,
        external_id: &str,
        text: &str,
        cancel: CancelToken,
    ) -> Result<(), TaskforgeError> {
        let id = require_id(external_id)?;
        let mut session = self.sync_client()?.session(cancel);
        session.add_comment(id, text).await
    }
}

fn require_id(external_id: &str) -> Result<&str, TaskforgeError> {
    let id = external_id.trim();
    if id.is_empty() || id.contains('/') {
        return Err(TaskforgeError::InvalidArgument(format!(
            "invalid task id '{external_id}'"
        )));
    }
    Ok(id)
}
