use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::traits::{BackendError, NewRemoteTask, RemoteComment, RemoteTask, TaskBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    CreateTask,
    GetTask,
    UpdateOwner,
    MoveColumn,
    AddComment,
    ListTasks,
}

/// One call received by the backend, successful or not.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub op: BackendOp,
    pub task_id: Option<String>,
    pub at: Instant,
}

#[derive(Default)]
struct State {
    tasks: Vec<RemoteTask>,
    project_of: HashMap<String, String>,
    comments: Vec<RemoteComment>,
    idempotency: HashMap<String, String>,
    failures: HashMap<BackendOp, VecDeque<BackendError>>,
    calls: Vec<RecordedCall>,
    next_id: u64,
}

/// In-process backend for tests and dry runs.
///
/// Failures can be scripted per operation; each scripted error is returned
/// once, in order, before the operation starts succeeding again.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue errors for the next calls of `op`.
    pub fn fail_next(&self, op: BackendOp, errors: Vec<BackendError>) {
        let mut state = self.lock();
        state.failures.entry(op).or_default().extend(errors);
    }

    /// Insert a task directly, bypassing the call log.
    pub fn seed_task(&self, project_id: &str, task: RemoteTask) {
        let mut state = self.lock();
        state
            .project_of
            .insert(task.id.clone(), project_id.to_string());
        state.tasks.push(task);
    }

    pub fn tasks(&self) -> Vec<RemoteTask> {
        self.lock().tasks.clone()
    }

    pub fn task(&self, id: &str) -> Option<RemoteTask> {
        self.lock().tasks.iter().find(|t| t.id == id).cloned()
    }

    pub fn comments_for(&self, id: &str) -> Vec<String> {
        self.lock()
            .comments
            .iter()
            .filter(|c| c.task_id == id)
            .map(|c| c.body.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, op: BackendOp) -> Vec<RecordedCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic while holding the lock only happens in a failing test.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Log the call and pop a scripted failure, if any.
    fn begin(&self, state: &mut State, op: BackendOp, task_id: Option<&str>) -> Result<(), BackendError> {
        state.calls.push(RecordedCall {
            op,
            task_id: task_id.map(String::from),
            at: Instant::now(),
        });
        match state.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn find_mut<'a>(state: &'a mut State, id: &str) -> Result<&'a mut RemoteTask, BackendError> {
    state
        .tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| BackendError::NotFound(format!("task {id} not found")))
}

#[async_trait]
impl TaskBackend for MemoryBackend {
    async fn create_task(
        &self,
        project_id: &str,
        task: &NewRemoteTask,
        idempotency_key: &str,
    ) -> Result<RemoteTask, BackendError> {
        let mut state = self.lock();
        self.begin(&mut state, BackendOp::CreateTask, None)?;

        if let Some(existing) = state.idempotency.get(idempotency_key).cloned() {
            return find_mut(&mut state, &existing).map(|t| t.clone());
        }
        if task.title.trim().is_empty() {
            return Err(BackendError::Rejected {
                status: 422,
                message: "title must not be empty".into(),
            });
        }

        state.next_id += 1;
        let created = RemoteTask {
            id: format!("task-{}", state.next_id),
            title: task.title.clone(),
            description: task.description.clone(),
            column_id: task.column_id.clone(),
            owner: None,
        };
        state
            .idempotency
            .insert(idempotency_key.to_string(), created.id.clone());
        state
            .project_of
            .insert(created.id.clone(), project_id.to_string());
        state.tasks.push(created.clone());
        Ok(created)
    }

    async fn get_task(&self, id: &str) -> Result<RemoteTask, BackendError> {
        let mut state = self.lock();
        self.begin(&mut state, BackendOp::GetTask, Some(id))?;
        find_mut(&mut state, id).map(|t| t.clone())
    }

    async fn update_owner(&self, id: &str, owner: &str) -> Result<RemoteTask, BackendError> {
        let mut state = self.lock();
        self.begin(&mut state, BackendOp::UpdateOwner, Some(id))?;
        let task = find_mut(&mut state, id)?;
        task.owner = Some(owner.to_string());
        Ok(task.clone())
    }

    async fn move_column(&self, id: &str, column_id: &str) -> Result<RemoteTask, BackendError> {
        let mut state = self.lock();
        self.begin(&mut state, BackendOp::MoveColumn, Some(id))?;
        let task = find_mut(&mut state, id)?;
        task.column_id = column_id.to_string();
        Ok(task.clone())
    }

    async fn add_comment(&self, id: &str, body: &str) -> Result<RemoteComment, BackendError> {
        let mut state = self.lock();
        self.begin(&mut state, BackendOp::AddComment, Some(id))?;
        find_mut(&mut state, id)?;
        state.next_id += 1;
        let comment = RemoteComment {
            id: format!("comment-{}", state.next_id),
            task_id: id.to_string(),
            body: body.to_string(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_tasks(&self, project_id: &str) -> Result<Vec<RemoteTask>, BackendError> {
        let mut state = self.lock();
        self.begin(&mut state, BackendOp::ListTasks, None)?;
        let tasks = state
            .tasks
            .iter()
            .filter(|t| state.project_of.get(&t.id).map(String::as_str) == Some(project_id))
            .cloned()
            .collect();
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(title: &str) -> NewRemoteTask {
        NewRemoteTask {
            title: title.into(),
            description: String::new(),
            column_id: "col-backlog".into(),
        }
    }

    #[tokio::test]
    async fn test_idempotency_key_returns_first_task() {
        let backend = MemoryBackend::new();
        let first = backend.create_task("p1", &new_task("A"), "key-1").await.unwrap();
        let again = backend.create_task("p1", &new_task("A"), "key-1").await.unwrap();
        assert_eq!(first, again);
        assert_eq!(backend.tasks().len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed_in_order() {
        let backend = MemoryBackend::new();
        backend.fail_next(
            BackendOp::GetTask,
            vec![
                BackendError::Connection("reset".into()),
                BackendError::NotFound("gone".into()),
            ],
        );
        assert_eq!(
            backend.get_task("x").await.unwrap_err(),
            BackendError::Connection("reset".into())
        );
        assert_eq!(
            backend.get_task("x").await.unwrap_err(),
            BackendError::NotFound("gone".into())
        );
        assert!(matches!(
            backend.get_task("x").await.unwrap_err(),
            BackendError::NotFound(_)
        ));
        assert_eq!(backend.calls_of(BackendOp::GetTask).len(), 3);
    }

    #[tokio::test]
    async fn test_list_tasks_by_project() {
        let backend = MemoryBackend::new();
        backend.create_task("p1", &new_task("A"), "k1").await.unwrap();
        backend.create_task("p2", &new_task("B"), "k2").await.unwrap();
        let listed = backend.list_tasks("p1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "A");
    }

    #[tokio::test]
    async fn test_comment_on_unknown_task_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.add_comment("missing", "hi").await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }
}
