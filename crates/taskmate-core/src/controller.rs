//! Session-side owner of the task list.
//!
//! The controller never updates its list ahead of the store: each mutation
//! awaits the store first and only then applies the confirmed result. Views
//! read the list through [`TaskController::list_tasks`] or follow it through
//! [`TaskController::subscribe`], and drain user-facing messages with
//! [`TaskController::take_notices`].

use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::error::TaskError;
use crate::store::TaskStore;
use crate::task::{Task, TaskFormData, TaskId, TaskPatch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub tasks: Vec<Task>,
    pub loading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self.level {
            NoticeLevel::Success => "Success",
            NoticeLevel::Error => "Error",
        }
    }
}

pub struct TaskController {
    store: Box<dyn TaskStore>,
    state: watch::Sender<ViewState>,
    notices: Vec<Notice>,
}

impl TaskController {
    pub fn new(store: Box<dyn TaskStore>) -> Self {
        let (state, _) = watch::channel(ViewState {
            tasks: Vec::new(),
            loading: true,
        });
        Self {
            store,
            state,
            notices: Vec::new(),
        }
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.state.borrow().tasks.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Fetch the full collection. A failed read leaves an empty list and an
    /// error notice; it is never returned to the caller.
    #[instrument(skip(self), fields(backend = self.store.backend()))]
    pub async fn load(&mut self) {
        self.state.send_modify(|state| state.loading = true);

        let tasks = match self.store.try_list().await {
            Ok(tasks) => tasks,
            Err(err) => {
                error!(error = %err, "failed to load tasks");
                self.notices.push(Notice::error("Failed to load tasks"));
                Vec::new()
            }
        };

        info!(count = tasks.len(), "tasks loaded");
        self.state.send_modify(|state| {
            state.tasks = tasks;
            state.loading = false;
        });
    }

    #[instrument(skip(self, form), fields(title_len = form.title.len()))]
    pub async fn add_task(&mut self, form: TaskFormData) -> Result<Task, TaskError> {
        if let Err(err) = form.validate() {
            self.notices.push(Notice::error(err.to_string()));
            return Err(err.into());
        }

        match self.store.create(form).await {
            Ok(task) => {
                debug!(id = %task.id, "task created");
                let added = task.clone();
                self.state.send_modify(|state| state.tasks.push(added));
                self.notices.push(Notice::success("Task added successfully"));
                Ok(task)
            }
            Err(err) => {
                error!(error = %err, "failed to add task");
                self.notices.push(Notice::error("Failed to add task"));
                Err(err.into())
            }
        }
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn set_task_completed(&mut self, id: &TaskId, completed: bool) -> Result<(), TaskError> {
        match self.store.update(id, TaskPatch::completed(completed)).await {
            Ok(_) => {
                self.state.send_modify(|state| {
                    for task in state.tasks.iter_mut().filter(|task| task.id == *id) {
                        task.completed = completed;
                    }
                });
                debug!(completed, "task completion confirmed");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "failed to update task status");
                self.notices.push(Notice::error("Failed to update task status"));
                Err(err.into())
            }
        }
    }

    #[instrument(skip(self, patch), fields(id = %id))]
    pub async fn edit_task(&mut self, id: &TaskId, patch: TaskPatch) -> Result<Task, TaskError> {
        if let Err(err) = patch.validate() {
            self.notices.push(Notice::error(err.to_string()));
            return Err(err.into());
        }

        match self.store.update(id, patch).await {
            Ok(updated) => {
                let replacement = updated.clone();
                self.state.send_modify(|state| {
                    for task in state.tasks.iter_mut().filter(|task| task.id == *id) {
                        *task = replacement.clone();
                    }
                });
                self.notices.push(Notice::success("Task updated successfully"));
                Ok(updated)
            }
            Err(err) => {
                error!(error = %err, "failed to update task");
                self.notices.push(Notice::error("Failed to update task"));
                Err(err.into())
            }
        }
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete_task(&mut self, id: &TaskId) -> Result<(), TaskError> {
        match self.store.delete(id).await {
            Ok(()) => {
                self.state.send_modify(|state| state.tasks.retain(|task| task.id != *id));
                self.notices.push(Notice::success("Task deleted successfully"));
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "failed to delete task");
                self.notices.push(Notice::error("Failed to delete task"));
                Err(err.into())
            }
        }
    }
}
