use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use taskmate_core::controller::{Notice, NoticeLevel, TaskController};
use taskmate_core::error::{ErrorKind, StoreError};
use taskmate_core::filter::{CategoryFilter, filter_tasks};
use taskmate_core::store::{LocalTaskStore, TaskStore};
use taskmate_core::task::{Category, Task, TaskFormData, TaskId, TaskPatch};
use tempfile::{TempDir, tempdir};

fn due() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 18).unwrap()
}

fn local_controller() -> (TempDir, TaskController) {
    let dir = tempdir().unwrap();
    let store = LocalTaskStore::open(dir.path(), "tasks").unwrap();
    (dir, TaskController::new(Box::new(store)))
}

fn messages(notices: &[Notice]) -> Vec<(NoticeLevel, &str)> {
    notices
        .iter()
        .map(|notice| (notice.level, notice.message.as_str()))
        .collect()
}

/// In-memory store whose every call can be switched to fail. Clones share state.
#[derive(Clone, Default)]
struct FlakyStore {
    tasks: Arc<Mutex<Vec<Task>>>,
    failing: Arc<AtomicBool>,
}

impl FlakyStore {
    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Status {
                method: "TEST".to_string(),
                url: "memory://tasks".to_string(),
                status: 503,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    async fn try_list(&self) -> Result<Vec<Task>, StoreError> {
        self.check()?;
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn create(&self, data: TaskFormData) -> Result<Task, StoreError> {
        self.check()?;
        let task = Task::from_form(TaskId::generate(), data);
        self.tasks.lock().unwrap().push(task.clone());
        Ok(task)
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
        self.check()?;
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .iter_mut()
            .find(|task| task.id == *id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        task.apply_patch(&patch);
        Ok(task.clone())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
        self.check()?;
        self.tasks.lock().unwrap().retain(|task| task.id != *id);
        Ok(())
    }
}

fn flaky_controller() -> (FlakyStore, TaskController) {
    let store = FlakyStore::default();
    (store.clone(), TaskController::new(Box::new(store)))
}

#[tokio::test]
async fn load_exposes_loading_then_persisted_tasks() {
    let (dir, mut controller) = local_controller();
    let seeded = LocalTaskStore::open(dir.path(), "tasks").unwrap();
    seeded.create(TaskFormData::new("Existing", due())).await.unwrap();

    let mut view = controller.subscribe();
    assert!(controller.is_loading());

    controller.load().await;

    assert!(!controller.is_loading());
    assert!(view.has_changed().unwrap());
    let state = view.borrow_and_update().clone();
    assert!(!state.loading);
    assert_eq!(state.tasks.len(), 1);
    assert_eq!(state.tasks[0].title, "Existing");
    assert!(controller.take_notices().is_empty());
}

#[tokio::test]
async fn cold_store_loads_empty() {
    let (_dir, mut controller) = local_controller();
    controller.load().await;
    assert!(controller.list_tasks().is_empty());
    assert!(controller.take_notices().is_empty());
}

#[tokio::test]
async fn crud_keeps_memory_in_step_with_store() {
    let (dir, mut controller) = local_controller();
    controller.load().await;

    let milk = controller
        .add_task(TaskFormData::new("Buy milk", due()).with_category(Category::Shopping))
        .await
        .unwrap();
    let report = controller
        .add_task(TaskFormData::new("Write report", due()).with_category(Category::Work))
        .await
        .unwrap();

    controller.set_task_completed(&milk.id, true).await.unwrap();
    let edited = controller
        .edit_task(
            &report.id,
            TaskPatch {
                description: Some("due friday".to_string()),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.description, "due friday");

    let in_memory = controller.list_tasks();
    let persisted = LocalTaskStore::open(dir.path(), "tasks").unwrap().list().await;
    assert_eq!(in_memory, persisted);
    assert!(in_memory[0].completed);

    let work = filter_tasks(&in_memory, "", &CategoryFilter::parse("work"));
    assert_eq!(work, vec![edited]);

    controller.delete_task(&milk.id).await.unwrap();
    assert_eq!(controller.list_tasks().len(), 1);
    assert!(controller.list_tasks().iter().all(|task| task.id != milk.id));

    assert_eq!(
        messages(&controller.take_notices()),
        vec![
            (NoticeLevel::Success, "Task added successfully"),
            (NoticeLevel::Success, "Task added successfully"),
            (NoticeLevel::Success, "Task updated successfully"),
            (NoticeLevel::Success, "Task deleted successfully"),
        ]
    );
}

#[tokio::test]
async fn blank_title_is_rejected_before_the_store() {
    let (store, mut controller) = flaky_controller();
    controller.load().await;

    let err = controller
        .add_task(TaskFormData::new("   ", due()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(store.tasks.lock().unwrap().is_empty());
    assert!(controller.list_tasks().is_empty());

    let task = controller.add_task(TaskFormData::new("Real", due())).await.unwrap();
    let err = controller
        .edit_task(
            &task.id,
            TaskPatch {
                title: Some(String::new()),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(store.tasks.lock().unwrap()[0].title, "Real");

    let notices = controller.take_notices();
    assert_eq!(notices[0].message, "Task title is required");
    assert_eq!(notices[0].title(), "Error");
}

#[tokio::test]
async fn failed_load_degrades_to_empty_with_notice() {
    let (store, mut controller) = flaky_controller();
    store.tasks.lock().unwrap().push(Task::from_form(
        TaskId::new("1"),
        TaskFormData::new("Hidden", due()),
    ));
    store.failing.store(true, Ordering::SeqCst);

    controller.load().await;

    assert!(!controller.is_loading());
    assert!(controller.list_tasks().is_empty());
    assert_eq!(
        messages(&controller.take_notices()),
        vec![(NoticeLevel::Error, "Failed to load tasks")]
    );
}

#[tokio::test]
async fn failed_mutations_leave_memory_untouched() {
    let (store, mut controller) = flaky_controller();
    controller.load().await;
    let task = controller.add_task(TaskFormData::new("Stable", due())).await.unwrap();
    controller.take_notices();
    let before = controller.list_tasks();

    store.failing.store(true, Ordering::SeqCst);

    let err = controller.add_task(TaskFormData::new("Nope", due())).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    assert!(controller.set_task_completed(&task.id, true).await.is_err());
    assert!(
        controller
            .edit_task(&task.id, TaskPatch::completed(true))
            .await
            .is_err()
    );
    assert!(controller.delete_task(&task.id).await.is_err());

    assert_eq!(controller.list_tasks(), before);
    assert_eq!(
        messages(&controller.take_notices()),
        vec![
            (NoticeLevel::Error, "Failed to add task"),
            (NoticeLevel::Error, "Failed to update task status"),
            (NoticeLevel::Error, "Failed to update task"),
            (NoticeLevel::Error, "Failed to delete task"),
        ]
    );
}

#[tokio::test]
async fn completing_unknown_task_reports_not_found() {
    let (_store, mut controller) = flaky_controller();
    controller.load().await;

    let err = controller
        .set_task_completed(&TaskId::new("ghost"), true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(controller.list_tasks().is_empty());
}

#[tokio::test]
async fn subscribers_see_confirmed_changes() {
    let (_store, mut controller) = flaky_controller();
    let mut view = controller.subscribe();
    controller.load().await;
    view.borrow_and_update();

    let task = controller.add_task(TaskFormData::new("Watch me", due())).await.unwrap();
    assert!(view.has_changed().unwrap());
    assert_eq!(view.borrow_and_update().tasks, vec![task.clone()]);

    controller.set_task_completed(&task.id, true).await.unwrap();
    assert!(view.borrow_and_update().tasks[0].completed);
}
