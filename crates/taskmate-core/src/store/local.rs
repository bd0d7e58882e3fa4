use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::TaskStore;
use crate::error::StoreError;
use crate::task::{Task, TaskFormData, TaskId, TaskPatch};

pub const DEFAULT_SLOT: &str = "tasks";

/// Keeps the whole collection in one named slot on disk (`<slot>.json`).
///
/// Every mutation reads the full array, changes it and replaces the file
/// atomically. A slot that was never written reads as an empty collection.
/// Clones share one write lock, so mutations through them never interleave.
#[derive(Debug, Clone)]
pub struct LocalTaskStore {
    slot_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl LocalTaskStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path, slot: &str) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir).map_err(|source| StoreError::Io {
            path: data_dir.to_path_buf(),
            source,
        })?;

        let slot_path = data_dir.join(format!("{slot}.json"));
        info!(
            data_dir = %data_dir.display(),
            slot = %slot_path.display(),
            exists = slot_path.exists(),
            "opened local task store"
        );

        Ok(Self {
            slot_path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn slot_path(&self) -> &Path {
        &self.slot_path
    }

    /// Load, mutate and write back the collection on the blocking pool.
    /// The write lock is held for the whole sequence. When `change` fails
    /// nothing is written.
    async fn mutate<F, R>(&self, change: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Vec<Task>) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let path = self.slot_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut tasks = load_slot(&path)?;
            let out = change(&mut tasks)?;
            save_slot_atomic(&path, &tasks)?;
            Ok(out)
        })
        .await?
    }
}

#[async_trait]
impl TaskStore for LocalTaskStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    #[tracing::instrument(skip(self))]
    async fn try_list(&self) -> Result<Vec<Task>, StoreError> {
        let path = self.slot_path.clone();
        tokio::task::spawn_blocking(move || load_slot(&path)).await?
    }

    #[tracing::instrument(skip(self, data), fields(title_len = data.title.len()))]
    async fn create(&self, data: TaskFormData) -> Result<Task, StoreError> {
        self.mutate(move |tasks| {
            let task = Task::from_form(TaskId::generate(), data);
            debug!(id = %task.id, "appending task");
            tasks.push(task.clone());
            Ok(task)
        })
        .await
    }

    #[tracing::instrument(skip(self, patch), fields(id = %id))]
    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
        let id = id.clone();
        self.mutate(move |tasks| {
            let task = tasks
                .iter_mut()
                .find(|task| task.id == id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            task.apply_patch(&patch);
            debug!(id = %task.id, completed = task.completed, "task patch applied");
            Ok(task.clone())
        })
        .await
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
        let id = id.clone();
        self.mutate(move |tasks| {
            let before = tasks.len();
            tasks.retain(|task| task.id != id);
            debug!(before, after = tasks.len(), "removed task");
            Ok(())
        })
        .await
    }
}

fn load_slot(path: &Path) -> Result<Vec<Task>, StoreError> {
    debug!(file = %path.display(), "loading task slot");
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let tasks: Vec<Task> = serde_json::from_str(&raw)?;
    debug!(count = tasks.len(), "loaded tasks from slot");
    Ok(tasks)
}

fn save_slot_atomic(path: &Path, tasks: &[Task]) -> Result<(), StoreError> {
    debug!(file = %path.display(), count = tasks.len(), "saving task slot atomically");
    let io_err = |source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir).map_err(io_err)?;
    serde_json::to_writer(&mut temp, tasks)?;
    writeln!(temp).map_err(io_err)?;
    temp.flush().map_err(io_err)?;

    temp.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn cold_slot_lists_empty_without_writing() {
        let dir = tempdir().unwrap();
        let store = LocalTaskStore::open(dir.path(), DEFAULT_SLOT).unwrap();

        assert!(store.try_list().await.unwrap().is_empty());
        assert!(!store.slot_path().exists());
    }

    #[tokio::test]
    async fn corrupt_slot_degrades_to_empty_list() {
        let dir = tempdir().unwrap();
        let store = LocalTaskStore::open(dir.path(), DEFAULT_SLOT).unwrap();
        fs::write(store.slot_path(), "{not json").unwrap();

        assert!(store.try_list().await.is_err());
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn slot_holds_a_single_json_array() {
        let dir = tempdir().unwrap();
        let store = LocalTaskStore::open(dir.path(), "inbox").unwrap();
        let due = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        store.create(TaskFormData::new("one", due)).await.unwrap();
        store.create(TaskFormData::new("two", due)).await.unwrap();

        assert!(store.slot_path().ends_with("inbox.json"));
        let raw = fs::read_to_string(store.slot_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let titles: Vec<&str> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|task| task["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["one", "two"]);
    }
}
