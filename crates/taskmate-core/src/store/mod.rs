pub mod local;
pub mod remote;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::StoreSettings;
use crate::error::StoreError;
use crate::task::{Task, TaskFormData, TaskId, TaskPatch};

pub use local::LocalTaskStore;
pub use remote::RemoteTaskStore;

/// Durable CRUD over the flat task collection.
///
/// Every backend agrees on the same four operations. Reads are allowed to
/// degrade (see [`TaskStore::list`]); mutations always report failure.
#[async_trait]
pub trait TaskStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn try_list(&self) -> Result<Vec<Task>, StoreError>;

    /// Like `try_list`, but a failed read logs and yields an empty collection.
    async fn list(&self) -> Vec<Task> {
        match self.try_list().await {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(backend = self.backend(), error = %err, "task list unavailable; using empty collection");
                Vec::new()
            }
        }
    }

    async fn create(&self, data: TaskFormData) -> Result<Task, StoreError>;

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError>;

    /// Removing an id that does not exist is not an error.
    async fn delete(&self, id: &TaskId) -> Result<(), StoreError>;
}

#[tracing::instrument(skip(settings))]
pub fn open(settings: &StoreSettings) -> Result<Box<dyn TaskStore>, StoreError> {
    let store: Box<dyn TaskStore> = match settings {
        StoreSettings::Local { data_dir, slot } => Box::new(LocalTaskStore::open(data_dir, slot)?),
        StoreSettings::Remote { base_url, timeout } => {
            Box::new(RemoteTaskStore::new(base_url.clone(), *timeout)?)
        }
    };
    info!(backend = store.backend(), "task store ready");
    Ok(store)
}
