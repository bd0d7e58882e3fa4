use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use super::TaskStore;
use crate::error::StoreError;
use crate::task::{Category, Task, TaskFormData, TaskId, TaskPatch};

/// Talks to a task REST resource rooted at `<base_url>/api/tasks`.
#[derive(Debug, Clone)]
pub struct RemoteTaskStore {
    client: reqwest::Client,
    base_url: Url,
}

impl RemoteTaskStore {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| StoreError::Http {
                url: base_url.to_string(),
                source,
            })?;

        debug!(base_url = %base_url, timeout_secs = timeout.as_secs(), "built remote task store client");
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn tasks_url(&self, id: Option<&TaskId>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("api").push("tasks");
            if let Some(id) = id {
                segments.push(id.as_str());
            }
        }
        url
    }

    async fn send(&self, method: Method, url: Url, request: RequestBuilder) -> Result<Response, StoreError> {
        debug!(%method, %url, "sending task request");
        let response = request.send().await.map_err(|source| StoreError::Http {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn read_task(&self, url: &Url, response: Response) -> Result<Task, StoreError> {
        let body = read_body(url, response).await?;
        let wire: WireTask = serde_json::from_slice(&body)?;
        wire.into_task()
    }
}

#[async_trait]
impl TaskStore for RemoteTaskStore {
    fn backend(&self) -> &'static str {
        "remote"
    }

    #[tracing::instrument(skip(self))]
    async fn try_list(&self) -> Result<Vec<Task>, StoreError> {
        let url = self.tasks_url(None);
        let request = self.client.get(url.clone());
        let response = self.send(Method::GET, url.clone(), request).await?;
        let body = read_body(&url, response).await?;

        let wire: Vec<WireTask> = serde_json::from_slice(&body)?;
        let tasks = wire
            .into_iter()
            .map(WireTask::into_task)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = tasks.len(), "fetched remote tasks");
        Ok(tasks)
    }

    #[tracing::instrument(skip(self, data), fields(title_len = data.title.len()))]
    async fn create(&self, data: TaskFormData) -> Result<Task, StoreError> {
        let url = self.tasks_url(None);
        let request = self.client.post(url.clone()).json(&data);
        let response = self.send(Method::POST, url.clone(), request).await?;
        self.read_task(&url, response).await
    }

    #[tracing::instrument(skip(self, patch), fields(id = %id))]
    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
        let url = self.tasks_url(Some(id));
        let request = self.client.patch(url.clone()).json(&patch);
        let response = match self.send(Method::PATCH, url.clone(), request).await {
            Ok(response) => response,
            Err(StoreError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                return Err(StoreError::NotFound(id.clone()));
            }
            Err(err) => return Err(err),
        };
        self.read_task(&url, response).await
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    async fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
        let url = self.tasks_url(Some(id));
        let request = self.client.delete(url.clone());
        match self.send(Method::DELETE, url, request).await {
            Ok(_) => Ok(()),
            Err(StoreError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                warn!(id = %id, "remote task already absent; treating delete as done");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

async fn read_body(url: &Url, response: Response) -> Result<Vec<u8>, StoreError> {
    let bytes = response.bytes().await.map_err(|source| StoreError::Http {
        url: url.to_string(),
        source,
    })?;
    Ok(bytes.to_vec())
}

/// Record shape accepted from the backend. Some backends key records by
/// `_id`; that name never leaves this module.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTask {
    #[serde(default)]
    id: Option<TaskId>,
    #[serde(default, rename = "_id")]
    document_id: Option<TaskId>,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(deserialize_with = "calendar_date")]
    due_date: NaiveDate,
    category: Category,
    #[serde(default)]
    completed: bool,
}

impl WireTask {
    fn into_task(self) -> Result<Task, StoreError> {
        let id = self
            .id
            .or(self.document_id)
            .ok_or_else(|| StoreError::InvalidRecord(format!("task '{}' has no id", self.title)))?;

        Ok(Task {
            id,
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            category: self.category,
            completed: self.completed,
        })
    }
}

// Accepts `YYYY-MM-DD` and timestamps whose first ten characters are one.
fn calendar_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let date_part = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn remote(base: &str) -> RemoteTaskStore {
        RemoteTaskStore::new(Url::parse(base).unwrap(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn urls_follow_the_task_resource_layout() {
        let store = remote("http://localhost:5000");
        assert_eq!(store.tasks_url(None).as_str(), "http://localhost:5000/api/tasks");
        assert_eq!(
            store.tasks_url(Some(&TaskId::new("a b"))).as_str(),
            "http://localhost:5000/api/tasks/a%20b"
        );

        let nested = remote("http://example.test/v2/");
        assert_eq!(nested.tasks_url(None).as_str(), "http://example.test/v2/api/tasks");
    }

    #[test]
    fn document_id_is_translated_to_id() {
        let wire: WireTask = serde_json::from_value(json!({
            "_id": "65f0c0ffee",
            "title": "Gym workout",
            "description": "cardio",
            "dueDate": "2025-04-14T00:00:00.000Z",
            "category": "personal",
            "completed": false,
            "__v": 0
        }))
        .unwrap();

        let task = wire.into_task().unwrap();
        assert_eq!(task.id, TaskId::new("65f0c0ffee"));
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2025, 4, 14).unwrap());
    }

    #[test]
    fn record_without_any_id_is_rejected() {
        let wire: WireTask = serde_json::from_value(json!({
            "title": "Nameless",
            "dueDate": "2025-04-14",
            "category": "other"
        }))
        .unwrap();

        assert!(matches!(wire.into_task(), Err(StoreError::InvalidRecord(_))));
    }
}
