use chrono::NaiveDate;
use taskmate_core::filter::{CategoryFilter, filter_tasks};
use taskmate_core::store::{LocalTaskStore, TaskStore};
use taskmate_core::task::{Category, TaskFormData, TaskPatch};
use tempfile::tempdir;

#[tokio::test]
async fn local_store_roundtrip_and_filtering() {
    let temp = tempdir().expect("tempdir");
    let store = LocalTaskStore::open(temp.path(), "tasks").expect("open store");
    let due = NaiveDate::from_ymd_opt(2025, 1, 1).expect("date");

    let milk = store
        .create(TaskFormData::new("Buy milk", due).with_category(Category::Shopping))
        .await
        .expect("create milk");
    let report = store
        .create(TaskFormData::new("Write report", due).with_category(Category::Work))
        .await
        .expect("create report");

    let tasks = store.list().await;
    assert_eq!(tasks.len(), 2);

    let by_query = filter_tasks(&tasks, "milk", &CategoryFilter::All);
    assert_eq!(by_query.len(), 1);
    assert_eq!(by_query[0].id, milk.id);

    let by_category = filter_tasks(&tasks, "", &CategoryFilter::parse("work"));
    assert_eq!(by_category.len(), 1);
    assert_eq!(by_category[0].id, report.id);

    store
        .update(&report.id, TaskPatch::completed(true))
        .await
        .expect("complete report");
    store.delete(&milk.id).await.expect("delete milk");

    // a second handle on the same slot sees the persisted state
    let reopened = LocalTaskStore::open(temp.path(), "tasks").expect("reopen store");
    let remaining = reopened.list().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, report.id);
    assert!(remaining[0].completed);
}
