//! Prune and list workflows against an in-memory store

use crate::common::fixtures::seed;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use cli_lib::workflow;
use planner::RetentionPolicy;
use std::path::Path;
use vault_core::naming::parse_timestamp;
use vault_core::{BackupKind, BackupStore, Catalog, ListFilter, ObjectStoreBackend, VaultError};

fn ts(value: &str) -> NaiveDateTime {
    parse_timestamp(value).unwrap()
}

const HISTORY: &[&str] = &[
    "db/2024-01-01 00:00:00-full",
    "db/2024-01-02 00:00:00",
    "db/2024-02-05 00:00:00-full",
    "db/2024-02-06 00:00:00",
    "db/2024-03-01 00:00:00-full",
    "db/2024-03-02 00:00:00",
    "db/2024-03-16 00:00:00-full",
    "db/2024-03-17 00:00:00",
    "db/2024-03-18 00:00:00",
];

async fn listed(store: &dyn BackupStore) -> Vec<String> {
    Catalog::list(store, "db")
        .await
        .unwrap()
        .into_records()
        .into_iter()
        .map(|r| r.path)
        .collect()
}

#[tokio::test]
async fn dry_run_reports_without_deleting() {
    let store = ObjectStoreBackend::in_memory();
    seed(&store, HISTORY).await;
    let policy = RetentionPolicy::parse(Some("7:days,1:months")).unwrap();

    let report = workflow::prune(&store, "db", policy, ts("2024-03-20 12:00:00"), true)
        .await
        .unwrap();

    assert!(report.dry_run);
    assert!(!report.plan.is_empty());
    assert_eq!(listed(&store).await, HISTORY);
}

#[tokio::test]
async fn prune_deletes_exactly_the_plan() {
    let store = ObjectStoreBackend::in_memory();
    seed(&store, HISTORY).await;
    let policy = RetentionPolicy::parse(Some("7:days,1:months")).unwrap();
    let now = ts("2024-03-20 12:00:00");

    let dry = workflow::prune(&store, "db", policy, now, true).await.unwrap();
    let report = workflow::prune(&store, "db", policy, now, false).await.unwrap();
    assert_eq!(dry.plan, report.plan);

    // the March full anchors nothing, but it is the monthly survivor
    assert_eq!(
        listed(&store).await,
        vec![
            "db/2024-03-01 00:00:00-full",
            "db/2024-03-16 00:00:00-full",
            "db/2024-03-17 00:00:00",
            "db/2024-03-18 00:00:00",
        ]
    );
    assert_eq!(report.plan.retained, 4);

    // a second run finds nothing left to do
    let again = workflow::prune(&store, "db", policy, now, false).await.unwrap();
    assert!(again.plan.is_empty());
}

#[tokio::test]
async fn prune_keeps_the_base_of_a_hot_chain() {
    let store = ObjectStoreBackend::in_memory();
    seed(
        &store,
        &[
            "db/2024-02-01 00:00:00-full",
            "db/2024-02-20 00:00:00-full",
            "db/2024-03-05 00:00:00",
            "db/2024-03-19 00:00:00",
        ],
    )
    .await;
    let policy = RetentionPolicy::parse(Some("7:days")).unwrap();

    let report = workflow::prune(&store, "db", policy, ts("2024-03-20 12:00:00"), false)
        .await
        .unwrap();

    assert_eq!(
        report.plan.paths().into_iter().collect::<Vec<_>>(),
        vec!["db/2024-02-01 00:00:00-full"]
    );
    assert_eq!(
        listed(&store).await,
        vec![
            "db/2024-02-20 00:00:00-full",
            "db/2024-03-05 00:00:00",
            "db/2024-03-19 00:00:00",
        ]
    );
}

/// Refuses to remove one specific artifact
struct StubbornStore {
    inner: ObjectStoreBackend,
    stuck: &'static str,
}

#[async_trait]
impl BackupStore for StubbornStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, VaultError> {
        self.inner.list(prefix).await
    }

    async fn fetch(&self, remote: &str, local_dir: &Path) -> Result<u64, VaultError> {
        self.inner.fetch(remote, local_dir).await
    }

    async fn push(&self, local_dir: &Path, remote: &str) -> Result<u64, VaultError> {
        self.inner.push(local_dir, remote).await
    }

    async fn remove(&self, paths: &[String]) -> Result<(), VaultError> {
        let (stuck, rest): (Vec<String>, Vec<String>) =
            paths.iter().cloned().partition(|p| p == self.stuck);
        self.inner.remove(&rest).await?;
        if stuck.is_empty() {
            Ok(())
        } else {
            Err(VaultError::PartialDeletionFailure {
                failed: stuck,
                removed: rest.len(),
            })
        }
    }
}

#[tokio::test]
async fn partial_deletion_failure_names_failed_paths() {
    let store = StubbornStore {
        inner: ObjectStoreBackend::in_memory(),
        stuck: "db/2024-01-02 00:00:00",
    };
    seed(&store, HISTORY).await;
    let policy = RetentionPolicy::parse(Some("7:days")).unwrap();

    let err = workflow::prune(&store, "db", policy, ts("2024-03-20 12:00:00"), false)
        .await
        .unwrap_err();

    match err.downcast_ref::<VaultError>() {
        Some(VaultError::PartialDeletionFailure { failed, removed }) => {
            assert_eq!(failed, &vec!["db/2024-01-02 00:00:00".to_string()]);
            assert!(*removed > 0);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // removed paths are not rolled back
    assert!(!listed(&store).await.contains(&"db/2024-01-01 00:00:00-full".to_string()));

    // a dry run never surfaces deletion failures
    let dry = workflow::prune(&store, "db", policy, ts("2024-03-20 12:00:00"), true).await;
    assert!(dry.is_ok());
}

#[tokio::test]
async fn list_applies_filter() {
    let store = ObjectStoreBackend::in_memory();
    seed(&store, HISTORY).await;

    let all = workflow::list(&store, "db", &ListFilter::default()).await.unwrap();
    assert_eq!(all.len(), HISTORY.len());

    let fulls = workflow::list(
        &store,
        "db",
        &ListFilter {
            full_only: true,
            ..ListFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(fulls.len(), 4);
    assert!(fulls.iter().all(|r| r.kind == BackupKind::Full));

    // bounds are exclusive
    let window = workflow::list(
        &store,
        "db",
        &ListFilter {
            after: Some(ts("2024-02-05 00:00:00")),
            before: Some(ts("2024-03-16 00:00:00")),
            full_only: false,
        },
    )
    .await
    .unwrap();
    let paths: Vec<&str> = window.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "db/2024-02-06 00:00:00",
            "db/2024-03-01 00:00:00-full",
            "db/2024-03-02 00:00:00",
        ]
    );
}

#[tokio::test]
async fn list_skips_foreign_objects_and_other_prefixes() {
    let store = ObjectStoreBackend::in_memory();
    seed(
        &store,
        &[
            "db/2024-03-01 00:00:00-full",
            "db/README",
            "other/2024-03-02 00:00:00-full",
        ],
    )
    .await;

    let records = workflow::list(&store, "db", &ListFilter::default()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, "db/2024-03-01 00:00:00-full");
}

#[tokio::test]
async fn empty_store_lists_nothing() {
    let store = ObjectStoreBackend::in_memory();
    let records = workflow::list(&store, "db", &ListFilter::default()).await.unwrap();
    assert!(records.is_empty());

    let report = workflow::prune(
        &store,
        "db",
        RetentionPolicy::default(),
        ts("2024-03-20 12:00:00"),
        false,
    )
    .await
    .unwrap();
    assert!(report.plan.is_empty());
}
