use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::json;

use gwadm::batch::{self, BatchOp, ResultSink};
use gwadm::bind::ValueMap;
use gwadm::error::Error;
use gwadm::output::{Format, OutputConfig, StreamEncoder};
use gwadm::recurse::{self, DirectoryLister, Member, MAX_GROUP_DEPTH};
use gwadm::retry::RetryConfig;

/// In-memory directory fixture
#[derive(Default)]
struct FakeDirectory {
    org_units: HashMap<String, Vec<String>>,
    groups: HashMap<String, Vec<Member>>,
}

#[async_trait]
impl DirectoryLister for FakeDirectory {
    async fn users_in_orgunit(&self, org_unit: &str) -> Result<Vec<String>, Error> {
        self.org_units
            .get(org_unit)
            .cloned()
            .ok_or_else(|| Error::Upstream {
                status: 404,
                message: format!("no org unit {}", org_unit),
            })
    }

    async fn group_members(&self, group: &str) -> Result<Vec<Member>, Error> {
        self.groups
            .get(group)
            .cloned()
            .ok_or_else(|| Error::Upstream {
                status: 404,
                message: format!("no group {}", group),
            })
    }
}

async fn collect_users(
    dir: FakeDirectory,
    org_units: &[&str],
    groups: &[&str],
) -> (Vec<String>, usize) {
    let (mut users, errors) = recurse::expand(
        Arc::new(dir),
        org_units.iter().map(|s| s.to_string()).collect(),
        groups.iter().map(|s| s.to_string()).collect(),
        4,
    );

    let error_count = tokio::spawn(recurse::drain_errors(errors));
    let mut collected = Vec::new();
    while let Some(user) = users.recv().await {
        collected.push(user);
    }
    let failures = error_count.await.unwrap();
    (collected, failures)
}

#[tokio::test]
async fn overlapping_groups_emit_each_user_once() {
    let mut dir = FakeDirectory::default();
    dir.groups.insert(
        "eng@x".to_string(),
        vec![Member::user("u1@x"), Member::user("u2@x")],
    );
    dir.groups.insert(
        "ops@x".to_string(),
        vec![Member::user("u1@x"), Member::user("u3@x")],
    );

    let (mut users, failures) = collect_users(dir, &[], &["eng@x", "ops@x"]).await;
    users.sort();

    assert_eq!(users, vec!["u1@x", "u2@x", "u3@x"]);
    assert_eq!(failures, 0);
}

#[tokio::test]
async fn org_units_and_groups_share_one_dedup_set() {
    let mut dir = FakeDirectory::default();
    dir.org_units.insert(
        "/Sales".to_string(),
        vec!["u1@x".to_string(), "u4@x".to_string()],
    );
    dir.groups
        .insert("eng@x".to_string(), vec![Member::user("u1@x")]);

    let (mut users, failures) = collect_users(dir, &["/Sales"], &["eng@x"]).await;
    users.sort();

    assert_eq!(users, vec!["u1@x", "u4@x"]);
    assert_eq!(failures, 0);
}

#[tokio::test]
async fn nested_groups_are_expanded_transitively() {
    let mut dir = FakeDirectory::default();
    dir.groups.insert(
        "all@x".to_string(),
        vec![Member::user("u1@x"), Member::group("nested@x")],
    );
    dir.groups.insert(
        "nested@x".to_string(),
        vec![Member::user("u2@x"), Member::user("u3@x")],
    );

    let (mut users, failures) = collect_users(dir, &[], &["all@x"]).await;
    users.sort();

    assert_eq!(users, vec!["u1@x", "u2@x", "u3@x"]);
    assert_eq!(failures, 0);
}

#[tokio::test]
async fn group_cycles_terminate() {
    let mut dir = FakeDirectory::default();
    dir.groups.insert(
        "a@x".to_string(),
        vec![Member::user("u1@x"), Member::group("b@x")],
    );
    dir.groups.insert(
        "b@x".to_string(),
        vec![Member::user("u2@x"), Member::group("a@x")],
    );

    let (mut users, _failures) = collect_users(dir, &[], &["a@x"]).await;
    users.sort();

    assert_eq!(users, vec!["u1@x", "u2@x"]);
}

#[tokio::test]
async fn depth_limit_skips_deep_subtrees_with_an_error() {
    let mut dir = FakeDirectory::default();
    // A chain one level longer than the limit.
    for depth in 0..=MAX_GROUP_DEPTH {
        let name = format!("g{}@x", depth);
        let next = format!("g{}@x", depth + 1);
        dir.groups.insert(
            name,
            vec![Member::user(format!("u{}@x", depth)), Member::group(next)],
        );
    }

    let (users, failures) = collect_users(dir, &[], &["g0@x"]).await;

    // Users above the cut are all present, the subtree below is reported.
    assert_eq!(users.len(), MAX_GROUP_DEPTH);
    assert!(failures >= 1);
}

#[tokio::test]
async fn listing_failures_go_to_the_error_sink_not_the_stream() {
    let mut dir = FakeDirectory::default();
    dir.groups
        .insert("good@x".to_string(), vec![Member::user("u1@x")]);

    let (users, failures) = collect_users(dir, &["/Nope"], &["good@x"]).await;

    assert_eq!(users, vec!["u1@x"]);
    assert_eq!(failures, 1);
}

#[tokio::test]
async fn expanded_users_drive_the_worker_pool_once_each() {
    let mut dir = FakeDirectory::default();
    dir.groups.insert(
        "eng@x".to_string(),
        vec![Member::user("u1@x"), Member::user("u2@x")],
    );
    dir.groups
        .insert("ops@x".to_string(), vec![Member::user("u1@x")]);

    let (users, errors) = recurse::expand(
        Arc::new(dir),
        Vec::new(),
        vec!["eng@x".to_string(), "ops@x".to_string()],
        2,
    );
    tokio::spawn(recurse::drain_errors(errors));

    let mut base = ValueMap::new();
    base.set(
        "delegateEmail",
        gwadm::flags::FlagValue::Str("helper@x".to_string()),
        true,
    );
    let units = recurse::units_from_users(users, base, "userId", 2);

    let invocations = Arc::new(AtomicU32::new(0));
    let invocations_clone = Arc::clone(&invocations);
    let op: BatchOp = Arc::new(move |values: ValueMap| {
        let invocations = Arc::clone(&invocations_clone);
        async move {
            invocations.fetch_add(1, Ordering::SeqCst);
            Ok(json!({
                "userId": values.str_value("userId").unwrap_or_default(),
                "delegateEmail": values.str_value("delegateEmail").unwrap_or_default(),
            }))
        }
        .boxed()
    });

    let cfg = batch::BatchConfig {
        threads: 2,
        pacing: std::time::Duration::ZERO,
        retry: RetryConfig {
            max_attempts: 2,
            initial_backoff_ms: 1,
            backoff_factor: 2.0,
            max_backoff_ms: 5,
            add_jitter: false,
        },
    };
    let sink = ResultSink::Streaming(Arc::new(StreamEncoder::to_writer(
        OutputConfig {
            format: Format::Json,
            compress: true,
            stream: true,
        },
        Box::new(std::io::sink()),
    )));

    let count = batch::run_units(units, cfg, op, sink).await.unwrap();

    // u1@x overlaps across the two groups: exactly one downstream call for it.
    assert_eq!(count, 2);
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
}
