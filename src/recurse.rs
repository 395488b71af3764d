//! Recursive expansion of org-units and groups
//!
//! Resolves an operator-supplied mix of organizational-unit paths and group
//! email addresses into a deduplicated stream of primary user emails, which
//! then feeds the same worker pool as CSV batches. First occurrence wins:
//! a user reachable through several groups or an overlapping org-unit is
//! emitted exactly once.
//!
//! Nested groups are followed to [`MAX_GROUP_DEPTH`]; a subtree that would
//! exceed the limit is reported to the error sink and skipped. Cycles
//! terminate through the visited-group set, which also prevents re-expanding
//! a group reachable along several paths.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::batch::WorkUnit;
use crate::bind::ValueMap;
use crate::error::{Error, Result};
use crate::flags::FlagValue;

/// Maximum nesting depth followed through member groups
pub const MAX_GROUP_DEPTH: usize = 8;

/// Membership kind reported by the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    User,
    Group,
}

/// One entry of a group's membership listing
#[derive(Debug, Clone)]
pub struct Member {
    pub email: String,
    pub kind: MemberKind,
}

/// Listing surface the expander consumes; implemented by the REST shim and
/// by in-memory fixtures in tests
#[async_trait]
pub trait DirectoryLister: Send + Sync {
    /// Primary emails of users whose org-unit path matches, recursively
    async fn users_in_orgunit(&self, org_unit: &str) -> Result<Vec<String>>;

    /// Direct members of a group, users and nested groups alike
    async fn group_members(&self, group: &str) -> Result<Vec<Member>>;
}

/// Expands org-units and groups into a unique user stream
///
/// Listing calls across the supplied sources run concurrently, bounded by
/// `threads`. Returns the user channel (buffer `threads`) and an error sink
/// carrying per-source listing failures; expansion continues past them.
pub fn expand(
    lister: Arc<dyn DirectoryLister>,
    org_units: Vec<String>,
    groups: Vec<String>,
    threads: usize,
) -> (Receiver<String>, Receiver<Error>) {
    let threads = threads.max(1);
    let (user_tx, user_rx) = mpsc::channel::<String>(threads);
    let (err_tx, err_rx) = mpsc::channel::<Error>(threads);

    tokio::spawn(async move {
        let seen_users: Arc<DashMap<String, ()>> = Arc::new(DashMap::new());
        let visited_groups: Arc<DashMap<String, ()>> = Arc::new(DashMap::new());

        let sources: Vec<Source> = org_units
            .into_iter()
            .map(Source::OrgUnit)
            .chain(groups.into_iter().map(Source::Group))
            .collect();

        stream::iter(sources)
            .for_each_concurrent(threads, |source| {
                let lister = Arc::clone(&lister);
                let user_tx = user_tx.clone();
                let err_tx = err_tx.clone();
                let seen_users = Arc::clone(&seen_users);
                let visited_groups = Arc::clone(&visited_groups);

                async move {
                    match source {
                        Source::OrgUnit(path) => {
                            expand_orgunit(&*lister, &path, &user_tx, &err_tx, &seen_users)
                                .await;
                        }
                        Source::Group(email) => {
                            expand_group_tree(
                                &*lister,
                                email,
                                &user_tx,
                                &err_tx,
                                &seen_users,
                                &visited_groups,
                            )
                            .await;
                        }
                    }
                }
            })
            .await;
    });

    (user_rx, err_rx)
}

enum Source {
    OrgUnit(String),
    Group(String),
}

async fn expand_orgunit(
    lister: &dyn DirectoryLister,
    path: &str,
    user_tx: &Sender<String>,
    err_tx: &Sender<Error>,
    seen: &DashMap<String, ()>,
) {
    debug!("expanding org unit {}", path);
    match lister.users_in_orgunit(path).await {
        Ok(users) => {
            for user in users {
                emit_user(user, user_tx, seen).await;
            }
        }
        Err(e) => {
            warn!("org unit {}: {}", path, e);
            let _ = err_tx.send(e).await;
        }
    }
}

/// Iterative walk over one top-level group and its nested groups
async fn expand_group_tree(
    lister: &dyn DirectoryLister,
    root: String,
    user_tx: &Sender<String>,
    err_tx: &Sender<Error>,
    seen: &DashMap<String, ()>,
    visited: &DashMap<String, ()>,
) {
    let mut queue: Vec<(String, usize)> = vec![(root, 0)];

    while let Some((group, depth)) = queue.pop() {
        if visited.insert(group.clone(), ()).is_some() {
            continue;
        }
        debug!("expanding group {} at depth {}", group, depth);

        let members = match lister.group_members(&group).await {
            Ok(members) => members,
            Err(e) => {
                warn!("group {}: {}", group, e);
                let _ = err_tx.send(e).await;
                continue;
            }
        };

        for member in members {
            match member.kind {
                MemberKind::User => emit_user(member.email, user_tx, seen).await,
                MemberKind::Group => {
                    if depth + 1 >= MAX_GROUP_DEPTH {
                        let _ = err_tx
                            .send(Error::InvalidInvocation(format!(
                                "group {} exceeds nesting depth {}; subtree skipped",
                                member.email, MAX_GROUP_DEPTH
                            )))
                            .await;
                        continue;
                    }
                    queue.push((member.email, depth + 1));
                }
            }
        }
    }
}

async fn emit_user(user: String, user_tx: &Sender<String>, seen: &DashMap<String, ()>) {
    if seen.insert(user.clone(), ()).is_some() {
        return;
    }
    let _ = user_tx.send(user).await;
}

/// Bridges the expanded user stream into the worker pool's unit channel
///
/// Each user becomes a work unit carrying the base value map (the flags the
/// operator supplied to the recursive subcommand) with the user's email bound
/// explicitly under `user_flag`. The context key is the user email.
pub fn units_from_users(
    users: Receiver<String>,
    base: ValueMap,
    user_flag: &'static str,
    threads: usize,
) -> Receiver<WorkUnit> {
    let (tx, rx) = mpsc::channel::<WorkUnit>(threads.max(1));

    tokio::spawn(async move {
        let mut stream = ReceiverStream::new(users);
        while let Some(user) = stream.next().await {
            let mut values = base.clone();
            values.set(user_flag, FlagValue::Str(user.clone()), true);
            let unit = WorkUnit {
                values,
                context: format!("{}:", user),
            };
            if tx.send(unit).await.is_err() {
                break;
            }
        }
    });

    rx
}

/// Drains the expander's error sink into the log
///
/// Returns the number of failures observed; recursive verbs report it after
/// the run so a partially failed expansion is visible.
pub async fn drain_errors(mut errors: Receiver<Error>) -> usize {
    let mut count = 0usize;
    while let Some(e) = errors.recv().await {
        warn!("expansion: {}", e);
        count += 1;
    }
    count
}

impl Member {
    pub fn user(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            kind: MemberKind::User,
        }
    }

    pub fn group(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            kind: MemberKind::Group,
        }
    }
}
