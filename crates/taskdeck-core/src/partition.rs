use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::task::{Task, TaskId, User};

/// Resolved capability of the current user. Until the directory lookup
/// completes the view stays in its unknown readiness state (see
/// `view::Board`); there is no role transition within a session after
/// that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Regular,
}

/// Resolves the current user's role from the user directory. This is
/// the single capability-resolution step: the directory is scanned once
/// and the answer feeds the partitioner. A username missing from the
/// directory resolves to `Regular`, never an error.
#[tracing::instrument(skip(directory))]
pub fn resolve_role(directory: &[User], username: &str) -> Role {
    let role = directory
        .iter()
        .find(|user| user.username == username)
        .map(|user| {
            if user.is_admin() {
                Role::Admin
            } else {
                Role::Regular
            }
        })
        .unwrap_or(Role::Regular);

    info!(username, ?role, "resolved role from user directory");
    role
}

/// The two labeled sections a non-administrator sees. They are kept
/// separate for display: a self-assigned task legitimately shows up in
/// both.
#[derive(Debug, Clone, PartialEq)]
pub struct Sections {
    pub assigned_to_me: Vec<Task>,
    pub assigned_by_me: Vec<Task>,
}

/// The task set a given role may see.
#[derive(Debug, Clone, PartialEq)]
pub enum VisibleTasks {
    /// Administrator: one unified list of every task in the system.
    Unified(Vec<Task>),
    /// Ordinary user: "assigned to me" and "assigned by me".
    Sections(Sections),
}

impl VisibleTasks {
    /// The set progress is computed over. For sections, the union with
    /// duplicates removed by task id, so a self-assigned task is not
    /// double-counted.
    pub fn aggregate_set(&self) -> Vec<&Task> {
        match self {
            VisibleTasks::Unified(tasks) => tasks.iter().collect(),
            VisibleTasks::Sections(sections) => {
                let mut seen = BTreeSet::<TaskId>::new();
                let mut out = Vec::new();
                for task in sections
                    .assigned_to_me
                    .iter()
                    .chain(sections.assigned_by_me.iter())
                {
                    if seen.insert(task.id) {
                        out.push(task);
                    }
                }
                out
            }
        }
    }
}

/// Splits a task collection into the two non-administrator sections by
/// owner/assignee. Newer backends serve these as separate endpoints;
/// this is the same rule, applied locally when a deployment only has
/// the single-list route.
#[tracing::instrument(skip(tasks))]
pub fn partition(tasks: &[Task], username: &str) -> Sections {
    let assigned_to_me: Vec<Task> = tasks
        .iter()
        .filter(|task| task.is_assigned_to(username))
        .cloned()
        .collect();
    let assigned_by_me: Vec<Task> = tasks
        .iter()
        .filter(|task| task.is_owned_by(username))
        .cloned()
        .collect();

    debug!(
        to_me = assigned_to_me.len(),
        by_me = assigned_by_me.len(),
        "partitioned tasks for user"
    );

    Sections {
        assigned_to_me,
        assigned_by_me,
    }
}
