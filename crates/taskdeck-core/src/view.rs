use anyhow::anyhow;
use tracing::{info, instrument, warn};

use crate::api::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::partition::{self, Role, Sections, VisibleTasks};
use crate::progress::{self, Progress};
use crate::task::{Priority, Task, User};

/// Client-side display filter over the visible set. Display only: the
/// progress aggregate is always computed over the unfiltered set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFilter {
    #[default]
    All,
    Starred,
    Completed,
}

impl ListFilter {
    pub fn parse(token: &str) -> anyhow::Result<Self> {
        match token.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "starred" => Ok(Self::Starred),
            "completed" => Ok(Self::Completed),
            other => Err(anyhow!(
                "unknown filter: {other} (expected all, starred, or completed)"
            )),
        }
    }

    pub fn keep(&self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Starred => task.is_starred(),
            Self::Completed => task.completed,
        }
    }
}

/// One fully resolved render cycle: the role, the task set that role
/// may see, the progress aggregate over it, and the user directory for
/// the assignee picker.
///
/// View readiness is realized by construction: a `Board` value exists
/// only after the directory lookup resolved, and its role never changes
/// within a session (a role change means building a fresh board after
/// re-authenticating). Every field is recomputed from a fresh server
/// snapshot on each load; nothing here is patched in place.
#[derive(Debug, Clone)]
pub struct Board {
    pub role: Role,
    pub visible: VisibleTasks,
    pub progress: Progress,
    pub users: Vec<User>,
}

impl Board {
    /// Fetches a fresh snapshot and computes the view model.
    ///
    /// Failure semantics: a directory failure resolves the role to
    /// `Regular`; a network failure on any task list degrades that
    /// source to an empty list; an explicit forbidden response on a
    /// task list is surfaced to the caller so it can be reported
    /// distinctly from generic failure.
    #[instrument(skip(client))]
    pub async fn load(client: &ApiClient, username: &str) -> ApiResult<Self> {
        let users = match client.list_users().await {
            Ok(users) => users,
            Err(err) => {
                warn!(error = %err, "user directory lookup failed; defaulting to regular view");
                Vec::new()
            }
        };

        let role = partition::resolve_role(&users, username);

        let visible = match role {
            Role::Admin => VisibleTasks::Unified(fetch_or_empty(client.list_tasks().await)?),
            Role::Regular => {
                let to_me = client.tasks_assigned_to_me().await;
                let by_me = client.tasks_assigned_by_me().await;
                match (to_me, by_me) {
                    // Deployments predating the partitioned routes serve
                    // everything at /tasks; apply the same split locally.
                    (
                        Err(ApiError::UnexpectedStatus { status: 404, .. }),
                        Err(ApiError::UnexpectedStatus { status: 404, .. }),
                    ) => {
                        let all = fetch_or_empty(client.list_tasks().await)?;
                        VisibleTasks::Sections(partition::partition(&all, username))
                    }
                    (to_me, by_me) => VisibleTasks::Sections(Sections {
                        assigned_to_me: fetch_or_empty(to_me)?,
                        assigned_by_me: fetch_or_empty(by_me)?,
                    }),
                }
            }
        };

        let progress = progress::aggregate(visible.aggregate_set());

        info!(
            ?role,
            completed = progress.completed,
            total = progress.total,
            "board loaded"
        );

        Ok(Self {
            role,
            visible,
            progress,
            users,
        })
    }

    /// Finds a task on the board by id, searching every visible list.
    pub fn find_task(&self, id: i64) -> Option<&Task> {
        match &self.visible {
            VisibleTasks::Unified(tasks) => tasks.iter().find(|task| task.id == id),
            VisibleTasks::Sections(sections) => sections
                .assigned_to_me
                .iter()
                .chain(sections.assigned_by_me.iter())
                .find(|task| task.id == id),
        }
    }
}

fn fetch_or_empty(result: ApiResult<Vec<Task>>) -> ApiResult<Vec<Task>> {
    match result {
        Ok(tasks) => Ok(tasks),
        Err(err) if err.is_forbidden() => Err(err),
        Err(err) => {
            warn!(error = %err, "task list fetch failed; showing empty list");
            Ok(Vec::new())
        }
    }
}

/// Update bodies are full replacements: each builder flips exactly one
/// field and carries everything else, owner and assignee included,
/// through unchanged.
pub fn toggled_completed(task: &Task) -> Task {
    Task {
        completed: !task.completed,
        ..task.clone()
    }
}

pub fn with_priority(task: &Task, priority: Option<Priority>) -> Task {
    Task {
        priority,
        ..task.clone()
    }
}

pub fn with_assignee(task: &Task, assignee: String) -> Task {
    Task {
        assignee,
        ..task.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{ListFilter, toggled_completed, with_assignee, with_priority};
    use crate::task::{Priority, PriorityLevel, Task};

    fn task() -> Task {
        Task {
            id: 9,
            title: "Rotate the API keys".to_string(),
            description: Some("before friday".to_string()),
            due_date: None,
            completed: false,
            priority: Some(Priority::Flag(0)),
            owner: "alice".to_string(),
            assignee: "bob".to_string(),
        }
    }

    #[test]
    fn toggle_echoes_owner_and_assignee_in_update_body() {
        let toggled = toggled_completed(&task());
        assert!(toggled.completed);

        let body = serde_json::to_value(&toggled).expect("update body");
        assert_eq!(body["owner"], "alice");
        assert_eq!(body["assignee"], "bob");
        assert_eq!(body["title"], "Rotate the API keys");
    }

    #[test]
    fn priority_change_echoes_owner_and_assignee() {
        let updated = with_priority(&task(), Some(Priority::Level(PriorityLevel::High)));
        let body = serde_json::to_value(&updated).expect("update body");
        assert_eq!(body["priority"], "HIGH");
        assert_eq!(body["owner"], "alice");
        assert_eq!(body["assignee"], "bob");
        assert_eq!(body["completed"], false);
    }

    #[test]
    fn reassign_keeps_owner() {
        let updated = with_assignee(&task(), "carol".to_string());
        assert_eq!(updated.assignee, "carol");
        assert_eq!(updated.owner, "alice");
    }

    #[test]
    fn filters_select_starred_and_completed() {
        let mut starred = task();
        starred.priority = Some(Priority::Flag(1));
        let mut done = task();
        done.completed = true;

        assert!(ListFilter::All.keep(&task()));
        assert!(ListFilter::Starred.keep(&starred));
        assert!(!ListFilter::Starred.keep(&task()));
        assert!(ListFilter::Completed.keep(&done));
        assert!(!ListFilter::Completed.keep(&task()));
    }
}
