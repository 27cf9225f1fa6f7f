use serde::{Deserialize, Serialize};

use crate::duedate::DueDate;

pub type TaskId = i64;

/// A task record as served by the backend. `owner` and `assignee` are
/// username strings; `owner` never changes after creation and every
/// update must echo both back unchanged next to the mutated field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub due_date: Option<DueDate>,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub priority: Option<Priority>,

    pub owner: String,

    pub assignee: String,
}

impl Task {
    pub fn is_assigned_to(&self, username: &str) -> bool {
        self.assignee == username
    }

    pub fn is_owned_by(&self, username: &str) -> bool {
        self.owner == username
    }

    pub fn is_starred(&self) -> bool {
        self.priority.as_ref().is_some_and(Priority::is_starred)
    }
}

/// Task priority as it appears on the wire. Deployments run one of two
/// backend contracts: a binary starred flag (0/1) or a named level
/// (LOW/MEDIUM/HIGH/STARRED). Neither is rewritten into the other; a
/// value outside both schemes rides through opaquely and displays as
/// neutral.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Priority {
    Flag(i64),
    Level(PriorityLevel),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Starred,
}

impl Priority {
    pub fn is_starred(&self) -> bool {
        match self {
            Priority::Flag(value) => *value == 1,
            Priority::Level(level) => *level == PriorityLevel::Starred,
            Priority::Other(_) => false,
        }
    }
}

/// Payload for `POST /tasks`. The server assigns the id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DueDate>,
    pub completed: bool,
    pub priority: Option<Priority>,
    pub owner: String,
    pub assignee: String,
}

/// A directory entry from `GET /auth/users`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl User {
    /// Administrator check; the role string is compared
    /// case-insensitively.
    pub fn is_admin(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|role| role.eq_ignore_ascii_case("ADMIN"))
    }
}
