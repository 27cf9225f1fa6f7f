use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::duedate::{self, NormalizedDue};
use crate::task::{Priority, PriorityLevel, Task};

/// Accent a task row is rendered with. Each named level has a fixed
/// color; anything unrecognized is neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accent {
    Neutral,
    Starred,
    Low,
    Medium,
    High,
}

/// Display state derived from one task record. Ephemeral: recomputed
/// from the source record on every refresh, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDisplay {
    pub overdue: bool,
    pub accent: Accent,
    /// Completed tasks render muted (dim, struck-through title)
    /// regardless of priority.
    pub muted: bool,
    pub due_label: Option<String>,
}

/// Derives the display state for a task at `now`. Overdue means the
/// normalized due instant is strictly in the past and the task is not
/// completed; an absent or unresolvable due date is never overdue. The
/// due label comes from the same normalized value the comparison uses.
pub fn derive(task: &Task, now: DateTime<Utc>, tz: Tz) -> TaskDisplay {
    let normalized = duedate::normalize(task.due_date.as_ref(), tz);

    TaskDisplay {
        overdue: is_overdue(task, &normalized, now),
        accent: accent_for(task.priority.as_ref()),
        muted: task.completed,
        due_label: normalized.display(tz),
    }
}

fn is_overdue(task: &Task, normalized: &NormalizedDue, now: DateTime<Utc>) -> bool {
    if task.completed {
        return false;
    }
    normalized.instant().is_some_and(|due| due < now)
}

fn accent_for(priority: Option<&Priority>) -> Accent {
    match priority {
        Some(Priority::Flag(1)) => Accent::Starred,
        Some(Priority::Level(PriorityLevel::Starred)) => Accent::Starred,
        Some(Priority::Level(PriorityLevel::Low)) => Accent::Low,
        Some(Priority::Level(PriorityLevel::Medium)) => Accent::Medium,
        Some(Priority::Level(PriorityLevel::High)) => Accent::High,
        Some(Priority::Flag(_)) | Some(Priority::Other(_)) | None => Accent::Neutral,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use chrono_tz::UTC;

    use super::{Accent, derive};
    use crate::duedate::DueDate;
    use crate::task::{Priority, PriorityLevel, Task};

    fn task(due: Option<DueDate>, completed: bool) -> Task {
        Task {
            id: 1,
            title: "x".to_string(),
            description: None,
            due_date: due,
            completed,
            priority: None,
            owner: "alice".to_string(),
            assignee: "bob".to_string(),
        }
    }

    #[test]
    fn past_due_pending_task_is_overdue() {
        let now = Utc
            .with_ymd_and_hms(2026, 8, 7, 12, 0, 0)
            .single()
            .expect("valid now");
        let due = DueDate::Tuple(vec![2026, 8, 7, 11, 59]);

        let display = derive(&task(Some(due.clone()), false), now, UTC);
        assert!(display.overdue);

        // Strictly before: an instant equal to now is not overdue.
        let at_now = DueDate::Tuple(vec![2026, 8, 7, 12, 0, 0]);
        let display = derive(&task(Some(at_now), false), now, UTC);
        assert!(!display.overdue);
    }

    #[test]
    fn completed_task_is_never_overdue() {
        let now = Utc::now();
        let due = DueDate::Text("2001-01-01T00:00:00".to_string());
        let display = derive(&task(Some(due), true), now, UTC);
        assert!(!display.overdue);
        assert!(display.muted);
    }

    #[test]
    fn absent_due_date_is_never_overdue() {
        let display = derive(&task(None, false), Utc::now(), UTC);
        assert!(!display.overdue);
        assert_eq!(display.due_label, None);
    }

    #[test]
    fn unresolvable_due_date_shows_raw_and_is_not_overdue() {
        let due = DueDate::Text("end of sprint".to_string());
        let display = derive(&task(Some(due), false), Utc::now(), UTC);
        assert!(!display.overdue);
        assert_eq!(display.due_label.as_deref(), Some("end of sprint"));
    }

    #[test]
    fn accents_cover_both_schemes() {
        let mut starred = task(None, false);
        starred.priority = Some(Priority::Flag(1));
        assert_eq!(derive(&starred, Utc::now(), UTC).accent, Accent::Starred);

        let mut plain = task(None, false);
        plain.priority = Some(Priority::Flag(0));
        assert_eq!(derive(&plain, Utc::now(), UTC).accent, Accent::Neutral);

        let mut high = task(None, false);
        high.priority = Some(Priority::Level(PriorityLevel::High));
        assert_eq!(derive(&high, Utc::now(), UTC).accent, Accent::High);

        let mut odd = task(None, false);
        odd.priority = Some(Priority::Other(serde_json::json!("URGENT")));
        assert_eq!(derive(&odd, Utc::now(), UTC).accent, Accent::Neutral);
    }

    #[test]
    fn completed_stays_muted_even_when_starred() {
        let mut done = task(None, true);
        done.priority = Some(Priority::Flag(1));
        let display = derive(&done, Utc::now(), UTC);
        assert!(display.muted);
        assert_eq!(display.accent, Accent::Starred);
    }

    #[test]
    fn future_due_is_not_overdue() {
        let now = Utc::now();
        let due = crate::duedate::to_wire(now + Duration::hours(2), UTC);
        let display = derive(&task(Some(due), false), now, UTC);
        assert!(!display.overdue);
    }
}
