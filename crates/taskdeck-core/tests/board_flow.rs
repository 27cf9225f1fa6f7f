use chrono::{TimeZone, Utc};
use chrono_tz::UTC;
use taskdeck_core::partition::{self, Role, VisibleTasks};
use taskdeck_core::progress;
use taskdeck_core::session::{Session, SessionStore};
use taskdeck_core::status;
use taskdeck_core::task::{Task, User};
use taskdeck_core::view;
use tempfile::tempdir;

#[test]
fn session_roundtrip_and_board_presentation() {
    let temp = tempdir().expect("tempdir");
    let store = SessionStore::new(&temp.path().join("session.json"));

    let session = Session {
        username: "alice".to_string(),
        token: "tok-abc".to_string(),
    };
    store.login(&session).expect("save session");
    assert_eq!(
        store.restore().expect("restore session"),
        Some(session.clone())
    );

    // A wire payload the way the backend serves it: camelCase fields and
    // three different due-date encodings in one list.
    let payload = r#"[
        {"id": 1, "title": "Prepare the demo", "description": "dry run first",
         "dueDate": [2026, 2, 16, 9, 0], "completed": false, "priority": 1,
         "owner": "alice", "assignee": "alice"},
        {"id": 2, "title": "Review the audit log", "description": null,
         "dueDate": "2026-02-18T17:00:00", "completed": false, "priority": 0,
         "owner": "alice", "assignee": "bob"},
        {"id": 3, "title": "Archive old boards", "description": null,
         "dueDate": 1771200000, "completed": true, "priority": 0,
         "owner": "bob", "assignee": "alice"}
    ]"#;
    let tasks: Vec<Task> = serde_json::from_str(payload).expect("wire payload");

    let directory = vec![
        User {
            username: "root".to_string(),
            role: Some("ADMIN".to_string()),
        },
        User {
            username: "alice".to_string(),
            role: Some("USER".to_string()),
        },
        User {
            username: "bob".to_string(),
            role: Some("USER".to_string()),
        },
    ];
    assert_eq!(
        partition::resolve_role(&directory, &session.username),
        Role::Regular
    );
    assert_eq!(partition::resolve_role(&directory, "root"), Role::Admin);

    let sections = partition::partition(&tasks, &session.username);
    let to_me: Vec<i64> = sections.assigned_to_me.iter().map(|t| t.id).collect();
    let by_me: Vec<i64> = sections.assigned_by_me.iter().map(|t| t.id).collect();
    assert_eq!(to_me, vec![1, 3]);
    assert_eq!(by_me, vec![1, 2]);

    // Task 1 is self-assigned; the aggregate counts it once.
    let visible = VisibleTasks::Sections(sections);
    let aggregate_set = visible.aggregate_set();
    let ids: Vec<i64> = aggregate_set.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 3, 2]);

    let progress = progress::aggregate(aggregate_set);
    assert_eq!(progress.completed, 1);
    assert_eq!(progress.total, 3);
    assert!((progress.percent - 100.0 / 3.0).abs() < 1e-9);

    // Derived display state at a moment between the first two due dates.
    let now = Utc
        .with_ymd_and_hms(2026, 2, 17, 12, 0, 0)
        .single()
        .expect("valid now");

    let first = status::derive(&tasks[0], now, UTC);
    assert!(first.overdue);
    assert_eq!(first.accent, status::Accent::Starred);
    assert_eq!(first.due_label.as_deref(), Some("2026-02-16 09:00"));

    let second = status::derive(&tasks[1], now, UTC);
    assert!(!second.overdue);
    assert_eq!(second.accent, status::Accent::Neutral);

    // Completed tasks mute and never count as overdue, even though the
    // epoch due date (seconds form) is in the past.
    let third = status::derive(&tasks[2], now, UTC);
    assert!(third.muted);
    assert!(!third.overdue);

    // Toggling completion produces a full-replace body that echoes the
    // record's owner and assignee untouched.
    let toggled = view::toggled_completed(&tasks[1]);
    let body = serde_json::to_value(&toggled).expect("update body");
    assert_eq!(body["completed"], true);
    assert_eq!(body["owner"], "alice");
    assert_eq!(body["assignee"], "bob");
    assert_eq!(body["dueDate"], "2026-02-18T17:00:00");

    store.logout().expect("logout");
    assert_eq!(store.restore().expect("restore after logout"), None);
}

#[test]
fn admin_board_aggregates_the_unified_list() {
    let payload = r#"[
        {"id": 10, "title": "T1", "completed": true, "owner": "a", "assignee": "b"},
        {"id": 11, "title": "T2", "completed": false, "owner": "b", "assignee": "c"},
        {"id": 12, "title": "T3", "completed": false, "owner": "c", "assignee": "a"}
    ]"#;
    let tasks: Vec<Task> = serde_json::from_str(payload).expect("wire payload");

    let visible = VisibleTasks::Unified(tasks);
    let progress = progress::aggregate(visible.aggregate_set());
    assert_eq!(progress.completed, 1);
    assert_eq!(progress.total, 3);
    assert!((progress.percent - 33.33).abs() < 0.01);
}
