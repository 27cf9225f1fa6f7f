use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiClient, Credentials};
use crate::cli::Invocation;
use crate::error::ApiError;
use crate::config::{Config, PriorityScheme};
use crate::duedate;
use crate::render::Renderer;
use crate::session::{Session, SessionStore};
use crate::task::{NewTask, Priority, PriorityLevel, TaskId};
use crate::view::{self, Board, ListFilter};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "board", "list", "add", "done", "star", "priority", "assign", "delete", "users", "login",
        "register", "logout", "whoami", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(cfg, store, renderer, inv))]
pub async fn dispatch(
    cfg: &Config,
    store: &SessionStore,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    let args = &inv.command_args;
    debug!(command, ?args, "dispatching command");

    match command {
        "board" | "list" => cmd_board(cfg, store, renderer, args).await,
        "add" => cmd_add(cfg, store, renderer, args).await,
        "done" => cmd_done(cfg, store, renderer, args).await,
        "star" => cmd_star(cfg, store, renderer, args).await,
        "priority" => cmd_priority(cfg, store, renderer, args).await,
        "assign" => cmd_assign(cfg, store, renderer, args).await,
        "delete" => cmd_delete(cfg, store, renderer, args).await,
        "users" => cmd_users(cfg, store, renderer).await,
        "login" => cmd_login(cfg, store, args).await,
        "register" => cmd_register(cfg, store, args).await,
        "logout" => cmd_logout(store),
        "whoami" => cmd_whoami(store),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other} (try: taskdeck help)")),
    }
}

fn require_session(store: &SessionStore) -> anyhow::Result<Session> {
    store
        .restore()?
        .ok_or_else(|| anyhow!("not logged in (run: taskdeck login <username>)"))
}

fn client_for(cfg: &Config, session: Option<&Session>) -> anyhow::Result<ApiClient> {
    ApiClient::new(&cfg.server_url, session.map(|s| s.token.clone()))
        .context("failed to build HTTP client")
}

/// Loads a fresh board, translating a forbidden response on the task
/// list into its own user-facing message, distinct from generic
/// failures (which the view layer already degraded to empty lists).
async fn load_board(client: &ApiClient, username: &str) -> anyhow::Result<Board> {
    match Board::load(client, username).await {
        Ok(board) => Ok(board),
        Err(err) if err.is_forbidden() => Err(anyhow!(
            "Access forbidden: make sure you are logged in and have permission to view tasks"
        )),
        Err(err) => Err(err).context("failed to load tasks"),
    }
}

async fn show_board(
    cfg: &Config,
    renderer: &mut Renderer,
    client: &ApiClient,
    username: &str,
    filter: ListFilter,
) -> anyhow::Result<()> {
    let board = load_board(client, username).await?;
    renderer.print_board(&board, filter, Utc::now(), cfg.timezone)?;
    Ok(())
}

#[instrument(skip(cfg, store, renderer, args))]
async fn cmd_board(
    cfg: &Config,
    store: &SessionStore,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command board");

    let filter = match args.first() {
        Some(token) => ListFilter::parse(token)?,
        None => ListFilter::default(),
    };

    let session = require_session(store)?;
    let client = client_for(cfg, Some(&session))?;
    show_board(cfg, renderer, &client, &session.username, filter).await?;
    Ok(())
}

#[instrument(skip(cfg, store, renderer, args))]
async fn cmd_add(
    cfg: &Config,
    store: &SessionStore,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command add");

    let session = require_session(store)?;
    let client = client_for(cfg, Some(&session))?;
    let now = Utc::now();

    let (title, mods) = parse_title_and_mods(args, now, cfg)?;

    let priority = match mods.priority {
        Some(priority) => priority,
        None => default_priority(cfg.scheme),
    };

    let task = NewTask {
        title,
        description: mods.description,
        due_date: mods.due.map(|dt| duedate::to_wire(dt, cfg.timezone)),
        completed: false,
        priority: Some(priority),
        owner: session.username.clone(),
        // Every task carries an assignee; without an explicit one the
        // task is assigned to its creator.
        assignee: mods.assignee.unwrap_or_else(|| session.username.clone()),
    };

    let created = client
        .create_task(&task)
        .await
        .context("failed to create task; nothing was saved")?;

    println!("Created task {}.", created.id);
    show_board(cfg, renderer, &client, &session.username, ListFilter::default()).await?;
    Ok(())
}

#[instrument(skip(cfg, store, renderer, args))]
async fn cmd_done(
    cfg: &Config,
    store: &SessionStore,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command done");

    let session = require_session(store)?;
    let client = client_for(cfg, Some(&session))?;
    let id = parse_task_id(args, "done <id>")?;

    let board = load_board(&client, &session.username).await?;
    let task = board
        .find_task(id)
        .ok_or_else(|| anyhow!("no task with id {id} on your board"))?;

    let updated = view::toggled_completed(task);
    let message = if updated.completed {
        "Task marked as complete!"
    } else {
        "Task marked as incomplete!"
    };

    client
        .update_task(&updated)
        .await
        .context("failed to update task; nothing was changed")?;

    println!("{message}");
    show_board(cfg, renderer, &client, &session.username, ListFilter::default()).await?;
    Ok(())
}

#[instrument(skip(cfg, store, renderer, args))]
async fn cmd_star(
    cfg: &Config,
    store: &SessionStore,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command star");

    let session = require_session(store)?;
    let client = client_for(cfg, Some(&session))?;
    let id = parse_task_id(args, "star <id>")?;

    let board = load_board(&client, &session.username).await?;
    let task = board
        .find_task(id)
        .ok_or_else(|| anyhow!("no task with id {id} on your board"))?;

    // Under the binary scheme star is a toggle; under the level scheme
    // it promotes to STARRED.
    let (priority, message) = match cfg.scheme {
        PriorityScheme::Starred if task.is_starred() => (Priority::Flag(0), "Task unstarred."),
        PriorityScheme::Starred => (Priority::Flag(1), "Task starred!"),
        PriorityScheme::Levels => (Priority::Level(PriorityLevel::Starred), "Task starred!"),
    };

    let updated = view::with_priority(task, Some(priority));
    client
        .update_task(&updated)
        .await
        .context("failed to update task; nothing was changed")?;

    println!("{message}");
    show_board(cfg, renderer, &client, &session.username, ListFilter::default()).await?;
    Ok(())
}

#[instrument(skip(cfg, store, renderer, args))]
async fn cmd_priority(
    cfg: &Config,
    store: &SessionStore,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command priority");

    let session = require_session(store)?;
    let client = client_for(cfg, Some(&session))?;
    let id = parse_task_id(args, "priority <id> <value>")?;
    let value = args
        .get(1)
        .ok_or_else(|| anyhow!("usage: priority <id> <value>"))?;

    let priority = parse_priority_value(value, cfg.scheme)?;

    let board = load_board(&client, &session.username).await?;
    let task = board
        .find_task(id)
        .ok_or_else(|| anyhow!("no task with id {id} on your board"))?;

    let updated = view::with_priority(task, Some(priority));
    client
        .update_task(&updated)
        .await
        .context("failed to update task; nothing was changed")?;

    println!("Updated priority of task {id}.");
    show_board(cfg, renderer, &client, &session.username, ListFilter::default()).await?;
    Ok(())
}

#[instrument(skip(cfg, store, renderer, args))]
async fn cmd_assign(
    cfg: &Config,
    store: &SessionStore,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command assign");

    let session = require_session(store)?;
    let client = client_for(cfg, Some(&session))?;
    let id = parse_task_id(args, "assign <id> <username>")?;
    let assignee = args
        .get(1)
        .ok_or_else(|| anyhow!("usage: assign <id> <username>"))?
        .clone();

    let board = load_board(&client, &session.username).await?;
    let task = board
        .find_task(id)
        .ok_or_else(|| anyhow!("no task with id {id} on your board"))?;

    if !board.users.is_empty() && !board.users.iter().any(|user| user.username == assignee) {
        return Err(anyhow!("unknown user: {assignee} (see: taskdeck users)"));
    }
    if board.users.is_empty() {
        warn!("user directory unavailable; assigning without validation");
    }

    let updated = view::with_assignee(task, assignee.clone());
    client
        .update_task(&updated)
        .await
        .context("failed to update task; nothing was changed")?;

    println!("Assigned task {id} to {assignee}.");
    show_board(cfg, renderer, &client, &session.username, ListFilter::default()).await?;
    Ok(())
}

#[instrument(skip(cfg, store, renderer, args))]
async fn cmd_delete(
    cfg: &Config,
    store: &SessionStore,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command delete");

    let session = require_session(store)?;
    let client = client_for(cfg, Some(&session))?;
    let id = parse_task_id(args, "delete <id>")?;

    client
        .delete_task(id)
        .await
        .context("failed to delete task; nothing was changed")?;

    println!("Task deleted successfully!");
    show_board(cfg, renderer, &client, &session.username, ListFilter::default()).await?;
    Ok(())
}

#[instrument(skip(cfg, store, renderer))]
async fn cmd_users(
    cfg: &Config,
    store: &SessionStore,
    renderer: &mut Renderer,
) -> anyhow::Result<()> {
    info!("command users");

    let session = require_session(store)?;
    let client = client_for(cfg, Some(&session))?;
    let users = client
        .list_users()
        .await
        .context("failed to load the user directory")?;

    renderer.print_users(&users)?;
    Ok(())
}

#[instrument(skip(cfg, store, args))]
async fn cmd_login(cfg: &Config, store: &SessionStore, args: &[String]) -> anyhow::Result<()> {
    info!("command login");

    let username = args
        .first()
        .ok_or_else(|| anyhow!("usage: login <username> [password]"))?
        .trim()
        .to_string();
    let password = match args.get(1) {
        Some(password) => password.clone(),
        None => read_password("Password: ")?,
    };

    let client = client_for(cfg, None)?;
    let response = match client.login(&Credentials { username, password }).await {
        Ok(response) => response,
        Err(ApiError::Unauthorized) => return Err(anyhow!("Invalid username or password")),
        Err(err) => return Err(err).context("login request failed"),
    };

    store.login(&Session {
        username: response.username.clone(),
        token: response.token,
    })?;

    println!("Logged in as {}.", response.username);
    Ok(())
}

#[instrument(skip(cfg, store, args))]
async fn cmd_register(cfg: &Config, store: &SessionStore, args: &[String]) -> anyhow::Result<()> {
    info!("command register");

    let username = args
        .first()
        .ok_or_else(|| anyhow!("usage: register <username> [password]"))?
        .trim()
        .to_string();
    let password = match args.get(1) {
        Some(password) => password.clone(),
        None => read_password("Password: ")?,
    };

    let client = client_for(cfg, None)?;
    let response = client
        .register(&Credentials { username, password })
        .await
        .context("registration failed")?;

    store.login(&Session {
        username: response.username.clone(),
        token: response.token,
    })?;

    println!("Registered and logged in as {}.", response.username);
    Ok(())
}

#[instrument(skip(store))]
fn cmd_logout(store: &SessionStore) -> anyhow::Result<()> {
    info!("command logout");
    store.logout()?;
    println!("Logged out.");
    Ok(())
}

#[instrument(skip(store))]
fn cmd_whoami(store: &SessionStore) -> anyhow::Result<()> {
    match store.restore()? {
        Some(session) => println!("{}", session.username),
        None => println!("Not logged in."),
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Commands: board [all|starred|completed], add <title> [due:<expr>] [to:<user>] \
         [pri:<value>] [desc:<text>], done <id>, star <id>, priority <id> <value>, \
         assign <id> <username>, delete <id>, users, login <username>, register <username>, \
         logout, whoami, help, version"
    );
    Ok(())
}

fn read_password(prompt: &str) -> anyhow::Result<String> {
    if io::stdin().is_terminal() {
        eprint!("{prompt}");
        io::stderr().flush()?;
    }

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed reading password from stdin")?;

    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.is_empty() {
        return Err(anyhow!("password must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn parse_task_id(args: &[String], usage: &str) -> anyhow::Result<TaskId> {
    let token = args
        .first()
        .ok_or_else(|| anyhow!("usage: {usage}"))?;
    token
        .parse::<TaskId>()
        .map_err(|_| anyhow!("invalid task id: {token}"))
}

#[derive(Debug, Default)]
struct AddMods {
    due: Option<DateTime<Utc>>,
    assignee: Option<String>,
    priority: Option<Priority>,
    description: Option<String>,
}

fn parse_title_and_mods(
    args: &[String],
    now: DateTime<Utc>,
    cfg: &Config,
) -> anyhow::Result<(String, AddMods)> {
    let mut title_parts = Vec::new();
    let mut mods = AddMods::default();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some((key, value)) = arg.split_once(':') {
            match key.to_ascii_lowercase().as_str() {
                "due" => {
                    mods.due = Some(duedate::parse_due_input(value, now, cfg.timezone)?);
                    continue;
                }
                "to" | "assignee" => {
                    mods.assignee = Some(value.to_string());
                    continue;
                }
                "pri" | "priority" => {
                    mods.priority = Some(parse_priority_value(value, cfg.scheme)?);
                    continue;
                }
                "desc" | "description" => {
                    mods.description = Some(value.to_string());
                    continue;
                }
                _ => {}
            }
        }

        title_parts.push(arg.clone());
    }

    if title_parts.is_empty() {
        return Err(anyhow!("add: a task title is required"));
    }

    Ok((title_parts.join(" "), mods))
}

fn default_priority(scheme: PriorityScheme) -> Priority {
    match scheme {
        PriorityScheme::Starred => Priority::Flag(0),
        PriorityScheme::Levels => Priority::Level(PriorityLevel::Low),
    }
}

fn parse_priority_value(value: &str, scheme: PriorityScheme) -> anyhow::Result<Priority> {
    match scheme {
        PriorityScheme::Starred => match value.to_ascii_lowercase().as_str() {
            "1" | "starred" => Ok(Priority::Flag(1)),
            "0" | "none" => Ok(Priority::Flag(0)),
            other => Err(anyhow!(
                "this deployment uses the starred scheme; expected 0 or 1, got: {other}"
            )),
        },
        PriorityScheme::Levels => match value.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Level(PriorityLevel::Low)),
            "medium" => Ok(Priority::Level(PriorityLevel::Medium)),
            "high" => Ok(Priority::Level(PriorityLevel::High)),
            "starred" => Ok(Priority::Level(PriorityLevel::Starred)),
            other => Err(anyhow!(
                "unknown priority level: {other} (expected low, medium, high, or starred)"
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{
        expand_command_abbrev, known_command_names, parse_priority_value, parse_title_and_mods,
    };
    use crate::config::{Config, PriorityScheme};
    use crate::task::{Priority, PriorityLevel};

    fn config(scheme: PriorityScheme) -> Config {
        Config {
            server_url: "http://localhost:8080/api".to_string(),
            timezone: chrono_tz::UTC,
            scheme,
            color: false,
            loaded_file: None,
        }
    }

    #[test]
    fn abbreviations_expand_unambiguously() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("boa", &known), Some("board"));
        assert_eq!(expand_command_abbrev("del", &known), Some("delete"));
        assert_eq!(expand_command_abbrev("log", &known), None); // login/logout
        assert_eq!(expand_command_abbrev("zzz", &known), None);
    }

    #[test]
    fn add_modifiers_are_split_from_the_title() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 17, 12, 0, 0)
            .single()
            .expect("valid now");
        let cfg = config(PriorityScheme::Levels);

        let args: Vec<String> = ["Write", "the", "report", "due:tomorrow", "to:bob", "pri:high"]
            .iter()
            .map(ToString::to_string)
            .collect();

        let (title, mods) = parse_title_and_mods(&args, now, &cfg).expect("parse add args");
        assert_eq!(title, "Write the report");
        assert_eq!(mods.assignee.as_deref(), Some("bob"));
        assert_eq!(mods.priority, Some(Priority::Level(PriorityLevel::High)));
        assert_eq!(
            mods.due,
            Utc.with_ymd_and_hms(2026, 2, 18, 0, 0, 0).single()
        );
    }

    #[test]
    fn literal_marker_keeps_colon_tokens_in_the_title() {
        let now = Utc::now();
        let cfg = config(PriorityScheme::Levels);
        let args: Vec<String> = ["--", "due:diligence", "review"]
            .iter()
            .map(ToString::to_string)
            .collect();

        let (title, mods) = parse_title_and_mods(&args, now, &cfg).expect("parse add args");
        assert_eq!(title, "due:diligence review");
        assert!(mods.due.is_none());
    }

    #[test]
    fn empty_title_is_rejected() {
        let now = Utc::now();
        let cfg = config(PriorityScheme::Levels);
        let args = vec!["due:tomorrow".to_string()];
        assert!(parse_title_and_mods(&args, now, &cfg).is_err());
    }

    #[test]
    fn priority_values_follow_the_configured_scheme() {
        let starred = parse_priority_value("1", PriorityScheme::Starred).expect("flag");
        assert_eq!(starred, Priority::Flag(1));
        assert!(parse_priority_value("high", PriorityScheme::Starred).is_err());

        let high = parse_priority_value("HIGH", PriorityScheme::Levels).expect("level");
        assert_eq!(high, Priority::Level(PriorityLevel::High));
        assert!(parse_priority_value("2", PriorityScheme::Levels).is_err());
    }
}
