use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::partition::{Role, VisibleTasks};
use crate::status::{self, Accent};
use crate::task::{Priority, PriorityLevel, Task, User};
use crate::view::{Board, ListFilter};

const PROGRESS_BAR_WIDTH: usize = 24;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self { color: cfg.color }
    }

    #[tracing::instrument(skip(self, board, now))]
    pub fn print_board(
        &mut self,
        board: &Board,
        filter: ListFilter,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let progress = board.progress;
        let filled = if progress.total == 0 {
            0
        } else {
            (progress.percent / 100.0 * PROGRESS_BAR_WIDTH as f64).round() as usize
        };
        let bar = format!(
            "[{}{}]",
            "#".repeat(filled.min(PROGRESS_BAR_WIDTH)),
            "-".repeat(PROGRESS_BAR_WIDTH.saturating_sub(filled))
        );
        writeln!(
            out,
            "{} {} of {} tasks completed ({:.0}%)",
            self.paint(&bar, "36"),
            progress.completed,
            progress.total,
            progress.percent
        )?;
        writeln!(out)?;

        match &board.visible {
            VisibleTasks::Unified(tasks) => {
                debug_assert_eq!(board.role, Role::Admin);
                self.print_section(&mut out, "All tasks", tasks, filter, now, tz)?;
            }
            VisibleTasks::Sections(sections) => {
                self.print_section(
                    &mut out,
                    "Assigned to me",
                    &sections.assigned_to_me,
                    filter,
                    now,
                    tz,
                )?;
                writeln!(out)?;
                self.print_section(
                    &mut out,
                    "Assigned by me",
                    &sections.assigned_by_me,
                    filter,
                    now,
                    tz,
                )?;
            }
        }

        Ok(())
    }

    fn print_section<W: Write>(
        &self,
        out: &mut W,
        label: &str,
        tasks: &[Task],
        filter: ListFilter,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(label, "1"))?;

        let rows: Vec<Vec<String>> = tasks
            .iter()
            .filter(|task| filter.keep(task))
            .map(|task| self.task_row(task, now, tz))
            .collect();

        if rows.is_empty() {
            writeln!(out, "  No tasks to display.")?;
            return Ok(());
        }

        let headers = ["", "ID", "", "Title", "Due", "Priority", "Owner", "Assignee"];
        write_table(out, &headers, rows)?;
        Ok(())
    }

    fn task_row(&self, task: &Task, now: DateTime<Utc>, tz: Tz) -> Vec<String> {
        let display = status::derive(task, now, tz);

        // Starred tasks get a left-border accent; other levels color
        // their priority cell instead.
        let marker = if display.accent == Accent::Starred {
            self.paint("|", accent_code(Accent::Starred))
        } else {
            " ".to_string()
        };

        let done_mark = if task.completed {
            self.paint("x", "32")
        } else {
            "-".to_string()
        };

        let title = if display.muted {
            self.paint(&task.title, "2;9")
        } else {
            task.title.clone()
        };

        let due = match display.due_label {
            Some(label) if display.overdue => self.paint(&format!("{label} (overdue)"), "31"),
            Some(label) => label,
            None => String::new(),
        };

        let priority = priority_cell(task.priority.as_ref());
        let priority = if display.accent == Accent::Neutral {
            priority
        } else {
            self.paint(&priority, accent_code(display.accent))
        };

        vec![
            marker,
            self.paint(&task.id.to_string(), "33"),
            done_mark,
            title,
            due,
            priority,
            task.owner.clone(),
            task.assignee.clone(),
        ]
    }

    #[tracing::instrument(skip(self, users))]
    pub fn print_users(&mut self, users: &[User]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if users.is_empty() {
            writeln!(out, "No users.")?;
            return Ok(());
        }

        let rows: Vec<Vec<String>> = users
            .iter()
            .map(|user| {
                vec![
                    user.username.clone(),
                    user.role.clone().unwrap_or_default(),
                ]
            })
            .collect();

        write_table(&mut out, &["Username", "Role"], rows)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn accent_code(accent: Accent) -> &'static str {
    match accent {
        Accent::Starred => "93",
        Accent::High => "35",
        Accent::Medium => "33",
        Accent::Low => "32",
        Accent::Neutral => "0",
    }
}

fn priority_cell(priority: Option<&Priority>) -> String {
    match priority {
        None => String::new(),
        Some(Priority::Flag(1)) => "starred".to_string(),
        Some(Priority::Flag(_)) => String::new(),
        Some(Priority::Level(level)) => match level {
            PriorityLevel::Low => "low".to_string(),
            PriorityLevel::Medium => "medium".to_string(),
            PriorityLevel::High => "high".to_string(),
            PriorityLevel::Starred => "starred".to_string(),
        },
        Some(Priority::Other(value)) => value
            .as_str()
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_else(|| value.to_string()),
    }
}

fn write_table<W: Write>(writer: &mut W, headers: &[&str], rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(*header))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(visible_width(cell));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        write!(writer, "{:width$} ", header, width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<w$} ", "", w = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let padding = widths[idx].saturating_sub(visible_width(cell));
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn visible_width(s: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(s).as_str())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{strip_ansi, visible_width, write_table};

    #[test]
    fn strips_color_codes_for_width_math() {
        let painted = "\x1b[31m2026-08-07 12:00 (overdue)\x1b[0m";
        assert_eq!(strip_ansi(painted), "2026-08-07 12:00 (overdue)");
        assert_eq!(visible_width(painted), 26);
    }

    #[test]
    fn table_pads_columns_to_widest_cell() {
        let mut buffer = Vec::new();
        write_table(
            &mut buffer,
            &["ID", "Title"],
            vec![
                vec!["1".to_string(), "short".to_string()],
                vec!["12".to_string(), "a longer title".to_string()],
            ],
        )
        .expect("table write");

        let text = String::from_utf8(buffer).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("ID "));
        assert!(lines[2].starts_with("1  short"));
        assert!(lines[3].starts_with("12 a longer title"));
    }
}
