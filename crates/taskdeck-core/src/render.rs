use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use taskdeck_shared::{Session, Settings, Task, TaskPriority, TaskStatus};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_due;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => io::stdout().is_terminal(),
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, out, tasks, now))]
    pub fn write_task_table<W: Write>(
        &self,
        out: &mut W,
        tasks: &[Task],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No matches.")?;
            return Ok(());
        }

        let headers = ["ID", "Status", "Pri", "Due", "Title", "Tags"]
            .map(String::from)
            .to_vec();

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = self.paint(&task.id.to_string(), "33");

            let due = match task.due_date {
                Some(due) if due < now && !is_closed(task.status) => {
                    self.paint(&format_due(due), "31")
                }
                Some(due) => format_due(due),
                None => String::new(),
            };

            let tags = task
                .tags
                .iter()
                .map(|tag| format!("+{tag}"))
                .collect::<Vec<_>>()
                .join(" ");

            rows.push(vec![
                id,
                task.status.as_str().to_string(),
                priority_label(task.priority).to_string(),
                due,
                task.title.clone(),
                tags,
            ]);
        }

        write_table(&mut *out, headers, rows)?;
        writeln!(out)?;
        writeln!(
            out,
            "{} task{}",
            tasks.len(),
            if tasks.len() == 1 { "" } else { "s" }
        )?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, task))]
    pub fn write_task_info<W: Write>(&self, out: &mut W, task: &Task) -> anyhow::Result<()> {
        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(
            out,
            "description {}",
            task.description.as_deref().unwrap_or_default()
        )?;
        writeln!(out, "status      {}", task.status.as_str())?;
        writeln!(out, "priority    {}", priority_label(task.priority))?;
        writeln!(out, "position    {}", task.position)?;
        writeln!(out, "tags        {}", task.tags.join(", "))?;

        if let Some(parent) = task.parent_task_id {
            writeln!(out, "parent      {parent}")?;
        }
        if let Some(due) = task.due_date {
            writeln!(out, "due         {}", due.to_rfc3339())?;
        }
        if let Some(completed) = task.completed_at {
            writeln!(out, "completed   {}", completed.to_rfc3339())?;
        }
        for (key, value) in &task.metadata {
            writeln!(out, "meta.{key:<7}{value}")?;
        }

        Ok(())
    }

    pub fn write_settings<W: Write>(
        &self,
        out: &mut W,
        settings: &Settings,
        dark: bool,
    ) -> anyhow::Result<()> {
        let value = serde_json::to_value(settings)?;
        let mut rows = Vec::new();
        flatten_json("", &value, &mut rows);
        rows.push(vec![
            "(resolved)".to_string(),
            if dark { "dark" } else { "light" }.to_string(),
        ]);
        write_table(out, vec!["Key".into(), "Value".into()], rows)
    }

    pub fn write_session<W: Write>(&self, out: &mut W, session: &Session) -> anyhow::Result<()> {
        match &session.user {
            Some(user) => {
                writeln!(out, "user        {} <{}> (#{})", user.username, user.email, user.id)?;
                if let Some(role) = &user.role {
                    writeln!(out, "role        {role}")?;
                }
            }
            None => writeln!(out, "user        (anonymous)")?,
        }
        writeln!(
            out,
            "token       {}",
            if session.token.is_some() { "stored" } else { "none" }
        )?;
        writeln!(out, "signed in   {}", session.is_authenticated())?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn is_closed(status: TaskStatus) -> bool {
    matches!(status, TaskStatus::Completed | TaskStatus::Cancelled)
}

fn priority_label(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Low => "L",
        TaskPriority::Medium => "M",
        TaskPriority::High => "H",
    }
}

fn flatten_json(prefix: &str, value: &serde_json::Value, rows: &mut Vec<Vec<String>>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, inner) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_json(&path, inner, rows);
            }
        }
        serde_json::Value::String(text) => rows.push(vec![prefix.to_string(), text.clone()]),
        other => rows.push(vec![prefix.to_string(), other.to_string()]),
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
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
    use chrono::Utc;
    use taskdeck_shared::{Settings, TaskCreate};

    use super::{Renderer, strip_ansi, write_table};

    #[test]
    fn wide_characters_keep_columns_aligned() {
        let mut out = Vec::new();
        write_table(
            &mut out,
            vec!["A".into(), "B".into()],
            vec![vec!["任务".into(), "x".into()], vec!["ab".into(), "y".into()]],
        )
        .expect("table");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A    B ");
        assert_eq!(lines[2], "任务 x ");
        assert_eq!(lines[3], "ab   y ");
    }

    #[test]
    fn task_table_lists_every_task() {
        let mut first = TaskCreate::new("first").into_task(1);
        first.tags = vec!["home".into()];
        let second = TaskCreate::new("second").into_task(2);

        let mut out = Vec::new();
        Renderer::plain()
            .write_task_table(&mut out, &[first, second], Utc::now())
            .expect("render");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("+home"));
        assert!(text.contains("second"));
        assert!(text.trim_end().ends_with("2 tasks"));
    }

    #[test]
    fn settings_are_flattened_by_wire_name() {
        let mut out = Vec::new();
        Renderer::plain()
            .write_settings(&mut out, &Settings::default(), false)
            .expect("render");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("notifications.reminderTime"));
        assert!(text.contains("zh-CN"));
    }

    #[test]
    fn ansi_codes_are_ignored_for_width() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
    }
}
