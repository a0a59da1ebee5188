use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use taskdeck_shared::{SortField, TaskPriority, TaskStatus, ThemePreference};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdeck",
    version,
    about = "Taskdeck: task list, settings and session state from the terminal",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "rc-file", global = true)]
    pub rc_file: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create, list and edit tasks.
    #[command(subcommand)]
    Task(TaskCommand),
    /// Inspect or change user settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Show the resolved theme, or set the theme preference.
    Theme {
        #[arg(value_parser = parse_theme)]
        preference: Option<ThemePreference>,
    },
    /// Show or set the interface locale.
    Locale { code: Option<String> },
    /// Inspect or change the stored session.
    #[command(subcommand)]
    Session(SessionCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    Add(TaskAddArgs),
    List(TaskListArgs),
    Show { id: u64 },
    Update(TaskUpdateArgs),
    /// Marks a task completed and stamps `completedAt`.
    Done { id: u64 },
    Delete { id: u64 },
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskAddArgs {
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,
    #[arg(long)]
    pub id: Option<u64>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, value_parser = parse_status)]
    pub status: Option<TaskStatus>,
    #[arg(long, value_parser = parse_priority)]
    pub priority: Option<TaskPriority>,
    #[arg(long)]
    pub due: Option<String>,
    #[arg(long = "tag", action = ArgAction::Append)]
    pub tags: Vec<String>,
    #[arg(long)]
    pub parent: Option<u64>,
    #[arg(long)]
    pub position: Option<i64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskListArgs {
    #[arg(long, value_parser = parse_status)]
    pub status: Option<TaskStatus>,
    #[arg(long, value_parser = parse_priority)]
    pub priority: Option<TaskPriority>,
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long = "tag", action = ArgAction::Append)]
    pub tags: Vec<String>,
    #[arg(long, value_parser = parse_sort_field)]
    pub sort: Option<SortField>,
    #[arg(long)]
    pub desc: bool,
    /// Print the view as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskUpdateArgs {
    pub id: u64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, conflicts_with = "clear_description")]
    pub description: Option<String>,
    #[arg(long)]
    pub clear_description: bool,
    #[arg(long, value_parser = parse_status)]
    pub status: Option<TaskStatus>,
    #[arg(long, value_parser = parse_priority)]
    pub priority: Option<TaskPriority>,
    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,
    #[arg(long)]
    pub clear_due: bool,
    /// Replaces the tag list.
    #[arg(long = "tag", action = ArgAction::Append)]
    pub tags: Vec<String>,
    #[arg(long)]
    pub clear_tags: bool,
    #[arg(long)]
    pub position: Option<i64>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Sets one top-level field by its camelCase name.
    Set { key: String, value: String },
    /// Sets one notification field by its camelCase name.
    Notify { key: String, value: String },
    Reset,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    Show,
    /// Stores a token, or clears it with `--clear`.
    Token {
        #[arg(required_unless_present = "clear")]
        token: Option<String>,
        #[arg(long)]
        clear: bool,
    },
    User {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        role: Option<String>,
    },
    Logout,
}

fn parse_status(raw: &str) -> Result<TaskStatus, String> {
    TaskStatus::parse(raw).ok_or_else(|| {
        format!("unknown status {raw:?} (pending, in_progress, completed, cancelled)")
    })
}

fn parse_priority(raw: &str) -> Result<TaskPriority, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "low" | "l" | "0" => Ok(TaskPriority::Low),
        "medium" | "m" | "1" => Ok(TaskPriority::Medium),
        "high" | "h" | "2" => Ok(TaskPriority::High),
        other => Err(format!("unknown priority {other:?} (low, medium, high)")),
    }
}

fn parse_sort_field(raw: &str) -> Result<SortField, String> {
    SortField::parse(raw).ok_or_else(|| format!("unknown sort field {raw:?}"))
}

fn parse_theme(raw: &str) -> Result<ThemePreference, String> {
    ThemePreference::parse(raw)
        .ok_or_else(|| format!("unknown theme {raw:?} (light, dark, system)"))
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` overrides out of the argument list before
/// clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.")
            && let Some((k, v)) = rest.split_once('=')
        {
            if k.trim().is_empty() {
                return Err(anyhow!("empty key in override: {s}"));
            }
            debug!(key = %k, value = %v, "captured positional rc override");
            overrides.push((format!("rc.{k}"), v.to_string()));
            continue;
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;
    use taskdeck_shared::{SortField, TaskPriority};

    use super::{Command, GlobalCli, TaskCommand, preprocess_args};

    fn args(raw: &[&str]) -> Vec<OsString> {
        raw.iter().map(OsString::from).collect()
    }

    #[test]
    fn rc_overrides_are_lifted_out() {
        let pre = preprocess_args(&args(&[
            "taskdeck",
            "rc.system.dark=on",
            "task",
            "list",
        ]))
        .expect("preprocess");
        assert_eq!(
            pre.rc_overrides,
            vec![("rc.system.dark".to_string(), "on".to_string())]
        );
        assert_eq!(pre.cleaned_args, args(&["taskdeck", "task", "list"]));
    }

    #[test]
    fn task_list_flags_parse() {
        let cli = GlobalCli::parse_from(args(&[
            "taskdeck", "task", "list", "--priority", "high", "--tag", "a", "--tag", "b",
            "--sort", "dueDate", "--desc", "-vv",
        ]));
        assert_eq!(cli.verbose, 2);
        let Some(Command::Task(TaskCommand::List(list))) = cli.command else {
            panic!("expected task list");
        };
        assert_eq!(list.priority, Some(TaskPriority::High));
        assert_eq!(list.tags, vec!["a", "b"]);
        assert_eq!(list.sort, Some(SortField::DueDate));
        assert!(list.desc);
    }

    #[test]
    fn unknown_priority_is_rejected() {
        let parsed = GlobalCli::try_parse_from(args(&[
            "taskdeck", "task", "add", "x", "--priority", "urgent",
        ]));
        assert!(parsed.is_err());
    }
}
