use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use taskdeck_shared::{
    NotificationPatch, SettingsPatch, SortOrder, TaskCreate, TaskFilter, TaskPatch, TaskSorting,
    TaskStatus, User,
};
use tracing::{debug, info, instrument};

use crate::cli::{
    Command, SessionCommand, SettingsCommand, TaskAddArgs, TaskCommand, TaskListArgs,
    TaskUpdateArgs,
};
use crate::color_scheme::MediaQuery;
use crate::config::Config;
use crate::datastore::{StoredTasks, TaskFile};
use crate::datetime::parse_due;
use crate::document::MemoryDocument;
use crate::locale::SupportedLocale;
use crate::render::Renderer;
use crate::state::{AppState, Host};
use crate::storage::FileStorage;

const SETTINGS_KEYS: &[&str] = &[
    "theme",
    "language",
    "sidebarCollapsed",
    "taskViewMode",
    "taskSortOrder",
    "taskGrouping",
];

const NOTIFICATION_KEYS: &[&str] = &[
    "enabled",
    "sound",
    "desktop",
    "email",
    "dueDateReminder",
    "reminderTime",
];

/// Application state wired to files under the data directory.
#[derive(Debug)]
pub struct Workspace {
    pub state: AppState,
    pub task_file: TaskFile,
    pub renderer: Renderer,
}

impl Workspace {
    #[instrument(skip(cfg, renderer))]
    pub fn open(cfg: &Config, data_dir: &Path, renderer: Renderer) -> anyhow::Result<Self> {
        let storage = FileStorage::open(data_dir)
            .with_context(|| format!("failed to open storage in {}", data_dir.display()))?;
        let host = Host {
            storage: Arc::new(storage),
            document: Arc::new(MemoryDocument::new()),
            color_scheme: Arc::new(MediaQuery::new(cfg.system_prefers_dark())),
            system_locale: cfg.system_locale(),
        };

        let mut state = AppState::new(host);
        let task_file = TaskFile::open(data_dir)?;
        let stored = task_file.load()?;
        state.tasks.reserve_ids_through(stored.last_id);
        state.tasks.replace_all(stored.tasks);

        Ok(Self {
            state,
            task_file,
            renderer,
        })
    }

    fn save_tasks(&self) -> anyhow::Result<()> {
        self.task_file.save(&StoredTasks {
            last_id: self.state.tasks.last_id(),
            tasks: self.state.tasks.tasks().to_vec(),
        })
    }
}

#[instrument(skip(ws, out, now))]
pub fn dispatch<W: Write>(
    ws: &mut Workspace,
    command: Command,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Task(task) => match task {
            TaskCommand::Add(args) => cmd_task_add(ws, args, now, out),
            TaskCommand::List(args) => cmd_task_list(ws, args, now, out),
            TaskCommand::Show { id } => cmd_task_show(ws, id, out),
            TaskCommand::Update(args) => cmd_task_update(ws, args, now, out),
            TaskCommand::Done { id } => cmd_task_done(ws, id, now, out),
            TaskCommand::Delete { id } => cmd_task_delete(ws, id, out),
        },
        Command::Settings(settings) => cmd_settings(ws, settings, out),
        Command::Theme { preference } => {
            if let Some(theme) = preference {
                ws.state.settings.update(SettingsPatch {
                    theme: Some(theme),
                    ..SettingsPatch::default()
                });
            }
            let resolved = if ws.state.settings.is_dark() {
                "dark"
            } else {
                "light"
            };
            writeln!(out, "theme    {}", ws.state.settings.theme().as_str())?;
            writeln!(out, "resolved {resolved}")?;
            Ok(())
        }
        Command::Locale { code } => {
            if let Some(code) = code {
                let locale: SupportedLocale = code.parse()?;
                ws.state.locale.set_locale(locale);
            }
            writeln!(out, "{}", ws.state.locale.locale())?;
            Ok(())
        }
        Command::Session(session) => cmd_session(ws, session, out),
    }
}

#[instrument(skip(ws, args, now, out))]
fn cmd_task_add<W: Write>(
    ws: &mut Workspace,
    args: TaskAddArgs,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command task add");

    let title = args.title.join(" ");
    if title.trim().is_empty() {
        bail!("task title cannot be empty");
    }

    let mut create = TaskCreate::new(title);
    create.id = args.id;
    create.description = args.description;
    if let Some(status) = args.status {
        create.status = status;
    }
    if let Some(priority) = args.priority {
        create.priority = priority;
    }
    if let Some(due) = args.due {
        create.due_date = Some(parse_due(&due, now)?);
    }
    if create.status == TaskStatus::Completed {
        create.completed_at = Some(now);
    }
    create.tags = args.tags;
    create.parent_task_id = args.parent;
    create.position = match args.position {
        Some(position) => position,
        None => next_position(ws)?,
    };

    let id = ws
        .state
        .tasks
        .add(create)
        .ok_or_else(|| anyhow!("no task ids left; the highest id is already in use"))?;
    ws.save_tasks()?;
    writeln!(out, "Created task {id}.")?;
    Ok(())
}

fn next_position(ws: &Workspace) -> anyhow::Result<i64> {
    match ws.state.tasks.tasks().iter().map(|task| task.position).max() {
        None => Ok(0),
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| anyhow!("no position after {max}; pass --position explicitly")),
    }
}

#[instrument(skip(ws, args, now, out))]
fn cmd_task_list<W: Write>(
    ws: &mut Workspace,
    args: TaskListArgs,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    let criteria = TaskFilter {
        status: args.status,
        priority: args.priority,
        search: args.search,
        tags: (!args.tags.is_empty()).then_some(args.tags),
    };
    let sorting = TaskSorting {
        field: args.sort.unwrap_or(TaskSorting::default().field),
        order: if args.desc {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        },
    };
    ws.state.tasks.set_filter(criteria);
    ws.state.tasks.set_sorting(sorting);

    let view = ws.state.tasks.filtered_tasks();
    debug!(count = view.len(), total = ws.state.tasks.tasks().len(), "derived view");

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &*view)?;
        writeln!(out)?;
        return Ok(());
    }
    ws.renderer.write_task_table(out, &view, now)
}

#[instrument(skip(ws, out))]
fn cmd_task_show<W: Write>(ws: &mut Workspace, id: u64, out: &mut W) -> anyhow::Result<()> {
    let task = ws
        .state
        .tasks
        .get(id)
        .cloned()
        .ok_or_else(|| anyhow!("task {id} not found"))?;
    ws.renderer.write_task_info(out, &task)?;
    ws.state.tasks.set_current(Some(task));
    Ok(())
}

#[instrument(skip(ws, args, now, out), fields(id = args.id))]
fn cmd_task_update<W: Write>(
    ws: &mut Workspace,
    args: TaskUpdateArgs,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command task update");

    let mut patch = TaskPatch {
        title: args.title,
        status: args.status,
        priority: args.priority,
        position: args.position,
        ..TaskPatch::default()
    };
    if args.clear_description {
        patch.description = Some(None);
    } else if let Some(description) = args.description {
        patch.description = Some(Some(description));
    }
    if args.clear_due {
        patch.due_date = Some(None);
    } else if let Some(due) = args.due {
        patch.due_date = Some(Some(parse_due(&due, now)?));
    }
    if args.clear_tags {
        patch.tags = Some(Vec::new());
    } else if !args.tags.is_empty() {
        patch.tags = Some(args.tags);
    }
    if let Some(status) = patch.status {
        patch.completed_at = Some((status == TaskStatus::Completed).then_some(now));
    }

    if patch == TaskPatch::default() {
        bail!("nothing to update for task {}", args.id);
    }

    apply_patch(ws, args.id, patch)?;
    writeln!(out, "Updated task {}.", args.id)?;
    Ok(())
}

#[instrument(skip(ws, now, out))]
fn cmd_task_done<W: Write>(
    ws: &mut Workspace,
    id: u64,
    now: DateTime<Utc>,
    out: &mut W,
) -> anyhow::Result<()> {
    apply_patch(
        ws,
        id,
        TaskPatch {
            status: Some(TaskStatus::Completed),
            completed_at: Some(Some(now)),
            ..TaskPatch::default()
        },
    )?;
    writeln!(out, "Completed task {id}.")?;
    Ok(())
}

#[instrument(skip(ws, out))]
fn cmd_task_delete<W: Write>(ws: &mut Workspace, id: u64, out: &mut W) -> anyhow::Result<()> {
    if !ws.state.tasks.delete(id) {
        bail!("task {id} not found");
    }
    ws.save_tasks()?;
    writeln!(out, "Deleted task {id}.")?;
    Ok(())
}

fn apply_patch(ws: &mut Workspace, id: u64, patch: TaskPatch) -> anyhow::Result<()> {
    if !ws.state.tasks.update(id, patch) {
        bail!("task {id} not found");
    }
    ws.save_tasks()
}

#[instrument(skip(ws, out))]
fn cmd_settings<W: Write>(
    ws: &mut Workspace,
    command: SettingsCommand,
    out: &mut W,
) -> anyhow::Result<()> {
    let settings = &ws.state.settings;
    match command {
        SettingsCommand::Show { json } => {
            if json {
                serde_json::to_writer_pretty(&mut *out, &settings.settings())?;
                writeln!(out)?;
                return Ok(());
            }
            ws.renderer
                .write_settings(out, &settings.settings(), settings.is_dark())
        }
        SettingsCommand::Set { key, value } => {
            let patch: SettingsPatch = patch_from_pair(SETTINGS_KEYS, &key, &value)?;
            settings.update(patch);
            writeln!(out, "Set {key} = {value}.")?;
            Ok(())
        }
        SettingsCommand::Notify { key, value } => {
            let patch: NotificationPatch = patch_from_pair(NOTIFICATION_KEYS, &key, &value)?;
            settings.update_notifications(patch);
            writeln!(out, "Set notifications.{key} = {value}.")?;
            Ok(())
        }
        SettingsCommand::Reset => {
            settings.reset();
            writeln!(out, "Settings reset to defaults.")?;
            Ok(())
        }
    }
}

/// Builds a one-field patch from `key` and a raw value, which is read as JSON
/// when it parses and as a string otherwise.
fn patch_from_pair<T: DeserializeOwned>(
    known: &[&str],
    key: &str,
    raw: &str,
) -> anyhow::Result<T> {
    if !known.contains(&key) {
        bail!("unknown key {key:?}; expected one of: {}", known.join(", "));
    }

    let value = serde_json::from_str::<Value>(raw)
        .ok()
        .filter(|value| !value.is_string())
        .unwrap_or_else(|| Value::String(raw.to_string()));
    let mut record = serde_json::Map::new();
    record.insert(key.to_string(), value);

    serde_json::from_value(Value::Object(record))
        .with_context(|| format!("invalid value for {key}: {raw}"))
}

#[instrument(skip(ws, out))]
fn cmd_session<W: Write>(
    ws: &mut Workspace,
    command: SessionCommand,
    out: &mut W,
) -> anyhow::Result<()> {
    let session = &mut ws.state.session;
    match command {
        SessionCommand::Show => {}
        SessionCommand::Token { token, clear } => {
            session.set_token(if clear { None } else { token });
        }
        SessionCommand::User {
            id,
            username,
            email,
            role,
        } => {
            session.set_user(Some(User {
                id,
                username,
                email,
                role,
            }));
        }
        SessionCommand::Logout => {
            session.logout();
            writeln!(out, "Logged out.")?;
        }
    }
    ws.renderer.write_session(out, &ws.state.session.snapshot())
}
