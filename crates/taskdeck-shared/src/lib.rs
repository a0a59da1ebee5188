use std::collections::BTreeMap;

use chrono::{
  DateTime,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  Pending,
  InProgress,
  Completed,
  Cancelled
}

impl TaskStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Pending => "pending",
      | Self::InProgress => "in_progress",
      | Self::Completed => "completed",
      | Self::Cancelled => "cancelled"
    }
  }

  pub fn parse(
    raw: &str
  ) -> Option<Self> {
    match raw.trim() {
      | "pending" => Some(Self::Pending),
      | "in_progress" => {
        Some(Self::InProgress)
      }
      | "completed" => {
        Some(Self::Completed)
      }
      | "cancelled" => {
        Some(Self::Cancelled)
      }
      | _ => None
    }
  }
}

/// Wire form is the bare integer
/// `0`, `1` or `2`.
#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
#[serde(
  try_from = "u8",
  into = "u8"
)]
pub enum TaskPriority {
  Low,
  Medium,
  High
}

impl TaskPriority {
  pub fn as_u8(self) -> u8 {
    match self {
      | Self::Low => 0,
      | Self::Medium => 1,
      | Self::High => 2
    }
  }
}

impl TryFrom<u8> for TaskPriority {
  type Error = String;

  fn try_from(
    value: u8
  ) -> Result<Self, Self::Error> {
    match value {
      | 0 => Ok(Self::Low),
      | 1 => Ok(Self::Medium),
      | 2 => Ok(Self::High),
      | other => Err(format!(
        "priority must be 0, 1 or 2, \
         got {other}"
      ))
    }
  }
}

impl From<TaskPriority> for u8 {
  fn from(value: TaskPriority) -> Self {
    value.as_u8()
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  pub id:             u64,
  pub title:          String,
  #[serde(default)]
  pub description:    Option<String>,
  pub status:         TaskStatus,
  pub priority:       TaskPriority,
  #[serde(default)]
  pub due_date:       Option<DateTime<Utc>>,
  #[serde(default)]
  pub completed_at:   Option<DateTime<Utc>>,
  #[serde(default)]
  pub parent_task_id: Option<u64>,
  #[serde(default)]
  pub position:       i64,
  #[serde(default)]
  pub tags:           Vec<String>,
  #[serde(default)]
  pub metadata:
    BTreeMap<String, serde_json::Value>
}

/// A task as submitted for creation;
/// the repository fills in `id` when
/// it is absent.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreate {
  #[serde(default)]
  pub id:             Option<u64>,
  pub title:          String,
  #[serde(default)]
  pub description:    Option<String>,
  pub status:         TaskStatus,
  pub priority:       TaskPriority,
  #[serde(default)]
  pub due_date:       Option<DateTime<Utc>>,
  #[serde(default)]
  pub completed_at:   Option<DateTime<Utc>>,
  #[serde(default)]
  pub parent_task_id: Option<u64>,
  #[serde(default)]
  pub position:       i64,
  #[serde(default)]
  pub tags:           Vec<String>,
  #[serde(default)]
  pub metadata:
    BTreeMap<String, serde_json::Value>
}

impl TaskCreate {
  pub fn new(
    title: impl Into<String>
  ) -> Self {
    Self {
      id:             None,
      title:          title.into(),
      description:    None,
      status:         TaskStatus::Pending,
      priority:       TaskPriority::Low,
      due_date:       None,
      completed_at:   None,
      parent_task_id: None,
      position:       0,
      tags:           vec![],
      metadata:       BTreeMap::new()
    }
  }

  pub fn into_task(
    self,
    id: u64
  ) -> Task {
    Task {
      id,
      title: self.title,
      description: self.description,
      status: self.status,
      priority: self.priority,
      due_date: self.due_date,
      completed_at: self.completed_at,
      parent_task_id: self
        .parent_task_id,
      position: self.position,
      tags: self.tags,
      metadata: self.metadata
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
  pub title:          Option<String>,
  pub description:
    Option<Option<String>>,
  pub status:         Option<TaskStatus>,
  pub priority:
    Option<TaskPriority>,
  pub due_date:
    Option<Option<DateTime<Utc>>>,
  pub completed_at:
    Option<Option<DateTime<Utc>>>,
  pub parent_task_id:
    Option<Option<u64>>,
  pub position:       Option<i64>,
  pub tags:           Option<Vec<String>>,
  pub metadata: Option<
    BTreeMap<String, serde_json::Value>
  >
}

impl TaskPatch {
  pub fn apply_to(
    self,
    task: &mut Task
  ) {
    if let Some(title) = self.title {
      task.title = title;
    }
    if let Some(description) =
      self.description
    {
      task.description = description;
    }
    if let Some(status) = self.status {
      task.status = status;
    }
    if let Some(priority) =
      self.priority
    {
      task.priority = priority;
    }
    if let Some(due_date) =
      self.due_date
    {
      task.due_date = due_date;
    }
    if let Some(completed_at) =
      self.completed_at
    {
      task.completed_at = completed_at;
    }
    if let Some(parent) =
      self.parent_task_id
    {
      task.parent_task_id = parent;
    }
    if let Some(position) =
      self.position
    {
      task.position = position;
    }
    if let Some(tags) = self.tags {
      task.tags = tags;
    }
    if let Some(metadata) =
      self.metadata
    {
      task.metadata = metadata;
    }
  }
}

/// Every `None` field is "no
/// constraint", never "match empty".
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
  Eq,
)]
pub struct TaskFilter {
  pub status:   Option<TaskStatus>,
  pub priority: Option<TaskPriority>,
  pub search:   Option<String>,
  pub tags:     Option<Vec<String>>
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
  Id,
  Title,
  Description,
  Status,
  Priority,
  DueDate,
  CompletedAt,
  ParentTaskId,
  Position,
  Tags,
  Metadata
}

impl SortField {
  pub fn parse(
    raw: &str
  ) -> Option<Self> {
    let field = match raw.trim() {
      | "id" => Self::Id,
      | "title" => Self::Title,
      | "description" => {
        Self::Description
      }
      | "status" => Self::Status,
      | "priority" => Self::Priority,
      | "dueDate" | "due_date"
      | "due" => Self::DueDate,
      | "completedAt"
      | "completed_at" => {
        Self::CompletedAt
      }
      | "parentTaskId"
      | "parent_task_id"
      | "parent" => Self::ParentTaskId,
      | "position" => Self::Position,
      | "tags" => Self::Tags,
      | "metadata" => Self::Metadata,
      | _ => return None
    };
    Some(field)
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
  #[default]
  Asc,
  Desc
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskSorting {
  pub field: SortField,
  pub order: SortOrder
}

impl Default for TaskSorting {
  fn default() -> Self {
    Self {
      field: SortField::Position,
      order: SortOrder::Asc
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
  Light,
  Dark,
  #[default]
  System
}

impl ThemePreference {
  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Light => "light",
      | Self::Dark => "dark",
      | Self::System => "system"
    }
  }

  pub fn parse(
    raw: &str
  ) -> Option<Self> {
    match raw.trim() {
      | "light" => Some(Self::Light),
      | "dark" => Some(Self::Dark),
      | "system" => Some(Self::System),
      | _ => None
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskViewMode {
  #[default]
  List,
  Board,
  Calendar
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub enum TaskSortOrder {
  #[default]
  Manual,
  DueDate,
  Priority,
  Title
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub enum TaskGrouping {
  #[default]
  None,
  Status,
  Priority,
  DueDate
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(
  rename_all = "camelCase",
  default
)]
pub struct NotificationSettings {
  pub enabled:           bool,
  pub sound:             bool,
  pub desktop:           bool,
  pub email:             bool,
  pub due_date_reminder: bool,
  /// Minutes before the due date.
  pub reminder_time:     u32
}

impl Default for NotificationSettings {
  fn default() -> Self {
    Self {
      enabled:           true,
      sound:             true,
      desktop:           true,
      email:             false,
      due_date_reminder: true,
      reminder_time:     30
    }
  }
}

/// Always full-shape: missing fields in
/// a persisted record come from
/// `Settings::default()`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(
  rename_all = "camelCase",
  default
)]
pub struct Settings {
  pub theme:             ThemePreference,
  pub language:          String,
  pub notifications:
    NotificationSettings,
  pub sidebar_collapsed: bool,
  pub task_view_mode:    TaskViewMode,
  pub task_sort_order:   TaskSortOrder,
  pub task_grouping:     TaskGrouping
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      theme:
        ThemePreference::System,
      language:          "zh-CN"
        .to_string(),
      notifications:
        NotificationSettings::default(
        ),
      sidebar_collapsed: false,
      task_view_mode:
        TaskViewMode::List,
      task_sort_order:
        TaskSortOrder::Manual,
      task_grouping:
        TaskGrouping::None
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
  pub theme:
    Option<ThemePreference>,
  pub language:          Option<String>,
  pub notifications:
    Option<NotificationSettings>,
  pub sidebar_collapsed: Option<bool>,
  pub task_view_mode:
    Option<TaskViewMode>,
  pub task_sort_order:
    Option<TaskSortOrder>,
  pub task_grouping:
    Option<TaskGrouping>
}

impl SettingsPatch {
  /// Top-level merge: `notifications`
  /// replaces the nested record as a
  /// whole.
  pub fn apply_to(
    self,
    settings: &mut Settings
  ) {
    if let Some(theme) = self.theme {
      settings.theme = theme;
    }
    if let Some(language) =
      self.language
    {
      settings.language = language;
    }
    if let Some(notifications) =
      self.notifications
    {
      settings.notifications =
        notifications;
    }
    if let Some(collapsed) =
      self.sidebar_collapsed
    {
      settings.sidebar_collapsed =
        collapsed;
    }
    if let Some(mode) =
      self.task_view_mode
    {
      settings.task_view_mode = mode;
    }
    if let Some(order) =
      self.task_sort_order
    {
      settings.task_sort_order = order;
    }
    if let Some(grouping) =
      self.task_grouping
    {
      settings.task_grouping = grouping;
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPatch {
  pub enabled:           Option<bool>,
  pub sound:             Option<bool>,
  pub desktop:           Option<bool>,
  pub email:             Option<bool>,
  pub due_date_reminder: Option<bool>,
  pub reminder_time:     Option<u32>
}

impl NotificationPatch {
  pub fn apply_to(
    self,
    notifications: &mut NotificationSettings
  ) {
    if let Some(v) = self.enabled {
      notifications.enabled = v;
    }
    if let Some(v) = self.sound {
      notifications.sound = v;
    }
    if let Some(v) = self.desktop {
      notifications.desktop = v;
    }
    if let Some(v) = self.email {
      notifications.email = v;
    }
    if let Some(v) =
      self.due_date_reminder
    {
      notifications.due_date_reminder =
        v;
    }
    if let Some(v) = self.reminder_time
    {
      notifications.reminder_time = v;
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct User {
  pub id:       u64,
  pub username: String,
  pub email:    String,
  #[serde(default)]
  pub role:     Option<String>
}

/// Snapshot of authentication state.
///
/// A token may be present without a
/// user: a token restored from storage
/// is never validated here.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
  Eq,
)]
pub struct Session {
  pub user:  Option<User>,
  pub token: Option<String>
}

impl Session {
  pub fn is_authenticated(
    &self
  ) -> bool {
    self.user.is_some()
  }
}
