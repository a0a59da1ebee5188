use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use taskdeck_shared::Task;
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const TASKS_FILE_NAME: &str = "tasks.json";

/// On-disk task list for the CLI host. The stores themselves never touch it;
/// it stands in for the remote task service.
#[derive(Debug)]
pub struct TaskFile {
    pub data_dir: PathBuf,
    pub path: PathBuf,
}

/// Contents of `tasks.json`. `last_id` keeps ids of deleted tasks from being
/// handed out again after a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTasks {
    #[serde(default)]
    pub last_id: u64,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TaskFile {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let path = data_dir.join(TASKS_FILE_NAME);
        info!(path = %path.display(), "opened task file");

        Ok(Self { data_dir, path })
    }

    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> anyhow::Result<StoredTasks> {
        if !self.path.exists() {
            debug!("no task file yet");
            return Ok(StoredTasks::default());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(StoredTasks::default());
        }

        let stored: StoredTasks = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.path.display()))?;
        debug!(count = stored.tasks.len(), last_id = stored.last_id, "loaded tasks");
        Ok(stored)
    }

    #[tracing::instrument(skip(self, stored), fields(count = stored.tasks.len()))]
    pub fn save(&self, stored: &StoredTasks) -> anyhow::Result<()> {
        save_json_atomic(&self.path, stored).context("failed to save tasks.json")
    }
}

#[tracing::instrument(skip(path, value))]
pub(crate) fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    debug!(file = %path.display(), "saving json atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, value)?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use taskdeck_shared::{TaskCreate, TaskStatus};
    use tempfile::tempdir;

    use super::{StoredTasks, TaskFile};

    #[test]
    fn missing_file_loads_empty_and_saves_round_trip() {
        let temp = tempdir().expect("tempdir");
        let file = TaskFile::open(temp.path()).expect("open");
        assert_eq!(file.load().expect("load"), StoredTasks::default());

        let mut task = TaskCreate::new("write docs").into_task(3);
        task.status = TaskStatus::InProgress;
        let stored = StoredTasks {
            last_id: 5,
            tasks: vec![task],
        };
        file.save(&stored).expect("save");

        let reopened = TaskFile::open(temp.path()).expect("reopen");
        assert_eq!(reopened.load().expect("load"), stored);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let file = TaskFile::open(temp.path()).expect("open");
        fs::write(&file.path, "{\"tasks\": [oops").expect("write");
        let err = file.load().expect_err("corrupt file");
        assert!(format!("{err:#}").contains("failed parsing"));
    }
}
