use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::datastore::save_json_atomic;

pub const TOKEN_STORAGE_KEY: &str = "token";
pub const SETTINGS_STORAGE_KEY: &str = "settings";
pub const LOCALE_STORAGE_KEY: &str = "locale";

pub const STORAGE_FILE_NAME: &str = "storage.json";

/// String-keyed, string-valued durable storage.
///
/// Writes are synchronous: when `set_item` returns `Ok`, the value is durable.
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()>;

    fn remove_item(&self, key: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
    fail_writes: Mutex<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items<I, K, V>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let items = items
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            items: Mutex::new(items),
            fail_writes: Mutex::new(false),
        }
    }

    /// Makes every subsequent `set_item`/`remove_item` fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.items.lock().clone()
    }

    fn check_writable(&self) -> anyhow::Result<()> {
        if *self.fail_writes.lock() {
            return Err(anyhow!("storage is not writable"));
        }
        Ok(())
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.check_writable()?;
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        self.check_writable()?;
        self.items.lock().remove(key);
        Ok(())
    }
}

/// Storage backed by a single JSON object file, rewritten atomically on every write.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let path = data_dir.join(STORAGE_FILE_NAME);
        let items = if path.exists() {
            load_items(&path)?
        } else {
            BTreeMap::new()
        };

        info!(
            file = %path.display(),
            keys = items.len(),
            "opened file storage"
        );

        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.items.lock().get(key).cloned())
    }

    #[tracing::instrument(skip(self, value))]
    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut items = self.items.lock();
        let mut next = items.clone();
        next.insert(key.to_string(), value.to_string());
        save_items_atomic(&self.path, &next)
            .with_context(|| format!("failed to write key {key}"))?;
        *items = next;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        let mut items = self.items.lock();
        if !items.contains_key(key) {
            return Ok(());
        }
        let mut next = items.clone();
        next.remove(key);
        save_items_atomic(&self.path, &next)
            .with_context(|| format!("failed to remove key {key}"))?;
        *items = next;
        Ok(())
    }
}

/// Unreadable files are errors. A file that is not a JSON object is moved
/// to `<name>.bak` and storage starts empty; non-string entries are dropped.
#[tracing::instrument(skip(path))]
fn load_items(path: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    debug!(file = %path.display(), "loading storage file");
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let object = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(object)) => object,
        Ok(other) => {
            warn!(file = %path.display(), kind = json_kind(&other), "storage file is not a JSON object; starting empty");
            set_aside(path);
            return Ok(BTreeMap::new());
        }
        Err(err) => {
            warn!(file = %path.display(), error = %err, "storage file is corrupt; starting empty");
            set_aside(path);
            return Ok(BTreeMap::new());
        }
    };

    let mut items = BTreeMap::new();
    for (key, value) in object {
        match value {
            Value::String(value) => {
                items.insert(key, value);
            }
            other => {
                warn!(key = %key, kind = json_kind(&other), "dropping non-string storage entry");
            }
        }
    }
    Ok(items)
}

fn set_aside(path: &Path) {
    let mut backup = path.as_os_str().to_os_string();
    backup.push(".bak");
    let backup = PathBuf::from(backup);
    match fs::rename(path, &backup) {
        Ok(()) => info!(backup = %backup.display(), "moved unreadable storage file aside"),
        Err(err) => warn!(error = %err, "failed to move unreadable storage file aside"),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn save_items_atomic(path: &Path, items: &BTreeMap<String, String>) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = items.len(), "saving storage");
    save_json_atomic(path, items)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{FileStorage, KeyValueStorage, MemoryStorage, STORAGE_FILE_NAME};

    #[test]
    fn file_storage_survives_reopen() {
        let temp = tempdir().expect("tempdir");
        {
            let storage = FileStorage::open(temp.path()).expect("open storage");
            storage.set_item("token", "abc").expect("set token");
            storage.set_item("locale", "en").expect("set locale");
            storage.remove_item("locale").expect("remove locale");
        }

        let reopened = FileStorage::open(temp.path()).expect("reopen storage");
        assert_eq!(
            reopened.get_item("token").expect("get token").as_deref(),
            Some("abc")
        );
        assert_eq!(reopened.get_item("locale").expect("get locale"), None);
    }

    #[test]
    fn memory_storage_write_failures_leave_contents_untouched() {
        let storage = MemoryStorage::with_items([("token", "abc")]);
        storage.set_fail_writes(true);
        assert!(storage.set_item("token", "xyz").is_err());
        assert!(storage.remove_item("token").is_err());
        assert_eq!(
            storage.get_item("token").expect("get token").as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn corrupt_file_is_set_aside_and_storage_starts_empty() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join(STORAGE_FILE_NAME);
        fs::write(&path, "{trunc").expect("write corrupt file");

        let storage = FileStorage::open(temp.path()).expect("open storage");
        assert_eq!(storage.get_item("token").expect("get token"), None);
        assert_eq!(
            fs::read_to_string(temp.path().join("storage.json.bak")).expect("backup kept"),
            "{trunc"
        );

        storage.set_item("token", "abc").expect("set token");
        let reopened = FileStorage::open(temp.path()).expect("reopen storage");
        assert_eq!(
            reopened.get_item("token").expect("get token").as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn non_string_entries_are_dropped() {
        let temp = tempdir().expect("tempdir");
        fs::write(
            temp.path().join(STORAGE_FILE_NAME),
            r#"{"settings":{"theme":"dark"},"token":"abc","locale":7}"#,
        )
        .expect("write file");

        let storage = FileStorage::open(temp.path()).expect("open storage");
        assert_eq!(storage.get_item("settings").expect("get settings"), None);
        assert_eq!(storage.get_item("locale").expect("get locale"), None);
        assert_eq!(
            storage.get_item("token").expect("get token").as_deref(),
            Some("abc")
        );
    }
}
