use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::color_scheme::{ColorSchemeQuery, MediaQuery};
use crate::document::{DocumentRoot, MemoryDocument};
use crate::locale::LocaleStore;
use crate::session::SessionStore;
use crate::settings::SettingsStore;
use crate::storage::{KeyValueStorage, MemoryStorage};
use crate::tasks::TaskStore;

/// Everything the stores need from the environment they run in.
#[derive(Clone)]
pub struct Host {
    pub storage: Arc<dyn KeyValueStorage>,
    pub document: Arc<dyn DocumentRoot>,
    pub color_scheme: Arc<dyn ColorSchemeQuery>,
    pub system_locale: Option<String>,
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("prefers_dark", &self.color_scheme.prefers_dark())
            .field("system_locale", &self.system_locale)
            .finish_non_exhaustive()
    }
}

impl Host {
    pub fn in_memory() -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            document: Arc::new(MemoryDocument::new()),
            color_scheme: Arc::new(MediaQuery::new(false)),
            system_locale: None,
        }
    }
}

/// Single serialization point for hosts that touch the stores from more
/// than one thread.
pub type SharedAppState = Arc<Mutex<AppState>>;

/// One instance per application context.
pub struct AppState {
    pub tasks: TaskStore,
    pub settings: SettingsStore,
    pub session: SessionStore,
    pub locale: LocaleStore,
    document: Arc<dyn DocumentRoot>,
}

impl AppState {
    #[tracing::instrument(skip_all)]
    pub fn new(host: Host) -> Self {
        let settings = SettingsStore::new(
            Arc::clone(&host.storage),
            Arc::clone(&host.document),
            Arc::clone(&host.color_scheme),
        );
        let session = SessionStore::new(Arc::clone(&host.storage));
        let locale = LocaleStore::new(
            Arc::clone(&host.storage),
            Arc::clone(&host.document),
            host.system_locale.as_deref(),
        );

        info!(
            locale = %locale.locale(),
            theme = ?settings.theme(),
            has_token = session.token().is_some(),
            "application state ready"
        );

        Self {
            tasks: TaskStore::new(),
            settings,
            session,
            locale,
            document: host.document,
        }
    }

    pub fn shared(self) -> SharedAppState {
        Arc::new(Mutex::new(self))
    }

    pub fn document(&self) -> &Arc<dyn DocumentRoot> {
        &self.document
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("tasks", &self.tasks.tasks().len())
            .field("settings", &self.settings)
            .field("session", &self.session)
            .field("locale", &self.locale)
            .finish()
    }
}
