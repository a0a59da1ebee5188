use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use taskdeck_shared::{
  NotificationPatch,
  Settings,
  SettingsPatch,
  ThemePreference
};
use tracing::{
  debug,
  error,
  info,
  instrument,
  warn
};

use crate::color_scheme::{
  ColorSchemeQuery,
  Subscription
};
use crate::document::DocumentRoot;
use crate::storage::{
  KeyValueStorage,
  SETTINGS_STORAGE_KEY
};
use crate::theme::ThemeResolver;

/// Reads the persisted settings record.
///
/// Absent, unreadable or malformed
/// records yield the defaults; fields
/// missing from a readable record are
/// filled from the defaults.
#[instrument(skip(storage))]
pub fn load_settings(
  storage: &dyn KeyValueStorage
) -> Settings {
  let stored = match storage
    .get_item(SETTINGS_STORAGE_KEY)
  {
    | Ok(stored) => stored,
    | Err(err) => {
      warn!(
        error = %err,
        "failed reading settings from \
         storage; using defaults"
      );
      None
    }
  };

  let Some(raw) = stored else {
    debug!(
      "no stored settings; using \
       defaults"
    );
    return Settings::default();
  };

  match serde_json::from_str::<Settings>(
    &raw
  ) {
    | Ok(settings) => settings,
    | Err(err) => {
      error!(
        error = %err,
        "failed parsing stored \
         settings; using defaults"
      );
      Settings::default()
    }
  }
}

struct SettingsInner {
  settings: Settings,
  storage:  Arc<dyn KeyValueStorage>,
  resolver: ThemeResolver
}

impl fmt::Debug for SettingsInner {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.debug_struct("SettingsInner")
      .field("settings", &self.settings)
      .field("resolver", &self.resolver)
      .finish_non_exhaustive()
  }
}

impl SettingsInner {
  /// Writes the full record. Failures
  /// are logged and swallowed.
  fn persist(&self) -> bool {
    let json = match serde_json::to_string(
      &self.settings
    ) {
      | Ok(json) => json,
      | Err(err) => {
        error!(
          error = %err,
          "failed serializing settings"
        );
        return false;
      }
    };

    match self
      .storage
      .set_item(SETTINGS_STORAGE_KEY, &json)
    {
      | Ok(()) => {
        debug!("persisted settings");
        true
      }
      | Err(err) => {
        error!(
          error = %err,
          "failed persisting settings"
        );
        false
      }
    }
  }

  fn apply_theme(
    &self,
    theme_override: Option<ThemePreference>
  ) -> bool {
    self.resolver.apply(
      theme_override
        .unwrap_or(self.settings.theme)
    )
  }

  fn commit(&self) {
    self.persist();
    self.apply_theme(None);
  }

  /// Re-reads the query instead of
  /// trusting the notified value, which
  /// may already be stale.
  fn on_system_change(&self) {
    if self.settings.theme
      != ThemePreference::System
    {
      debug!(
        theme = ?self.settings.theme,
        "explicit theme; ignoring system \
         color scheme change"
      );
      return;
    }
    self
      .resolver
      .apply(ThemePreference::System);
  }
}

/// Owns the settings record. Every
/// mutation persists the full record
/// before returning, then re-resolves
/// the theme.
///
/// Listens to system color scheme
/// changes for as long as it lives.
#[derive(Debug)]
pub struct SettingsStore {
  inner:         Arc<Mutex<SettingsInner>>,
  _subscription: Subscription
}

impl SettingsStore {
  #[instrument(skip_all)]
  pub fn new(
    storage: Arc<dyn KeyValueStorage>,
    document: Arc<dyn DocumentRoot>,
    color_scheme: Arc<dyn ColorSchemeQuery>
  ) -> Self {
    let settings =
      load_settings(storage.as_ref());
    let resolver = ThemeResolver::new(
      document,
      Arc::clone(&color_scheme)
    );
    let inner =
      Arc::new(Mutex::new(SettingsInner {
        settings,
        storage,
        resolver
      }));

    let dark = inner.lock().apply_theme(None);
    info!(
      dark,
      "settings store initialized"
    );

    let weak = Arc::downgrade(&inner);
    let subscription = Subscription::new(
      color_scheme,
      Arc::new(move |_: bool| {
        if let Some(inner) = weak.upgrade()
        {
          inner.lock().on_system_change();
        }
      })
    );

    Self {
      inner,
      _subscription: subscription
    }
  }

  pub fn settings(&self) -> Settings {
    self.inner.lock().settings.clone()
  }

  pub fn theme(&self) -> ThemePreference {
    self.inner.lock().settings.theme
  }

  pub fn is_dark(&self) -> bool {
    self.inner.lock().resolver.is_dark()
  }

  #[instrument(skip(self))]
  pub fn update(
    &self,
    patch: SettingsPatch
  ) {
    let mut inner = self.inner.lock();
    patch.apply_to(&mut inner.settings);
    inner.commit();
  }

  #[instrument(skip(self))]
  pub fn update_notifications(
    &self,
    patch: NotificationPatch
  ) {
    let mut inner = self.inner.lock();
    patch.apply_to(
      &mut inner.settings.notifications
    );
    inner.commit();
  }

  #[instrument(skip(self))]
  pub fn reset(&self) {
    let mut inner = self.inner.lock();
    inner.settings = Settings::default();
    inner.commit();
    info!("settings reset to defaults");
  }

  /// Applies `theme_override`, or the
  /// stored theme when `None`, and
  /// returns whether the result is dark.
  #[instrument(skip(self))]
  pub fn apply_theme(
    &self,
    theme_override: Option<ThemePreference>
  ) -> bool {
    self
      .inner
      .lock()
      .apply_theme(theme_override)
  }
}
