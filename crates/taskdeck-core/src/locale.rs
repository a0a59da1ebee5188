use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{
  debug,
  error,
  info,
  instrument
};

use crate::document::{
  DocumentRoot,
  LANG_ATTRIBUTE
};
use crate::storage::{
  KeyValueStorage,
  LOCALE_STORAGE_KEY
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum SupportedLocale {
  En,
  ZhCn
}

pub const SUPPORTED_LOCALES:
  [SupportedLocale; 2] = [
  SupportedLocale::En,
  SupportedLocale::ZhCn
];

/// Used when no stored or system
/// locale applies.
pub const DEFAULT_LOCALE:
  SupportedLocale =
  SupportedLocale::ZhCn;

impl SupportedLocale {
  pub fn code(self) -> &'static str {
    match self {
      | Self::En => "en",
      | Self::ZhCn => "zh-CN"
    }
  }
}

impl fmt::Display for SupportedLocale {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.code())
  }
}

impl FromStr for SupportedLocale {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    SUPPORTED_LOCALES
      .into_iter()
      .find(|locale| locale.code() == s)
      .ok_or_else(|| {
        anyhow!(
          "unsupported locale: {s} \
           (expected en or zh-CN)"
        )
      })
  }
}

fn parse_locale(
  raw: &str
) -> Option<SupportedLocale> {
  raw.parse().ok()
}

/// Active UI locale, persisted under
/// `locale` and mirrored to the
/// document's `lang` attribute on
/// change.
pub struct LocaleStore {
  storage:  Arc<dyn KeyValueStorage>,
  document: Arc<dyn DocumentRoot>,
  locale:   SupportedLocale
}

impl fmt::Debug for LocaleStore {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.debug_struct("LocaleStore")
      .field("locale", &self.locale)
      .finish()
  }
}

impl LocaleStore {
  /// Stored locale first, then the
  /// system locale, then
  /// `DEFAULT_LOCALE`; unsupported codes
  /// are skipped.
  #[instrument(skip(storage, document))]
  pub fn new(
    storage: Arc<dyn KeyValueStorage>,
    document: Arc<dyn DocumentRoot>,
    system_locale: Option<&str>
  ) -> Self {
    let stored = match storage
      .get_item(LOCALE_STORAGE_KEY)
    {
      | Ok(stored) => stored,
      | Err(err) => {
        error!(
          error = %err,
          "failed reading stored locale"
        );
        None
      }
    };

    let locale = stored
      .as_deref()
      .and_then(parse_locale)
      .or_else(|| {
        system_locale
          .and_then(parse_locale)
      })
      .unwrap_or(DEFAULT_LOCALE);
    debug!(
      %locale,
      stored = ?stored,
      "locale resolved"
    );

    Self {
      storage,
      document,
      locale
    }
  }

  pub fn locale(&self) -> SupportedLocale {
    self.locale
  }

  #[instrument(skip(self))]
  pub fn set_locale(
    &mut self,
    locale: SupportedLocale
  ) {
    self.locale = locale;
    if let Err(err) = self
      .storage
      .set_item(
        LOCALE_STORAGE_KEY,
        locale.code()
      )
    {
      error!(
        error = %err,
        "failed persisting locale"
      );
    }
    self.document.set_attribute(
      LANG_ATTRIBUTE,
      locale.code()
    );
    info!(%locale, "locale changed");
  }
}
