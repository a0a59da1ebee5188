use std::fmt;
use std::sync::Arc;

use taskdeck_shared::ThemePreference;
use tracing::debug;

use crate::color_scheme::ColorSchemeQuery;
use crate::document::{
  DARK_CLASS,
  DocumentRoot
};

pub fn resolve_dark(
  theme: ThemePreference,
  prefers_dark: bool
) -> bool {
  match theme {
    | ThemePreference::Light => false,
    | ThemePreference::Dark => true,
    | ThemePreference::System => {
      prefers_dark
    }
  }
}

/// Applies a theme preference to the
/// document root as the `dark` class.
#[derive(Clone)]
pub struct ThemeResolver {
  document:     Arc<dyn DocumentRoot>,
  color_scheme: Arc<dyn ColorSchemeQuery>
}

impl fmt::Debug for ThemeResolver {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.debug_struct("ThemeResolver")
      .field(
        "dark",
        &self.document.has_class(DARK_CLASS)
      )
      .finish()
  }
}

impl ThemeResolver {
  pub fn new(
    document: Arc<dyn DocumentRoot>,
    color_scheme: Arc<dyn ColorSchemeQuery>
  ) -> Self {
    Self {
      document,
      color_scheme
    }
  }

  /// Resolves against the current
  /// system preference and returns
  /// whether the result is dark.
  pub fn apply(
    &self,
    theme: ThemePreference
  ) -> bool {
    self.apply_with(
      theme,
      self.color_scheme.prefers_dark()
    )
  }

  pub fn apply_with(
    &self,
    theme: ThemePreference,
    prefers_dark: bool
  ) -> bool {
    let dark =
      resolve_dark(theme, prefers_dark);
    let changed = self
      .document
      .toggle_class(DARK_CLASS, dark);
    debug!(
      ?theme,
      prefers_dark,
      dark,
      changed,
      "applied theme"
    );
    dark
  }

  pub fn is_dark(&self) -> bool {
    self.document.has_class(DARK_CLASS)
  }
}
