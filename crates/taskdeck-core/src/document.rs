use std::collections::{
  BTreeMap,
  BTreeSet
};

use parking_lot::Mutex;
use tracing::trace;

pub const DARK_CLASS: &str = "dark";
pub const LANG_ATTRIBUTE: &str = "lang";

/// The root element of the host
/// document.
///
/// Both writers report whether state
/// actually changed; writing the value
/// already present is a no-op.
pub trait DocumentRoot: Send + Sync {
  fn toggle_class(
    &self,
    class: &str,
    force: bool
  ) -> bool;

  fn has_class(
    &self,
    class: &str
  ) -> bool;

  fn set_attribute(
    &self,
    name: &str,
    value: &str
  ) -> bool;

  fn attribute(
    &self,
    name: &str
  ) -> Option<String>;
}

#[derive(Debug, Default)]
struct DocumentState {
  classes:    BTreeSet<String>,
  attributes: BTreeMap<String, String>,
  mutations:  u64
}

#[derive(Debug, Default)]
pub struct MemoryDocument {
  state: Mutex<DocumentState>
}

impl MemoryDocument {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of writes that changed
  /// state.
  pub fn mutation_count(&self) -> u64 {
    self.state.lock().mutations
  }

  pub fn classes(
    &self
  ) -> Vec<String> {
    self
      .state
      .lock()
      .classes
      .iter()
      .cloned()
      .collect()
  }
}

impl DocumentRoot for MemoryDocument {
  fn toggle_class(
    &self,
    class: &str,
    force: bool
  ) -> bool {
    let mut state = self.state.lock();
    let changed = if force {
      state
        .classes
        .insert(class.to_string())
    } else {
      state.classes.remove(class)
    };
    if changed {
      state.mutations += 1;
    }
    trace!(
      class,
      force,
      changed,
      "toggled root class"
    );
    changed
  }

  fn has_class(
    &self,
    class: &str
  ) -> bool {
    self
      .state
      .lock()
      .classes
      .contains(class)
  }

  fn set_attribute(
    &self,
    name: &str,
    value: &str
  ) -> bool {
    let mut state = self.state.lock();
    if state
      .attributes
      .get(name)
      .is_some_and(|v| v == value)
    {
      return false;
    }
    state.attributes.insert(
      name.to_string(),
      value.to_string()
    );
    state.mutations += 1;
    trace!(
      name,
      value,
      "set root attribute"
    );
    true
  }

  fn attribute(
    &self,
    name: &str
  ) -> Option<String> {
    self
      .state
      .lock()
      .attributes
      .get(name)
      .cloned()
  }
}

#[cfg(test)]
mod tests {
  use super::{
    DocumentRoot,
    MemoryDocument
  };

  #[test]
  fn repeated_writes_do_not_count() {
    let doc = MemoryDocument::new();
    assert!(doc.toggle_class("dark", true));
    assert!(
      !doc.toggle_class("dark", true)
    );
    assert!(
      !doc.toggle_class("light", false)
    );
    assert!(doc.set_attribute("lang", "en"));
    assert!(
      !doc.set_attribute("lang", "en")
    );
    assert_eq!(doc.mutation_count(), 2);
    assert_eq!(
      doc.classes(),
      vec!["dark".to_string()]
    );
  }
}
