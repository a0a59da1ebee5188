use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

pub type SchemeListener =
  Arc<dyn Fn(bool) + Send + Sync>;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
)]
pub struct ListenerId(u64);

impl ListenerId {
  /// For host-side `ColorSchemeQuery`
  /// implementations that mint their
  /// own ids.
  pub fn from_raw(raw: u64) -> Self {
    Self(raw)
  }
}

/// The host's `prefers-color-scheme:
/// dark` media query.
pub trait ColorSchemeQuery:
  Send + Sync
{
  fn prefers_dark(&self) -> bool;

  fn add_listener(
    &self,
    listener: SchemeListener
  ) -> ListenerId;

  fn remove_listener(
    &self,
    id: ListenerId
  ) -> bool;
}

struct MediaQueryState {
  matches:   bool,
  next_id:   u64,
  listeners: Vec<(ListenerId, SchemeListener)>
}

/// In-process media query driven by
/// the host (or a test) through
/// `set_prefers_dark`.
pub struct MediaQuery {
  state: Mutex<MediaQueryState>
}

impl fmt::Debug for MediaQuery {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("MediaQuery")
      .field("matches", &state.matches)
      .field(
        "listeners",
        &state.listeners.len()
      )
      .finish()
  }
}

impl MediaQuery {
  pub fn new(prefers_dark: bool) -> Self {
    Self {
      state: Mutex::new(
        MediaQueryState {
          matches:   prefers_dark,
          next_id:   1,
          listeners: vec![]
        }
      )
    }
  }

  /// Updates the preference and, only
  /// when it changed, notifies every
  /// listener with the new value.
  ///
  /// Listeners run after the internal
  /// lock is released, so they may call
  /// back into this query.
  pub fn set_prefers_dark(
    &self,
    prefers_dark: bool
  ) -> usize {
    let listeners = {
      let mut state = self.state.lock();
      if state.matches == prefers_dark {
        return 0;
      }
      state.matches = prefers_dark;
      state
        .listeners
        .iter()
        .map(|(_, l)| Arc::clone(l))
        .collect::<Vec<_>>()
    };

    debug!(
      prefers_dark,
      listeners = listeners.len(),
      "system color scheme changed"
    );
    for listener in &listeners {
      listener(prefers_dark);
    }
    listeners.len()
  }

  pub fn listener_count(
    &self
  ) -> usize {
    self.state.lock().listeners.len()
  }
}

impl ColorSchemeQuery for MediaQuery {
  fn prefers_dark(&self) -> bool {
    self.state.lock().matches
  }

  fn add_listener(
    &self,
    listener: SchemeListener
  ) -> ListenerId {
    let mut state = self.state.lock();
    let id = ListenerId(state.next_id);
    state.next_id += 1;
    state.listeners.push((id, listener));
    id
  }

  fn remove_listener(
    &self,
    id: ListenerId
  ) -> bool {
    let mut state = self.state.lock();
    let before = state.listeners.len();
    state
      .listeners
      .retain(|(lid, _)| *lid != id);
    before != state.listeners.len()
  }
}

/// Removes its listener when dropped.
pub struct Subscription {
  query: Arc<dyn ColorSchemeQuery>,
  id:    ListenerId
}

impl Subscription {
  pub fn new(
    query: Arc<dyn ColorSchemeQuery>,
    listener: SchemeListener
  ) -> Self {
    let id = query.add_listener(listener);
    Self { query, id }
  }

  pub fn id(&self) -> ListenerId {
    self.id
  }
}

impl fmt::Debug for Subscription {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.debug_struct("Subscription")
      .field("id", &self.id)
      .finish()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    let removed =
      self.query.remove_listener(self.id);
    debug!(
      id = self.id.0,
      removed,
      "color scheme listener removed"
    );
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::sync::atomic::{
    AtomicUsize,
    Ordering
  };

  use super::{
    ColorSchemeQuery,
    MediaQuery,
    Subscription
  };

  #[test]
  fn notifies_only_on_change_and_unsubscribes_on_drop()
   {
    let query =
      Arc::new(MediaQuery::new(false));
    let hits =
      Arc::new(AtomicUsize::new(0));

    let sub = {
      let hits = Arc::clone(&hits);
      Subscription::new(
        query.clone(),
        Arc::new(move |_: bool| {
          hits.fetch_add(
            1,
            Ordering::SeqCst
          );
        })
      )
    };

    assert_eq!(
      query.set_prefers_dark(true),
      1
    );
    assert_eq!(
      query.set_prefers_dark(true),
      0
    );
    assert_eq!(
      hits.load(Ordering::SeqCst),
      1
    );
    assert!(query.prefers_dark());

    drop(sub);
    assert_eq!(query.listener_count(), 0);
    query.set_prefers_dark(false);
    assert_eq!(
      hits.load(Ordering::SeqCst),
      1
    );
  }
}
