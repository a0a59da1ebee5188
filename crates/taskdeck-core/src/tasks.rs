use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use taskdeck_shared::{Task, TaskCreate, TaskFilter, TaskPatch, TaskSorting};
use tracing::{debug, instrument, warn};

use crate::view::derive_view;

/// One counter per view input; bumped whenever that input changes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Generations {
    tasks: u64,
    filter: u64,
    sorting: u64,
}

#[derive(Debug)]
struct CachedView {
    key: Generations,
    view: Arc<[Task]>,
}

#[derive(Debug, Default)]
struct ViewCache {
    entry: Option<CachedView>,
    recomputes: u64,
}

/// Canonical task collection plus its memoized filtered/sorted view.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    current: Option<Task>,
    filter: TaskFilter,
    sorting: TaskSorting,
    generations: Generations,
    // Highest id ever held this session; ids are never handed out twice.
    high_water: u64,
    cache: Mutex<ViewCache>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn current(&self) -> Option<&Task> {
        self.current.as_ref()
    }

    pub fn filter(&self) -> &TaskFilter {
        &self.filter
    }

    pub fn sorting(&self) -> &TaskSorting {
        &self.sorting
    }

    /// Highest id ever assigned or loaded.
    pub fn last_id(&self) -> u64 {
        self.tasks.iter().map(|t| t.id).max().unwrap_or(0).max(self.high_water)
    }

    /// Raises the id floor, e.g. from a persisted counter; never lowers it.
    pub fn reserve_ids_through(&mut self, id: u64) {
        self.high_water = self.high_water.max(id);
    }

    /// `None` once `u64::MAX` has been handed out.
    pub fn next_id(&self) -> Option<u64> {
        self.last_id().checked_add(1)
    }

    #[instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        let mut seen = BTreeSet::new();
        let duplicates = tasks.iter().filter(|t| !seen.insert(t.id)).count();
        if duplicates > 0 {
            warn!(duplicates, "replacement collection contains duplicate task ids");
        }

        if let Some(max) = tasks.iter().map(|t| t.id).max() {
            self.high_water = self.high_water.max(max);
        }
        self.tasks = tasks;
        self.touch_tasks();
    }

    /// Appends a task and returns its id. A supplied id is kept unless it
    /// is already taken, in which case a fresh one is assigned. Returns
    /// `None`, leaving the store untouched, when no fresh id is left.
    #[instrument(skip(self, create), fields(requested = ?create.id))]
    pub fn add(&mut self, create: TaskCreate) -> Option<u64> {
        let id = match create.id {
            Some(id) if self.get(id).is_none() => Some(id),
            Some(id) => {
                let fresh = self.next_id();
                warn!(requested = id, assigned = ?fresh, "task id already in use; assigning a new one");
                fresh
            }
            None => self.next_id(),
        };
        let Some(id) = id else {
            warn!("task id space exhausted");
            return None;
        };

        self.high_water = self.high_water.max(id);
        self.tasks.push(create.into_task(id));
        self.touch_tasks();
        debug!(id, "added task");
        Some(id)
    }

    /// Returns `false` (and changes nothing) when no task has `id`.
    #[instrument(skip(self, patch))]
    pub fn update(&mut self, id: u64, patch: TaskPatch) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(id, "update ignored; no such task");
            return false;
        };
        patch.apply_to(task);
        self.touch_tasks();
        true
    }

    #[instrument(skip(self))]
    pub fn delete(&mut self, id: u64) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        let removed = before != self.tasks.len();
        if removed {
            self.touch_tasks();
        } else {
            debug!(id, "delete ignored; no such task");
        }
        removed
    }

    pub fn set_current(&mut self, task: Option<Task>) {
        self.current = task;
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        if self.filter != filter {
            self.filter = filter;
            self.generations.filter += 1;
        }
    }

    pub fn set_sorting(&mut self, sorting: TaskSorting) {
        if self.sorting != sorting {
            self.sorting = sorting;
            self.generations.sorting += 1;
        }
    }

    /// The filtered, sorted view. Recomputed only when tasks, filter or
    /// sorting changed since the last call; otherwise the same `Arc` is
    /// returned.
    pub fn filtered_tasks(&self) -> Arc<[Task]> {
        let mut cache = self.cache.lock();
        if let Some(entry) = cache.entry.as_ref()
            && entry.key == self.generations
        {
            debug!(generations = ?self.generations, "task view cache hit");
            return Arc::clone(&entry.view);
        }

        let view: Arc<[Task]> = derive_view(&self.tasks, &self.filter, &self.sorting).into();
        cache.recomputes += 1;
        cache.entry = Some(CachedView {
            key: self.generations,
            view: Arc::clone(&view),
        });
        debug!(
            generations = ?self.generations,
            recomputes = cache.recomputes,
            "task view recomputed"
        );
        view
    }

    /// How many times the view has been derived; a probe for memoization.
    pub fn recompute_count(&self) -> u64 {
        self.cache.lock().recomputes
    }

    fn touch_tasks(&mut self) {
        self.generations.tasks += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use taskdeck_shared::{
        SortField, SortOrder, TaskCreate, TaskFilter, TaskPatch, TaskPriority, TaskSorting,
        TaskStatus,
    };

    use super::TaskStore;

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut store = TaskStore::new();
        assert_eq!(store.add(TaskCreate::new("a")), Some(1));
        assert_eq!(store.add(TaskCreate::new("b")), Some(2));
        assert!(store.delete(1));
        assert_eq!(store.add(TaskCreate::new("c")), Some(3));

        assert!(store.delete(3));
        assert_eq!(store.add(TaskCreate::new("d")), Some(4));
    }

    #[test]
    fn supplied_ids_are_kept_unless_taken() {
        let mut store = TaskStore::new();
        let mut create = TaskCreate::new("imported");
        create.id = Some(10);
        assert_eq!(store.add(create.clone()), Some(10));
        assert_eq!(store.add(create), Some(11));
        assert_eq!(store.add(TaskCreate::new("next")), Some(12));
    }

    #[test]
    fn update_and_delete_of_missing_ids_are_no_ops() {
        let mut store = TaskStore::new();
        store.add(TaskCreate::new("a"));
        let before = store.filtered_tasks();

        assert!(!store.update(
            42,
            TaskPatch {
                title: Some("nope".into()),
                ..TaskPatch::default()
            }
        ));
        assert!(!store.delete(42));
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].title, "a");
        assert!(Arc::ptr_eq(&before, &store.filtered_tasks()));
        assert_eq!(store.recompute_count(), 1);
    }

    #[test]
    fn update_merges_only_supplied_fields() {
        let mut store = TaskStore::new();
        let mut create = TaskCreate::new("draft");
        create.description = Some("keep me".into());
        create.tags = vec!["x".into()];
        let id = store.add(create).expect("id available");

        assert!(store.update(
            id,
            TaskPatch {
                status: Some(TaskStatus::InProgress),
                ..TaskPatch::default()
            }
        ));
        let task = store.get(id).expect("task exists");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.description.as_deref(), Some("keep me"));
        assert_eq!(task.tags, vec!["x".to_string()]);

        assert!(store.update(
            id,
            TaskPatch {
                description: Some(None),
                ..TaskPatch::default()
            }
        ));
        assert_eq!(store.get(id).expect("task exists").description, None);
    }

    #[test]
    fn view_is_memoized_until_an_input_changes() {
        let mut store = TaskStore::new();
        store.add(TaskCreate::new("a"));
        let mut high = TaskCreate::new("b");
        high.priority = TaskPriority::High;
        store.add(high);

        let first = store.filtered_tasks();
        let second = store.filtered_tasks();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.recompute_count(), 1);

        store.set_filter(TaskFilter {
            priority: Some(TaskPriority::High),
            ..TaskFilter::default()
        });
        let filtered = store.filtered_tasks();
        assert_eq!(filtered.len(), 1);
        assert_eq!(store.recompute_count(), 2);

        store.set_filter(store.filter().clone());
        store.filtered_tasks();
        assert_eq!(store.recompute_count(), 2);

        store.set_sorting(TaskSorting {
            field: SortField::Title,
            order: SortOrder::Desc,
        });
        store.filtered_tasks();
        assert_eq!(store.recompute_count(), 3);

        store.add(TaskCreate::new("c"));
        store.set_filter(TaskFilter::default());
        let all = store.filtered_tasks();
        let titles: Vec<&str> = all.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "b", "a"]);
        assert_eq!(store.recompute_count(), 4);
    }

    #[test]
    fn replace_all_raises_the_id_floor() {
        let mut store = TaskStore::new();
        let mut tasks = Vec::new();
        for id in [3_u64, 7] {
            tasks.push(TaskCreate::new(format!("t{id}")).into_task(id));
        }
        store.replace_all(tasks);
        assert_eq!(store.add(TaskCreate::new("n")), Some(8));

        store.replace_all(vec![]);
        assert_eq!(store.add(TaskCreate::new("m")), Some(9));
    }

    #[test]
    fn reserved_ids_are_skipped() {
        let mut store = TaskStore::new();
        store.reserve_ids_through(4);
        store.reserve_ids_through(2);
        assert_eq!(store.last_id(), 4);
        assert_eq!(store.add(TaskCreate::new("n")), Some(5));
        assert_eq!(store.last_id(), 5);
    }

    #[test]
    fn exhausted_id_space_is_refused_without_wrapping() {
        let mut store = TaskStore::new();
        let mut create = TaskCreate::new("last");
        create.id = Some(u64::MAX);
        assert_eq!(store.add(create.clone()), Some(u64::MAX));
        assert_eq!(store.next_id(), None);

        let before = store.filtered_tasks();
        assert_eq!(store.add(TaskCreate::new("next")), None);
        assert_eq!(store.add(create), None);
        assert_eq!(store.tasks().len(), 1);
        assert!(Arc::ptr_eq(&before, &store.filtered_tasks()));

        let mut reserved = TaskStore::new();
        reserved.reserve_ids_through(u64::MAX);
        assert_eq!(reserved.add(TaskCreate::new("n")), None);
        assert!(reserved.tasks().is_empty());
    }

    #[test]
    fn current_task_is_independent_of_the_collection() {
        let mut store = TaskStore::new();
        let id = store.add(TaskCreate::new("a")).expect("id available");
        let task = store.get(id).cloned();
        store.set_current(task);
        assert!(store.delete(id));
        assert_eq!(store.current().map(|t| t.id), Some(id));
        store.set_current(None);
        assert!(store.current().is_none());
    }
}
