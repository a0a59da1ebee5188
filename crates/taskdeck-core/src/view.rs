use taskdeck_shared::{Task, TaskFilter, TaskSorting};
use tracing::debug;

use crate::filter::Filter;
use crate::sort::sort_tasks;

/// Filters, then stably sorts, a copy of `tasks`. Never mutates its inputs.
#[tracing::instrument(skip_all, fields(input = tasks.len()))]
pub fn derive_view(tasks: &[Task], criteria: &TaskFilter, sorting: &TaskSorting) -> Vec<Task> {
    let filter = Filter::from_criteria(criteria);
    let mut out: Vec<Task> = tasks
        .iter()
        .filter(|task| filter.matches(task))
        .cloned()
        .collect();
    sort_tasks(&mut out, sorting);
    debug!(output = out.len(), field = ?sorting.field, order = ?sorting.order, "derived task view");
    out
}

#[cfg(test)]
mod tests {
    use taskdeck_shared::{SortField, SortOrder, TaskCreate, TaskFilter, TaskPriority, TaskSorting};

    use super::derive_view;

    #[test]
    fn filters_before_sorting() {
        let tasks: Vec<_> = [
            ("write docs", TaskPriority::Low, 3),
            ("write tests", TaskPriority::High, 1),
            ("ship", TaskPriority::High, 2),
            ("write release notes", TaskPriority::High, 0),
        ]
        .into_iter()
        .enumerate()
        .map(|(idx, (title, priority, position))| {
            let mut create = TaskCreate::new(title);
            create.priority = priority;
            create.position = position;
            create.into_task(idx as u64 + 1)
        })
        .collect();

        let view = derive_view(
            &tasks,
            &TaskFilter {
                priority: Some(TaskPriority::High),
                search: Some("WRITE".into()),
                ..TaskFilter::default()
            },
            &TaskSorting {
                field: SortField::Position,
                order: SortOrder::Asc,
            },
        );
        let ids: Vec<u64> = view.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![4, 2]);
        assert_eq!(tasks.len(), 4);
    }
}
