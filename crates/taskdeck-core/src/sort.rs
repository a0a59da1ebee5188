use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use taskdeck_shared::{SortField, SortOrder, Task, TaskSorting};

#[derive(Debug, Clone, PartialEq)]
enum SortKey<'a> {
    Int(i64),
    UInt(u64),
    Text(&'a str),
    Time(DateTime<Utc>),
    Tags(&'a [String]),
    /// Values with no natural order; every pair compares equal.
    Opaque,
}

fn sort_key(task: &Task, field: SortField) -> Option<SortKey<'_>> {
    let key = match field {
        SortField::Id => SortKey::UInt(task.id),
        SortField::Title => SortKey::Text(&task.title),
        SortField::Description => SortKey::Text(task.description.as_deref()?),
        SortField::Status => SortKey::Text(task.status.as_str()),
        SortField::Priority => SortKey::Int(i64::from(task.priority.as_u8())),
        SortField::DueDate => SortKey::Time(task.due_date?),
        SortField::CompletedAt => SortKey::Time(task.completed_at?),
        SortField::ParentTaskId => SortKey::UInt(task.parent_task_id?),
        SortField::Position => SortKey::Int(task.position),
        SortField::Tags => SortKey::Tags(&task.tags),
        SortField::Metadata => SortKey::Opaque,
    };
    Some(key)
}

fn compare_keys(a: &SortKey<'_>, b: &SortKey<'_>) -> Ordering {
    match (a, b) {
        (SortKey::Int(a), SortKey::Int(b)) => a.cmp(b),
        (SortKey::UInt(a), SortKey::UInt(b)) => a.cmp(b),
        (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
        (SortKey::Time(a), SortKey::Time(b)) => a.cmp(b),
        (SortKey::Tags(a), SortKey::Tags(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

/// Total order for the view: defined values by `sorting.order`, then every
/// task missing the field, regardless of direction.
pub fn compare_tasks(a: &Task, b: &Task, sorting: &TaskSorting) -> Ordering {
    match (sort_key(a, sorting.field), sort_key(b, sorting.field)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => {
            let ord = compare_keys(&x, &y);
            match sorting.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        }
    }
}

/// Stable: tasks with equal keys keep their input order.
pub fn sort_tasks(tasks: &mut [Task], sorting: &TaskSorting) {
    tasks.sort_by(|a, b| compare_tasks(a, b, sorting));
}
