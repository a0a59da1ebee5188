use taskdeck_shared::{
  Task,
  TaskFilter,
  TaskPriority,
  TaskStatus
};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pred {
  StatusEq(TaskStatus),
  PriorityEq(TaskPriority),
  /// Lowercased needle, matched
  /// against title or description.
  TextContains(String),
  /// Matches when any listed tag is
  /// present on the task.
  AnyTag(Vec<String>)
}

/// Conjunction of predicates compiled
/// from a `TaskFilter`.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct Filter {
  preds: Vec<Pred>
}

impl Filter {
  #[tracing::instrument(skip(criteria))]
  pub fn from_criteria(
    criteria: &TaskFilter
  ) -> Self {
    let mut preds = Vec::with_capacity(4);

    if let Some(status) = criteria.status
    {
      preds.push(Pred::StatusEq(status));
    }

    // Low is a real constraint; only an
    // absent priority means "any".
    if let Some(priority) =
      criteria.priority
    {
      preds
        .push(Pred::PriorityEq(priority));
    }

    if let Some(search) =
      criteria.search.as_deref()
      && !search.is_empty()
    {
      preds.push(Pred::TextContains(
        search.to_lowercase()
      ));
    }

    if let Some(tags) =
      criteria.tags.as_ref()
      && !tags.is_empty()
    {
      preds.push(Pred::AnyTag(
        tags.clone()
      ));
    }

    trace!(
      count = preds.len(),
      "compiled task filter"
    );
    Self { preds }
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    self
      .preds
      .iter()
      .all(|pred| eval_pred(pred, task))
  }

  pub fn is_empty(&self) -> bool {
    self.preds.is_empty()
  }

  pub fn preds(&self) -> &[Pred] {
    &self.preds
  }
}

fn eval_pred(
  pred: &Pred,
  task: &Task
) -> bool {
  match pred {
    | Pred::StatusEq(status) => {
      task.status == *status
    }
    | Pred::PriorityEq(priority) => {
      task.priority == *priority
    }
    | Pred::TextContains(needle) => {
      task
        .title
        .to_lowercase()
        .contains(needle.as_str())
        || task
          .description
          .as_deref()
          .is_some_and(|desc| {
            desc
              .to_lowercase()
              .contains(needle.as_str())
          })
    }
    | Pred::AnyTag(wanted) => {
      wanted.iter().any(|tag| {
        task.tags.iter().any(|t| t == tag)
      })
    }
  }
}
