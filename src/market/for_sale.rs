use crate::market::geometry::PositionMatcher;
use crate::market::types::{Bundle, Task};

/// Tasks a seller currently holds for auction.
///
/// Entries are unique under the list's [`PositionMatcher`]. The list is the
/// only authority on what may be awarded: every bid is checked against it
/// before ranking.
#[derive(Debug, Clone)]
pub struct ForSaleList {
    tasks: Vec<Task>,
    matcher: PositionMatcher,
}

impl ForSaleList {
    pub fn new(matcher: PositionMatcher) -> Self {
        Self {
            tasks: Vec::new(),
            matcher,
        }
    }

    pub fn with_tasks(matcher: PositionMatcher, tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut list = Self::new(matcher);
        list.extend(tasks);
        list
    }

    pub fn matcher(&self) -> &PositionMatcher {
        &self.matcher
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Appends `task` unless an equal task is already for sale.
    pub fn push(&mut self, task: Task) -> bool {
        if self.matcher.contains(&self.tasks, &task) {
            return false;
        }
        self.tasks.push(task);
        true
    }

    /// Appends every new task, returning how many were added.
    pub fn extend(&mut self, tasks: impl IntoIterator<Item = Task>) -> usize {
        tasks.into_iter().filter(|t| self.push(*t)).count()
    }

    pub fn index_of(&self, task: &Task) -> Option<usize> {
        self.matcher.position(&self.tasks, task)
    }

    /// Indices of the for-sale tasks contained in `bundle`, in bundle order.
    ///
    /// Tasks of the bundle that are not for sale (typically the bidder's own
    /// committed tasks) are ignored; a for-sale task listed twice counts once.
    pub fn matching_indices(&self, bundle: &Bundle) -> Vec<usize> {
        let mut indices = Vec::new();
        for task in &bundle.tasks {
            if let Some(idx) = self.index_of(task)
                && !indices.contains(&idx)
            {
                indices.push(idx);
            }
        }
        indices
    }

    pub fn remove(&mut self, task: &Task) -> Option<Task> {
        let idx = self.index_of(task)?;
        Some(self.tasks.remove(idx))
    }

    /// Removes awarded tasks one by one, stopping at the first task that is no
    /// longer for sale. Returns the number removed.
    pub fn remove_awarded<'a>(&mut self, awarded: impl IntoIterator<Item = &'a Task>) -> usize {
        let mut removed = 0;
        for task in awarded {
            if self.remove(task).is_none() {
                tracing::debug!("task {} already gone from for-sale list, stopping removal", task);
                break;
            }
            removed += 1;
        }
        removed
    }

    pub fn drain(&mut self) -> Vec<Task> {
        std::mem::take(&mut self.tasks)
    }
}
