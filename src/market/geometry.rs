use crate::error::{Error, Result};
use crate::market::types::{Point2D, Task};

/// Positional equality with a fixed tolerance.
///
/// Two points match when both axes differ by strictly less than `epsilon`.
/// The relation is symmetric and reflexive but not transitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionMatcher {
    epsilon: f64,
}

impl PositionMatcher {
    pub fn new(epsilon: f64) -> Result<Self> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(Error::Configuration(format!(
                "close_enough must be a positive distance, got {}",
                epsilon
            )));
        }
        Ok(Self { epsilon })
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn close_enough(&self, a: &Point2D, b: &Point2D) -> bool {
        (a.x - b.x).abs() < self.epsilon && (a.y - b.y).abs() < self.epsilon
    }

    pub fn same_task(&self, a: &Task, b: &Task) -> bool {
        self.close_enough(&a.target, &b.target)
    }

    /// Index of the first task in `tasks` matching `needle`.
    pub fn position(&self, tasks: &[Task], needle: &Task) -> Option<usize> {
        tasks.iter().position(|t| self.same_task(t, needle))
    }

    pub fn contains(&self, tasks: &[Task], needle: &Task) -> bool {
        self.position(tasks, needle).is_some()
    }

    /// True when every task of `subset` has a match in `superset`.
    pub fn covers(&self, superset: &[Task], subset: &[Task]) -> bool {
        subset.iter().all(|t| self.contains(superset, t))
    }
}
