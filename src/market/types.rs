//! Core value types shared by sellers and buyers

use crate::error::Error;
use crate::market::geometry::PositionMatcher;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "robot{}", self.0)
    }
}

/// Planar position in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A location a robot has to visit.
///
/// Tasks carry no id; two tasks are the same task when a
/// [`PositionMatcher`] says their targets are close enough.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub target: Point2D,
}

impl Task {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            target: Point2D::new(x, y),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", self.target.x, self.target.y)
    }
}

impl From<Point2D> for Task {
    fn from(target: Point2D) -> Self {
        Self { target }
    }
}

/// Ordered tasks plus the bidder's valuation of visiting them in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Bundle {
    pub tasks: Vec<Task>,
    pub cost: f64,
}

impl Bundle {
    pub fn new(tasks: Vec<Task>, cost: f64) -> Self {
        Self { tasks, cost }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}:", self.cost)?;
        for task in &self.tasks {
            write!(f, " {}", task)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub bidder: AgentId,
    pub bundle: Bundle,
}

impl Bid {
    pub fn new(bidder: AgentId, bundle: Bundle) -> Self {
        Self { bidder, bundle }
    }

    pub fn cost(&self) -> f64 {
        self.bundle.cost
    }
}

fn normalize_variant(s: &str) -> String {
    s.trim().to_ascii_uppercase().replace('-', "_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WinnerDetermination {
    #[default]
    MinCost,
    RegretClearing,
}

impl FromStr for WinnerDetermination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_variant(s).as_str() {
            "MIN_COST" => Ok(Self::MinCost),
            "REGRET_CLEARING" => Ok(Self::RegretClearing),
            _ => Err(Error::Configuration(format!("unknown winner determination '{}'", s))),
        }
    }
}

impl fmt::Display for WinnerDetermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinCost => write!(f, "MIN_COST"),
            Self::RegretClearing => write!(f, "REGRET_CLEARING"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DynamicAllocation {
    #[default]
    Ssi,
    Replan,
    Resell,
}

impl FromStr for DynamicAllocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_variant(s).as_str() {
            "SSI" => Ok(Self::Ssi),
            "REPLAN" => Ok(Self::Replan),
            "RESELL" => Ok(Self::Resell),
            _ => Err(Error::Configuration(format!("unknown dynamic allocation '{}'", s))),
        }
    }
}

impl fmt::Display for DynamicAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ssi => write!(f, "SSI"),
            Self::Replan => write!(f, "REPLAN"),
            Self::Resell => write!(f, "RESELL"),
        }
    }
}

/// How many awards a single auction may hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AwardPolicy {
    /// One winning bundle per auction; unsold tasks wait for the next auction.
    SingleBest,
    /// Every task may be awarded in the same auction, at most one award per bidder.
    #[default]
    PerTask,
}

/// Strategy pair fixed for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct RoundSetting {
    pub winner_determination: WinnerDetermination,
    pub dynamic_allocation: DynamicAllocation,
}

impl fmt::Display for RoundSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.winner_determination, self.dynamic_allocation)
    }
}

/// Draws `n` tasks from `pool`.
///
/// With a matcher, positional duplicates are skipped and the draw stops early
/// when the pool runs out of distinct tasks. Without one, tasks are sampled
/// with replacement.
pub fn draw_tasks<R: Rng + ?Sized>(
    pool: &[Task],
    n: usize,
    matcher: Option<&PositionMatcher>,
    rng: &mut R,
) -> Vec<Task> {
    if pool.is_empty() {
        return Vec::new();
    }

    let Some(matcher) = matcher else {
        return (0..n).map(|_| pool[rng.random_range(0..pool.len())]).collect();
    };

    let mut order: Vec<usize> = (0..pool.len()).collect();
    order.shuffle(rng);

    let mut drawn: Vec<Task> = Vec::with_capacity(n.min(pool.len()));
    for idx in order {
        if drawn.len() == n {
            break;
        }
        let candidate = pool[idx];
        if !matcher.contains(&drawn, &candidate) {
            drawn.push(candidate);
        }
    }
    drawn
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_strategy_names_parse_case_insensitively() {
        assert_eq!("min_cost".parse::<WinnerDetermination>().unwrap(), WinnerDetermination::MinCost);
        assert_eq!(
            "REGRET_CLEARING".parse::<WinnerDetermination>().unwrap(),
            WinnerDetermination::RegretClearing
        );
        assert_eq!("replan".parse::<DynamicAllocation>().unwrap(), DynamicAllocation::Replan);
        assert!("cheapest".parse::<WinnerDetermination>().is_err());
    }

    #[test]
    fn test_bundle_display() {
        let bundle = Bundle::new(vec![Task::new(1.0, 2.0), Task::new(-3.5, 0.0)], 4.25);
        assert_eq!(bundle.to_string(), "4.250: [1 2] [-3.5 0]");
    }

    #[test]
    fn test_draw_without_duplicates() {
        let matcher = PositionMatcher::new(0.01).unwrap();
        let pool = vec![Task::new(0.0, 0.0), Task::new(0.001, 0.0), Task::new(5.0, 5.0)];
        let mut rng = StdRng::seed_from_u64(7);

        let drawn = draw_tasks(&pool, 10, Some(&matcher), &mut rng);
        assert_eq!(drawn.len(), 2);
        assert!(!matcher.same_task(&drawn[0], &drawn[1]));
    }

    #[test]
    fn test_draw_with_duplicates() {
        let pool = vec![Task::new(1.0, 1.0)];
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(draw_tasks(&pool, 4, None, &mut rng).len(), 4);
        assert!(draw_tasks(&[], 4, None, &mut rng).is_empty());
    }
}
