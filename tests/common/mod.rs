#![allow(dead_code)]

use std::time::Duration;
use taskmarket::*;
use tokio::task::JoinHandle;

/// Prices a candidate by inserting it at the cheapest position of the
/// committed path, costing the straight-line tour from the start.
pub struct StraightLineOracle;

pub fn path_cost(start: Point2D, tasks: &[Task]) -> f64 {
    let mut cost = 0.0;
    let mut at = start;
    for task in tasks {
        cost += at.distance(&task.target);
        at = task.target;
    }
    cost
}

fn best_insertion(start: Point2D, committed: &[Task], candidate: Task) -> Bundle {
    (0..=committed.len())
        .map(|pos| {
            let mut tasks = committed.to_vec();
            tasks.insert(pos, candidate);
            let cost = path_cost(start, &tasks);
            Bundle::new(tasks, cost)
        })
        .min_by(|a, b| a.cost.total_cmp(&b.cost))
        .unwrap_or_default()
}

impl CostOracle for StraightLineOracle {
    async fn quote(&self, request: &QuoteRequest) -> std::result::Result<Vec<Bundle>, OracleError> {
        let mut bundles: Vec<Bundle> = request
            .candidates
            .iter()
            .map(|c| best_insertion(request.start, &request.committed, *c))
            .collect();
        bundles.sort_by(|a, b| a.cost.total_cmp(&b.cost));
        bundles.truncate(request.max_bundles);
        Ok(bundles)
    }
}

/// Always fails, so its bidder refuses every call.
pub struct OfflineOracle;

impl CostOracle for OfflineOracle {
    async fn quote(&self, _request: &QuoteRequest) -> std::result::Result<Vec<Bundle>, OracleError> {
        Err(OracleError::Busy)
    }
}

pub fn test_config() -> MarketConfig {
    MarketConfig {
        tasks_per_round: 2,
        response_timeout_ms: 1000,
        trigger_period_ms: 10,
        clear_timeout_ms: 1000,
        oracle_max_retries: 1,
        oracle_backoff_ms: 5,
        ..MarketConfig::default()
    }
}

pub fn spawn_bidder<O: CostOracle>(
    network: &LocalNetwork,
    id: u32,
    location: Point2D,
    oracle: O,
    config: &MarketConfig,
) -> JoinHandle<Bidder<O>> {
    let (writer, reader) = network.join(AgentId(id), &[TASK_BUYING]);
    let bidder = Bidder::new(AgentId(id), location, oracle, config).unwrap();
    tokio::spawn(bidder.run(writer, reader))
}

pub fn backlog() -> Vec<Task> {
    vec![
        Task::new(1.0, 0.0),
        Task::new(2.0, 1.0),
        Task::new(9.0, 0.0),
        Task::new(8.0, -1.0),
        Task::new(5.0, 5.0),
    ]
}

/// Asserts every task of `expected` was allocated to exactly one robot.
pub fn assert_allocated_once(summary: &RunSummary, expected: &[Task], matcher: &PositionMatcher) {
    let allocated: Vec<Task> = summary
        .allocations
        .iter()
        .flat_map(|a| a.bundle.tasks.iter().copied())
        .collect();
    assert_eq!(allocated.len(), expected.len(), "allocated {:?}", allocated);
    for task in expected {
        let holders = allocated.iter().filter(|t| matcher.same_task(t, task)).count();
        assert_eq!(holders, 1, "task {} held {} times", task, holders);
    }
}

pub const WAIT: Duration = Duration::from_secs(30);
