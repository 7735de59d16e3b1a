//! Per-task bid queues ordered by ascending cost

use crate::market::types::{AgentId, Bid};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A bid tagged with the for-sale task it targets and its arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedBid {
    pub task_index: usize,
    pub bid: Bid,
    arrival: u64,
}

impl RankedBid {
    pub fn bidder(&self) -> AgentId {
        self.bid.bidder
    }

    pub fn cost(&self) -> f64 {
        self.bid.bundle.cost
    }

    pub fn arrival(&self) -> u64 {
        self.arrival
    }

    /// Total order used everywhere bids compete: cost, then bidder id, then
    /// arrival.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.cost()
            .total_cmp(&other.cost())
            .then_with(|| self.bidder().cmp(&other.bidder()))
            .then_with(|| self.arrival.cmp(&other.arrival))
    }
}

/// Bids for one task, cheapest first.
#[derive(Debug, Clone, Default)]
pub struct BidQueue {
    entries: Vec<RankedBid>,
}

impl BidQueue {
    fn insert(&mut self, entry: RankedBid) {
        let at = self
            .entries
            .partition_point(|e| e.rank_cmp(&entry) != Ordering::Greater);
        self.entries.insert(at, entry);
    }

    pub fn best(&self) -> Option<&RankedBid> {
        self.entries.first()
    }

    pub fn runner_up(&self) -> Option<&RankedBid> {
        self.entries.get(1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RankedBid> {
        self.entries.iter()
    }

    /// Second-best minus best cost; a lone bid has infinite regret.
    pub fn regret(&self) -> Option<f64> {
        let best = self.best()?;
        Some(match self.runner_up() {
            Some(second) => second.cost() - best.cost(),
            None => f64::INFINITY,
        })
    }
}

/// Verified single-task bids grouped by for-sale index.
#[derive(Debug, Clone, Default)]
pub struct BidRanking {
    queues: BTreeMap<usize, BidQueue>,
    arrivals: u64,
}

impl BidRanking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task_index: usize, bid: Bid) {
        let entry = RankedBid {
            task_index,
            bid,
            arrival: self.arrivals,
        };
        self.arrivals += 1;
        self.queues.entry(task_index).or_default().insert(entry);
    }

    pub fn queue(&self, task_index: usize) -> Option<&BidQueue> {
        self.queues.get(&task_index)
    }

    /// Non-empty queues in for-sale order.
    pub fn queues(&self) -> impl Iterator<Item = (usize, &BidQueue)> {
        self.queues.iter().map(|(idx, q)| (*idx, q)).filter(|(_, q)| !q.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.queues.values().all(BidQueue::is_empty)
    }

    pub fn bid_count(&self) -> usize {
        self.queues.values().map(BidQueue::len).sum()
    }

    pub fn remove_task(&mut self, task_index: usize) -> Option<BidQueue> {
        self.queues.remove(&task_index)
    }

    /// Drops every remaining bid placed by `bidder`.
    pub fn remove_bidder(&mut self, bidder: AgentId) {
        for queue in self.queues.values_mut() {
            queue.entries.retain(|e| e.bidder() != bidder);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::types::{Bundle, Task};

    fn bid(agent: u32, cost: f64) -> Bid {
        Bid::new(AgentId(agent), Bundle::new(vec![Task::new(0.0, 0.0)], cost))
    }

    #[test]
    fn test_queue_orders_by_cost_then_bidder() {
        let mut ranking = BidRanking::new();
        ranking.insert(0, bid(3, 10.0));
        ranking.insert(0, bid(2, 4.0));
        ranking.insert(0, bid(1, 10.0));

        let queue = ranking.queue(0).unwrap();
        let order: Vec<u32> = queue.iter().map(|e| e.bidder().0).collect();
        assert_eq!(order, vec![2, 1, 3]);
        assert_eq!(queue.regret(), Some(6.0));
    }

    #[test]
    fn test_equal_bids_keep_arrival_order() {
        let mut ranking = BidRanking::new();
        ranking.insert(0, bid(1, 2.0));
        ranking.insert(0, bid(1, 2.0));
        let queue = ranking.queue(0).unwrap();
        assert!(queue.best().unwrap().arrival() < queue.runner_up().unwrap().arrival());
    }

    #[test]
    fn test_single_bid_has_infinite_regret() {
        let mut ranking = BidRanking::new();
        ranking.insert(4, bid(1, 5.0));
        assert_eq!(ranking.queue(4).unwrap().regret(), Some(f64::INFINITY));
    }

    #[test]
    fn test_remove_bidder_empties_queues() {
        let mut ranking = BidRanking::new();
        ranking.insert(0, bid(1, 1.0));
        ranking.insert(1, bid(1, 2.0));
        ranking.insert(1, bid(2, 3.0));
        ranking.remove_bidder(AgentId(1));
        assert_eq!(ranking.queues().count(), 1);
        assert_eq!(ranking.bid_count(), 1);
    }
}
