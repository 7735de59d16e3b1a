//! Winner determination
//!
//! Bids are verified against the seller's [`ForSaleList`], ranked per task and
//! cleared with one of the [`WinnerDetermination`] strategies. Only single-task
//! bids are supported: a bundle must contain exactly one task that is for sale
//! (it may also contain tasks the bidder already holds).

use crate::market::for_sale::ForSaleList;
use crate::market::ranking::{BidQueue, BidRanking, RankedBid};
use crate::market::types::{AgentId, AwardPolicy, Bid, Bundle, Task, WinnerDetermination};
use std::collections::BTreeMap;
use tracing::{error, warn};

/// One awarded for-sale task and the bid that won it.
#[derive(Debug, Clone, PartialEq)]
pub struct Award {
    pub task: Task,
    pub bid: Bid,
}

/// Groups valid bids per for-sale task, discarding invalid and bundle bids.
pub fn rank_bids(for_sale: &ForSaleList, responses: &[(AgentId, Vec<Bundle>)]) -> BidRanking {
    let mut ranking = BidRanking::new();
    for (bidder, bundles) in responses {
        for bundle in bundles {
            let matched = for_sale.matching_indices(bundle);
            match matched.as_slice() {
                [] => warn!(
                    "invalid bid from {}: no task of bundle ({}) is for sale",
                    bidder, bundle
                ),
                [idx] => ranking.insert(*idx, Bid::new(*bidder, bundle.clone())),
                _ => error!(
                    "bundle bid from {} covers {} for-sale tasks, bundle bids are not supported",
                    bidder,
                    matched.len()
                ),
            }
        }
    }
    ranking
}

/// Cheapest best bid over all tasks; equal costs go to the lower for-sale
/// index, then to the usual bid order.
fn pick_min_cost(ranking: &BidRanking) -> Option<&RankedBid> {
    ranking.queues().filter_map(|(_, q)| q.best()).min_by(|a, b| {
        a.cost()
            .total_cmp(&b.cost())
            .then_with(|| a.task_index.cmp(&b.task_index))
            .then_with(|| a.rank_cmp(b))
    })
}

fn pick_max_regret(ranking: &BidRanking) -> Option<&RankedBid> {
    let mut incumbent: Option<(f64, &BidQueue)> = None;
    for (idx, queue) in ranking.queues() {
        let Some(regret) = queue.regret() else { continue };
        tracing::trace!("regret of task #{} is {}", idx, regret);
        // strict comparison keeps the earlier task on ties
        if incumbent.is_none_or(|(best, _)| regret > best) {
            incumbent = Some((regret, queue));
        }
    }
    incumbent.and_then(|(_, q)| q.best())
}

/// Selects awards from a ranking.
///
/// Under [`AwardPolicy::PerTask`] clearing repeats until no bids remain, each
/// bidder winning at most one task. Under [`AwardPolicy::SingleBest`] only the
/// first selection is awarded.
pub fn select_awards(
    for_sale: &ForSaleList,
    mut ranking: BidRanking,
    strategy: WinnerDetermination,
    policy: AwardPolicy,
) -> Vec<Award> {
    let mut awards = Vec::new();
    loop {
        let pick = match strategy {
            WinnerDetermination::MinCost => pick_min_cost(&ranking),
            WinnerDetermination::RegretClearing => pick_max_regret(&ranking),
        };
        let Some(winner) = pick.cloned() else { break };
        let Some(task) = for_sale.tasks().get(winner.task_index).copied() else {
            break;
        };

        ranking.remove_task(winner.task_index);
        ranking.remove_bidder(winner.bidder());
        awards.push(Award { task, bid: winner.bid });

        if policy == AwardPolicy::SingleBest {
            break;
        }
    }
    awards
}

/// Verifies, ranks and clears `responses`, then removes the awarded tasks
/// from `for_sale`.
///
/// Returns the awards in selection order; an auction with no valid bids yields
/// an empty list.
pub fn determine_winners(
    for_sale: &mut ForSaleList,
    responses: &[(AgentId, Vec<Bundle>)],
    strategy: WinnerDetermination,
    policy: AwardPolicy,
) -> Vec<Award> {
    let ranking = rank_bids(for_sale, responses);
    if ranking.is_empty() {
        return Vec::new();
    }
    crate::market_debug!(
        "{} valid bid(s) over {} task(s), clearing with {}",
        ranking.bid_count(),
        ranking.queues().count(),
        strategy
    );

    let awards = select_awards(for_sale, ranking, strategy, policy);
    for_sale.remove_awarded(awards.iter().map(|a| &a.task));
    awards
}

/// Awards keyed by winner.
pub fn awards_by_winner(awards: &[Award]) -> BTreeMap<AgentId, Bundle> {
    awards
        .iter()
        .map(|a| (a.bid.bidder, a.bid.bundle.clone()))
        .collect()
}
