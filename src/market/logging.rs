use crate::market::types::{AgentId, Bundle, Task};
use crate::market::winner::Award;

#[macro_export]
macro_rules! market_info {
    ($($arg:tt)+) => {
        tracing::info!(target: "market", $($arg)+)
    }
}

#[macro_export]
macro_rules! market_debug {
    ($($arg:tt)+) => {
        tracing::debug!(target: "market", $($arg)+)
    }
}

pub fn task_list(tasks: &[Task]) -> String {
    tasks
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Log the awards made in one auction
pub fn log_awards(conversation_id: &str, awards: &[Award]) {
    if awards.is_empty() {
        market_info!("auction {} closed without awards", conversation_id);
        return;
    }
    market_info!("auction {} awarded {} task(s):", conversation_id, awards.len());
    for award in awards {
        market_info!(
            "  {} wins {} for {:.3} (bundle {})",
            award.bid.bidder,
            award.task,
            award.bid.bundle.cost,
            task_list(&award.bid.bundle.tasks)
        );
    }
}

/// Log what happened in a completed reallocation round
pub fn log_round_summary(round: usize, offered: usize, auctions: usize, unsold: &[Task]) {
    market_info!(
        "round {} done: {} task(s) offered over {} auction(s)",
        round,
        offered,
        auctions
    );
    if !unsold.is_empty() {
        tracing::warn!(target: "market", "round {} left {} task(s) unsold: {}", round, unsold.len(), task_list(unsold));
    }
}

/// Log the bundles collected at the end of a run
pub fn log_final_allocation(allocations: &[(AgentId, Bundle)], total_cost: f64, max_cost: f64) {
    market_info!("final allocation:");
    for (agent, bundle) in allocations {
        market_info!("  {} {:.3}: [{}]", agent, bundle.cost, task_list(&bundle.tasks));
    }
    market_info!("  total cost {:.3}, max cost {:.3}", total_cost, max_cost);
}
