//! Dynamic reallocation controller
//!
//! Drives the seller through rounds. Each round puts part of the backlog up
//! for sale and lets the [`Auctioneer`] sell it.
//!
//! - SSI releases the backlog in fixed slices of `tasks_per_round`.
//! - REPLAN asks every buyer to drop its bundle before each later round, then
//!   re-offers the backlog truncated to `tasks_per_round * round`.
//! - RESELL is rejected.
//!
//! When the backlog is exhausted a final clear request collects every
//! buyer's bundle into a [`RunSummary`].

use crate::agent::auctioneer::{Auctioneer, SaleReport};
use crate::config::MarketConfig;
use crate::error::{Error, Result};
use crate::market::logging::{log_final_allocation, log_round_summary};
use crate::market::types::{AgentId, Bundle, DynamicAllocation, RoundSetting, Task};
use crate::protocol::transport::{AgentDirectory, AgentReader, AgentWriter};
use crate::protocol::types::{Message, TASK_BUYING, new_conversation_id};
use crate::protocol::wire;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Instrument, debug, info_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    PrepareRound,
    AwaitClear,
    RunAuction,
    CollectResults,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundReport {
    pub round: usize,
    pub offered: Vec<Task>,
    pub sale: SaleReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentAllocation {
    pub agent: AgentId,
    pub bundle: Bundle,
}

/// Result of a whole run, gathered by the final clear request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub setting: RoundSetting,
    pub rounds: Vec<RoundReport>,
    pub allocations: Vec<AgentAllocation>,
    pub unsold: Vec<Task>,
    pub missing_buyers: Vec<AgentId>,
    pub total_cost: f64,
    pub max_cost: f64,
    pub runtime_ms: f64,
}

impl RunSummary {
    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    pub fn allocated_tasks(&self) -> usize {
        self.allocations.iter().map(|a| a.bundle.len()).sum()
    }
}

/// Bundles returned for a clear request, plus buyers that never answered.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClearReplies {
    pub released: Vec<(AgentId, Bundle)>,
    pub missing: Vec<AgentId>,
}

pub struct Controller<D: AgentDirectory> {
    setting: RoundSetting,
    tasks_per_round: usize,
    clear_timeout: Duration,
    auctioneer: Auctioneer,
    writer: AgentWriter,
    reader: AgentReader,
    directory: D,
    backlog: Vec<Task>,
    round: usize,
    clears_sent: usize,
    state: ControllerState,
    rounds: Vec<RoundReport>,
}

impl<D: AgentDirectory> Controller<D> {
    pub fn new(
        config: &MarketConfig,
        writer: AgentWriter,
        reader: AgentReader,
        directory: D,
        backlog: Vec<Task>,
    ) -> Result<Self> {
        config.validate()?;
        if config.dynamic_allocation == DynamicAllocation::Resell {
            return Err(Error::Unsupported(
                "RESELL dynamic allocation is not implemented".into(),
            ));
        }
        Ok(Self {
            setting: config.setting(),
            tasks_per_round: config.tasks_per_round,
            clear_timeout: config.clear_timeout(),
            auctioneer: Auctioneer::new(writer.agent_id(), config)?,
            writer,
            reader,
            directory,
            backlog,
            round: 0,
            clears_sent: 0,
            state: ControllerState::PrepareRound,
            rounds: Vec::new(),
        })
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn round(&self) -> usize {
        self.round
    }

    pub fn backlog(&self) -> &[Task] {
        &self.backlog
    }

    /// Tasks to put up for sale in the current round.
    ///
    /// SSI consumes a slice of the backlog. REPLAN only consumes the backlog
    /// once the exposure limit reaches its size.
    pub fn next_offer(&mut self) -> Vec<Task> {
        match self.setting.dynamic_allocation {
            DynamicAllocation::Ssi => {
                let take = self.tasks_per_round.min(self.backlog.len());
                self.backlog.drain(..take).collect()
            }
            DynamicAllocation::Replan | DynamicAllocation::Resell => {
                let limit = self.tasks_per_round.saturating_mul(self.round);
                if limit >= self.backlog.len() {
                    std::mem::take(&mut self.backlog)
                } else {
                    self.backlog[..limit].to_vec()
                }
            }
        }
    }

    /// Asks every buyer to release its bundle and waits for the replies.
    pub async fn request_clear(&mut self) -> ClearReplies {
        let buyers = self.directory.find_agents(TASK_BUYING);
        self.clears_sent += 1;
        let conversation_id = new_conversation_id("clear", self.clears_sent);
        let recipients = self
            .writer
            .broadcast(&buyers, &conversation_id, &Message::clear_request());

        let mut pending: BTreeSet<AgentId> = recipients.iter().copied().collect();
        let mut released = Vec::new();
        let deadline = Instant::now() + self.clear_timeout;

        while !pending.is_empty() {
            let Some(envelope) = self.reader.recv_until(deadline).await else {
                break;
            };
            if envelope.conversation_id != conversation_id || !pending.remove(&envelope.sender) {
                debug!("dropping {} from {} while clearing", envelope.message.performative(), envelope.sender);
                continue;
            }
            match envelope.message {
                Message::Inform(content) => match wire::parse_single_bundle(&content) {
                    Ok(bundle) => released.push((envelope.sender, bundle)),
                    Err(e) => warn!("unreadable bundle from {}: {}", envelope.sender, e),
                },
                other => warn!(
                    "{} answered clear request with {}",
                    envelope.sender,
                    other.performative()
                ),
            }
        }

        let mut missing: Vec<AgentId> = pending.into_iter().collect();
        missing.extend(buyers.iter().filter(|b| !recipients.contains(b)));
        missing.sort();
        if !missing.is_empty() {
            warn!("{} robot(s) did not confirm clear request: {:?}", missing.len(), missing);
        }
        ClearReplies { released, missing }
    }

    async fn run_round(&mut self) {
        let offered = self.next_offer();
        // leftovers of earlier rounds are re-offered by REPLAN anyway
        if self.setting.dynamic_allocation == DynamicAllocation::Replan {
            self.auctioneer.withdraw_all();
        }
        self.auctioneer.offer(offered.iter().copied());

        let sale = self
            .auctioneer
            .sell_all(&self.writer, &mut self.reader, &self.directory)
            .await;
        log_round_summary(self.round, offered.len(), sale.auctions.len(), &sale.unsold);
        self.rounds.push(RoundReport {
            round: self.round,
            offered,
            sale,
        });
    }

    fn summarize(&mut self, clear: ClearReplies, started: Instant) -> RunSummary {
        let allocations: Vec<(AgentId, Bundle)> = clear.released;
        let total_cost: f64 = allocations.iter().map(|(_, b)| b.cost).sum();
        let max_cost = allocations.iter().map(|(_, b)| b.cost).fold(0.0, f64::max);
        log_final_allocation(&allocations, total_cost, max_cost);

        RunSummary {
            setting: self.setting,
            rounds: std::mem::take(&mut self.rounds),
            allocations: allocations
                .into_iter()
                .map(|(agent, bundle)| AgentAllocation { agent, bundle })
                .collect(),
            unsold: self.auctioneer.for_sale().tasks().to_vec(),
            missing_buyers: clear.missing,
            total_cost,
            max_cost,
            runtime_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }

    /// Runs every round and collects the final allocation.
    pub async fn run(mut self) -> RunSummary {
        let span = info_span!("controller", agent = %self.writer.agent_id(), setting = %self.setting);
        async move {
            let started = Instant::now();
            crate::market_info!("starting run with {} task(s) in backlog", self.backlog.len());
            loop {
                self.state = match self.state {
                    ControllerState::PrepareRound => {
                        if self.backlog.is_empty() {
                            ControllerState::CollectResults
                        } else {
                            self.round += 1;
                            if self.setting.dynamic_allocation == DynamicAllocation::Replan && self.round > 1 {
                                ControllerState::AwaitClear
                            } else {
                                ControllerState::RunAuction
                            }
                        }
                    }
                    ControllerState::AwaitClear => {
                        let cleared = self.request_clear().await;
                        debug!("round {}: {} robot(s) released their bundles", self.round, cleared.released.len());
                        ControllerState::RunAuction
                    }
                    ControllerState::RunAuction => {
                        self.run_round().await;
                        ControllerState::PrepareRound
                    }
                    ControllerState::CollectResults => {
                        let cleared = self.request_clear().await;
                        self.state = ControllerState::Done;
                        break self.summarize(cleared, started);
                    }
                    ControllerState::Done => break self.summarize(ClearReplies::default(), started),
                };
            }
        }
        .instrument(span)
        .await
    }
}
