//! Seller side of the protocol
//!
//! The [`Auctioneer`] owns the for-sale list. An auction broadcasts a call for
//! proposals, collects replies until every buyer answered or the deadline
//! passed, clears the bids and sends the awards.

use crate::config::MarketConfig;
use crate::error::Result;
use crate::market::for_sale::ForSaleList;
use crate::market::logging::log_awards;
use crate::market::types::{AgentId, AwardPolicy, Bundle, Task, WinnerDetermination};
use crate::market::winner::{Award, determine_winners};
use crate::protocol::transport::{AgentDirectory, AgentReader, AgentWriter};
use crate::protocol::types::{Message, TASK_BUYING, new_conversation_id};
use crate::protocol::wire;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum AuctionPhase {
    Idle,
    CfpSent {
        conversation_id: String,
        recipients: Vec<AgentId>,
        deadline: Instant,
    },
    Award {
        conversation_id: String,
    },
}

/// What a trigger tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    Start,
    NoBuyers,
    Busy,
    Idle,
}

/// Proposals gathered for one call, plus how many buyers answered at all.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Responses {
    pub proposals: Vec<(AgentId, Vec<Bundle>)>,
    pub replied: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuctionOutcome {
    pub conversation_id: String,
    pub offered: usize,
    pub recipients: usize,
    pub replies: usize,
    pub awards: Vec<(AgentId, Bundle)>,
}

/// Auctions run while selling one batch of tasks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleReport {
    pub auctions: Vec<AuctionOutcome>,
    pub unsold: Vec<Task>,
}

pub struct Auctioneer {
    id: AgentId,
    for_sale: ForSaleList,
    phase: AuctionPhase,
    active_auction_counter: i64,
    max_wait_cycles: i64,
    response_timeout: Duration,
    trigger_period: Duration,
    max_stalled_auctions: u32,
    strategy: WinnerDetermination,
    policy: AwardPolicy,
    auctions_held: usize,
}

impl Auctioneer {
    pub fn new(id: AgentId, config: &MarketConfig) -> Result<Self> {
        Ok(Self {
            id,
            for_sale: ForSaleList::new(config.matcher()?),
            phase: AuctionPhase::Idle,
            active_auction_counter: 0,
            max_wait_cycles: i64::from(config.max_wait_cycles),
            response_timeout: config.response_timeout(),
            trigger_period: config.trigger_period(),
            max_stalled_auctions: config.max_stalled_auctions,
            strategy: config.winner_determination,
            policy: config.award_policy,
            auctions_held: 0,
        })
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn for_sale(&self) -> &ForSaleList {
        &self.for_sale
    }

    pub fn phase(&self) -> &AuctionPhase {
        &self.phase
    }

    pub fn active_auction_counter(&self) -> i64 {
        self.active_auction_counter
    }

    pub fn auctions_held(&self) -> usize {
        self.auctions_held
    }

    /// Puts tasks up for sale; returns how many were new.
    pub fn offer(&mut self, tasks: impl IntoIterator<Item = Task>) -> usize {
        self.for_sale.extend(tasks)
    }

    /// Takes every unsold task off the market.
    pub fn withdraw_all(&mut self) -> Vec<Task> {
        self.for_sale.drain()
    }

    /// One trigger tick.
    ///
    /// The counter is decremented on every tick; a new auction may start once
    /// it drops below zero while tasks are for sale.
    pub fn on_tick(&mut self, buyer_count: usize) -> TriggerAction {
        self.active_auction_counter -= 1;
        if self.active_auction_counter < 0 && !self.for_sale.is_empty() {
            if buyer_count == 0 {
                warn!("{}: no robots to sell {} task(s) to", self.id, self.for_sale.len());
                return TriggerAction::NoBuyers;
            }
            return TriggerAction::Start;
        }
        if self.active_auction_counter >= 0 && !self.for_sale.is_empty() {
            debug!("{}: old auction still busy", self.id);
            return TriggerAction::Busy;
        }
        self.active_auction_counter = 0;
        TriggerAction::Idle
    }

    /// Broadcasts a call for proposals for everything on sale.
    ///
    /// Returns the buyers actually reached; an empty list leaves the
    /// auctioneer idle.
    pub fn start_auction(&mut self, writer: &AgentWriter, buyers: &[AgentId]) -> Vec<AgentId> {
        if self.for_sale.is_empty() || buyers.is_empty() {
            return Vec::new();
        }
        self.auctions_held += 1;
        let conversation_id = new_conversation_id("cfp", self.auctions_held);
        let deadline = Instant::now() + self.response_timeout;
        let message = Message::call_for_proposals(self.for_sale.tasks(), deadline);

        let recipients = writer.broadcast(buyers, &conversation_id, &message);
        if recipients.is_empty() {
            warn!("{}: call for proposals {} reached nobody", self.id, conversation_id);
            return recipients;
        }
        crate::market_info!(
            "{}: auction {} offers {} task(s) to {} robot(s)",
            self.id,
            conversation_id,
            self.for_sale.len(),
            recipients.len()
        );

        self.active_auction_counter = self.max_wait_cycles;
        self.phase = AuctionPhase::CfpSent {
            conversation_id,
            recipients: recipients.clone(),
            deadline,
        };
        recipients
    }

    /// Gathers proposals until every recipient answered or the deadline passed.
    pub async fn collect_responses(&mut self, reader: &mut AgentReader) -> Responses {
        self.gather(reader, None).await
    }

    /// Like [`Auctioneer::collect_responses`], with the trigger still ticking.
    ///
    /// Each tick runs [`Auctioneer::on_tick`]; once the active-auction counter
    /// drops below zero the call is closed as if its deadline had passed.
    pub async fn collect_responses_watched(&mut self, reader: &mut AgentReader, ticker: &mut Interval) -> Responses {
        self.gather(reader, Some(ticker)).await
    }

    async fn gather(&mut self, reader: &mut AgentReader, mut ticker: Option<&mut Interval>) -> Responses {
        let AuctionPhase::CfpSent {
            conversation_id,
            recipients,
            deadline,
        } = std::mem::replace(&mut self.phase, AuctionPhase::Idle)
        else {
            return Responses::default();
        };

        let mut pending: BTreeSet<AgentId> = recipients.iter().copied().collect();
        let mut proposals = Vec::new();

        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        while !pending.is_empty() {
            tokio::select! {
                _ = &mut sleep => {
                    break;
                }
                _ = next_tick(&mut ticker) => {
                    if self.on_tick(recipients.len()) != TriggerAction::Busy {
                        warn!("{}: auction {} outlived {} trigger tick(s)", self.id, conversation_id, self.max_wait_cycles);
                        break;
                    }
                }
                maybe = reader.recv() => {
                    let Some(envelope) = maybe else { break };
                    if envelope.conversation_id != conversation_id {
                        debug!("{}: dropping {} from {} for stale conversation", self.id, envelope.message.performative(), envelope.sender);
                        continue;
                    }
                    if !pending.remove(&envelope.sender) {
                        debug!("{}: duplicate reply from {}", self.id, envelope.sender);
                        continue;
                    }
                    match envelope.message {
                        Message::Propose(content) => match wire::parse_bundles(&content) {
                            Ok(bundles) => proposals.push((envelope.sender, bundles)),
                            Err(e) => warn!("{}: unreadable proposal from {}: {}", self.id, envelope.sender, e),
                        },
                        Message::Refuse(reason) => {
                            debug!("{}: {} refused: {}", self.id, envelope.sender, reason);
                        }
                        Message::NotUnderstood(reason) => {
                            warn!("{}: {} did not understand the call: {}", self.id, envelope.sender, reason);
                        }
                        other => {
                            debug!("{}: unexpected {} from {}", self.id, other.performative(), envelope.sender);
                        }
                    }
                }
            }
        }

        let replies = recipients.len() - pending.len();
        if !pending.is_empty() {
            warn!(
                "{}: only {} of {} robot(s) answered auction {}",
                self.id,
                replies,
                recipients.len(),
                conversation_id
            );
        }

        self.phase = AuctionPhase::Award { conversation_id };
        Responses { proposals, replied: replies }
    }

    /// Clears the collected bids, sends the awards and resets the counter.
    ///
    /// Awarded tasks leave the for-sale list before delivery; a lost award is
    /// not recovered.
    pub fn award(&mut self, writer: &AgentWriter, responses: &[(AgentId, Vec<Bundle>)]) -> Vec<Award> {
        let conversation_id = match std::mem::replace(&mut self.phase, AuctionPhase::Idle) {
            AuctionPhase::Award { conversation_id } => conversation_id,
            _ => new_conversation_id("award", self.auctions_held),
        };

        let awards = determine_winners(&mut self.for_sale, responses, self.strategy, self.policy);
        log_awards(&conversation_id, &awards);

        for award in &awards {
            if let Err(e) = writer.send(award.bid.bidder, &conversation_id, Message::accept(&award.bid.bundle)) {
                warn!("{}: award for {} lost: {}", self.id, award.bid.bidder, e);
            }
        }
        self.active_auction_counter = 0;
        awards
    }

    /// Runs one complete auction against `buyers`.
    pub async fn run_auction(
        &mut self,
        writer: &AgentWriter,
        reader: &mut AgentReader,
        buyers: &[AgentId],
    ) -> AuctionOutcome {
        self.auction_with(writer, reader, buyers, None).await
    }

    async fn auction_with(
        &mut self,
        writer: &AgentWriter,
        reader: &mut AgentReader,
        buyers: &[AgentId],
        ticker: Option<&mut Interval>,
    ) -> AuctionOutcome {
        let offered = self.for_sale.len();
        let recipients = self.start_auction(writer, buyers);
        let conversation_id = match &self.phase {
            AuctionPhase::CfpSent { conversation_id, .. } => conversation_id.clone(),
            _ => String::new(),
        };
        if recipients.is_empty() {
            return AuctionOutcome {
                conversation_id,
                offered,
                recipients: 0,
                replies: 0,
                awards: Vec::new(),
            };
        }

        let responses = self.gather(reader, ticker).await;
        let awards = self.award(writer, &responses.proposals);
        AuctionOutcome {
            conversation_id,
            offered,
            recipients: recipients.len(),
            replies: responses.replied,
            awards: awards.into_iter().map(|a| (a.bid.bidder, a.bid.bundle)).collect(),
        }
    }

    /// Auctions until the for-sale list is empty or the market stalls.
    ///
    /// Auctions are started by trigger ticks, which keep running while an
    /// auction is open. After an auction that awarded something the next one
    /// starts at once while tasks remain.
    pub async fn sell_all<D: AgentDirectory + ?Sized>(
        &mut self,
        writer: &AgentWriter,
        reader: &mut AgentReader,
        directory: &D,
    ) -> SaleReport {
        let mut ticker = tokio::time::interval(self.trigger_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut auctions = Vec::new();
        let mut stalled = 0;
        let mut restart = false;

        while !self.for_sale.is_empty() && stalled < self.max_stalled_auctions {
            let buyers = directory.find_agents(TASK_BUYING);
            if !restart {
                ticker.tick().await;
                match self.on_tick(buyers.len()) {
                    TriggerAction::Start => {}
                    TriggerAction::NoBuyers => {
                        stalled += 1;
                        continue;
                    }
                    TriggerAction::Busy | TriggerAction::Idle => continue,
                }
            }

            let outcome = self.auction_with(writer, reader, &buyers, Some(&mut ticker)).await;
            restart = !outcome.awards.is_empty();
            if restart {
                stalled = 0;
            } else {
                stalled += 1;
            }
            auctions.push(outcome);
        }

        if !self.for_sale.is_empty() {
            warn!(
                "{}: giving up on {} task(s) after {} auction(s) without awards",
                self.id,
                self.for_sale.len(),
                stalled
            );
        }
        self.active_auction_counter = 0;
        self.phase = AuctionPhase::Idle;
        SaleReport {
            auctions,
            unsold: self.for_sale.tasks().to_vec(),
        }
    }
}

async fn next_tick(ticker: &mut Option<&mut Interval>) -> Instant {
    match ticker {
        Some(ticker) => ticker.tick().await,
        None => std::future::pending().await,
    }
}
