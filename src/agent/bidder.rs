//! Buyer side of the protocol
//!
//! A [`Bidder`] answers calls for proposals with bundles priced by its
//! [`CostOracle`], commits to awarded bundles and releases its commitment on a
//! clear request.

use crate::agent::oracle::{CostOracle, QuoteRequest, RetryPolicy, quote_with_retry};
use crate::config::MarketConfig;
use crate::error::Result;
use crate::market::geometry::PositionMatcher;
use crate::market::logging::task_list;
use crate::market::types::{AgentId, Bundle, Point2D, Task};
use crate::protocol::transport::{AgentReader, AgentWriter};
use crate::protocol::types::{Envelope, Message};
use crate::protocol::wire;
use tracing::{Instrument, debug, info, info_span, warn};

/// Outcome of handling an award.
#[derive(Debug, Clone, PartialEq)]
pub enum AwardOutcome {
    Committed { added: Vec<Task>, cost: f64 },
    Rejected(String),
}

pub struct Bidder<O: CostOracle> {
    id: AgentId,
    location: Point2D,
    matcher: PositionMatcher,
    oracle: O,
    retry: RetryPolicy,
    bundle_size: usize,
    max_bundles: usize,
    committed: Bundle,
    total_cost: f64,
    received: Vec<Task>,
}

impl<O: CostOracle> Bidder<O> {
    pub fn new(id: AgentId, location: Point2D, oracle: O, config: &MarketConfig) -> Result<Self> {
        Ok(Self {
            id,
            location,
            matcher: config.matcher()?,
            oracle,
            retry: config.retry_policy(),
            bundle_size: config.bundle_size,
            max_bundles: config.max_bundles,
            committed: Bundle::empty(),
            total_cost: 0.0,
            received: Vec::new(),
        })
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn location(&self) -> Point2D {
        self.location
    }

    /// The bundle currently held; its cost is the running total cost.
    pub fn committed(&self) -> &Bundle {
        &self.committed
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Tasks pushed to this robot by a task request.
    pub fn received_tasks(&self) -> &[Task] {
        &self.received
    }

    /// Prices the offered tasks. Returns the reply to send.
    pub async fn handle_cfp(&self, content: &str) -> Message {
        let offered = match wire::parse_tasks(content) {
            Ok(tasks) if !tasks.is_empty() => tasks,
            Ok(_) => return Message::NotUnderstood("no tasks in call for proposals".into()),
            Err(e) => {
                warn!("{}: malformed call for proposals: {}", self.id, e);
                return Message::NotUnderstood(e.to_string());
            }
        };

        let candidates: Vec<Task> = offered
            .into_iter()
            .filter(|t| !self.matcher.contains(&self.committed.tasks, t))
            .collect();

        if candidates.is_empty() {
            debug!("{}: every offered task is already mine, proposing my bundle at no cost", self.id);
            return Message::propose(&[self.committed.clone().with_cost(0.0)]);
        }

        let request = QuoteRequest {
            start: self.location,
            committed: self.committed.tasks.clone(),
            candidates,
            bundle_size: self.bundle_size,
            max_bundles: self.max_bundles,
        };

        let bundles = match quote_with_retry(&self.oracle, &request, &self.retry).await {
            Ok(bundles) => bundles,
            Err(e) => {
                warn!("{}: no quote from cost oracle: {}", self.id, e);
                Vec::new()
            }
        };

        if bundles.is_empty() {
            return Message::Refuse("no bundles to bid".into());
        }

        let bids: Vec<Bundle> = bundles
            .into_iter()
            .map(|b| {
                let incremental = b.cost - self.committed.cost;
                b.with_cost(incremental)
            })
            .collect();
        debug!("{}: proposing {} bundle(s)", self.id, bids.len());
        Message::propose(&bids)
    }

    /// Commits to an awarded bundle, replacing the current one.
    pub fn handle_accept(&mut self, content: &str) -> AwardOutcome {
        let awarded = match wire::parse_single_bundle(content) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("{}: award not applied: {}", self.id, e);
                return AwardOutcome::Rejected(e.to_string());
            }
        };

        if !self.matcher.covers(&awarded.tasks, &self.committed.tasks) {
            warn!(
                "{}: awarded bundle [{}] drops tasks of my commitment [{}]",
                self.id,
                task_list(&awarded.tasks),
                task_list(&self.committed.tasks)
            );
        }

        let added: Vec<Task> = awarded
            .tasks
            .iter()
            .filter(|t| !self.matcher.contains(&self.committed.tasks, t))
            .copied()
            .collect();
        info!(
            "{}: won [{}] for {:.3}, now committed to {} task(s)",
            self.id,
            task_list(&added),
            awarded.cost,
            awarded.tasks.len()
        );

        self.total_cost += awarded.cost;
        self.committed = Bundle::new(awarded.tasks, self.total_cost);
        AwardOutcome::Committed {
            added,
            cost: awarded.cost,
        }
    }

    /// Releases the commitment, returning what was held.
    pub fn handle_clear(&mut self) -> Bundle {
        let released = std::mem::take(&mut self.committed);
        self.total_cost = 0.0;
        debug!("{}: released {} task(s)", self.id, released.tasks.len());
        released
    }

    pub fn handle_task_request(&mut self, content: &str) -> Result<usize> {
        let tasks = wire::parse_tasks(content)?;
        let mut added = 0;
        for task in tasks {
            if !self.matcher.contains(&self.received, &task) {
                self.received.push(task);
                added += 1;
            }
        }
        Ok(added)
    }

    async fn dispatch(&mut self, writer: &AgentWriter, envelope: Envelope) -> Result<()> {
        match &envelope.message {
            Message::CallForProposals { content, .. } => {
                let reply = self.handle_cfp(content).await;
                writer.reply(&envelope, reply)?;
            }
            Message::AcceptProposal(content) => {
                self.handle_accept(content);
            }
            Message::Request(content) if wire::is_clear_request(content) => {
                let released = self.handle_clear();
                writer.reply(&envelope, Message::inform(&released))?;
            }
            Message::Request(content) => match self.handle_task_request(content) {
                Ok(added) => info!("{}: received {} new task(s)", self.id, added),
                Err(e) => {
                    warn!("{}: malformed task request: {}", self.id, e);
                    writer.reply(&envelope, Message::NotUnderstood(e.to_string()))?;
                }
            },
            other => {
                debug!("{}: ignoring {} from {}", self.id, other.performative(), envelope.sender);
            }
        }
        Ok(())
    }

    /// Serves messages until the agent leaves the network, then hands the
    /// bidder back.
    pub async fn run(mut self, writer: AgentWriter, mut reader: AgentReader) -> Self {
        let span = info_span!("bidder", agent = %self.id);
        async {
            while let Some(envelope) = reader.recv().await {
                if let Err(e) = self.dispatch(&writer, envelope).await {
                    warn!("{}: reply lost: {}", self.id, e);
                }
            }
            debug!("{}: inbox closed", self.id);
        }
        .instrument(span)
        .await;
        self
    }
}
