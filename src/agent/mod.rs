pub mod auctioneer;
pub mod bidder;
pub mod controller;
pub mod oracle;

pub use auctioneer::{AuctionOutcome, AuctionPhase, Auctioneer, SaleReport, TriggerAction};
pub use bidder::{AwardOutcome, Bidder};
pub use controller::{AgentAllocation, ClearReplies, Controller, ControllerState, RoundReport, RunSummary};
pub use oracle::{CostOracle, QuoteRequest, RetryPolicy, quote_with_retry};
