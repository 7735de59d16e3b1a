//! # taskmarket - market-based task allocation for robot teams
//!
//! A seller auctions spatial tasks to buyer robots in Contract-Net style:
//! call for proposals, bundle bids priced by each buyer, winner determination
//! and award. Rounds of auctions are driven by a dynamic reallocation policy.
//!
//! ## Modules
//!
//! - [`market`] - Tasks, bundles, bids, positional matching and winner determination
//! - [`protocol`] - Message types, text encoding and the in-process network
//! - [`agent`] - Auctioneer, bidder, reallocation controller and the cost oracle seam
//! - [`config`] - Market configuration and loaders
//! - [`error`] - Error types and handling
//! - [`logger`] - Tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust
//! use taskmarket::*;
//!
//! let matcher = PositionMatcher::new(0.01).unwrap();
//! let mut for_sale = ForSaleList::with_tasks(matcher, vec![Task::new(0.0, 0.0), Task::new(4.0, 2.0)]);
//!
//! let responses = vec![
//!     (AgentId(1), vec![Bundle::new(vec![Task::new(4.0, 2.0)], 3.5)]),
//!     (AgentId(2), vec![Bundle::new(vec![Task::new(4.0, 2.0)], 2.0)]),
//! ];
//! let awards = determine_winners(
//!     &mut for_sale,
//!     &responses,
//!     WinnerDetermination::MinCost,
//!     AwardPolicy::PerTask,
//! );
//! assert_eq!(awards[0].bid.bidder, AgentId(2));
//! assert_eq!(for_sale.len(), 1);
//! ```

#![allow(ambiguous_glob_reexports)]

pub mod agent;
pub mod config;
pub mod error;
pub mod logger;
pub mod market;
pub mod protocol;

pub use agent::*;
pub use config::MarketConfig;
pub use error::*;
pub use market::*;
pub use protocol::*;
