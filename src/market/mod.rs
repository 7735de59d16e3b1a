pub mod for_sale;
pub mod geometry;
pub mod logging;
pub mod ranking;
pub mod types;
pub mod winner;

pub use for_sale::ForSaleList;
pub use geometry::PositionMatcher;
pub use ranking::{BidQueue, BidRanking, RankedBid};
pub use types::*;
pub use winner::{Award, awards_by_winner, determine_winners, rank_bids, select_awards};
