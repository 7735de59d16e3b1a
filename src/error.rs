//! Error types for market operations

use crate::market::types::AgentId;
use crate::protocol::wire::ParseError;
use thiserror::Error;

/// Errors that can occur while running auctions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Malformed message content: {0}")]
    Wire(#[from] ParseError),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Unknown agent {0}")]
    UnknownAgent(AgentId),
    #[error("Cost oracle error: {0}")]
    Oracle(#[from] OracleError),
    #[error("Invalid bid from {bidder}: {reason}")]
    InvalidBid { bidder: AgentId, reason: String },
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("State error: {0}")]
    State(String),
}

/// Failures reported by a [`CostOracle`](crate::agent::oracle::CostOracle)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("oracle busy")]
    Busy,
    #[error("oracle did not answer within {0} ms")]
    Timeout(u64),
    #[error("oracle failed: {0}")]
    Failed(String),
}

/// A specialized Result type for market operations
pub type Result<T> = std::result::Result<T, Error>;
