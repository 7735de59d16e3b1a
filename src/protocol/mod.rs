pub mod transport;
pub mod types;
pub mod wire;

pub use transport::{AgentDirectory, AgentReader, AgentWriter, LocalNetwork};
pub use types::{Envelope, Message, Performative, TASK_BUYING, TASK_SELLING, new_conversation_id};
pub use wire::{CLEAR_SENTINEL, ParseError};
