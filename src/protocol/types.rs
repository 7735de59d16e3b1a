use crate::market::types::{AgentId, Bundle, Task};
use crate::protocol::wire;
use std::fmt;
use tokio::time::Instant;

pub const TASK_BUYING: &str = "task-buying";
pub const TASK_SELLING: &str = "task-selling";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Performative {
    CallForProposals,
    Propose,
    Refuse,
    NotUnderstood,
    AcceptProposal,
    Inform,
    Request,
}

impl fmt::Display for Performative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CallForProposals => "CFP",
            Self::Propose => "PROPOSE",
            Self::Refuse => "REFUSE",
            Self::NotUnderstood => "NOT_UNDERSTOOD",
            Self::AcceptProposal => "ACCEPT_PROPOSAL",
            Self::Inform => "INFORM",
            Self::Request => "REQUEST",
        };
        f.write_str(name)
    }
}

/// Message body. Content is kept in wire form and parsed by the receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    CallForProposals { content: String, reply_by: Instant },
    Propose(String),
    Refuse(String),
    NotUnderstood(String),
    AcceptProposal(String),
    Inform(String),
    Request(String),
}

impl Message {
    pub fn call_for_proposals(tasks: &[Task], reply_by: Instant) -> Self {
        Self::CallForProposals {
            content: wire::encode_tasks(tasks),
            reply_by,
        }
    }

    pub fn propose(bundles: &[Bundle]) -> Self {
        Self::Propose(wire::encode_bundles(bundles))
    }

    pub fn accept(bundle: &Bundle) -> Self {
        Self::AcceptProposal(wire::encode_bundle(bundle))
    }

    pub fn inform(bundle: &Bundle) -> Self {
        Self::Inform(wire::encode_bundle(bundle))
    }

    pub fn clear_request() -> Self {
        Self::Request(wire::CLEAR_SENTINEL.to_string())
    }

    pub fn task_request(tasks: &[Task]) -> Self {
        Self::Request(wire::encode_tasks(tasks))
    }

    pub fn performative(&self) -> Performative {
        match self {
            Self::CallForProposals { .. } => Performative::CallForProposals,
            Self::Propose(_) => Performative::Propose,
            Self::Refuse(_) => Performative::Refuse,
            Self::NotUnderstood(_) => Performative::NotUnderstood,
            Self::AcceptProposal(_) => Performative::AcceptProposal,
            Self::Inform(_) => Performative::Inform,
            Self::Request(_) => Performative::Request,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::CallForProposals { content, .. } => content,
            Self::Propose(c)
            | Self::Refuse(c)
            | Self::NotUnderstood(c)
            | Self::AcceptProposal(c)
            | Self::Inform(c)
            | Self::Request(c) => c,
        }
    }
}

/// A message in flight. Replies reuse the conversation id they answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub conversation_id: String,
    pub sender: AgentId,
    pub receiver: AgentId,
    pub message: Message,
}

impl Envelope {
    pub fn reply(&self, message: Message) -> Envelope {
        Envelope {
            conversation_id: self.conversation_id.clone(),
            sender: self.receiver,
            receiver: self.sender,
            message,
        }
    }
}

/// Fresh conversation id, e.g. `cfp-3-6f1c...`.
pub fn new_conversation_id(kind: &str, counter: usize) -> String {
    format!("{}-{}-{}", kind, counter, uuid::Uuid::new_v4())
}
