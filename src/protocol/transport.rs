//! In-process message network
//!
//! Every agent owns an unbounded inbox. [`LocalNetwork::join`] registers an
//! agent with its capabilities and hands back a writer/reader pair. The
//! network also serves as the [`AgentDirectory`] used to discover buyers.

use crate::error::{Error, Result};
use crate::market::types::AgentId;
use crate::protocol::types::{Envelope, Message};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Lookup of agents offering a capability.
pub trait AgentDirectory: Send + Sync {
    fn find_agents(&self, capability: &str) -> Vec<AgentId>;
}

#[derive(Debug)]
struct Registration {
    capabilities: Vec<String>,
    inbox: UnboundedSender<Envelope>,
}

#[derive(Debug, Clone, Default)]
pub struct LocalNetwork {
    agents: Arc<RwLock<BTreeMap<AgentId, Registration>>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `agent`, replacing any earlier registration under that id.
    pub fn join(&self, agent: AgentId, capabilities: &[&str]) -> (AgentWriter, AgentReader) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registration = Registration {
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            inbox: tx,
        };
        if self.agents.write().insert(agent, registration).is_some() {
            warn!("{} re-joined the network, previous inbox dropped", agent);
        }
        debug!("{} joined with capabilities {:?}", agent, capabilities);

        let writer = AgentWriter {
            agent_id: agent,
            network: self.clone(),
        };
        (writer, AgentReader { agent_id: agent, rx })
    }

    /// Deregisters `agent`; its reader sees the end of its inbox.
    pub fn leave(&self, agent: AgentId) {
        if self.agents.write().remove(&agent).is_some() {
            debug!("{} left the network", agent);
        }
    }

    pub fn deliver(&self, envelope: Envelope) -> Result<()> {
        let agents = self.agents.read();
        let Some(registration) = agents.get(&envelope.receiver) else {
            return Err(Error::UnknownAgent(envelope.receiver));
        };
        let receiver = envelope.receiver;
        registration
            .inbox
            .send(envelope)
            .map_err(|_| Error::Transport(format!("inbox of {} is closed", receiver)))
    }
}

impl AgentDirectory for LocalNetwork {
    fn find_agents(&self, capability: &str) -> Vec<AgentId> {
        self.agents
            .read()
            .iter()
            .filter(|(_, r)| r.capabilities.iter().any(|c| c == capability))
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Sending half of an agent's network handle.
#[derive(Debug, Clone)]
pub struct AgentWriter {
    agent_id: AgentId,
    network: LocalNetwork,
}

impl AgentWriter {
    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    pub fn send(&self, receiver: AgentId, conversation_id: &str, message: Message) -> Result<()> {
        self.network.deliver(Envelope {
            conversation_id: conversation_id.to_string(),
            sender: self.agent_id,
            receiver,
            message,
        })
    }

    pub fn reply(&self, to: &Envelope, message: Message) -> Result<()> {
        self.network.deliver(to.reply(message))
    }

    /// Sends `message` to every receiver; returns those it reached.
    pub fn broadcast(&self, receivers: &[AgentId], conversation_id: &str, message: &Message) -> Vec<AgentId> {
        receivers
            .iter()
            .filter(|receiver| match self.send(**receiver, conversation_id, message.clone()) {
                Ok(()) => true,
                Err(e) => {
                    warn!("{}: {} not sent to {}: {}", self.agent_id, message.performative(), receiver, e);
                    false
                }
            })
            .copied()
            .collect()
    }
}

/// Receiving half of an agent's network handle.
#[derive(Debug)]
pub struct AgentReader {
    agent_id: AgentId,
    rx: UnboundedReceiver<Envelope>,
}

impl AgentReader {
    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    /// Next message, or `None` once the agent has left the network.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Next message received before `deadline`.
    pub async fn recv_until(&mut self, deadline: Instant) -> Option<Envelope> {
        tokio::time::timeout_at(deadline, self.rx.recv()).await.ok().flatten()
    }

    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }
}
