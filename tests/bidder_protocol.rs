//! Message-level conversations with a running bidder

mod common;

use common::*;
use taskmarket::*;
use tokio::time::Instant;

struct Harness {
    network: LocalNetwork,
    seller: AgentWriter,
    inbox: AgentReader,
}

impl Harness {
    fn new() -> Self {
        let network = LocalNetwork::new();
        let (seller, inbox) = network.join(AgentId(0), &[TASK_SELLING]);
        Self {
            network,
            seller,
            inbox,
        }
    }

    async fn ask(&mut self, conversation: &str, message: Message) -> Envelope {
        self.seller.send(AgentId(1), conversation, message).unwrap();
        tokio::time::timeout(WAIT, self.inbox.recv())
            .await
            .unwrap()
            .unwrap()
    }
}

#[tokio::test]
async fn test_cfp_award_and_clear() {
    let config = test_config();
    let mut h = Harness::new();
    let robot = spawn_bidder(&h.network, 1, Point2D::new(0.0, 0.0), StraightLineOracle, &config);
    let deadline = Instant::now() + config.response_timeout();

    let reply = h
        .ask("c1", Message::call_for_proposals(&[Task::new(0.0, 2.0), Task::new(6.0, 8.0)], deadline))
        .await;
    assert_eq!(reply.conversation_id, "c1");
    let Message::Propose(content) = reply.message else {
        panic!("expected PROPOSE");
    };
    let bundles = wire::parse_bundles(&content).unwrap();
    assert_eq!(bundles.len(), 2);
    assert_eq!(bundles[0].cost, 2.0);
    assert!((bundles[1].cost - 10.0).abs() < 1e-9);

    h.seller
        .send(AgentId(1), "c1", Message::accept(&bundles[0]))
        .unwrap();

    let inform = h.ask("c2", Message::clear_request()).await;
    assert_eq!(inform.message, Message::inform(&Bundle::new(vec![Task::new(0.0, 2.0)], 2.0)));

    let inform = h.ask("c3", Message::clear_request()).await;
    assert_eq!(inform.message, Message::Inform("0: ".to_string()));

    h.network.leave(AgentId(1));
    let robot = robot.await.unwrap();
    assert!(robot.committed().is_empty());
}

#[tokio::test]
async fn test_malformed_content_is_not_understood() {
    let config = test_config();
    let mut h = Harness::new();
    let _robot = spawn_bidder(&h.network, 1, Point2D::new(0.0, 0.0), StraightLineOracle, &config);
    let deadline = Instant::now() + config.response_timeout();

    let reply = h
        .ask(
            "bad",
            Message::CallForProposals {
                content: "[1 2] [3".to_string(),
                reply_by: deadline,
            },
        )
        .await;
    assert!(matches!(reply.message, Message::NotUnderstood(_)));

    let reply = h.ask("bad-request", Message::Request("go home".to_string())).await;
    assert!(matches!(reply.message, Message::NotUnderstood(_)));
}

#[tokio::test(start_paused = true)]
async fn test_offline_oracle_refuses() {
    let config = test_config();
    let mut h = Harness::new();
    let _robot = spawn_bidder(&h.network, 1, Point2D::new(0.0, 0.0), OfflineOracle, &config);

    let reply = h
        .ask("c1", Message::call_for_proposals(&[Task::new(1.0, 1.0)], Instant::now()))
        .await;
    assert_eq!(reply.message, Message::Refuse("no bundles to bid".to_string()));
}

#[tokio::test]
async fn test_bad_award_keeps_commitment() {
    let config = test_config();
    let mut h = Harness::new();
    let robot = spawn_bidder(&h.network, 1, Point2D::new(0.0, 0.0), StraightLineOracle, &config);

    h.seller
        .send(AgentId(1), "a", Message::AcceptProposal("1: [1 1]\n2: [2 2]\n".to_string()))
        .unwrap();
    h.seller
        .send(AgentId(1), "a", Message::task_request(&[Task::new(4.0, 4.0)]))
        .unwrap();

    let inform = h.ask("c", Message::clear_request()).await;
    assert_eq!(inform.message, Message::Inform("0: ".to_string()));

    h.network.leave(AgentId(1));
    let robot = robot.await.unwrap();
    assert_eq!(robot.received_tasks(), &[Task::new(4.0, 4.0)]);
}
