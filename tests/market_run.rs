//! End-to-end runs of the seller against bidder robots on the in-process network

mod common;

use common::*;
use taskmarket::*;

async fn run_market(
    config: &MarketConfig,
    network: &LocalNetwork,
    backlog: Vec<Task>,
) -> RunSummary {
    let (writer, reader) = network.join(AgentId(0), &[TASK_SELLING]);
    let controller = Controller::new(config, writer, reader, network.clone(), backlog).unwrap();
    tokio::time::timeout(WAIT, controller.run())
        .await
        .expect("run finished in time")
}

#[tokio::test(start_paused = true)]
async fn test_ssi_distributes_every_task() {
    logger::init_stdout("info");
    let config = test_config();
    let network = LocalNetwork::new();
    let b1 = spawn_bidder(&network, 1, Point2D::new(0.0, 0.0), StraightLineOracle, &config);
    let b2 = spawn_bidder(&network, 2, Point2D::new(10.0, 0.0), StraightLineOracle, &config);

    let summary = run_market(&config, &network, backlog()).await;

    assert_eq!(summary.round_count(), 3);
    let offered: Vec<usize> = summary.rounds.iter().map(|r| r.offered.len()).collect();
    assert_eq!(offered, vec![2, 2, 1]);
    assert!(summary.unsold.is_empty());
    assert!(summary.missing_buyers.is_empty());
    assert_allocated_once(&summary, &backlog(), &config.matcher().unwrap());

    let costs: f64 = summary.allocations.iter().map(|a| a.bundle.cost).sum();
    assert!((summary.total_cost - costs).abs() < 1e-9);
    assert!(summary.max_cost <= summary.total_cost);

    network.leave(AgentId(1));
    network.leave(AgentId(2));
    // the final clear request empties every robot
    assert!(b1.await.unwrap().committed().is_empty());
    assert!(b2.await.unwrap().committed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_costs_accumulate_incrementally() {
    let config = MarketConfig {
        tasks_per_round: 1,
        ..test_config()
    };
    let network = LocalNetwork::new();
    let _robot = spawn_bidder(&network, 1, Point2D::new(0.0, 0.0), StraightLineOracle, &config);

    let summary = run_market(&config, &network, vec![Task::new(3.0, 4.0), Task::new(6.0, 8.0)]).await;

    assert_eq!(summary.round_count(), 2);
    let awards: Vec<f64> = summary
        .rounds
        .iter()
        .flat_map(|r| r.sale.auctions.iter())
        .flat_map(|a| a.awards.iter().map(|(_, b)| b.cost))
        .collect();
    assert_eq!(awards.len(), 2);
    assert!(awards.iter().all(|c| (c - 5.0).abs() < 1e-9));
    assert_eq!(summary.allocations.len(), 1);
    assert_eq!(
        summary.allocations[0].bundle.tasks,
        vec![Task::new(3.0, 4.0), Task::new(6.0, 8.0)]
    );
    assert!((summary.total_cost - 10.0).abs() < 1e-9);
    assert!((summary.max_cost - 10.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_replan_reoffers_growing_prefix() {
    let config = MarketConfig {
        dynamic_allocation: DynamicAllocation::Replan,
        ..test_config()
    };
    let network = LocalNetwork::new();
    let _b1 = spawn_bidder(&network, 1, Point2D::new(0.0, 0.0), StraightLineOracle, &config);
    let _b2 = spawn_bidder(&network, 2, Point2D::new(10.0, 0.0), StraightLineOracle, &config);

    let summary = run_market(&config, &network, backlog()).await;

    let offered: Vec<usize> = summary.rounds.iter().map(|r| r.offered.len()).collect();
    assert_eq!(offered, vec![2, 4, 5]);
    assert_eq!(summary.rounds[1].offered[..2], summary.rounds[0].offered[..]);
    assert_allocated_once(&summary, &backlog(), &config.matcher().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_regret_clearing_run() {
    let config = MarketConfig {
        winner_determination: WinnerDetermination::RegretClearing,
        tasks_per_round: 5,
        ..test_config()
    };
    let network = LocalNetwork::new();
    let _b1 = spawn_bidder(&network, 1, Point2D::new(0.0, 0.0), StraightLineOracle, &config);
    let _b2 = spawn_bidder(&network, 2, Point2D::new(10.0, 0.0), StraightLineOracle, &config);

    let summary = run_market(&config, &network, backlog()).await;

    assert_eq!(summary.round_count(), 1);
    assert_allocated_once(&summary, &backlog(), &config.matcher().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_single_best_awards_one_task_per_auction() {
    let config = MarketConfig {
        award_policy: AwardPolicy::SingleBest,
        tasks_per_round: 5,
        ..test_config()
    };
    let network = LocalNetwork::new();
    let _b1 = spawn_bidder(&network, 1, Point2D::new(0.0, 0.0), StraightLineOracle, &config);
    let _b2 = spawn_bidder(&network, 2, Point2D::new(10.0, 0.0), StraightLineOracle, &config);

    let summary = run_market(&config, &network, backlog()).await;

    let auctions = &summary.rounds[0].sale.auctions;
    assert_eq!(auctions.len(), 5);
    assert!(auctions.iter().all(|a| a.awards.len() == 1));
    assert_allocated_once(&summary, &backlog(), &config.matcher().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_silent_and_refusing_robots_do_not_block() {
    let config = test_config();
    let network = LocalNetwork::new();
    let _worker = spawn_bidder(&network, 1, Point2D::new(0.0, 0.0), StraightLineOracle, &config);
    let _offline = spawn_bidder(&network, 2, Point2D::new(5.0, 0.0), OfflineOracle, &config);
    let _silent = network.join(AgentId(3), &[TASK_BUYING]);

    let summary = run_market(&config, &network, backlog()).await;

    assert_eq!(summary.round_count(), 3);
    assert!(summary.unsold.is_empty());
    assert_eq!(summary.missing_buyers, vec![AgentId(3)]);
    // the offline robot confirms the clear request with an empty bundle
    let offline = summary
        .allocations
        .iter()
        .find(|a| a.agent == AgentId(2))
        .unwrap();
    assert!(offline.bundle.is_empty());
    assert_allocated_once(&summary, &backlog(), &config.matcher().unwrap());

    let first = &summary.rounds[0].sale.auctions[0];
    assert_eq!(first.recipients, 3);
    assert_eq!(first.replies, 2);
}

#[tokio::test(start_paused = true)]
async fn test_no_buyers_leaves_tasks_unsold() {
    let config = test_config();
    let network = LocalNetwork::new();

    let summary = run_market(&config, &network, vec![Task::new(1.0, 1.0)]).await;

    assert_eq!(summary.round_count(), 1);
    assert!(summary.rounds[0].sale.auctions.is_empty());
    assert_eq!(summary.unsold, vec![Task::new(1.0, 1.0)]);
    assert!(summary.allocations.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_summary_serializes() {
    let config = test_config();
    let network = LocalNetwork::new();
    let _b1 = spawn_bidder(&network, 1, Point2D::new(0.0, 0.0), StraightLineOracle, &config);

    let summary = run_market(&config, &network, vec![Task::new(2.0, 0.0)]).await;
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["setting"]["winner_determination"], "min_cost");
    assert_eq!(json["total_cost"], 2.0);
}
