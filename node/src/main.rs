// node/src/main.rs

//! Validator node binary.
//!
//! Connects to a relay over TCP, runs the single-threaded consensus loop
//! (spec §5), and exposes a stdin REPL for local commands. Embeds a
//! `ConsensusEngine<InMemoryBlockStore>`, persists its active chain to a
//! JSON file on every head change, and exports Prometheus metrics on
//! `/metrics`.

mod config;
mod persistence;
mod repl;
mod transport;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use chain::{
    AccountId, ConsensusEngine, InMemoryBlockStore, InboundMessage, MetricsRegistry,
    OutboundMessage, Transaction, TxKind, run_prometheus_http_server,
};

use config::NodeConfig;
use repl::ReplCommand;

type Engine = ConsensusEngine<InMemoryBlockStore>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "node=info,chain=info".to_string()))
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("node.toml"));
    let node_cfg = match NodeConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, path = %config_path.display(), "using default node configuration");
            NodeConfig::default()
        }
    };

    let self_id = AccountId::new(node_cfg.node_id.clone());

    let metrics = Arc::new(MetricsRegistry::new().expect("failed to initialise metrics registry"));
    {
        let metrics = metrics.clone();
        let addr = node_cfg.metrics_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics, addr).await {
                tracing::error!(error = %e, "metrics HTTP server error");
            }
        });
        tracing::info!(%addr, "metrics exporter listening");
    }

    let persisted = persistence::load(&node_cfg.persist_path).unwrap_or_default();
    let mut engine =
        Engine::from_persisted_chain(self_id.clone(), node_cfg.consensus.clone(), InMemoryBlockStore::new(), persisted);

    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<InboundMessage>();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (repl_tx, mut repl_rx) = mpsc::unbounded_channel::<ReplCommand>();

    let shutdown = Arc::new(tokio::sync::Notify::new());
    let transport_handle = tokio::spawn(transport::run(
        node_cfg.relay_addr(),
        self_id.clone(),
        inbound_tx,
        outbound_rx,
        shutdown.clone(),
    ));
    repl::spawn(repl_tx);

    for msg in engine.begin_sync(Instant::now()) {
        let _ = outbound_tx.send(msg);
    }
    metrics.consensus.sync_rounds_total.inc();

    let mut ticker = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            maybe = inbound_rx.recv() => {
                let Some(msg) = maybe else { break };
                step(&mut engine, msg, &outbound_tx, &node_cfg, &metrics);
            }
            maybe = repl_rx.recv() => {
                let Some(cmd) = maybe else { break };
                if matches!(cmd, ReplCommand::Exit) {
                    handle_exit(&shutdown, transport_handle).await;
                    break;
                }
                handle_repl_command(cmd, &mut engine, &self_id, &outbound_tx, &node_cfg, &metrics);
            }
            _ = ticker.tick() => {
                let now = Instant::now();
                if engine.sync_round_expired(now) {
                    step(&mut engine, InboundMessage::SyncTimeout, &outbound_tx, &node_cfg, &metrics);
                }
                if engine.vote_round_expired(now) {
                    step(&mut engine, InboundMessage::VoteTimeout, &outbound_tx, &node_cfg, &metrics);
                }
            }
        }

        metrics.consensus.mempool_size.set(engine.mempool().len() as f64);
        if let Some(head) = engine.chain().head_block() {
            metrics.consensus.chain_height.set(head.header.index as f64);
        }
    }

    tracing::info!("node shutting down");
}

/// Runs one engine step: handles `msg`, forwards the resulting
/// `OutboundMessage`s to the transport writer, updates forge/vote/reorg
/// counters, and persists the chain when the head moved.
fn step(engine: &mut Engine, msg: InboundMessage, outbound_tx: &mpsc::UnboundedSender<OutboundMessage>, node_cfg: &NodeConfig, metrics: &MetricsRegistry) {
    let is_forge_attempt = matches!(msg, InboundMessage::Step | InboundMessage::ForceForge);
    let head_before = engine.head();

    let outs = engine.handle(msg, Instant::now());

    if is_forge_attempt && outs.iter().any(|m| matches!(m, OutboundMessage::Block(_))) {
        metrics.consensus.blocks_forged.inc();
    }
    for out in &outs {
        if let OutboundMessage::Vote { .. } = out {
            metrics.consensus.votes_cast.inc();
        }
        let _ = outbound_tx.send(out.clone());
    }

    let head_after = engine.head();
    if head_after != head_before {
        if let (Some(before), Some(after)) = (&head_before, &head_after) {
            if let Some(block) = engine.chain().store().get_block(after) {
                if &block.header.prev_hash != before {
                    metrics.consensus.reorgs_total.inc();
                }
            }
        }
        persistence::save(&node_cfg.persist_path, &engine.active_chain());
    }
}

/// Drains the inbound queue has already happened by the time this runs
/// (the REPL branch fires after any already-queued inbound message), so
/// all that remains is telling the transport task to send BYE and wait
/// for it to close the socket, per spec §5's shutdown sequence.
async fn handle_exit(shutdown: &Arc<tokio::sync::Notify>, transport_handle: tokio::task::JoinHandle<()>) {
    tracing::info!("exit requested from REPL, sending BYE");
    shutdown.notify_one();
    if tokio::time::timeout(Duration::from_millis(500), transport_handle).await.is_err() {
        tracing::warn!("transport task did not shut down within the grace period");
    }
}

fn handle_repl_command(
    cmd: ReplCommand,
    engine: &mut Engine,
    self_id: &AccountId,
    outbound_tx: &mpsc::UnboundedSender<OutboundMessage>,
    node_cfg: &NodeConfig,
    metrics: &MetricsRegistry,
) {
    match cmd {
        ReplCommand::Tx { to, amount } => {
            let tx = Transaction { sender: self_id.clone(), receiver: AccountId::new(to), amount, timestamp: now_ts(), kind: TxKind::Transfer };
            step(engine, InboundMessage::Transaction(tx), outbound_tx, node_cfg, metrics);
        }
        ReplCommand::Stake { amount } => {
            let tx = Transaction { sender: self_id.clone(), receiver: self_id.clone(), amount, timestamp: now_ts(), kind: TxKind::Stake };
            step(engine, InboundMessage::Transaction(tx), outbound_tx, node_cfg, metrics);
        }
        ReplCommand::Unstake { amount } => {
            let tx = Transaction { sender: self_id.clone(), receiver: self_id.clone(), amount, timestamp: now_ts(), kind: TxKind::Unstake };
            step(engine, InboundMessage::Transaction(tx), outbound_tx, node_cfg, metrics);
        }
        ReplCommand::Forge { force } => {
            let msg = if force { InboundMessage::ForceForge } else { InboundMessage::Step };
            step(engine, msg, outbound_tx, node_cfg, metrics);
        }
        ReplCommand::Sync => {
            for msg in engine.begin_sync(Instant::now()) {
                let _ = outbound_tx.send(msg);
            }
            metrics.consensus.sync_rounds_total.inc();
        }
        ReplCommand::Chain => {
            for block in engine.active_chain() {
                println!("{:>6}  {}  validator={}  txs={}", block.header.index, block.hash, block.header.validator, block.transactions.len());
            }
        }
        ReplCommand::Wallet => {
            let acct = engine.chain().wallet().get(self_id);
            println!("balance={} stake={}", acct.balance, acct.stake);
        }
        ReplCommand::Mempool => {
            println!("{} pending transaction(s)", engine.mempool().len());
        }
        ReplCommand::Info => {
            println!(
                "node_id={} head={:?} height={}",
                self_id,
                engine.head(),
                engine.chain().head_block().map(|b| b.header.index).unwrap_or(0)
            );
        }
        ReplCommand::Nodes => {
            println!("peer discovery is handled by the relay; this node only sees traffic it has been sent");
        }
        ReplCommand::Exit => unreachable!("handled by the caller before dispatch"),
    }
}

fn now_ts() -> f64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}
