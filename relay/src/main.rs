// relay/src/main.rs

//! TCP fan-out relay binary (spec.md §1 "out of scope", §5, §6 "Relay admin
//! commands").
//!
//! Accepts framed connections from nodes, maintains a sender-id keyed table
//! of dropped/delayed peers, and broadcasts every inbound frame to all
//! other connected peers. It does not decode message semantics beyond the
//! envelope's sender-id header: drop and delay are sender-id keyed, matching
//! the convention that a dropped node's outbound traffic is suppressed but
//! its inbound traffic (from other nodes) is still forwarded to it.

mod admin;
mod config;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use chain::wire::{WireBody, WireEnvelope, decode, encode};
use chain::AccountId;

use admin::{AdminCommand, DropAction};
use config::RelayConfig;

struct PeerEntry {
    tx: mpsc::UnboundedSender<Bytes>,
    dropped: bool,
    delay: Option<Duration>,
}

type PeerTable = Arc<Mutex<HashMap<AccountId, PeerEntry>>>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "relay=info,chain=info".to_string()))
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("relay.toml"));
    let cfg = match RelayConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, path = %config_path.display(), "using default relay configuration");
            RelayConfig::default()
        }
    };

    let peers: PeerTable = Arc::new(Mutex::new(HashMap::new()));
    let auto_step = Arc::new(AtomicBool::new(cfg.auto_step));
    let threshold = Arc::new(Mutex::new(cfg.vote_threshold));

    let listener = match TcpListener::bind(cfg.listen_addr()).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %cfg.listen_addr(), error = %e, "failed to bind relay listener");
            return;
        }
    };
    tracing::info!(addr = %cfg.listen_addr(), "relay listening");

    {
        let peers = peers.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let peers = peers.clone();
                        tokio::spawn(handle_connection(stream, peers, addr));
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                }
            }
        });
    }

    let (admin_tx, mut admin_rx) = mpsc::unbounded_channel::<AdminCommand>();
    admin::spawn(admin_tx);

    let mut ticker = tokio::time::interval(Duration::from_secs(cfg.step_interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if auto_step.load(Ordering::Relaxed) {
                    broadcast_step(&peers).await;
                }
            }
            maybe = admin_rx.recv() => {
                let Some(cmd) = maybe else { break };
                if matches!(cmd, AdminCommand::Exit) {
                    break;
                }
                handle_admin(cmd, &peers, &auto_step, &threshold).await;
            }
        }
    }

    tracing::info!("relay shutting down");
}

/// Reads frames from one connection, registers the peer's sender-id on
/// `HELLO`, and fans out every non-dropped frame to all other peers.
async fn handle_connection(stream: TcpStream, peers: PeerTable, addr: std::net::SocketAddr) {
    let framed = Framed::new(stream, LengthDelimitedCodec::new());
    let (mut sink, mut stream) = framed.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
    let writer = tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if sink.send(bytes).await.is_err() {
                break;
            }
        }
    });

    let mut my_id: Option<AccountId> = None;

    while let Some(frame) = stream.next().await {
        let Ok(bytes) = frame else {
            tracing::warn!(%addr, "connection read error");
            break;
        };
        let Some(envelope) = decode(&bytes) else {
            tracing::warn!(%addr, "dropping malformed frame");
            continue;
        };

        match &envelope.body {
            WireBody::Hello => {
                tracing::info!(sender = %envelope.sender, %addr, "node connected");
                let mut table = peers.lock().await;
                table.insert(envelope.sender.clone(), PeerEntry { tx: tx.clone(), dropped: false, delay: None });
                my_id = Some(envelope.sender.clone());
            }
            WireBody::Bye => {
                tracing::info!(sender = %envelope.sender, %addr, "node disconnected");
                break;
            }
            _ => {}
        }

        let (dropped, delay) = {
            let table = peers.lock().await;
            table.get(&envelope.sender).map(|p| (p.dropped, p.delay)).unwrap_or((false, None))
        };
        if dropped {
            continue;
        }

        fan_out(&peers, &envelope.sender, bytes.freeze(), delay).await;
    }

    if let Some(id) = my_id {
        peers.lock().await.remove(&id);
    }
    writer.abort();
}

/// Forwards `bytes` to every registered peer other than `from`, applying
/// `delay` (if any) as an artificial latency before delivery.
async fn fan_out(peers: &PeerTable, from: &AccountId, bytes: Bytes, delay: Option<Duration>) {
    let targets: Vec<_> = {
        let table = peers.lock().await;
        table.iter().filter(|(id, _)| *id != from).map(|(_, p)| p.tx.clone()).collect()
    };

    match delay {
        Some(d) => {
            tokio::spawn(async move {
                tokio::time::sleep(d).await;
                for tx in targets {
                    let _ = tx.send(bytes.clone());
                }
            });
        }
        None => {
            for tx in targets {
                let _ = tx.send(bytes.clone());
            }
        }
    }
}

/// Broadcasts a relay-issued `STEP` tick to every connected peer, unfiltered
/// by drop/delay (`STEP` is not subject to the per-sender fault injection —
/// only node-originated frames are).
async fn broadcast_step(peers: &PeerTable) {
    let envelope = WireEnvelope { sender: AccountId::new("relay"), body: WireBody::Step };
    let bytes = encode(&envelope);
    let table = peers.lock().await;
    for peer in table.values() {
        let _ = peer.tx.send(bytes.clone());
    }
}

async fn handle_admin(cmd: AdminCommand, peers: &PeerTable, auto_step: &AtomicBool, threshold: &Mutex<f64>) {
    match cmd {
        AdminCommand::Step => broadcast_step(peers).await,
        AdminCommand::Stop => {
            auto_step.store(false, Ordering::Relaxed);
            println!("auto-STEP stopped");
        }
        AdminCommand::Continue => {
            auto_step.store(true, Ordering::Relaxed);
            println!("auto-STEP resumed");
        }
        AdminCommand::Drop { id, action } => {
            let mut table = peers.lock().await;
            match table.get_mut(&id) {
                Some(peer) => {
                    peer.dropped = match action {
                        DropAction::On => true,
                        DropAction::Off => false,
                        DropAction::Toggle => !peer.dropped,
                    };
                    println!("drop {id} -> {}", peer.dropped);
                }
                None => println!("unknown node id: {id}"),
            }
        }
        AdminCommand::Delay { id, ms } => {
            let mut table = peers.lock().await;
            match table.get_mut(&id) {
                Some(peer) => {
                    peer.delay = ms.map(Duration::from_millis);
                    println!("delay {id} -> {:?}", peer.delay);
                }
                None => println!("unknown node id: {id}"),
            }
        }
        AdminCommand::Threshold(x) => {
            *threshold.lock().await = x;
            println!("threshold set to {x}");
        }
        AdminCommand::Detect => println!("detect: not implemented in this build"),
        AdminCommand::Attacks => println!("attacks: not implemented in this build"),
        AdminCommand::Exit => unreachable!("handled by the caller before dispatch"),
    }
}
