//! Relay transport: length-delimited framed messages over a TCP connection
//! to the relay, decoded/encoded with `chain::wire`'s canonical contract.
//!
//! A reader task turns incoming frames into [`chain::InboundMessage`]s on
//! an inbound channel; a writer task drains an outbound channel of
//! [`chain::OutboundMessage`]s onto the socket. Both channels are plain
//! `tokio::sync::mpsc` single-producer/single-consumer queues at the task
//! boundary; the consensus loop is the only consumer of the inbound side
//! and the only producer of the outbound side.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use chain::wire::{WireBody, WireEnvelope, decode, encode, from_outbound, to_inbound};
use chain::{AccountId, InboundMessage, OutboundMessage};

/// Runs the transport: connects to the relay, sends HELLO, then shuttles
/// frames between the socket and the inbound/outbound channels until the
/// connection drops, at which point it reconnects with bounded exponential
/// backoff (spec §7 "Transport error"). Fires a BYE frame and returns when
/// `shutdown` is notified (spec §5 shutdown sequence).
pub async fn run(
    relay_addr: String,
    self_id: AccountId,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    shutdown: Arc<Notify>,
) {
    let mut backoff = Duration::from_millis(250);
    const MAX_BACKOFF: Duration = Duration::from_secs(30);

    loop {
        tracing::info!(addr = %relay_addr, "connecting to relay");
        let stream = match TcpStream::connect(&relay_addr).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(addr = %relay_addr, error = %e, backoff_ms = backoff.as_millis(), "relay connection failed");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        };
        backoff = Duration::from_millis(250);
        tracing::info!(addr = %relay_addr, "connected to relay");

        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
        let hello = encode(&WireEnvelope { sender: self_id.clone(), body: WireBody::Hello });
        if framed.send(hello).await.is_err() {
            continue;
        }

        loop {
            tokio::select! {
                frame = framed.next() => {
                    match frame {
                        Some(Ok(bytes)) => {
                            let Some(envelope) = decode(&bytes) else {
                                tracing::warn!("dropping malformed frame from relay");
                                continue;
                            };
                            if let Some(msg) = to_inbound(envelope) {
                                if inbound_tx.send(msg).is_err() {
                                    return;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "relay read error, reconnecting");
                            break;
                        }
                        None => {
                            tracing::warn!("relay closed connection, reconnecting");
                            break;
                        }
                    }
                }
                outbound = outbound_rx.recv() => {
                    match outbound {
                        Some(msg) => {
                            let envelope = from_outbound(self_id.clone(), msg);
                            if framed.send(encode(&envelope)).await.is_err() {
                                break;
                            }
                        }
                        None => return,
                    }
                }
                _ = shutdown.notified() => {
                    let bye = encode(&WireEnvelope { sender: self_id.clone(), body: WireBody::Bye });
                    let _ = framed.send(bye).await;
                    tracing::info!("sent BYE, closing relay connection");
                    return;
                }
            }
        }
    }
}
