//! Wire protocol shared by the node and relay binaries (spec.md §6).
//!
//! Defines the tagged-union frame both sides encode/decode: a sender-id
//! header the relay uses for its fan-out and drop/delay bookkeeping, plus
//! a message body mirroring the node's `InboundMessage`/`OutboundMessage`
//! contract. Encoding is the same canonical bincode form
//! `Block::canonical_bytes` uses for hashing, so a frame captured off the
//! wire and a block's hash preimage share one serialization rule.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::consensus::{InboundMessage, OutboundMessage};
use crate::types::{AccountId, Block, Transaction};

/// The frame actually sent over the wire: a sender-id header (used by the
/// relay for fan-out and drop/delay bookkeeping) plus the message body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub sender: AccountId,
    pub body: WireBody,
}

/// One variant per spec wire message type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum WireBody {
    Hello,
    Bye,
    Transaction(Transaction),
    Block(Block),
    SyncRequest,
    SyncResponse(Vec<Block>),
    Step,
    BlockVote { block_hash: String },
}

/// Encodes an envelope using the canonical bincode contract.
pub fn encode(envelope: &WireEnvelope) -> Bytes {
    let cfg = bincode::config::standard();
    Bytes::from(bincode::serde::encode_to_vec(envelope, cfg).expect("wire envelope always encodes"))
}

/// Decodes an envelope, returning `None` on a malformed frame (spec.md §7
/// "Malformed frame": log, drop frame, keep connection — the caller owns
/// the logging and connection lifecycle).
pub fn decode(buf: &BytesMut) -> Option<WireEnvelope> {
    let cfg = bincode::config::standard();
    bincode::serde::decode_from_slice(buf, cfg).map(|(v, _)| v).ok()
}

/// Translates a decoded envelope into an engine [`InboundMessage`], or
/// `None` for envelope kinds the engine does not consume directly (HELLO
/// and BYE are transport-level bookkeeping only).
pub fn to_inbound(envelope: WireEnvelope) -> Option<InboundMessage> {
    match envelope.body {
        WireBody::Hello | WireBody::Bye => None,
        WireBody::Transaction(tx) => Some(InboundMessage::Transaction(tx)),
        WireBody::Block(block) => Some(InboundMessage::Block(block)),
        WireBody::SyncRequest => Some(InboundMessage::SyncRequest { from: envelope.sender }),
        WireBody::SyncResponse(chain) => Some(InboundMessage::SyncResponse { from: envelope.sender, chain }),
        WireBody::Step => Some(InboundMessage::Step),
        WireBody::BlockVote { block_hash } => Some(InboundMessage::Vote { voter: envelope.sender, block_hash }),
    }
}

/// Wraps an engine [`OutboundMessage`] into a wire envelope addressed from
/// `self_id`.
pub fn from_outbound(self_id: AccountId, msg: OutboundMessage) -> WireEnvelope {
    let body = match msg {
        OutboundMessage::Transaction(tx) => WireBody::Transaction(tx),
        OutboundMessage::Block(block) => WireBody::Block(block),
        OutboundMessage::Vote { voter: _, block_hash } => WireBody::BlockVote { block_hash },
        OutboundMessage::SyncRequest => WireBody::SyncRequest,
        OutboundMessage::SyncResponse { to: _, chain } => WireBody::SyncResponse(chain),
    };
    WireEnvelope { sender: self_id, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockHeader, TxKind};

    fn dummy_block() -> Block {
        let header = BlockHeader {
            index: 1,
            prev_hash: Block::genesis().hash,
            validator: AccountId::new("node1"),
            timestamp: 1.0,
        };
        let mut b = Block { header, transactions: vec![], hash: String::new() };
        b.hash = b.compute_hash();
        b
    }

    #[test]
    fn block_envelope_roundtrips_through_encode_decode() {
        let envelope = WireEnvelope { sender: AccountId::new("node1"), body: WireBody::Block(dummy_block()) };
        let bytes = encode(&envelope);
        let decoded = decode(&BytesMut::from(&bytes[..])).expect("decode");
        match decoded.body {
            WireBody::Block(b) => assert_eq!(b.hash, dummy_block().hash),
            other => panic!("expected Block, got {other:?}"),
        }
    }

    #[test]
    fn sync_request_carries_sender_into_inbound_message() {
        let envelope = WireEnvelope { sender: AccountId::new("node2"), body: WireBody::SyncRequest };
        let inbound = to_inbound(envelope).expect("sync request maps to inbound message");
        match inbound {
            InboundMessage::SyncRequest { from } => assert_eq!(from, AccountId::new("node2")),
            other => panic!("expected SyncRequest, got {other:?}"),
        }
    }

    #[test]
    fn hello_and_bye_do_not_produce_inbound_messages() {
        let hello = WireEnvelope { sender: AccountId::new("node1"), body: WireBody::Hello };
        let bye = WireEnvelope { sender: AccountId::new("node1"), body: WireBody::Bye };
        assert!(to_inbound(hello).is_none());
        assert!(to_inbound(bye).is_none());
    }

    #[test]
    fn transaction_body_roundtrips() {
        let tx = Transaction {
            sender: AccountId::new("a"),
            receiver: AccountId::new("b"),
            amount: 1.0,
            timestamp: 1.0,
            kind: TxKind::Transfer,
        };
        let envelope = WireEnvelope { sender: AccountId::new("a"), body: WireBody::Transaction(tx.clone()) };
        let bytes = encode(&envelope);
        let decoded = decode(&BytesMut::from(&bytes[..])).expect("decode");
        match decoded.body {
            WireBody::Transaction(decoded_tx) => assert_eq!(decoded_tx, tx),
            other => panic!("expected Transaction, got {other:?}"),
        }
    }
}
