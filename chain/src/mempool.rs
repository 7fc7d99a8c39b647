//! The pending-transaction pool.
//!
//! FIFO ordering with O(1) duplicate detection: a [`VecDeque`] carries
//! insertion order while a side [`HashSet`] of transaction identities
//! rejects repeats without a linear scan.

use std::collections::{HashSet, VecDeque};

use crate::consensus::proposer::TxPool;
use crate::types::{Transaction, WalletState};

/// The pool of transactions waiting to be included in a block.
#[derive(Default)]
pub struct Mempool {
    queue: VecDeque<Transaction>,
    seen: HashSet<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, tx: &Transaction) -> bool {
        self.seen.contains(tx)
    }

    /// Inserts `tx` at the back of the queue. Returns `false` (and silently
    /// suppresses the insert) if an identical transaction is already
    /// present, per the mempool's duplicate-suppression rule.
    pub fn insert(&mut self, tx: Transaction) -> bool {
        if self.seen.contains(&tx) {
            return false;
        }
        self.seen.insert(tx.clone());
        self.queue.push_back(tx);
        true
    }

    /// Removes every transaction in `txs` from the pool (called once a
    /// block containing them has been finalized).
    pub fn remove_all(&mut self, txs: &[Transaction]) {
        for tx in txs {
            self.seen.remove(tx);
        }
        self.queue.retain(|queued| !txs.contains(queued));
    }

    /// Reinjects transactions discarded from a losing branch during a
    /// reorg (law R1), skipping anything already in the mempool or present
    /// on the new active branch.
    pub fn reinject(&mut self, txs: Vec<Transaction>, active_chain: &HashSet<Transaction>) {
        for tx in txs {
            if active_chain.contains(&tx) {
                continue;
            }
            self.insert(tx);
        }
    }

    /// Drains up to `max_txs` applicable transactions in FIFO order,
    /// skipping (not aborting on) any transaction that is not applicable
    /// against `wallet` at the point it is drawn, and respecting
    /// `max_bytes` as a soft cap on the serialized size of the draw.
    pub fn select_for_block(&mut self, max_txs: usize, max_bytes: usize, wallet: &WalletState) -> Vec<Transaction> {
        let mut selected = Vec::new();
        let mut working = wallet.clone();
        let mut size_estimate = 0usize;
        let mut skipped = VecDeque::new();

        while selected.len() < max_txs {
            let Some(tx) = self.queue.pop_front() else {
                break;
            };

            if !working.is_applicable(&tx) {
                skipped.push_back(tx);
                continue;
            }

            let cfg = bincode::config::standard();
            let tx_size = bincode::serde::encode_to_vec(&tx, cfg).map(|b| b.len()).unwrap_or(0);
            if size_estimate + tx_size > max_bytes && !selected.is_empty() {
                self.queue.push_front(tx);
                break;
            }

            working.apply(&tx).expect("checked applicable above");
            size_estimate += tx_size;
            self.seen.remove(&tx);
            selected.push(tx);
        }

        // Put back anything we pulled but skipped, preserving FIFO order.
        while let Some(tx) = skipped.pop_back() {
            self.queue.push_front(tx);
        }

        selected
    }
}

impl TxPool for Mempool {
    fn select_for_block(&mut self, max_txs: usize, max_bytes: usize, wallet: &WalletState) -> Vec<Transaction> {
        Mempool::select_for_block(self, max_txs, max_bytes, wallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, TxKind};

    fn tx(sender: &str, amount: f64, ts: f64) -> Transaction {
        Transaction {
            sender: AccountId::new(sender),
            receiver: AccountId::new("dest"),
            amount,
            timestamp: ts,
            kind: TxKind::Transfer,
        }
    }

    #[test]
    fn insert_rejects_duplicates() {
        let mut pool = Mempool::new();
        assert!(pool.insert(tx("a", 1.0, 1.0)));
        assert!(!pool.insert(tx("a", 1.0, 1.0)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn select_for_block_respects_fifo_order() {
        let mut pool = Mempool::new();
        pool.insert(tx("a", 1.0, 1.0));
        pool.insert(tx("a", 2.0, 2.0));

        let mut wallet = WalletState::new();
        wallet.0.insert(AccountId::new("a"), crate::types::WalletAccount { balance: 100.0, stake: 0.0 });

        let selected = pool.select_for_block(10, 1_000_000, &wallet);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].amount, 1.0);
        assert_eq!(selected[1].amount, 2.0);
    }

    #[test]
    fn select_for_block_skips_non_applicable_without_aborting() {
        let mut pool = Mempool::new();
        pool.insert(tx("a", 1000.0, 1.0)); // will not be applicable
        pool.insert(tx("a", 5.0, 2.0));

        let mut wallet = WalletState::new();
        wallet.0.insert(AccountId::new("a"), crate::types::WalletAccount { balance: 10.0, stake: 0.0 });

        let selected = pool.select_for_block(10, 1_000_000, &wallet);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].amount, 5.0);
    }

    #[test]
    fn reinject_skips_transactions_already_on_active_chain() {
        let mut pool = Mempool::new();
        let discarded = tx("a", 1.0, 1.0);
        let mut active = HashSet::new();
        active.insert(discarded.clone());

        pool.reinject(vec![discarded.clone()], &active);
        assert!(!pool.contains(&discarded));
    }

    #[test]
    fn reinject_restores_transactions_not_on_active_chain() {
        let mut pool = Mempool::new();
        let discarded = tx("a", 1.0, 1.0);

        pool.reinject(vec![discarded.clone()], &HashSet::new());
        assert!(pool.contains(&discarded));
    }
}
