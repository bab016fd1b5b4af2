use crate::types::{BlockInfo, RuneBlockIndex};
use bitcoin::Transaction;

/// Hooks invoked around every block and transaction the indexer processes.
///
/// All methods default to doing nothing.
pub trait IndexerLifecycle: Send + Sync {
    fn before_block(&self, _block: &BlockInfo, _tx_count: usize) {}

    fn after_block(&self, _block: &BlockInfo, _index: &RuneBlockIndex) {}

    fn before_tx(&self, _block: &BlockInfo, _tx_index: u32, _tx: &Transaction) {}

    fn after_tx(&self, _block: &BlockInfo, _tx_index: u32, _tx: &Transaction) {}
}

/// Logs indexing progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLifecycle;

impl IndexerLifecycle for TracingLifecycle {
    fn before_block(&self, block: &BlockInfo, tx_count: usize) {
        tracing::debug!(height = block.height, hash = %block.hash, tx_count, "Indexing block");
    }

    fn after_block(&self, block: &BlockInfo, index: &RuneBlockIndex) {
        tracing::info!(
            height = block.height,
            hash = %block.hash,
            reorg = index.reorg,
            etchings = index.etchings.len(),
            mints = index.mint_counts.len(),
            balances = index.utxo_balances.len(),
            spent = index.spent_balances.len(),
            burned = index.burned_balances.len(),
            "Indexed block"
        );
    }

    fn before_tx(&self, block: &BlockInfo, tx_index: u32, tx: &Transaction) {
        tracing::trace!(
            height = block.height,
            tx_index,
            txid = %tx.compute_txid(),
            "Indexing transaction"
        );
    }
}
