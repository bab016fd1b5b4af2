use crate::error::Result;
use crate::types::{BlockIdentifier, RuneBlockIndex, RuneEtching, RuneUtxoBalance};
use bitcoin::{BlockHash, OutPoint};
use subcoin_runes::{Rune, RuneId};

/// Persistent rune state.
///
/// Storage is the system of record for everything indexed in earlier blocks. The updater reads
/// from it while processing a block and writes the block's [`RuneBlockIndex`] in one call.
#[async_trait::async_trait]
pub trait RuneStorage: Send + Sync {
    /// Called when the indexer starts.
    async fn connect(&self) -> Result<()>;

    /// Called when the indexer stops.
    async fn disconnect(&self) -> Result<()>;

    /// Most recently indexed block.
    async fn get_current_block(&self) -> Result<Option<BlockIdentifier>>;

    /// Hash of the indexed block at `height`.
    async fn get_block_hash(&self, height: u32) -> Result<Option<BlockHash>>;

    /// Unindexes every block above `block`, or every block when `block` is `None`.
    ///
    /// Outputs spent above the new tip become unspent again. Seeded etchings are kept.
    async fn reset_current_block(&self, block: Option<&BlockIdentifier>) -> Result<()>;

    /// Inserts predefined etchings that are not already present.
    async fn seed_etchings(&self, etchings: &[RuneEtching]) -> Result<()>;

    /// Persists a block atomically.
    ///
    /// When `index.reorg` is set, anything previously stored at or above the block's height is
    /// replaced.
    async fn save_block_index(&self, index: &RuneBlockIndex) -> Result<()>;

    /// Etching of `rune_id`, if it was etched at or below `height`.
    async fn get_etching(&self, rune_id: &RuneId, height: u32) -> Result<Option<RuneEtching>>;

    /// Number of mints of `rune_id` in blocks at or below `height`.
    async fn get_valid_mint_count(&self, rune_id: &RuneId, height: u32) -> Result<u128>;

    /// Id of the etching that claimed `rune`.
    async fn get_rune_location(&self, rune: &Rune) -> Result<Option<RuneId>>;

    /// Rune balances of an unspent output.
    async fn get_utxo_balance(&self, outpoint: &OutPoint) -> Result<Vec<RuneUtxoBalance>>;
}
