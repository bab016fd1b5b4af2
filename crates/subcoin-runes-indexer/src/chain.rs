use crate::error::Result;
use bitcoin::{Block, BlockHash, Network, Transaction, Txid};

/// Header metadata of a block known to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeaderInfo {
    pub height: u32,
    pub previous_hash: Option<BlockHash>,
}

/// A transaction and the block it was confirmed in, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransactionInfo {
    pub transaction: Transaction,
    pub blockhash: Option<BlockHash>,
}

/// Source of blocks and transactions, typically a Bitcoin Core node.
#[async_trait::async_trait]
pub trait ChainSource: Send + Sync {
    /// Network the node runs on.
    async fn get_network(&self) -> Result<Network>;

    /// Hash of the best chain block at `height`, `None` above the tip.
    async fn get_block_hash(&self, height: u32) -> Result<Option<BlockHash>>;

    async fn get_block(&self, hash: &BlockHash) -> Result<Block>;

    async fn get_block_header_info(&self, hash: &BlockHash) -> Result<BlockHeaderInfo>;

    async fn get_raw_transaction_info(&self, txid: &Txid) -> Result<RawTransactionInfo>;
}
