//! Types for the rune indexer.

use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, OutPoint, ScriptBuf, Txid};
use serde::{Deserialize, Serialize};
use subcoin_runes::{Rune, RuneId, SpacedRune, Terms};

/// Height and hash of an indexed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIdentifier {
    pub height: u32,
    pub hash: BlockHash,
}

/// Block being indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u32,
    pub hash: BlockHash,
    pub previous_hash: BlockHash,
    /// Block timestamp.
    pub time: u32,
}

impl BlockInfo {
    pub fn identifier(&self) -> BlockIdentifier {
        BlockIdentifier {
            height: self.height,
            hash: self.hash,
        }
    }
}

/// A rune etching.
///
/// Etchings made by cenotaphs are recorded with `valid = false` so that their name stays taken,
/// but they carry no supply and cannot be minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuneEtching {
    pub valid: bool,
    pub rune_id: RuneId,
    pub rune: SpacedRune,
    /// Etching transaction.
    pub txid: Txid,
    pub divisibility: Option<u8>,
    pub premine: Option<u128>,
    pub symbol: Option<char>,
    pub terms: Option<Terms>,
    pub turbo: bool,
}

impl RuneEtching {
    /// Etching recorded for a cenotaph.
    pub fn invalid(rune_id: RuneId, rune: Rune, txid: Txid) -> Self {
        Self {
            valid: false,
            rune_id,
            rune: SpacedRune::new(rune, 0),
            txid,
            divisibility: None,
            premine: None,
            symbol: None,
            terms: None,
            turbo: false,
        }
    }
}

/// Amount of one rune held by an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuneUtxoBalance {
    pub txid: Txid,
    pub vout: u32,
    pub rune_id: RuneId,
    pub amount: u128,
    /// Value of the output in satoshis.
    pub sat_value: u64,
    pub script_pubkey: ScriptBuf,
    pub address: Option<String>,
    /// Height of the block that created the output.
    pub block_height: u32,
}

impl RuneUtxoBalance {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid,
            vout: self.vout,
        }
    }
}

/// A balance consumed by a transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuneSpentUtxoBalance {
    pub balance: RuneUtxoBalance,
    pub spent_txid: Txid,
}

/// Number of successful mints of a rune within one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuneMintCount {
    pub rune_id: RuneId,
    pub count: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuneBalance {
    pub rune_id: RuneId,
    pub amount: u128,
}

/// Everything a block changed, persisted atomically by [`crate::RuneStorage::save_block_index`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuneBlockIndex {
    pub block: BlockInfo,
    /// Whether the block replaces a block at the same height after a reorg.
    pub reorg: bool,
    pub etchings: Vec<RuneEtching>,
    pub mint_counts: Vec<RuneMintCount>,
    pub utxo_balances: Vec<RuneUtxoBalance>,
    pub spent_balances: Vec<RuneSpentUtxoBalance>,
    pub burned_balances: Vec<RuneBalance>,
}

/// Whether an update pass is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexerState {
    #[default]
    Idle,
    Running,
}

/// `UNCOMMON•GOODS`, the rune etched by protocol at `1:0`.
///
/// Anyone may mint one unit per transaction between heights 840000 and 1050000.
pub fn genesis_etching() -> RuneEtching {
    RuneEtching {
        valid: true,
        rune_id: RuneId { block: 1, tx: 0 },
        rune: SpacedRune::new(Rune(2055900680524219742), 0b1000_0000),
        txid: Txid::all_zeros(),
        divisibility: Some(0),
        premine: Some(0),
        symbol: Some('\u{29C9}'),
        terms: Some(Terms {
            amount: Some(1),
            cap: Some(u128::MAX),
            height: (Some(840_000), Some(1_050_000)),
            offset: (None, None),
        }),
        turbo: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_rune_name() {
        let etching = genesis_etching();
        assert_eq!(etching.rune.to_string(), "UNCOMMON•GOODS");
        assert_eq!(etching.rune_id.to_string(), "1:0");
    }
}
