//! In-memory rune storage.

use crate::error::{Error, Result};
use crate::storage::RuneStorage;
use crate::types::{
    BlockIdentifier, RuneBalance, RuneBlockIndex, RuneEtching, RuneMintCount, RuneUtxoBalance,
};
use bitcoin::{BlockHash, OutPoint, Txid};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use subcoin_runes::{Rune, RuneId};

#[derive(Debug, Clone)]
struct StoredEtching {
    /// `None` for seeded etchings.
    height: Option<u32>,
    etching: RuneEtching,
}

#[derive(Debug, Clone)]
struct StoredBalance {
    balance: RuneUtxoBalance,
    spent: Option<(Txid, u32)>,
}

#[derive(Debug, Default)]
struct State {
    blocks: BTreeMap<u32, BlockHash>,
    etchings: BTreeMap<RuneId, StoredEtching>,
    mints: BTreeMap<(RuneId, u32), u128>,
    outputs: HashMap<OutPoint, Vec<StoredBalance>>,
    burned: BTreeMap<(u32, RuneId), u128>,
}

impl State {
    /// Drops everything indexed above `tip`, or everything indexed when `tip` is `None`.
    fn revert(&mut self, tip: Option<u32>) {
        let above = |height: u32| tip.is_none_or(|tip| height > tip);

        self.blocks.retain(|height, _| !above(*height));
        self.etchings
            .retain(|_, stored| stored.height.is_none_or(|height| !above(height)));
        self.mints.retain(|(_, height), _| !above(*height));
        self.burned.retain(|(height, _), _| !above(*height));

        self.outputs.retain(|_, balances| {
            balances.retain(|stored| !above(stored.balance.block_height));
            !balances.is_empty()
        });

        for stored in self.outputs.values_mut().flatten() {
            if stored.spent.is_some_and(|(_, height)| above(height)) {
                stored.spent = None;
            }
        }
    }
}

/// [`RuneStorage`] keeping everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    state: RwLock<State>,
    connected: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// All unspent balances, ordered by outpoint.
    pub fn unspent_balances(&self) -> Vec<RuneUtxoBalance> {
        let state = self.state.read();
        let mut balances = state
            .outputs
            .values()
            .flatten()
            .filter(|stored| stored.spent.is_none())
            .map(|stored| stored.balance.clone())
            .collect::<Vec<_>>();
        balances.sort_by_key(|balance| (balance.outpoint(), balance.rune_id));
        balances
    }

    /// Total unspent supply of `rune_id`.
    pub fn circulating(&self, rune_id: &RuneId) -> u128 {
        self.unspent_balances()
            .iter()
            .filter(|balance| balance.rune_id == *rune_id)
            .map(|balance| balance.amount)
            .sum()
    }

    /// Total amount of `rune_id` burned so far.
    pub fn burned(&self, rune_id: &RuneId) -> u128 {
        self.state
            .read()
            .burned
            .iter()
            .filter(|((_, id), _)| id == rune_id)
            .map(|(_, amount)| *amount)
            .sum()
    }

    pub fn etchings(&self) -> Vec<RuneEtching> {
        self.state
            .read()
            .etchings
            .values()
            .map(|stored| stored.etching.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl RuneStorage for InMemoryStorage {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn get_current_block(&self) -> Result<Option<BlockIdentifier>> {
        Ok(self
            .state
            .read()
            .blocks
            .last_key_value()
            .map(|(height, hash)| BlockIdentifier {
                height: *height,
                hash: *hash,
            }))
    }

    async fn get_block_hash(&self, height: u32) -> Result<Option<BlockHash>> {
        Ok(self.state.read().blocks.get(&height).copied())
    }

    async fn reset_current_block(&self, block: Option<&BlockIdentifier>) -> Result<()> {
        self.state.write().revert(block.map(|block| block.height));
        Ok(())
    }

    async fn seed_etchings(&self, etchings: &[RuneEtching]) -> Result<()> {
        let mut state = self.state.write();
        for etching in etchings {
            state
                .etchings
                .entry(etching.rune_id)
                .or_insert_with(|| StoredEtching {
                    height: None,
                    etching: etching.clone(),
                });
        }
        Ok(())
    }

    async fn save_block_index(&self, index: &RuneBlockIndex) -> Result<()> {
        let mut state = self.state.write();
        let height = index.block.height;

        if index.reorg {
            state.revert(height.checked_sub(1));
        }

        state.blocks.insert(height, index.block.hash);

        for etching in &index.etchings {
            state.etchings.insert(
                etching.rune_id,
                StoredEtching {
                    height: Some(height),
                    etching: etching.clone(),
                },
            );
        }

        for RuneMintCount { rune_id, count } in &index.mint_counts {
            state.mints.insert((*rune_id, height), *count);
        }

        for spent in &index.spent_balances {
            let stored = state
                .outputs
                .get_mut(&spent.balance.outpoint())
                .and_then(|balances| {
                    balances
                        .iter_mut()
                        .find(|stored| stored.balance.rune_id == spent.balance.rune_id)
                });

            if let Some(stored) = stored {
                stored.spent = Some((spent.spent_txid, height));
            }
        }

        for balance in &index.utxo_balances {
            state
                .outputs
                .entry(balance.outpoint())
                .or_default()
                .push(StoredBalance {
                    balance: balance.clone(),
                    spent: None,
                });
        }

        for RuneBalance { rune_id, amount } in &index.burned_balances {
            state.burned.insert((height, *rune_id), *amount);
        }

        Ok(())
    }

    async fn get_etching(&self, rune_id: &RuneId, height: u32) -> Result<Option<RuneEtching>> {
        Ok(self
            .state
            .read()
            .etchings
            .get(rune_id)
            .filter(|stored| stored.height.is_none_or(|etched_at| etched_at <= height))
            .map(|stored| stored.etching.clone()))
    }

    async fn get_valid_mint_count(&self, rune_id: &RuneId, height: u32) -> Result<u128> {
        self.state
            .read()
            .mints
            .range((*rune_id, 0)..=(*rune_id, height))
            .try_fold(0u128, |total, (_, count)| total.checked_add(*count))
            .ok_or(Error::BalanceOverflow(*rune_id))
    }

    async fn get_rune_location(&self, rune: &Rune) -> Result<Option<RuneId>> {
        Ok(self
            .state
            .read()
            .etchings
            .values()
            .find(|stored| stored.etching.rune.rune == *rune)
            .map(|stored| stored.etching.rune_id))
    }

    async fn get_utxo_balance(&self, outpoint: &OutPoint) -> Result<Vec<RuneUtxoBalance>> {
        Ok(self
            .state
            .read()
            .outputs
            .get(outpoint)
            .map(|balances| {
                balances
                    .iter()
                    .filter(|stored| stored.spent.is_none())
                    .map(|stored| stored.balance.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}
