//! Per-block rune ledger.
//!
//! [`RuneUpdater`] applies the runestone of every transaction of one block, in order, to the rune
//! balances carried by transaction outputs. Balances created and spent within the block never
//! reach storage, everything else is accumulated into a [`RuneBlockIndex`] saved once the block
//! is complete.

use crate::chain::ChainSource;
use crate::error::{Error, Result};
use crate::storage::RuneStorage;
use crate::types::{
    BlockInfo, RuneBalance, RuneBlockIndex, RuneEtching, RuneMintCount, RuneSpentUtxoBalance,
    RuneUtxoBalance,
};
use bitcoin::{Address, Network, OutPoint, Transaction, Txid};
use indexmap::IndexMap;
use std::collections::HashSet;
use subcoin_runes::{
    Artifact, COMMIT_CONFIRMATIONS, Edict, Rune, RuneId, Runestone, SpacedRune,
};

type Balances = IndexMap<RuneId, u128>;

fn credit(balances: &mut Balances, rune_id: RuneId, amount: u128) -> Result<()> {
    let balance = balances.entry(rune_id).or_default();
    *balance = balance
        .checked_add(amount)
        .ok_or(Error::BalanceOverflow(rune_id))?;
    Ok(())
}

/// Moves `amount` out of `balance` into `output`.
fn allocate(balance: &mut u128, amount: u128, rune_id: RuneId, output: &mut Balances) -> Result<()> {
    if amount > 0 {
        *balance = balance
            .checked_sub(amount)
            .ok_or(Error::BalanceUnderflow(rune_id))?;
        credit(output, rune_id, amount)?;
    }
    Ok(())
}

pub struct RuneUpdater<'a, S: ?Sized, C: ?Sized> {
    network: Network,
    block: BlockInfo,
    reorg: bool,
    minimum: Rune,
    storage: &'a S,
    chain: &'a C,
    etchings: Vec<RuneEtching>,
    mint_counts: IndexMap<RuneId, u128>,
    /// Unspent balances created in this block.
    outputs: IndexMap<OutPoint, Vec<RuneUtxoBalance>>,
    spent_balances: Vec<RuneSpentUtxoBalance>,
    spent: HashSet<OutPoint>,
    burned: Balances,
}

impl<'a, S, C> RuneUpdater<'a, S, C>
where
    S: RuneStorage + ?Sized,
    C: ChainSource + ?Sized,
{
    pub fn new(network: Network, block: BlockInfo, reorg: bool, storage: &'a S, chain: &'a C) -> Self {
        Self {
            network,
            block,
            reorg,
            minimum: Rune::minimum_at_height(network, block.height),
            storage,
            chain,
            etchings: Vec::new(),
            mint_counts: IndexMap::new(),
            outputs: IndexMap::new(),
            spent_balances: Vec::new(),
            spent: HashSet::new(),
            burned: IndexMap::new(),
        }
    }

    /// Applies the runestone of `tx`, the `tx_index`-th transaction of the block.
    pub async fn index_runes(&mut self, tx_index: u32, tx: &Transaction) -> Result<()> {
        let txid = tx.compute_txid();
        let artifact = Runestone::decipher(tx);
        let mut unallocated = self.unallocated(txid, tx).await?;
        let mut allocated = vec![Balances::new(); tx.output.len()];

        if let Some(artifact) = &artifact {
            if let Some(id) = artifact.mint() {
                if let Some(amount) = self.mint(id).await? {
                    credit(&mut unallocated, id, amount)?;
                }
            }

            let etched = self.etched(tx_index, tx, artifact).await?;

            if let Artifact::Runestone(runestone) = artifact {
                if let Some((id, _)) = etched {
                    let premine = runestone
                        .etching
                        .and_then(|etching| etching.premine)
                        .unwrap_or_default();
                    credit(&mut unallocated, id, premine)?;
                }

                for Edict { id, amount, output } in runestone.edicts.iter().copied() {
                    let id = if id == RuneId::default() {
                        match etched {
                            Some((id, _)) => id,
                            None => continue,
                        }
                    } else {
                        id
                    };

                    let Some(balance) = unallocated.get_mut(&id) else {
                        continue;
                    };

                    let Ok(output) = usize::try_from(output) else {
                        continue;
                    };

                    if output == tx.output.len() {
                        let destinations = tx
                            .output
                            .iter()
                            .enumerate()
                            .filter(|(_, txout)| !txout.script_pubkey.is_op_return())
                            .map(|(vout, _)| vout)
                            .collect::<Vec<_>>();

                        if destinations.is_empty() {
                            continue;
                        }

                        if amount == 0 {
                            let count = destinations.len() as u128;
                            let share = *balance / count;
                            let remainder = *balance % count;

                            for (vout, position) in destinations.into_iter().zip(0u128..) {
                                let amount = share + u128::from(position < remainder);
                                allocate(balance, amount, id, &mut allocated[vout])?;
                            }
                        } else {
                            for vout in destinations {
                                let amount = amount.min(*balance);
                                allocate(balance, amount, id, &mut allocated[vout])?;
                            }
                        }
                    } else if let Some(target) = allocated.get_mut(output) {
                        let amount = if amount == 0 {
                            *balance
                        } else {
                            amount.min(*balance)
                        };
                        allocate(balance, amount, id, target)?;
                    }
                }
            }

            if let Some((id, rune)) = etched {
                self.create_etching(txid, artifact, id, rune);
            }
        }

        let mut burned = Balances::new();

        if let Some(Artifact::Cenotaph(_)) = &artifact {
            for (id, balance) in unallocated {
                if balance > 0 {
                    credit(&mut burned, id, balance)?;
                }
            }
        } else {
            let pointer = match &artifact {
                Some(Artifact::Runestone(runestone)) => runestone.pointer,
                _ => None,
            };

            let vout = pointer
                .and_then(|pointer| usize::try_from(pointer).ok())
                .filter(|pointer| *pointer < allocated.len())
                .or_else(|| {
                    tx.output
                        .iter()
                        .position(|txout| !txout.script_pubkey.is_op_return())
                });

            for (id, balance) in unallocated {
                if balance == 0 {
                    continue;
                }
                match vout {
                    Some(vout) => credit(&mut allocated[vout], id, balance)?,
                    None => credit(&mut burned, id, balance)?,
                }
            }
        }

        for ((balances, txout), vout) in allocated.into_iter().zip(&tx.output).zip(0u32..) {
            if balances.is_empty() {
                continue;
            }

            if txout.script_pubkey.is_op_return() {
                for (id, amount) in balances {
                    credit(&mut burned, id, amount)?;
                }
                continue;
            }

            let address = Address::from_script(&txout.script_pubkey, self.network)
                .ok()
                .map(|address| address.to_string());

            let entry = self.outputs.entry(OutPoint { txid, vout }).or_default();

            for (rune_id, amount) in balances {
                entry.push(RuneUtxoBalance {
                    txid,
                    vout,
                    rune_id,
                    amount,
                    sat_value: txout.value.to_sat(),
                    script_pubkey: txout.script_pubkey.clone(),
                    address: address.clone(),
                    block_height: self.block.height,
                });
            }
        }

        for (id, amount) in burned {
            credit(&mut self.burned, id, amount)?;
        }

        Ok(())
    }

    /// Everything the block changed.
    pub fn into_block_index(self) -> RuneBlockIndex {
        RuneBlockIndex {
            block: self.block,
            reorg: self.reorg,
            etchings: self.etchings,
            mint_counts: self
                .mint_counts
                .into_iter()
                .map(|(rune_id, count)| RuneMintCount { rune_id, count })
                .collect(),
            utxo_balances: self.outputs.into_values().flatten().collect(),
            spent_balances: self.spent_balances,
            burned_balances: self
                .burned
                .into_iter()
                .map(|(rune_id, amount)| RuneBalance { rune_id, amount })
                .collect(),
        }
    }

    /// Sums the balances of every output spent by `tx`.
    async fn unallocated(&mut self, txid: Txid, tx: &Transaction) -> Result<Balances> {
        let mut unallocated = Balances::new();

        if tx.is_coinbase() {
            return Ok(unallocated);
        }

        for input in &tx.input {
            let outpoint = input.previous_output;

            // Outputs created earlier in this block were never persisted.
            if let Some(balances) = self.outputs.shift_remove(&outpoint) {
                for balance in balances {
                    credit(&mut unallocated, balance.rune_id, balance.amount)?;
                }
                continue;
            }

            if !self.spent.insert(outpoint) {
                continue;
            }

            for balance in self.storage.get_utxo_balance(&outpoint).await? {
                credit(&mut unallocated, balance.rune_id, balance.amount)?;
                self.spent_balances.push(RuneSpentUtxoBalance {
                    balance,
                    spent_txid: txid,
                });
            }
        }

        Ok(unallocated)
    }

    async fn load_etching(&self, rune_id: &RuneId) -> Result<Option<RuneEtching>> {
        if let Some(etching) = self.etchings.iter().find(|etching| etching.rune_id == *rune_id) {
            return Ok(Some(etching.clone()));
        }

        self.storage.get_etching(rune_id, self.block.height).await
    }

    /// Returns the amount minted, or `None` if the mint is not allowed.
    async fn mint(&mut self, id: RuneId) -> Result<Option<u128>> {
        let Some(etching) = self.load_etching(&id).await? else {
            return Ok(None);
        };

        if !etching.valid {
            return Ok(None);
        }

        let Some(terms) = etching.terms else {
            return Ok(None);
        };

        if !terms.is_open(id.block, u64::from(self.block.height)) {
            return Ok(None);
        }

        let cap = terms.cap.unwrap_or_default();
        let minted_in_block = self.mint_counts.get(&id).copied().unwrap_or_default();
        let minted = self
            .storage
            .get_valid_mint_count(&id, self.block.height)
            .await?
            .checked_add(minted_in_block)
            .ok_or(Error::BalanceOverflow(id))?;

        if minted >= cap {
            return Ok(None);
        }

        self.mint_counts.insert(id, minted_in_block + 1);

        Ok(Some(terms.amount.unwrap_or_default()))
    }

    /// Returns the id and name of the rune etched by `tx`, if any.
    async fn etched(
        &self,
        tx_index: u32,
        tx: &Transaction,
        artifact: &Artifact,
    ) -> Result<Option<(RuneId, Rune)>> {
        let Some(rune) = artifact.etching() else {
            return Ok(None);
        };

        let rune = match rune {
            Some(rune) => {
                if rune < self.minimum
                    || rune.is_reserved()
                    || self.is_etched(rune).await?
                    || !self.tx_commits_to_rune(tx, rune).await?
                {
                    return Ok(None);
                }
                rune
            }
            None => Rune::reserved(u64::from(self.block.height), tx_index),
        };

        let id = RuneId {
            block: u64::from(self.block.height),
            tx: tx_index,
        };

        Ok(Some((id, rune)))
    }

    async fn is_etched(&self, rune: Rune) -> Result<bool> {
        if self.etchings.iter().any(|etching| etching.rune.rune == rune) {
            return Ok(true);
        }

        Ok(self.storage.get_rune_location(&rune).await?.is_some())
    }

    /// Whether some input reveals the commitment to `rune` from a mature taproot output.
    async fn tx_commits_to_rune(&self, tx: &Transaction, rune: Rune) -> Result<bool> {
        let commitment = rune.commitment();

        for input in &tx.input {
            let Some(tapscript) = input.witness.taproot_leaf_script().map(|leaf| leaf.script) else {
                continue;
            };

            for instruction in tapscript.instructions() {
                let Ok(instruction) = instruction else {
                    break;
                };

                let Some(pushed) = instruction.push_bytes() else {
                    continue;
                };

                if pushed.as_bytes() != commitment.as_slice() {
                    continue;
                }

                let outpoint = input.previous_output;
                let info = self.chain.get_raw_transaction_info(&outpoint.txid).await?;

                let taproot = usize::try_from(outpoint.vout)
                    .ok()
                    .and_then(|vout| info.transaction.output.get(vout))
                    .ok_or(Error::MissingOutput(outpoint))?
                    .script_pubkey
                    .is_p2tr();

                if !taproot {
                    continue;
                }

                let Some(blockhash) = info.blockhash else {
                    continue;
                };

                let commit_height = self.chain.get_block_header_info(&blockhash).await?.height;
                let confirmations = self
                    .block
                    .height
                    .checked_sub(commit_height)
                    .map_or(0, |depth| depth + 1);

                if confirmations >= COMMIT_CONFIRMATIONS {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    fn create_etching(&mut self, txid: Txid, artifact: &Artifact, rune_id: RuneId, rune: Rune) {
        let etching = match artifact {
            Artifact::Runestone(Runestone {
                etching: Some(etching),
                ..
            }) => RuneEtching {
                valid: true,
                rune_id,
                rune: SpacedRune::new(rune, etching.spacers.unwrap_or_default()),
                txid,
                divisibility: etching.divisibility,
                premine: etching.premine,
                symbol: etching.symbol,
                terms: etching.terms,
                turbo: etching.turbo,
            },
            _ => RuneEtching::invalid(rune_id, rune, txid),
        };

        tracing::debug!(
            rune_id = %etching.rune_id,
            rune = %etching.rune,
            valid = etching.valid,
            "Etched rune"
        );

        self.etchings.push(etching);
    }
}
