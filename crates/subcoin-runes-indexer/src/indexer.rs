use crate::chain::ChainSource;
use crate::config::IndexerConfig;
use crate::error::{Error, Result};
use crate::lifecycle::{IndexerLifecycle, TracingLifecycle};
use crate::storage::RuneStorage;
use crate::types::{BlockIdentifier, BlockInfo, IndexerState, genesis_etching};
use crate::updater::RuneUpdater;
use bitcoin::BlockHash;
use parking_lot::Mutex;
use std::sync::Arc;
use subcoin_runes::first_rune_height;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Result of [`RunestoneIndexer::update_rune_utxo_balances`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Another pass was already running.
    Skipped,
    Completed {
        /// Number of blocks replayed after a reorg.
        reorged: usize,
        /// Number of new blocks indexed.
        indexed: usize,
    },
}

/// Marks the indexer as running until dropped.
struct RunningGuard<'a>(&'a Mutex<IndexerState>);

impl<'a> RunningGuard<'a> {
    fn acquire(state: &'a Mutex<IndexerState>) -> Option<Self> {
        let mut state_guard = state.lock();
        match *state_guard {
            IndexerState::Running => None,
            IndexerState::Idle => {
                *state_guard = IndexerState::Running;
                Some(Self(state))
            }
        }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = IndexerState::Idle;
    }
}

type PollingTask = (watch::Sender<bool>, JoinHandle<()>);

/// Keeps rune storage in sync with the best chain of a node.
pub struct RunestoneIndexer<C, S> {
    chain: Arc<C>,
    storage: Arc<S>,
    config: IndexerConfig,
    lifecycle: Arc<dyn IndexerLifecycle>,
    state: Mutex<IndexerState>,
    task: tokio::sync::Mutex<Option<PollingTask>>,
}

impl<C, S> RunestoneIndexer<C, S>
where
    C: ChainSource + 'static,
    S: RuneStorage + 'static,
{
    pub fn new(chain: Arc<C>, storage: Arc<S>, config: IndexerConfig) -> Self {
        Self {
            chain,
            storage,
            config,
            lifecycle: Arc::new(TracingLifecycle),
            state: Mutex::new(IndexerState::Idle),
            task: tokio::sync::Mutex::new(None),
        }
    }

    /// Replaces the default [`TracingLifecycle`].
    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn IndexerLifecycle>) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn state(&self) -> IndexerState {
        *self.state.lock()
    }

    /// Connects storage and spawns the polling task.
    ///
    /// Fails if the node runs on another network than the configured one. Starting a running
    /// indexer does nothing.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let mut task = self.task.lock().await;

        if task.is_some() {
            return Ok(());
        }

        self.storage.connect().await?;

        let actual = self.chain.get_network().await?;
        if actual != self.config.network {
            self.storage.disconnect().await?;
            return Err(Error::NetworkMismatch {
                expected: self.config.network,
                actual,
            });
        }

        if self.config.seed_genesis_rune {
            self.storage.seed_etchings(&[genesis_etching()]).await?;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let indexer = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(indexer.config.poll_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {
                        if let Err(err) = indexer.update_rune_utxo_balances().await {
                            tracing::error!(?err, "Failed to update rune balances");
                        }
                    }
                }
            }
        });

        *task = Some((shutdown_tx, handle));

        tracing::info!(
            network = %self.config.network,
            poll_interval = ?self.config.poll_interval(),
            "Rune indexer started"
        );

        Ok(())
    }

    /// Stops the polling task, waiting for an update in progress, then disconnects storage.
    pub async fn stop(&self) -> Result<()> {
        let Some((shutdown_tx, handle)) = self.task.lock().await.take() else {
            return Ok(());
        };

        let _ = shutdown_tx.send(true);

        if let Err(err) = handle.await {
            tracing::error!(?err, "Rune indexer task failed");
        }

        self.storage.disconnect().await?;

        tracing::info!("Rune indexer stopped");

        Ok(())
    }

    /// Catches up with the node, handling reorgs first.
    ///
    /// Returns [`UpdateOutcome::Skipped`] immediately if another pass is running.
    pub async fn update_rune_utxo_balances(&self) -> Result<UpdateOutcome> {
        let Some(_guard) = RunningGuard::acquire(&self.state) else {
            tracing::debug!("Rune update already in progress");
            return Ok(UpdateOutcome::Skipped);
        };

        let reorged = self.handle_reorg().await?;
        let indexed = self.index_new_blocks().await?;

        Ok(UpdateOutcome::Completed { reorged, indexed })
    }

    /// Rewinds storage to the last block shared with the node and replays the node's blocks
    /// above it.
    async fn handle_reorg(&self) -> Result<usize> {
        let Some(current) = self.storage.get_current_block().await? else {
            return Ok(0);
        };

        let mut stale = Vec::new();
        let mut height = current.height;

        let ancestor = loop {
            let Some(stored) = self.storage.get_block_hash(height).await? else {
                break None;
            };

            let canonical = self.chain.get_block_hash(height).await?;

            if canonical == Some(stored) {
                break Some(BlockIdentifier {
                    height,
                    hash: stored,
                });
            }

            if let Some(hash) = canonical {
                let header = self.chain.get_block_header_info(&hash).await?;
                tracing::debug!(
                    height,
                    %stored,
                    %hash,
                    previous_hash = ?header.previous_hash,
                    "Stale block"
                );
            }

            stale.push(height);

            match height.checked_sub(1) {
                Some(parent) => height = parent,
                None => break None,
            }
        };

        if stale.is_empty() {
            return Ok(0);
        }

        tracing::info!(
            tip = current.height,
            ancestor = ?ancestor.map(|block| block.height),
            stale = stale.len(),
            "Chain reorganization detected"
        );

        self.storage.reset_current_block(ancestor.as_ref()).await?;

        let mut replayed = 0;

        for height in stale.into_iter().rev() {
            let Some(hash) = self.chain.get_block_hash(height).await? else {
                break;
            };
            self.index_block(height, hash, true).await?;
            replayed += 1;
        }

        Ok(replayed)
    }

    async fn index_new_blocks(&self) -> Result<usize> {
        let next = match self.storage.get_current_block().await? {
            Some(current) => current.height.saturating_add(1),
            None => 0,
        };

        let mut height = next.max(first_rune_height(self.config.network));
        let mut indexed = 0;

        while let Some(hash) = self.chain.get_block_hash(height).await? {
            self.index_block(height, hash, false).await?;
            indexed += 1;

            match height.checked_add(1) {
                Some(next) => height = next,
                None => break,
            }
        }

        if indexed > 0 {
            tracing::debug!(indexed, tip = height - 1, "Caught up with node");
        }

        Ok(indexed)
    }

    async fn index_block(&self, height: u32, hash: BlockHash, reorg: bool) -> Result<()> {
        let block = self.chain.get_block(&hash).await?;

        let info = BlockInfo {
            height,
            hash,
            previous_hash: block.header.prev_blockhash,
            time: block.header.time,
        };

        self.lifecycle.before_block(&info, block.txdata.len());

        let mut updater = RuneUpdater::new(
            self.config.network,
            info,
            reorg,
            self.storage.as_ref(),
            self.chain.as_ref(),
        );

        for (tx, tx_index) in block.txdata.iter().zip(0u32..) {
            self.lifecycle.before_tx(&info, tx_index, tx);
            updater.index_runes(tx_index, tx).await?;
            self.lifecycle.after_tx(&info, tx_index, tx);
        }

        let index = updater.into_block_index();

        self.storage.save_block_index(&index).await?;

        self.lifecycle.after_block(&info, &index);

        Ok(())
    }
}
