//! Rune balance indexer.
//!
//! Replays blocks from a Bitcoin node through [`RuneUpdater`], which applies every
//! transaction's runestone to the rune balances of its outputs, and persists one
//! [`RuneBlockIndex`] per block into a [`RuneStorage`] backend. Chain reorganizations are
//! handled by rewinding storage to the last block shared with the node and replaying from there.

mod chain;
mod config;
mod error;
mod in_mem;
mod indexer;
mod lifecycle;
mod rpc;
mod sqlite;
mod storage;
mod types;
mod updater;

pub use self::chain::{BlockHeaderInfo, ChainSource, RawTransactionInfo};
pub use self::config::IndexerConfig;
pub use self::error::{Error, Result};
pub use self::in_mem::InMemoryStorage;
pub use self::indexer::{RunestoneIndexer, UpdateOutcome};
pub use self::lifecycle::{IndexerLifecycle, TracingLifecycle};
pub use self::rpc::BitcoindClient;
pub use self::sqlite::SqliteStorage;
pub use self::storage::RuneStorage;
pub use self::types::{
    BlockIdentifier, BlockInfo, IndexerState, RuneBalance, RuneBlockIndex, RuneEtching,
    RuneMintCount, RuneSpentUtxoBalance, RuneUtxoBalance, genesis_etching,
};
pub use self::updater::RuneUpdater;
