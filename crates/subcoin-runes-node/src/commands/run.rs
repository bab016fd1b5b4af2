use crate::Result;
use crate::cli::params::{Network, StorageKind};
use std::path::PathBuf;
use std::sync::Arc;
use subcoin_runes_indexer::{
    BitcoindClient, InMemoryStorage, IndexerConfig, RuneStorage, RunestoneIndexer, SqliteStorage,
};

#[derive(Debug, clap::Parser)]
pub struct Run {
    /// Bitcoin Core RPC endpoint.
    #[arg(long, value_name = "URL", default_value = "http://127.0.0.1:8332")]
    pub rpc_url: String,

    /// RPC user name.
    #[arg(long, default_value = "")]
    pub rpc_user: String,

    /// RPC password.
    #[arg(long, default_value = "")]
    pub rpc_password: String,

    /// Specify the chain network.
    #[arg(long, value_name = "NETWORK", default_value = "mainnet")]
    pub network: Network,

    /// Where to keep the rune balances.
    #[arg(long, value_enum, default_value_t = StorageKind::Sqlite)]
    pub storage: StorageKind,

    /// SQLite database file, used with `--storage sqlite`.
    #[arg(long, value_name = "PATH", default_value = "runes.sqlite")]
    pub db_path: PathBuf,

    /// Delay between two polls of the node, in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    pub poll_interval_ms: u64,

    /// Do not seed the storage with `UNCOMMON•GOODS`.
    #[arg(long)]
    pub no_genesis_rune: bool,
}

impl Run {
    pub async fn execute(self) -> Result<()> {
        let config = IndexerConfig {
            network: self.network.into(),
            poll_interval_ms: self.poll_interval_ms,
            seed_genesis_rune: !self.no_genesis_rune,
        };

        let chain = Arc::new(BitcoindClient::new(
            &self.rpc_url,
            &self.rpc_user,
            &self.rpc_password,
        )?);

        match self.storage {
            StorageKind::Memory => {
                run_until_exit(chain, Arc::new(InMemoryStorage::new()), config).await
            }
            StorageKind::Sqlite => {
                tracing::info!(path = %self.db_path.display(), "Opening rune database");
                let storage = SqliteStorage::open(&self.db_path).await?;
                run_until_exit(chain, Arc::new(storage), config).await
            }
        }
    }
}

async fn run_until_exit<S: RuneStorage + 'static>(
    chain: Arc<BitcoindClient>,
    storage: Arc<S>,
    config: IndexerConfig,
) -> Result<()> {
    let indexer = Arc::new(RunestoneIndexer::new(chain, storage, config));

    indexer.start().await?;

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down rune indexer");

    indexer.stop().await?;

    Ok(())
}
