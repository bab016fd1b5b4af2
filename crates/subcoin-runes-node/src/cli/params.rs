/// Bitcoin network type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Network {
    /// Mainnet.
    Mainnet,
    /// Testnet.
    Testnet,
    /// Signet.
    Signet,
    /// Regtest.
    Regtest,
}

impl From<Network> for bitcoin::Network {
    fn from(network: Network) -> Self {
        match network {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Signet => bitcoin::Network::Signet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }
}

/// Rune storage backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageKind {
    /// Keep everything in memory, lost on exit.
    Memory,
    /// SQLite database at `--db-path`.
    Sqlite,
}

#[derive(Debug, Clone, clap::Parser)]
pub struct LogParams {
    /// Sets a custom logging filter (syntax: `<target>=<level>`).
    ///
    /// Log levels (least to most verbose) are `error`, `warn`, `info`, `debug`, and `trace`.
    ///
    /// By default, all targets log `info`, or follow `RUST_LOG` when set.
    ///
    /// *Example*: `--log warn,subcoin_runes_indexer=debug`.
    #[arg(short = 'l', long, value_name = "LOG_PATTERN", num_args = 1.., global = true)]
    pub log: Vec<String>,
}
