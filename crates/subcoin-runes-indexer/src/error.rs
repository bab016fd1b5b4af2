use bitcoin::{Network, OutPoint, Txid};
use subcoin_runes::RuneId;

/// Rune indexer error type.
///
/// Malformed runestones are never an error, they decipher into cenotaphs. Everything here aborts
/// the current indexing pass.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("RPC error: {0}")]
    Rpc(#[from] jsonrpsee::core::ClientError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid consensus encoding: {0}")]
    Decode(#[from] bitcoin::consensus::encode::FromHexError),

    #[error("Invalid {kind} in database: {value}")]
    Corrupted { kind: &'static str, value: String },

    #[error("Invalid RPC credentials")]
    InvalidCredentials,

    #[error("Unknown network `{0}`")]
    UnknownNetwork(String),

    #[error("Node is on {actual}, indexer is configured for {expected}")]
    NetworkMismatch { expected: Network, actual: Network },

    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(Txid),

    #[error("Output {0} not found")]
    MissingOutput(OutPoint),

    #[error("Rune balance overflow for {0}")]
    BalanceOverflow(RuneId),

    #[error("Rune balance underflow for {0}")]
    BalanceUnderflow(RuneId),
}

pub type Result<T> = std::result::Result<T, Error>;
