//! Runes indexer node.
//!
//! Command line front end of [`subcoin_runes_indexer`]: follows a Bitcoin Core node and keeps a
//! rune balance database in sync, and provides tools to encode and decode runestones.

mod cli;
mod commands;

pub use self::cli::run;

/// Node error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Indexer(#[from] subcoin_runes_indexer::Error),

    #[error("Invalid runestone: {0}")]
    Runestone(#[from] subcoin_runes::BuilderError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid transaction: {0}")]
    Transaction(#[from] bitcoin::consensus::encode::FromHexError),

    #[error("Invalid log filter: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
