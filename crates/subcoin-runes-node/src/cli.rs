pub mod params;

use crate::Result;
use crate::commands::decode::Decode;
use crate::commands::encode::Encode;
use crate::commands::run::Run;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Index runes from a Bitcoin Core node.
    Run(Run),

    /// Encode a JSON runestone description into an output script.
    Encode(Encode),

    /// Decipher the runestone of a raw transaction.
    Decode(Decode),
}

#[derive(Debug, Parser)]
#[command(name = "runes-indexer", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[allow(missing_docs)]
    #[clap(flatten)]
    pub log_params: params::LogParams,
}

fn init_logging(log: &[String]) -> Result<()> {
    let filter = if log.is_empty() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_new(log.join(","))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Parse and run command line arguments
pub fn run() -> Result<()> {
    let Cli {
        command,
        log_params,
    } = Cli::parse();

    init_logging(&log_params.log)?;

    match command {
        Command::Run(run) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run.execute())
        }
        Command::Encode(encode) => {
            println!("{}", encode.execute()?);
            Ok(())
        }
        Command::Decode(decode) => {
            println!("{}", decode.execute()?);
            Ok(())
        }
    }
}
