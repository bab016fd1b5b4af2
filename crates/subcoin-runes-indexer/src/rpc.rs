//! Bitcoin Core JSON-RPC client.

use crate::chain::{BlockHeaderInfo, ChainSource, RawTransactionInfo};
use crate::error::{Error, Result};
use bitcoin::base64::Engine;
use bitcoin::base64::engine::general_purpose::STANDARD;
use bitcoin::consensus::encode::deserialize_hex;
use bitcoin::{Block, BlockHash, Network, Txid};
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HeaderMap, HeaderValue, HttpClient, HttpClientBuilder};
use jsonrpsee::proc_macros::rpc;
use serde::Deserialize;

/// `RPC_INVALID_PARAMETER`, returned by `getblockhash` for heights above the tip.
const RPC_INVALID_PARAMETER: i32 = -8;

/// `RPC_INVALID_ADDRESS_OR_KEY`, returned for unknown blocks and transactions.
const RPC_INVALID_ADDRESS_OR_KEY: i32 = -5;

fn is_not_found(err: &ClientError) -> bool {
    matches!(err, ClientError::Call(err) if err.code() == RPC_INVALID_ADDRESS_OR_KEY)
}

/// Subset of `getblockchaininfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetBlockchainInfo {
    /// Current network name (main, test, signet, regtest).
    pub chain: String,
}

/// Subset of verbose `getblockheader`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetBlockHeader {
    pub height: u32,
    pub previousblockhash: Option<BlockHash>,
}

/// Subset of verbose `getrawtransaction`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetRawTransaction {
    pub hex: String,
    pub blockhash: Option<BlockHash>,
}

/// Bitcoin Core RPC methods used by the indexer.
#[rpc(client)]
pub trait BitcoindApi {
    #[method(name = "getblockchaininfo")]
    async fn get_blockchain_info(&self) -> jsonrpsee::core::RpcResult<GetBlockchainInfo>;

    #[method(name = "getblockhash")]
    async fn get_block_hash(&self, height: u32) -> jsonrpsee::core::RpcResult<BlockHash>;

    /// Verbosity 0 returns the hex-encoded serialized block.
    #[method(name = "getblock")]
    async fn get_block(
        &self,
        blockhash: BlockHash,
        verbosity: u8,
    ) -> jsonrpsee::core::RpcResult<String>;

    #[method(name = "getblockheader")]
    async fn get_block_header(
        &self,
        blockhash: BlockHash,
        verbose: bool,
    ) -> jsonrpsee::core::RpcResult<GetBlockHeader>;

    #[method(name = "getrawtransaction")]
    async fn get_raw_transaction(
        &self,
        txid: Txid,
        verbose: bool,
    ) -> jsonrpsee::core::RpcResult<GetRawTransaction>;
}

/// [`ChainSource`] backed by a Bitcoin Core node.
pub struct BitcoindClient {
    client: HttpClient,
}

impl BitcoindClient {
    /// Creates a client authenticating with HTTP basic auth.
    pub fn new(url: &str, user: &str, password: &str) -> Result<Self> {
        let credentials = STANDARD.encode(format!("{user}:{password}"));
        let authorization = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|_| Error::InvalidCredentials)?;

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", authorization);

        let client = HttpClientBuilder::default()
            .set_headers(headers)
            .build(url)?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ChainSource for BitcoindClient {
    async fn get_network(&self) -> Result<Network> {
        let GetBlockchainInfo { chain } = self.client.get_blockchain_info().await?;
        Network::from_core_arg(&chain).map_err(|_| Error::UnknownNetwork(chain))
    }

    async fn get_block_hash(&self, height: u32) -> Result<Option<BlockHash>> {
        match BitcoindApiClient::get_block_hash(&self.client, height).await {
            Ok(hash) => Ok(Some(hash)),
            Err(ClientError::Call(err)) if err.code() == RPC_INVALID_PARAMETER => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_block(&self, hash: &BlockHash) -> Result<Block> {
        let hex = BitcoindApiClient::get_block(&self.client, *hash, 0)
            .await
            .map_err(|err| {
                if is_not_found(&err) {
                    Error::BlockNotFound(hash.to_string())
                } else {
                    err.into()
                }
            })?;
        Ok(deserialize_hex(&hex)?)
    }

    async fn get_block_header_info(&self, hash: &BlockHash) -> Result<BlockHeaderInfo> {
        let header = self
            .client
            .get_block_header(*hash, true)
            .await
            .map_err(|err| {
                if is_not_found(&err) {
                    Error::BlockNotFound(hash.to_string())
                } else {
                    err.into()
                }
            })?;
        Ok(BlockHeaderInfo {
            height: header.height,
            previous_hash: header.previousblockhash,
        })
    }

    async fn get_raw_transaction_info(&self, txid: &Txid) -> Result<RawTransactionInfo> {
        let response = self
            .client
            .get_raw_transaction(*txid, true)
            .await
            .map_err(|err| {
                if is_not_found(&err) {
                    Error::TransactionNotFound(*txid)
                } else {
                    err.into()
                }
            })?;
        Ok(RawTransactionInfo {
            transaction: deserialize_hex(&response.hex)?,
            blockhash: response.blockhash,
        })
    }
}
