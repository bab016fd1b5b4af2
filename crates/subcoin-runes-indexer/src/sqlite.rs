//! SQLite rune storage.
//!
//! u128 amounts do not fit SQLite integers and are stored as decimal text. Terms are stored as
//! JSON.

use crate::error::{Error, Result};
use crate::storage::RuneStorage;
use crate::types::{BlockIdentifier, RuneBlockIndex, RuneEtching, RuneUtxoBalance};
use bitcoin::hashes::Hash;
use bitcoin::hex::DisplayHex;
use bitcoin::{BlockHash, OutPoint, ScriptBuf, Txid};
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use subcoin_runes::{Rune, RuneId, SpacedRune, Terms};

type EtchingRow = (
    i64,
    i64,
    String,
    i64,
    bool,
    Vec<u8>,
    Option<i64>,
    Option<String>,
    Option<String>,
    Option<String>,
    bool,
);

type BalanceRow = (
    Vec<u8>,
    i64,
    i64,
    i64,
    String,
    i64,
    Vec<u8>,
    Option<String>,
    i64,
);

const ETCHING_COLUMNS: &str =
    "block, tx, rune, spacers, valid, txid, divisibility, premine, symbol, terms, turbo";

const BALANCE_COLUMNS: &str =
    "txid, vout, rune_block, rune_tx, amount, sat_value, script_pubkey, address, block_height";

fn corrupted(kind: &'static str, value: impl ToString) -> Error {
    Error::Corrupted {
        kind,
        value: value.to_string(),
    }
}

fn parse_u128(kind: &'static str, value: &str) -> Result<u128> {
    value.parse().map_err(|_| corrupted(kind, value))
}

fn parse_txid(bytes: &[u8]) -> Result<Txid> {
    Txid::from_slice(bytes).map_err(|_| corrupted("txid", bytes.to_lower_hex_string()))
}

fn parse_block_hash(bytes: &[u8]) -> Result<BlockHash> {
    BlockHash::from_slice(bytes).map_err(|_| corrupted("block hash", bytes.to_lower_hex_string()))
}

fn parse_u32(kind: &'static str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| corrupted(kind, value))
}

fn parse_rune_id(block: i64, tx: i64) -> Result<RuneId> {
    let block = u64::try_from(block).map_err(|_| corrupted("rune block", block))?;
    let tx = parse_u32("rune tx", tx)?;
    Ok(RuneId { block, tx })
}

fn etching_from_row(row: EtchingRow) -> Result<RuneEtching> {
    let (block, tx, rune, spacers, valid, txid, divisibility, premine, symbol, terms, turbo) = row;

    let divisibility = divisibility
        .map(|value| u8::try_from(value).map_err(|_| corrupted("divisibility", value)))
        .transpose()?;

    let premine = premine
        .map(|value| parse_u128("premine", &value))
        .transpose()?;

    let symbol = symbol
        .map(|value| {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(symbol), None) => Ok(symbol),
                _ => Err(corrupted("symbol", &value)),
            }
        })
        .transpose()?;

    let terms = terms
        .map(|value| {
            serde_json::from_str::<Terms>(&value).map_err(|_| corrupted("terms", &value))
        })
        .transpose()?;

    Ok(RuneEtching {
        valid,
        rune_id: parse_rune_id(block, tx)?,
        rune: SpacedRune::new(Rune(parse_u128("rune", &rune)?), parse_u32("spacers", spacers)?),
        txid: parse_txid(&txid)?,
        divisibility,
        premine,
        symbol,
        terms,
        turbo,
    })
}

fn balance_from_row(row: BalanceRow) -> Result<RuneUtxoBalance> {
    let (txid, vout, rune_block, rune_tx, amount, sat_value, script_pubkey, address, block_height) =
        row;

    Ok(RuneUtxoBalance {
        txid: parse_txid(&txid)?,
        vout: parse_u32("vout", vout)?,
        rune_id: parse_rune_id(rune_block, rune_tx)?,
        amount: parse_u128("amount", &amount)?,
        sat_value: u64::try_from(sat_value).map_err(|_| corrupted("sat value", sat_value))?,
        script_pubkey: ScriptBuf::from_bytes(script_pubkey),
        address,
        block_height: parse_u32("block height", block_height)?,
    })
}

/// Deletes everything indexed above `height`, everything when `height` is negative.
async fn revert_above(conn: &mut SqliteConnection, height: i64) -> Result<()> {
    sqlx::query("UPDATE balances SET spent_txid = NULL, spent_height = NULL WHERE spent_height > ?")
        .bind(height)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM balances WHERE block_height > ?")
        .bind(height)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM etchings WHERE height IS NOT NULL AND height > ?")
        .bind(height)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM mints WHERE height > ?")
        .bind(height)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM burned WHERE height > ?")
        .bind(height)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM blocks WHERE height > ?")
        .bind(height)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn insert_etching(
    conn: &mut SqliteConnection,
    etching: &RuneEtching,
    height: Option<u32>,
    replace: bool,
) -> Result<()> {
    let terms = etching
        .terms
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| corrupted("terms", err))?;

    let sql = format!(
        "INSERT OR {} INTO etchings ({ETCHING_COLUMNS}, height) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        if replace { "REPLACE" } else { "IGNORE" }
    );

    sqlx::query(&sql)
        .bind(etching.rune_id.block as i64)
        .bind(etching.rune_id.tx as i64)
        .bind(etching.rune.rune.0.to_string())
        .bind(etching.rune.spacers as i64)
        .bind(etching.valid)
        .bind(etching.txid.as_byte_array().as_slice())
        .bind(etching.divisibility.map(i64::from))
        .bind(etching.premine.map(|premine| premine.to_string()))
        .bind(etching.symbol.map(String::from))
        .bind(terms)
        .bind(etching.turbo)
        .bind(height.map(i64::from))
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// [`RuneStorage`] backed by SQLite.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`.
    ///
    /// The schema is created by [`RuneStorage::connect`].
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .pragma("cache_size", "-64000")
            .pragma("synchronous", "NORMAL");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Opens a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection would see its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blocks (
                height INTEGER PRIMARY KEY,
                hash BLOB NOT NULL,
                previous_hash BLOB NOT NULL,
                timestamp INTEGER NOT NULL
            );

            -- height is NULL for seeded etchings
            CREATE TABLE IF NOT EXISTS etchings (
                block INTEGER NOT NULL,
                tx INTEGER NOT NULL,
                rune TEXT NOT NULL UNIQUE,
                spacers INTEGER NOT NULL,
                valid INTEGER NOT NULL,
                txid BLOB NOT NULL,
                divisibility INTEGER,
                premine TEXT,
                symbol TEXT,
                terms TEXT,
                turbo INTEGER NOT NULL,
                height INTEGER,
                PRIMARY KEY (block, tx)
            );

            CREATE TABLE IF NOT EXISTS mints (
                block INTEGER NOT NULL,
                tx INTEGER NOT NULL,
                height INTEGER NOT NULL,
                count TEXT NOT NULL,
                PRIMARY KEY (block, tx, height)
            );

            CREATE TABLE IF NOT EXISTS balances (
                txid BLOB NOT NULL,
                vout INTEGER NOT NULL,
                rune_block INTEGER NOT NULL,
                rune_tx INTEGER NOT NULL,
                amount TEXT NOT NULL,
                sat_value INTEGER NOT NULL,
                script_pubkey BLOB NOT NULL,
                address TEXT,
                block_height INTEGER NOT NULL,
                spent_txid BLOB,
                spent_height INTEGER,
                PRIMARY KEY (txid, vout, rune_block, rune_tx)
            );
            CREATE INDEX IF NOT EXISTS idx_balances_block ON balances(block_height);
            CREATE INDEX IF NOT EXISTS idx_balances_spent ON balances(spent_height) WHERE spent_height IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_balances_address ON balances(address) WHERE address IS NOT NULL AND spent_txid IS NULL;

            CREATE TABLE IF NOT EXISTS burned (
                height INTEGER NOT NULL,
                rune_block INTEGER NOT NULL,
                rune_tx INTEGER NOT NULL,
                amount TEXT NOT NULL,
                PRIMARY KEY (height, rune_block, rune_tx)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Total amount of `rune_id` burned so far.
    pub async fn burned(&self, rune_id: &RuneId) -> Result<u128> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT amount FROM burned WHERE rune_block = ? AND rune_tx = ?")
                .bind(rune_id.block as i64)
                .bind(rune_id.tx as i64)
                .fetch_all(&self.pool)
                .await?;

        rows.iter().try_fold(0u128, |total, (amount,)| {
            total
                .checked_add(parse_u128("amount", amount)?)
                .ok_or(Error::BalanceOverflow(*rune_id))
        })
    }
}

#[async_trait::async_trait]
impl RuneStorage for SqliteStorage {
    async fn connect(&self) -> Result<()> {
        self.init_schema().await
    }

    async fn disconnect(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    async fn get_current_block(&self) -> Result<Option<BlockIdentifier>> {
        let row: Option<(i64, Vec<u8>)> =
            sqlx::query_as("SELECT height, hash FROM blocks ORDER BY height DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(height, hash)| {
            Ok(BlockIdentifier {
                height: parse_u32("block height", height)?,
                hash: parse_block_hash(&hash)?,
            })
        })
        .transpose()
    }

    async fn get_block_hash(&self, height: u32) -> Result<Option<BlockHash>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT hash FROM blocks WHERE height = ?")
            .bind(i64::from(height))
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(hash,)| parse_block_hash(&hash)).transpose()
    }

    async fn reset_current_block(&self, block: Option<&BlockIdentifier>) -> Result<()> {
        let height = block.map_or(-1, |block| i64::from(block.height));

        let mut tx = self.pool.begin().await?;
        revert_above(&mut tx, height).await?;
        tx.commit().await?;

        tracing::debug!(height, "Reverted rune storage");

        Ok(())
    }

    async fn seed_etchings(&self, etchings: &[RuneEtching]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for etching in etchings {
            insert_etching(&mut tx, etching, None, false).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn save_block_index(&self, index: &RuneBlockIndex) -> Result<()> {
        let height = i64::from(index.block.height);
        let mut tx = self.pool.begin().await?;

        if index.reorg {
            revert_above(&mut tx, height - 1).await?;
        }

        sqlx::query(
            "INSERT OR REPLACE INTO blocks (height, hash, previous_hash, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(height)
        .bind(index.block.hash.as_byte_array().as_slice())
        .bind(index.block.previous_hash.as_byte_array().as_slice())
        .bind(i64::from(index.block.time))
        .execute(&mut *tx)
        .await?;

        for etching in &index.etchings {
            insert_etching(&mut tx, etching, Some(index.block.height), true).await?;
        }

        for mint in &index.mint_counts {
            sqlx::query("INSERT OR REPLACE INTO mints (block, tx, height, count) VALUES (?, ?, ?, ?)")
                .bind(mint.rune_id.block as i64)
                .bind(mint.rune_id.tx as i64)
                .bind(height)
                .bind(mint.count.to_string())
                .execute(&mut *tx)
                .await?;
        }

        for spent in &index.spent_balances {
            let balance = &spent.balance;
            sqlx::query(
                "UPDATE balances SET spent_txid = ?, spent_height = ? WHERE txid = ? AND vout = ? AND rune_block = ? AND rune_tx = ?",
            )
            .bind(spent.spent_txid.as_byte_array().as_slice())
            .bind(height)
            .bind(balance.txid.as_byte_array().as_slice())
            .bind(balance.vout as i64)
            .bind(balance.rune_id.block as i64)
            .bind(balance.rune_id.tx as i64)
            .execute(&mut *tx)
            .await?;
        }

        let sql = format!(
            "INSERT OR REPLACE INTO balances ({BALANCE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        for balance in &index.utxo_balances {
            sqlx::query(&sql)
                .bind(balance.txid.as_byte_array().as_slice())
                .bind(balance.vout as i64)
                .bind(balance.rune_id.block as i64)
                .bind(balance.rune_id.tx as i64)
                .bind(balance.amount.to_string())
                .bind(balance.sat_value as i64)
                .bind(balance.script_pubkey.as_bytes())
                .bind(&balance.address)
                .bind(i64::from(balance.block_height))
                .execute(&mut *tx)
                .await?;
        }

        for burned in &index.burned_balances {
            sqlx::query(
                "INSERT OR REPLACE INTO burned (height, rune_block, rune_tx, amount) VALUES (?, ?, ?, ?)",
            )
            .bind(height)
            .bind(burned.rune_id.block as i64)
            .bind(burned.rune_id.tx as i64)
            .bind(burned.amount.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn get_etching(&self, rune_id: &RuneId, height: u32) -> Result<Option<RuneEtching>> {
        let sql = format!(
            "SELECT {ETCHING_COLUMNS} FROM etchings WHERE block = ? AND tx = ? AND (height IS NULL OR height <= ?)"
        );

        let row: Option<EtchingRow> = sqlx::query_as(&sql)
            .bind(rune_id.block as i64)
            .bind(rune_id.tx as i64)
            .bind(i64::from(height))
            .fetch_optional(&self.pool)
            .await?;

        row.map(etching_from_row).transpose()
    }

    async fn get_valid_mint_count(&self, rune_id: &RuneId, height: u32) -> Result<u128> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT count FROM mints WHERE block = ? AND tx = ? AND height <= ?")
                .bind(rune_id.block as i64)
                .bind(rune_id.tx as i64)
                .bind(i64::from(height))
                .fetch_all(&self.pool)
                .await?;

        rows.iter().try_fold(0u128, |total, (count,)| {
            total
                .checked_add(parse_u128("mint count", count)?)
                .ok_or(Error::BalanceOverflow(*rune_id))
        })
    }

    async fn get_rune_location(&self, rune: &Rune) -> Result<Option<RuneId>> {
        let row: Option<(i64, i64)> = sqlx::query_as("SELECT block, tx FROM etchings WHERE rune = ?")
            .bind(rune.0.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(block, tx)| parse_rune_id(block, tx)).transpose()
    }

    async fn get_utxo_balance(&self, outpoint: &OutPoint) -> Result<Vec<RuneUtxoBalance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM balances WHERE txid = ? AND vout = ? AND spent_txid IS NULL ORDER BY rune_block, rune_tx"
        );

        let rows: Vec<BalanceRow> = sqlx::query_as(&sql)
            .bind(outpoint.txid.as_byte_array().as_slice())
            .bind(outpoint.vout as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(balance_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        BlockInfo, RuneBalance, RuneMintCount, RuneSpentUtxoBalance, genesis_etching,
    };

    const RUNE: RuneId = RuneId { block: 1, tx: 0 };

    async fn storage() -> SqliteStorage {
        let storage = SqliteStorage::in_memory().await.unwrap();
        storage.connect().await.unwrap();
        storage
    }

    fn block(height: u32) -> BlockInfo {
        BlockInfo {
            height,
            hash: BlockHash::from_byte_array([height as u8; 32]),
            previous_hash: BlockHash::from_byte_array([height as u8 - 1; 32]),
            time: height * 600,
        }
    }

    fn balance(txid: u8, amount: u128, block_height: u32) -> RuneUtxoBalance {
        RuneUtxoBalance {
            txid: Txid::from_byte_array([txid; 32]),
            vout: 1,
            rune_id: RUNE,
            amount,
            sat_value: 546,
            script_pubkey: ScriptBuf::from_bytes(vec![0x51, 0x20]),
            address: Some("bcrt1ptest".to_string()),
            block_height,
        }
    }

    fn block_index(height: u32) -> RuneBlockIndex {
        RuneBlockIndex {
            block: block(height),
            reorg: false,
            etchings: vec![],
            mint_counts: vec![],
            utxo_balances: vec![],
            spent_balances: vec![],
            burned_balances: vec![],
        }
    }

    #[tokio::test]
    async fn seeded_etching_round_trips() {
        let storage = storage().await;
        let genesis = genesis_etching();

        storage.seed_etchings(&[genesis.clone()]).await.unwrap();
        storage.seed_etchings(&[genesis.clone()]).await.unwrap();

        assert_eq!(storage.get_etching(&RUNE, 0).await.unwrap(), Some(genesis.clone()));
        assert_eq!(
            storage.get_rune_location(&genesis.rune.rune).await.unwrap(),
            Some(RUNE)
        );

        storage.reset_current_block(None).await.unwrap();
        assert_eq!(storage.get_etching(&RUNE, 0).await.unwrap(), Some(genesis));
    }

    #[tokio::test]
    async fn spent_balances_disappear_and_come_back_on_reset() {
        let storage = storage().await;

        let mut first = block_index(1);
        first.utxo_balances = vec![balance(1, 400, 1)];
        storage.save_block_index(&first).await.unwrap();

        let outpoint = first.utxo_balances[0].outpoint();
        assert_eq!(
            storage.get_utxo_balance(&outpoint).await.unwrap(),
            first.utxo_balances
        );

        let mut second = block_index(2);
        second.spent_balances = vec![RuneSpentUtxoBalance {
            balance: balance(1, 400, 1),
            spent_txid: Txid::from_byte_array([2; 32]),
        }];
        second.utxo_balances = vec![balance(2, 400, 2)];
        storage.save_block_index(&second).await.unwrap();

        assert!(storage.get_utxo_balance(&outpoint).await.unwrap().is_empty());
        assert_eq!(
            storage.get_current_block().await.unwrap(),
            Some(block(2).identifier())
        );

        storage
            .reset_current_block(Some(&block(1).identifier()))
            .await
            .unwrap();

        assert_eq!(
            storage.get_utxo_balance(&outpoint).await.unwrap(),
            first.utxo_balances
        );
        assert!(
            storage
                .get_utxo_balance(&second.utxo_balances[0].outpoint())
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(storage.get_block_hash(2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn mint_counts_are_summed_up_to_height() {
        let storage = storage().await;

        for height in 1..=3 {
            let mut index = block_index(height);
            index.mint_counts = vec![RuneMintCount {
                rune_id: RUNE,
                count: u128::from(height),
            }];
            storage.save_block_index(&index).await.unwrap();
        }

        assert_eq!(storage.get_valid_mint_count(&RUNE, 0).await.unwrap(), 0);
        assert_eq!(storage.get_valid_mint_count(&RUNE, 2).await.unwrap(), 3);
        assert_eq!(storage.get_valid_mint_count(&RUNE, 3).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn reorg_index_replaces_the_block() {
        let storage = storage().await;

        let mut stale = block_index(1);
        stale.burned_balances = vec![RuneBalance {
            rune_id: RUNE,
            amount: u128::MAX,
        }];
        stale.etchings = vec![RuneEtching::invalid(
            RuneId { block: 1, tx: 3 },
            Rune(99),
            Txid::from_byte_array([3; 32]),
        )];
        storage.save_block_index(&stale).await.unwrap();
        assert_eq!(storage.burned(&RUNE).await.unwrap(), u128::MAX);

        let mut replacement = block_index(1);
        replacement.block.hash = BlockHash::from_byte_array([9; 32]);
        replacement.reorg = true;
        replacement.burned_balances = vec![RuneBalance {
            rune_id: RUNE,
            amount: 5,
        }];
        storage.save_block_index(&replacement).await.unwrap();

        assert_eq!(storage.burned(&RUNE).await.unwrap(), 5);
        assert_eq!(storage.get_rune_location(&Rune(99)).await.unwrap(), None);
        assert_eq!(
            storage.get_block_hash(1).await.unwrap(),
            Some(BlockHash::from_byte_array([9; 32]))
        );
    }

    #[tokio::test]
    async fn etchings_are_not_visible_before_their_block() {
        let storage = storage().await;
        let id = RuneId { block: 5, tx: 1 };

        let mut index = block_index(5);
        index.etchings = vec![RuneEtching {
            terms: Some(Terms {
                amount: Some(1_000),
                cap: Some(u128::MAX),
                height: (Some(5), None),
                offset: (None, Some(100)),
            }),
            premine: Some(u128::MAX),
            symbol: Some('R'),
            divisibility: Some(38),
            rune_id: id,
            ..genesis_etching()
        }];
        storage.save_block_index(&index).await.unwrap();

        assert_eq!(storage.get_etching(&id, 4).await.unwrap(), None);
        assert_eq!(
            storage.get_etching(&id, 5).await.unwrap(),
            Some(index.etchings[0].clone())
        );
    }
}
