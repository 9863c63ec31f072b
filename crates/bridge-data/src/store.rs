//! SQLite storage layer for the per-chain trace archive.
//!
//! Uses WAL mode for concurrent read performance and prepared statements
//! for batch insert throughput. One database holds every chain's traces,
//! scoped by `chain_id`; the engine treats `(chain, method)` pairs as
//! independent per-chain stores.

use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;
use crate::types::{Chain, TraceRecord};

pub struct TraceStore {
    conn: Mutex<Connection>,
}

impl TraceStore {
    /// Creates or opens a SQLite database with WAL mode enabled.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrations fail.
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("trace store lock poisoned")
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS traces (
                chain_id INTEGER NOT NULL,
                hash TEXT NOT NULL,
                block INTEGER NOT NULL,
                to_address TEXT NOT NULL,
                from_address TEXT NOT NULL,
                value TEXT NOT NULL,
                gas_price INTEGER NOT NULL,
                gas_used INTEGER NOT NULL,
                functrace TEXT NOT NULL,
                transferlogs TEXT NOT NULL,
                eventtrace TEXT NOT NULL,
                PRIMARY KEY (chain_id, hash)
            );

            CREATE INDEX IF NOT EXISTS idx_traces_block
                ON traces (chain_id, block, to_address);

            CREATE TABLE IF NOT EXISTS blocks (
                chain_id INTEGER NOT NULL,
                block_number INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                PRIMARY KEY (chain_id, block_number)
            );
            ",
        )?;
        Ok(())
    }

    /// Batch insert trace records using a prepared statement and transaction.
    ///
    /// # Errors
    /// Returns error if database insert fails.
    pub fn insert_traces(&self, records: &[TraceRecord]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR REPLACE INTO traces (
                    chain_id, hash, block, to_address, from_address, value,
                    gas_price, gas_used, functrace, transferlogs, eventtrace
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )?;

            for r in records {
                stmt.execute(rusqlite::params![
                    r.chain.id(),
                    r.hash,
                    r.block,
                    r.to,
                    r.from,
                    r.value,
                    r.gas_price,
                    r.gas_used,
                    r.functrace,
                    r.transferlogs,
                    r.eventtrace,
                ])?;
            }
        }

        let count = records.len();
        tx.commit()?;
        Ok(count)
    }

    /// Insert a single trace record.
    pub fn insert_trace(&self, record: &TraceRecord) -> Result<()> {
        self.insert_traces(std::slice::from_ref(record))?;
        Ok(())
    }

    /// Batch insert `(block_number, timestamp)` pairs for one chain.
    ///
    /// # Errors
    /// Returns error if database insert fails.
    pub fn insert_blocks(&self, chain: Chain, blocks: &[(u64, u64)]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO blocks (chain_id, block_number, timestamp)
                 VALUES (?, ?, ?)",
            )?;
            for (block_number, timestamp) in blocks {
                stmt.execute(rusqlite::params![chain.id(), block_number, timestamp])?;
            }
        }
        let count = blocks.len();
        tx.commit()?;
        Ok(count)
    }

    /// Fetch one transaction's trace record, `None` if absent.
    pub fn get_tx(&self, chain: Chain, hash: &str) -> Result<Option<TraceRecord>> {
        let conn = self.conn();
        let record = conn
            .query_row(
                "SELECT hash, block, to_address, from_address, value, gas_price,
                        gas_used, functrace, transferlogs, eventtrace
                 FROM traces WHERE chain_id = ? AND hash = ?",
                rusqlite::params![chain.id(), hash],
                |row| {
                    Ok(TraceRecord {
                        hash: row.get(0)?,
                        chain,
                        block: row.get(1)?,
                        to: row.get(2)?,
                        from: row.get(3)?,
                        value: row.get(4)?,
                        gas_price: row.get(5)?,
                        gas_used: row.get(6)?,
                        functrace: row.get(7)?,
                        transferlogs: row.get(8)?,
                        eventtrace: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Whether a transaction hash exists in one chain's archive.
    pub fn tx_exists(&self, chain: Chain, hash: &str) -> Result<bool> {
        let conn = self.conn();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM traces WHERE chain_id = ? AND hash = ?",
                rusqlite::params![chain.id(), hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Number of archived transactions for one chain.
    pub fn count_traces(&self, chain: Chain) -> Result<u64> {
        let conn = self.conn();
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM traces WHERE chain_id = ?",
            [chain.id()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Hashes of transactions in `[start, end]`, optionally filtered by
    /// recipient address, ordered by block then hash, bounded by `limit`.
    pub fn get_block_range(
        &self,
        chain: Chain,
        start: u64,
        end: u64,
        to_address: Option<&str>,
        limit: u32,
    ) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT hash FROM traces
             WHERE chain_id = ?1 AND block BETWEEN ?2 AND ?3
               AND (?4 IS NULL OR to_address = ?4)
             ORDER BY block, hash
             LIMIT ?5",
        )?;
        let hashes = stmt
            .query_map(
                rusqlite::params![chain.id(), start, end, to_address, limit],
                |row| row.get(0),
            )?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(hashes)
    }

    /// Unix timestamp of one block, `None` if the block is not indexed.
    pub fn block_timestamp(&self, chain: Chain, block: u64) -> Result<Option<u64>> {
        let conn = self.conn();
        let ts = conn
            .query_row(
                "SELECT timestamp FROM blocks WHERE chain_id = ? AND block_number = ?",
                rusqlite::params![chain.id(), block],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ts)
    }

    /// Every `(block_number, timestamp)` pair for one chain, block-ordered.
    pub fn block_index(&self, chain: Chain) -> Result<Vec<(u64, u64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT block_number, timestamp FROM blocks
             WHERE chain_id = ? ORDER BY block_number",
        )?;
        let pairs = stmt
            .query_map(rusqlite::params![chain.id()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<std::result::Result<Vec<(u64, u64)>, _>>()?;
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(chain: Chain, hash: &str, block: u64, to: &str) -> TraceRecord {
        TraceRecord {
            hash: hash.to_string(),
            chain,
            block,
            to: to.to_string(),
            from: "0xsender".to_string(),
            value: "0".to_string(),
            gas_price: 5_000_000_000,
            gas_used: 90_000,
            functrace: String::new(),
            transferlogs: String::new(),
            eventtrace: String::new(),
        }
    }

    #[test]
    fn migrations_create_tables() {
        let store = TraceStore::new(":memory:").expect("in-memory store should always open");
        let conn = store.conn();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .expect("query should prepare");

        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .expect("query_map should succeed")
            .collect::<Result<Vec<_>, _>>()
            .expect("all rows should parse");

        assert!(tables.contains(&"traces".to_string()));
        assert!(tables.contains(&"blocks".to_string()));
    }

    #[test]
    fn trace_round_trip_preserves_fields() {
        let store = TraceStore::new(":memory:").expect("in-memory store should always open");
        let mut record = sample_record(Chain::Bsc, "0xabc", 100, "0xbridge");
        record.functrace = "0,call,0,0xa,0xb,0,21000,0x,0x".to_string();

        store.insert_trace(&record).expect("insert should succeed");
        let loaded = store
            .get_tx(Chain::Bsc, "0xabc")
            .expect("query should succeed")
            .expect("record should exist");
        assert_eq!(loaded, record);
    }

    #[test]
    fn tx_exists_is_chain_scoped() {
        let store = TraceStore::new(":memory:").expect("in-memory store should always open");
        store
            .insert_trace(&sample_record(Chain::Eth, "0xabc", 1, "0xbridge"))
            .expect("insert should succeed");

        assert!(store.tx_exists(Chain::Eth, "0xabc").unwrap());
        assert!(!store.tx_exists(Chain::Bsc, "0xabc").unwrap());
        assert!(!store.tx_exists(Chain::Eth, "0xdef").unwrap());
    }

    #[test]
    fn block_range_filters_and_orders() {
        let store = TraceStore::new(":memory:").expect("in-memory store should always open");
        store
            .insert_traces(&[
                sample_record(Chain::Bsc, "0xc", 12, "0xbridge"),
                sample_record(Chain::Bsc, "0xa", 10, "0xbridge"),
                sample_record(Chain::Bsc, "0xb", 11, "0xother"),
                sample_record(Chain::Bsc, "0xd", 99, "0xbridge"),
            ])
            .expect("insert should succeed");

        let hashes = store
            .get_block_range(Chain::Bsc, 10, 20, Some("0xbridge"), 100)
            .expect("query should succeed");
        assert_eq!(hashes, vec!["0xa".to_string(), "0xc".to_string()]);

        let limited = store
            .get_block_range(Chain::Bsc, 10, 20, None, 1)
            .expect("query should succeed");
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn archive_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("temp dir should create");
        let path = dir.path().join("eth.sqlite");
        let path = path.to_str().expect("temp path is UTF-8");

        {
            let store = TraceStore::new(path).expect("store should open");
            store
                .insert_trace(&sample_record(Chain::Eth, "0xabc", 7, "0xbridge"))
                .expect("insert should succeed");
            store
                .insert_blocks(Chain::Eth, &[(7, 700)])
                .expect("insert should succeed");
        }

        let reopened = TraceStore::new(path).expect("store should reopen");
        assert!(reopened.tx_exists(Chain::Eth, "0xabc").unwrap());
        assert_eq!(reopened.count_traces(Chain::Eth).unwrap(), 1);
        assert_eq!(reopened.block_timestamp(Chain::Eth, 7).unwrap(), Some(700));
    }

    #[test]
    fn block_index_is_ordered() {
        let store = TraceStore::new(":memory:").expect("in-memory store should always open");
        store
            .insert_blocks(Chain::Polygon, &[(20, 2000), (10, 1000), (30, 3000)])
            .expect("insert should succeed");

        assert_eq!(
            store.block_index(Chain::Polygon).unwrap(),
            vec![(10, 1000), (20, 2000), (30, 3000)]
        );
        assert_eq!(store.block_timestamp(Chain::Polygon, 20).unwrap(), Some(2000));
        assert_eq!(store.block_timestamp(Chain::Polygon, 21).unwrap(), None);
    }
}
