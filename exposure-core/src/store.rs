//! Exposure record storage
//!
//! The store is a keyed map from ordered (giver, taker) pairs to [`Exposure`]
//! records, owned and mutated exclusively by the engine. Keys are never
//! deleted; writing the zero record is how an exposure is retired.
//!
//! Two implementations:
//!
//! - [`MemoryExposureStore`] — in-process map, used by tests and embedders
//! - [`RocksDbExposureStore`] — persistent store on a dedicated column family

use crate::{config::Config, error::Result, types::Exposure};
use parking_lot::RwLock;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Options, DB};
use std::collections::HashMap;
use std::sync::Arc;
use token_ledger::AccountId;

/// Column family for exposure records
const CF_EXPOSURES: &str = "exposures";

/// Keyed storage for exposure records
///
/// `get` of a never-written pair returns the zero record; `put` replaces the
/// whole record so amount and expiry are never observable half-updated.
pub trait ExposureStore: Send + Sync {
    /// Record for the pair; the zero record when none was ever written
    fn get(&self, giver: &AccountId, taker: &AccountId) -> Result<Exposure>;

    /// Replace the pair's record in one atomic write
    fn put(&self, giver: &AccountId, taker: &AccountId, exposure: Exposure) -> Result<()>;
}

impl<S: ExposureStore + ?Sized> ExposureStore for Arc<S> {
    fn get(&self, giver: &AccountId, taker: &AccountId) -> Result<Exposure> {
        (**self).get(giver, taker)
    }

    fn put(&self, giver: &AccountId, taker: &AccountId, exposure: Exposure) -> Result<()> {
        (**self).put(giver, taker, exposure)
    }
}

/// In-memory exposure store
#[derive(Default)]
pub struct MemoryExposureStore {
    records: RwLock<HashMap<(AccountId, AccountId), Exposure>>,
}

impl MemoryExposureStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExposureStore for MemoryExposureStore {
    fn get(&self, giver: &AccountId, taker: &AccountId) -> Result<Exposure> {
        let records = self.records.read();
        Ok(records
            .get(&(giver.clone(), taker.clone()))
            .copied()
            .unwrap_or_default())
    }

    fn put(&self, giver: &AccountId, taker: &AccountId, exposure: Exposure) -> Result<()> {
        let mut records = self.records.write();
        records.insert((giver.clone(), taker.clone()), exposure);
        Ok(())
    }
}

/// Persistent exposure store on RocksDB
pub struct RocksDbExposureStore {
    db: Arc<DB>,
}

impl RocksDbExposureStore {
    /// Open or create the database under `config.data_dir`
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Point lookups dominate; records are tiny
        db_opts.set_compaction_style(DBCompactionStyle::Level);

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(
            CF_EXPOSURES,
            Self::cf_options_exposures(),
        )];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB exposure store at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_exposures() -> Options {
        let mut opts = Options::default();
        // Hot read path, favor decode speed over ratio
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self) -> Result<&ColumnFamily> {
        self.db.cf_handle(CF_EXPOSURES).ok_or_else(|| {
            crate::Error::Storage(format!("Column family {} not found", CF_EXPOSURES))
        })
    }

    /// Composite key: length-prefixed giver, then taker.
    ///
    /// The prefix keeps (ab, c) and (a, bc) distinct for arbitrary account
    /// id bytes.
    fn pair_key(giver: &AccountId, taker: &AccountId) -> Vec<u8> {
        let giver_bytes = giver.as_str().as_bytes();
        let taker_bytes = taker.as_str().as_bytes();

        let mut key = Vec::with_capacity(2 + giver_bytes.len() + taker_bytes.len());
        key.extend_from_slice(&(giver_bytes.len() as u16).to_be_bytes());
        key.extend_from_slice(giver_bytes);
        key.extend_from_slice(taker_bytes);
        key
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB exposure store closed");
        Ok(())
    }
}

impl ExposureStore for RocksDbExposureStore {
    fn get(&self, giver: &AccountId, taker: &AccountId) -> Result<Exposure> {
        let cf = self.cf_handle()?;
        let key = Self::pair_key(giver, taker);

        match self.db.get_cf(cf, &key)? {
            Some(value) => {
                let exposure: Exposure = bincode::deserialize(&value)?;
                Ok(exposure)
            }
            None => Ok(Exposure::default()),
        }
    }

    fn put(&self, giver: &AccountId, taker: &AccountId, exposure: Exposure) -> Result<()> {
        let cf = self.cf_handle()?;
        let key = Self::pair_key(giver, taker);
        let value = bincode::serialize(&exposure)?;

        self.db.put_cf(cf, &key, &value)?;

        tracing::debug!(
            giver = %giver,
            taker = %taker,
            amount = exposure.amount,
            "Exposure record written"
        );

        Ok(())
    }
}
