//! # Tickwarden Warehouse
//!
//! DuckDB-backed persistence for the tickwarden market-data layer.
//!
//! ## Overview
//!
//! - [`PriceCacheStore`]: OHLCV rows keyed by `(instrument_id, price_date)`
//!   with upsert writes and two-tier staleness ([`StalenessPolicy`]).
//! - [`InstrumentRegistry`]: symbol to instrument id, created on first use.
//! - [`Clock`]: injectable time source; [`ManualClock`] drives tests.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `instruments` | Symbol registry |
//! | `price_cache` | Cached daily bars with provenance |
//! | `schema_migrations` | Applied migration versions |
//!
//! ```rust,no_run
//! use tickwarden_warehouse::{Warehouse, WarehouseConfig};
//!
//! # fn main() -> Result<(), tickwarden_warehouse::WarehouseError> {
//! let warehouse = Warehouse::open(WarehouseConfig::default())?;
//! let stats = warehouse.price_cache().get_cache_stats()?;
//! println!("{} cached rows", stats.total_records);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod dates;
pub mod duckdb;
pub mod instruments;
pub mod migrations;
pub mod prices;
pub mod staleness;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use duckdb::{DbLocation, DuckDbConnectionManager, PooledConnection};
pub use instruments::InstrumentRegistry;
pub use prices::{CacheStats, CleanupReport, PriceBar, PriceCacheStore, PriceRecord};
pub use staleness::StalenessPolicy;

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Stored or supplied data could not be encoded or decoded.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for tickwarden data.
    pub home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
    pub staleness: StalenessPolicy,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let home = resolve_tickwarden_home();
        let db_path = default_db_path(&home);
        Self {
            home,
            db_path,
            max_pool_size: 4,
            staleness: StalenessPolicy::default(),
        }
    }
}

/// Open handle to the cache database.
#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
    clock: Arc<dyn Clock>,
    policy: StalenessPolicy,
}

impl Warehouse {
    /// Open (creating if needed) the database file and apply migrations.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager =
            DuckDbConnectionManager::open(DbLocation::File(config.db_path), config.max_pool_size)?;
        Self::initialize(manager, config.staleness)
    }

    /// Private in-memory database with default policy, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        let manager = DuckDbConnectionManager::open(DbLocation::InMemory, 2)?;
        Self::initialize(manager, StalenessPolicy::default())
    }

    fn initialize(
        manager: DuckDbConnectionManager,
        policy: StalenessPolicy,
    ) -> Result<Self, WarehouseError> {
        {
            let connection = manager.acquire()?;
            migrations::apply_migrations(&connection)?;
        }
        Ok(Self {
            manager,
            clock: Arc::new(SystemClock),
            policy,
        })
    }

    /// Replace the time source used for staleness decisions and fetch stamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_staleness(mut self, policy: StalenessPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn price_cache(&self) -> PriceCacheStore {
        PriceCacheStore::new(self.manager.clone(), Arc::clone(&self.clock), self.policy)
    }

    #[must_use]
    pub fn instruments(&self) -> InstrumentRegistry {
        InstrumentRegistry::new(self.manager.clone())
    }

    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Path to the database file, `None` when in memory.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.manager.db_path()
    }
}

/// `$TICKWARDEN_HOME`, else `$HOME/.tickwarden`, else `./.tickwarden`.
#[must_use]
pub fn resolve_tickwarden_home() -> PathBuf {
    if let Some(path) = env::var_os("TICKWARDEN_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".tickwarden");
    }

    PathBuf::from(".tickwarden")
}

#[must_use]
pub fn default_db_path(home: &Path) -> PathBuf {
    home.join("cache").join("prices.duckdb")
}
