use ::duckdb::params;

use crate::duckdb::DuckDbConnectionManager;
use crate::WarehouseError;

/// Maps ticker symbols to stable integer ids used as cache keys.
#[derive(Clone)]
pub struct InstrumentRegistry {
    manager: DuckDbConnectionManager,
}

impl InstrumentRegistry {
    pub(crate) fn new(manager: DuckDbConnectionManager) -> Self {
        Self { manager }
    }

    /// Id for `symbol`, registering it on first use. Symbols are matched
    /// exactly; callers normalize case beforehand.
    pub fn resolve_or_create(&self, symbol: &str) -> Result<i64, WarehouseError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(WarehouseError::InvalidData(String::from(
                "instrument symbol cannot be empty",
            )));
        }

        let connection = self.manager.acquire()?;
        connection.execute(
            "INSERT INTO instruments (symbol) VALUES (?) ON CONFLICT (symbol) DO NOTHING",
            params![symbol],
        )?;
        let instrument_id = connection.query_row(
            "SELECT instrument_id FROM instruments WHERE symbol = ?",
            params![symbol],
            |row| row.get(0),
        )?;
        Ok(instrument_id)
    }

    pub fn lookup(&self, symbol: &str) -> Result<Option<i64>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement =
            connection.prepare("SELECT instrument_id FROM instruments WHERE symbol = ?")?;
        let mut rows = statement.query(params![symbol.trim()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}
