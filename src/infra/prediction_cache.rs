// ============================================================
// Layer 6 — Prediction Cache
// ============================================================
// Durable key-value table of computed predictions:
//
//   prediction(inchi TEXT, property_token INTEGER, value REAL,
//              UNIQUE(inchi, property_token))
//
// Write-once-per-key semantics: inserts go through
// INSERT OR IGNORE, so under a race the first writer wins and a
// duplicate writer is a no-op. `put` re-reads after the insert
// and returns the canonical stored value, which every racing
// caller then agrees on. Rows are never updated in place or
// deleted by this layer.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::errors::CacheError;

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Storage(e.to_string())
    }
}

pub struct PredictionCache {
    conn: Mutex<Connection>,
}

impl PredictionCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        Self::init(Connection::open(path.as_ref()).map_err(CacheError::from)?)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory().map_err(CacheError::from)?)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS prediction (
                inchi          TEXT NOT NULL,
                property_token INTEGER NOT NULL,
                value          REAL NOT NULL,
                UNIQUE(inchi, property_token)
            )",
            [],
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Read the cached value for a key, if any.
    pub fn get(&self, inchi: &str, property_token: usize) -> Result<Option<f64>, CacheError> {
        let conn = self.conn.lock().expect("prediction cache mutex poisoned");
        let value = conn
            .query_row(
                "SELECT value FROM prediction WHERE inchi = ?1 AND property_token = ?2",
                params![inchi, property_token as i64],
                |row| row.get::<_, f64>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Idempotent insert. Returns the stored value, which is the
    /// first writer's value if another caller got there first.
    pub fn put(&self, inchi: &str, property_token: usize, value: f64) -> Result<f64, CacheError> {
        {
            let conn = self.conn.lock().expect("prediction cache mutex poisoned");
            conn.execute(
                "INSERT OR IGNORE INTO prediction (inchi, property_token, value)
                 VALUES (?1, ?2, ?3)",
                params![inchi, property_token as i64, value],
            )?;
        }
        self.get(inchi, property_token)?.ok_or_else(|| CacheError::Conflict {
            inchi:          inchi.to_string(),
            property_token,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const INCHI: &str = "InChI=1S/C9H8O4/c1-6(10)13-8-5-3-2-4-7(8)9(11)12/h2-5H,1H3,(H,11,12)";

    #[test]
    fn test_miss_then_hit() {
        let cache = PredictionCache::open_in_memory().unwrap();
        assert_eq!(cache.get(INCHI, 6178).unwrap(), None);
        cache.put(INCHI, 6178, 0.73).unwrap();
        assert_eq!(cache.get(INCHI, 6178).unwrap(), Some(0.73));
    }

    #[test]
    fn test_first_writer_wins() {
        let cache = PredictionCache::open_in_memory().unwrap();
        let first = cache.put(INCHI, 6178, 0.73).unwrap();
        let second = cache.put(INCHI, 6178, 0.99).unwrap();
        assert_eq!(first, 0.73);
        assert_eq!(second, 0.73, "duplicate insert must be a no-op");
        assert_eq!(cache.get(INCHI, 6178).unwrap(), Some(0.73));
    }

    #[test]
    fn test_keys_are_independent() {
        let cache = PredictionCache::open_in_memory().unwrap();
        cache.put(INCHI, 1, 0.1).unwrap();
        cache.put(INCHI, 2, 0.2).unwrap();
        cache.put("InChI=1S/other", 1, 0.3).unwrap();
        assert_eq!(cache.get(INCHI, 1).unwrap(), Some(0.1));
        assert_eq!(cache.get(INCHI, 2).unwrap(), Some(0.2));
        assert_eq!(cache.get("InChI=1S/other", 1).unwrap(), Some(0.3));
    }
}
