// ============================================================
// Layer 4 — Relational Property Store
// ============================================================
// Read-only access to the SQLite database the ETL step produces.
// Relevant tables:
//
//   compound(inchi, smiles, selfies)
//   source(source_id, source)
//   property(property_id, property_token)
//   category(category_id, category)
//   property_category(property_id, category_id)
//   activity(inchi, source_id, property_id, value_token)
//
// property_token and value_token are GLOBAL vocabulary indices,
// written by the same tokenizer layout this crate uses. The store
// also backs the molecule-conversion contract: the ETL step
// records the canonical SMILES and SELFIES encodings per InChI,
// so conversion is a lookup, and an unknown molecule is a typed
// ConversionError.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::errors::ConversionError;
use crate::domain::fact::PropertyFact;
use crate::domain::traits::{MoleculeConverter, PropertySource};

/// One molecule as pulled for training: identity, structural
/// encoding, and every known (property_token, value_token) fact.
#[derive(Debug, Clone)]
pub struct TrainingRow {
    pub inchi:   String,
    pub selfies: String,
    pub facts:   Vec<(i64, i64)>,
}

pub struct PropertyStore {
    conn: Mutex<Connection>,
}

impl PropertyStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("cannot open property store '{}'", path.display()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Mutex::new(Connection::open_in_memory()?) })
    }

    /// Every molecule in the store with its selfies encoding and
    /// its full fact list, grouped per molecule. Molecules without
    /// any recorded activity still appear, with an empty fact list.
    pub fn training_rows(&self) -> Result<Vec<TrainingRow>> {
        let conn = self.conn.lock().expect("property store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT c.inchi, c.selfies, prop.property_token, act.value_token
             FROM compound c
             LEFT JOIN activity act ON act.inchi = c.inchi
             LEFT JOIN property prop ON prop.property_id = act.property_id
             ORDER BY c.inchi",
        )?;

        let mut rows = stmt.query([])?;
        let mut out: Vec<TrainingRow> = Vec::new();
        while let Some(row) = rows.next()? {
            let inchi: String = row.get(0)?;
            let selfies: String = row.get(1)?;
            let prop: Option<i64> = row.get(2)?;
            let val: Option<i64> = row.get(3)?;

            if out.last().map(|r| r.inchi != inchi).unwrap_or(true) {
                out.push(TrainingRow { inchi, selfies, facts: Vec::new() });
            }
            if let (Some(p), Some(v)) = (prop, val) {
                out.last_mut().unwrap().facts.push((p, v));
            }
        }
        tracing::info!("Loaded {} molecules from the property store", out.len());
        Ok(out)
    }

    fn lookup_one(&self, sql: &str, key: &str) -> Result<Option<String>, ConversionError> {
        let conn = self.conn.lock().expect("property store mutex poisoned");
        conn.query_row(sql, params![key], |row| row.get::<_, String>(0))
            .optional()
            .map_err(|e| ConversionError::Lookup(e.to_string()))
    }
}

impl PropertySource for PropertyStore {
    fn known_facts(&self, inchi: &str) -> Result<Vec<PropertyFact>> {
        let conn = self.conn.lock().expect("property store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT prop.property_token, act.value_token, cat.category, src.source
             FROM activity act
             INNER JOIN source src ON act.source_id = src.source_id
             INNER JOIN property prop ON act.property_id = prop.property_id
             INNER JOIN property_category prop_cat ON prop.property_id = prop_cat.property_id
             INNER JOIN category cat ON prop_cat.category_id = cat.category_id
             WHERE act.inchi = ?1",
        )?;
        let facts = stmt
            .query_map(params![inchi], |row| {
                Ok(PropertyFact::new(
                    row.get::<_, i64>(0)? as usize,
                    row.get::<_, i64>(1)? as usize,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(facts)
    }

    fn all_property_tokens(&self) -> Result<Vec<usize>> {
        let conn = self.conn.lock().expect("property store mutex poisoned");
        let mut stmt = conn.prepare("SELECT DISTINCT property_token FROM property")?;
        let tokens = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tokens.into_iter().map(|t| t as usize).collect())
    }
}

impl MoleculeConverter for PropertyStore {
    fn inchi_to_smiles(&self, inchi: &str) -> Result<String, ConversionError> {
        self.lookup_one("SELECT smiles FROM compound WHERE inchi = ?1", inchi)?
            .ok_or_else(|| ConversionError::UnknownInchi(inchi.to_string()))
    }

    fn smiles_to_selfies(&self, smiles: &str) -> Result<String, ConversionError> {
        self.lookup_one("SELECT selfies FROM compound WHERE smiles = ?1", smiles)?
            .ok_or_else(|| ConversionError::UnknownSmiles(smiles.to_string()))
    }
}


// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::testing::seeded_store;
    use super::*;

    const INCHI: &str = "InChI=1S/CH4/h1H4";

    #[test]
    fn test_known_facts_join() {
        let store = seeded_store(INCHI, "C", "[C]", &[(24, 44), (25, 45)]);
        let facts = store.known_facts(INCHI).unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].property_token, 24);
        assert_eq!(facts[0].value_token, 44);
        assert_eq!(facts[0].category, "toxicity");
        assert_eq!(facts[0].source, "assay-db");
    }

    #[test]
    fn test_all_property_tokens() {
        let store = seeded_store(INCHI, "C", "[C]", &[(24, 44), (25, 45)]);
        let mut tokens = store.all_property_tokens().unwrap();
        tokens.sort_unstable();
        assert_eq!(tokens, vec![24, 25]);
    }

    #[test]
    fn test_training_rows_group_facts_per_molecule() {
        let store = seeded_store(INCHI, "C", "[C]", &[(24, 44), (25, 45)]);
        let rows = store.training_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].selfies, "[C]");
        assert_eq!(rows[0].facts, vec![(24, 44), (25, 45)]);
    }

    #[test]
    fn test_conversion_contract() {
        let store = seeded_store(INCHI, "C", "[C]", &[]);
        assert_eq!(store.inchi_to_smiles(INCHI).unwrap(), "C");
        assert_eq!(store.smiles_to_selfies("C").unwrap(), "[C]");
        assert!(matches!(
            store.inchi_to_smiles("InChI=1S/unknown"),
            Err(ConversionError::UnknownInchi(_))
        ));
    }
}
