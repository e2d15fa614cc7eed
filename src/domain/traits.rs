// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// By programming against traits instead of concrete types we can
// swap implementations without changing the code that uses them:
//   - PropertyStore implements PropertySource and
//     MoleculeConverter against SQLite
//   - A future service-backed converter could replace the
//     store-backed one without touching the prediction service

use std::path::Path;

use anyhow::Result;

use crate::domain::errors::ConversionError;
use crate::domain::fact::PropertyFact;

// ─── MoleculeConverter ────────────────────────────────────────────────────────
/// Canonicalization between molecule string encodings. Both
/// operations are fallible: an unresolvable input surfaces a
/// typed `ConversionError`, never a silent default.
pub trait MoleculeConverter {
    /// Resolve an InChI identity to its canonical SMILES string.
    fn inchi_to_smiles(&self, inchi: &str) -> Result<String, ConversionError>;

    /// Resolve a SMILES string to its SELFIES encoding.
    fn smiles_to_selfies(&self, smiles: &str) -> Result<String, ConversionError>;
}

// ─── PropertySource ───────────────────────────────────────────────────────────
/// Read-only access to the relational store of known
/// property/value facts.
pub trait PropertySource {
    /// All known facts for one molecule identity.
    fn known_facts(&self, inchi: &str) -> Result<Vec<PropertyFact>>;

    /// The full closed set of property tokens the store knows about.
    fn all_property_tokens(&self) -> Result<Vec<usize>>;
}

// ─── Persistable ──────────────────────────────────────────────────────────────
/// Any component whose state can be saved and restored from disk.
///
/// Implementations:
///   - PropValTokenizer → saves/loads its vocabulary layout
pub trait Persistable: Sized {
    /// Save this component's state under the given directory.
    fn save(&self, dir: &Path) -> Result<()>;

    /// Load a component's state from the given directory.
    fn load(dir: &Path) -> Result<Self>;
}
