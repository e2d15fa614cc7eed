// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums, and traits that define the core
// concepts of the system.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O, database, or network calls
//   - Only plain Rust structs, enums, and traits
//
// Why keep this layer pure?
//   - Easy to unit test (no GPU needed)
//   - Easy to understand (no framework noise)
//   - Easy to swap implementations (just implement the trait)

// Property/value facts and per-molecule fact sets
pub mod fact;

// Typed error taxonomy shared by every other layer
pub mod errors;

// Core abstractions (traits) that other layers implement
pub mod traits;
