//! Storage layer implementation
//!
//! Every table lives in memory as a `Relation`: its schema plus an ordered
//! vector of tuples behind one reader/writer lock. Scans are linear.

pub mod relation;

pub use relation::{InsertOutcome, Relation, RelationData, Tuple};
