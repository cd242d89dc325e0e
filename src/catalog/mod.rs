//! Relation catalog

pub mod registry;

pub use registry::Catalog;
