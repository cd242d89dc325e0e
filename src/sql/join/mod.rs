/// JOIN module: virtual rows built by nested-loop scans
pub mod nested_loop;

pub use nested_loop::{merge, JoinLevel, NestedLoopJoin, OnCondition};

use crate::types::Value;

/// Joined row keyed by `table.attribute`
pub type VirtualRow = ahash::AHashMap<String, Value>;
