//! Result decorators wrapping a row sink
//!
//! Each decorator forwards results, errors, headers and end markers
//! untouched and filters only `write_row`. The SELECT handler stacks them
//! as distinct, then offset, then limit, in the order rows flow.

use super::RowSink;
use crate::error::{EngineError, Result};
use ahash::AHashMap;

/// Membership tree keyed column by column
#[derive(Debug, Default)]
struct SeenTree {
    children: AHashMap<String, SeenTree>,
}

impl SeenTree {
    /// Record `keys`; returns true if they were not present before.
    fn insert(&mut self, keys: &[String]) -> bool {
        let mut node = self;
        let mut fresh = false;
        for key in keys {
            if !node.children.contains_key(key) {
                fresh = true;
            }
            node = node.children.entry(key.clone()).or_default();
        }
        fresh
    }
}

/// Suppresses rows already emitted. With `on = Some(k)` only the first k
/// columns are compared and those columns are not emitted.
pub struct Distinct<S: RowSink> {
    inner: S,
    on: Option<usize>,
    seen: SeenTree,
}

impl<S: RowSink> Distinct<S> {
    pub fn new(inner: S, on: Option<usize>) -> Self {
        Self {
            inner,
            on,
            seen: SeenTree::default(),
        }
    }
}

impl<S: RowSink> RowSink for Distinct<S> {
    fn write_result(&mut self, last_id: i64, rows_affected: i64) -> Result<()> {
        self.inner.write_result(last_id, rows_affected)
    }

    fn write_error(&mut self, err: &EngineError) -> Result<()> {
        self.inner.write_error(err)
    }

    fn write_row_header(&mut self, header: Vec<String>) -> Result<()> {
        match self.on {
            Some(k) => self.inner.write_row_header(header.into_iter().skip(k).collect()),
            None => self.inner.write_row_header(header),
        }
    }

    fn write_row(&mut self, row: Vec<String>) -> Result<()> {
        let width = self.on.unwrap_or(row.len()).min(row.len());
        if !self.seen.insert(&row[..width]) {
            return Ok(());
        }
        match self.on {
            Some(k) => self.inner.write_row(row.into_iter().skip(k).collect()),
            None => self.inner.write_row(row),
        }
    }

    fn write_row_end(&mut self) -> Result<()> {
        self.inner.write_row_end()
    }
}

/// Passes the first `limit` rows through
pub struct Limit<S: RowSink> {
    inner: S,
    limit: u64,
    passed: u64,
}

impl<S: RowSink> Limit<S> {
    pub fn new(inner: S, limit: u64) -> Self {
        Self {
            inner,
            limit,
            passed: 0,
        }
    }
}

impl<S: RowSink> RowSink for Limit<S> {
    fn write_result(&mut self, last_id: i64, rows_affected: i64) -> Result<()> {
        self.inner.write_result(last_id, rows_affected)
    }

    fn write_error(&mut self, err: &EngineError) -> Result<()> {
        self.inner.write_error(err)
    }

    fn write_row_header(&mut self, header: Vec<String>) -> Result<()> {
        self.inner.write_row_header(header)
    }

    fn write_row(&mut self, row: Vec<String>) -> Result<()> {
        if self.passed >= self.limit {
            return Ok(());
        }
        self.passed += 1;
        self.inner.write_row(row)
    }

    fn write_row_end(&mut self) -> Result<()> {
        self.inner.write_row_end()
    }
}

/// Drops the first `offset` rows
pub struct Offset<S: RowSink> {
    inner: S,
    offset: u64,
    dropped: u64,
}

impl<S: RowSink> Offset<S> {
    pub fn new(inner: S, offset: u64) -> Self {
        Self {
            inner,
            offset,
            dropped: 0,
        }
    }
}

impl<S: RowSink> RowSink for Offset<S> {
    fn write_result(&mut self, last_id: i64, rows_affected: i64) -> Result<()> {
        self.inner.write_result(last_id, rows_affected)
    }

    fn write_error(&mut self, err: &EngineError) -> Result<()> {
        self.inner.write_error(err)
    }

    fn write_row_header(&mut self, header: Vec<String>) -> Result<()> {
        self.inner.write_row_header(header)
    }

    fn write_row(&mut self, row: Vec<String>) -> Result<()> {
        if self.dropped < self.offset {
            self.dropped += 1;
            return Ok(());
        }
        self.inner.write_row(row)
    }

    fn write_row_end(&mut self) -> Result<()> {
        self.inner.write_row_end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Reply, ReplyCollector};

    fn feed<S: RowSink>(sink: &mut S, rows: &[&[&str]]) {
        sink.write_row_header(vec!["k".into(), "v".into()]).unwrap();
        for row in rows {
            sink.write_row(row.iter().map(|s| s.to_string()).collect())
                .unwrap();
        }
        sink.write_row_end().unwrap();
    }

    fn rows_of(collector: ReplyCollector) -> Vec<Vec<String>> {
        match collector.into_replies().remove(0) {
            Reply::Rows { rows, .. } => rows,
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_distinct_then_offset_then_limit() {
        let mut collector = ReplyCollector::new();
        {
            let limit = Limit::new(&mut collector, 3);
            let offset = Offset::new(limit, 2);
            let mut distinct = Distinct::new(offset, None);
            let mut rows = Vec::new();
            for i in 0..10 {
                // every value twice
                rows.push([i.to_string(), "x".to_string()]);
                rows.push([i.to_string(), "x".to_string()]);
            }
            let refs: Vec<Vec<&str>> = rows.iter().map(|r| r.iter().map(|s| s.as_str()).collect()).collect();
            let slices: Vec<&[&str]> = refs.iter().map(|r| r.as_slice()).collect();
            feed(&mut distinct, &slices);
        }
        let keys: Vec<String> = rows_of(collector).into_iter().map(|r| r[0].clone()).collect();
        assert_eq!(keys, vec!["2", "3", "4"]);
    }

    #[test]
    fn test_distinct_on_drops_key_columns() {
        let mut collector = ReplyCollector::new();
        {
            let mut distinct = Distinct::new(&mut collector, Some(1));
            feed(&mut distinct, &[&["a", "1"], &["a", "2"], &["b", "3"]]);
        }
        match collector.into_replies().remove(0) {
            Reply::Rows { header, rows } => {
                assert_eq!(header, vec!["v"]);
                assert_eq!(rows, vec![vec!["1".to_string()], vec!["3".to_string()]]);
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_seen_tree_prefix_is_not_a_match() {
        let mut seen = SeenTree::default();
        assert!(seen.insert(&["a".into(), "b".into()]));
        assert!(seen.insert(&["a".into(), "c".into()]));
        assert!(!seen.insert(&["a".into(), "b".into()]));
    }
}
