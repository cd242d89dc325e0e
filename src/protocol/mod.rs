//! Connection protocol between the engine and its clients
//!
//! The engine reads SQL text from an `EngineConn` and answers through the
//! `RowSink` half of the same connection. Every value crosses this boundary
//! as its canonical string. Concrete transports live in submodules.

pub mod channel;
pub mod decorators;

pub use channel::{ChannelConn, ChannelEndpoint, DriverConn};
pub use decorators::{Distinct, Limit, Offset};

use crate::error::{EngineError, Result};

/// Outbound half of a connection
pub trait RowSink {
    fn write_result(&mut self, last_id: i64, rows_affected: i64) -> Result<()>;
    fn write_error(&mut self, err: &EngineError) -> Result<()>;
    fn write_row_header(&mut self, header: Vec<String>) -> Result<()>;
    fn write_row(&mut self, row: Vec<String>) -> Result<()>;
    fn write_row_end(&mut self) -> Result<()>;
}

impl<T: RowSink + ?Sized> RowSink for &mut T {
    fn write_result(&mut self, last_id: i64, rows_affected: i64) -> Result<()> {
        (**self).write_result(last_id, rows_affected)
    }

    fn write_error(&mut self, err: &EngineError) -> Result<()> {
        (**self).write_error(err)
    }

    fn write_row_header(&mut self, header: Vec<String>) -> Result<()> {
        (**self).write_row_header(header)
    }

    fn write_row(&mut self, row: Vec<String>) -> Result<()> {
        (**self).write_row(row)
    }

    fn write_row_end(&mut self) -> Result<()> {
        (**self).write_row_end()
    }
}

impl<T: RowSink + ?Sized> RowSink for Box<T> {
    fn write_result(&mut self, last_id: i64, rows_affected: i64) -> Result<()> {
        (**self).write_result(last_id, rows_affected)
    }

    fn write_error(&mut self, err: &EngineError) -> Result<()> {
        (**self).write_error(err)
    }

    fn write_row_header(&mut self, header: Vec<String>) -> Result<()> {
        (**self).write_row_header(header)
    }

    fn write_row(&mut self, row: Vec<String>) -> Result<()> {
        (**self).write_row(row)
    }

    fn write_row_end(&mut self) -> Result<()> {
        (**self).write_row_end()
    }
}

/// Engine side of a client connection
pub trait EngineConn: RowSink + Send {
    /// Next unit of SQL text, or `None` once the client has hung up.
    fn read_statement(&mut self) -> Result<Option<String>>;
}

/// Source of new connections
pub trait Endpoint: Send + Sync {
    /// Block until a client connects. An error ends the accept loop.
    fn accept(&self) -> Result<Box<dyn EngineConn>>;

    /// Stop accepting. Pending and future `accept` calls fail.
    fn close(&self);
}

/// Answer to one statement as seen by a client
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Result { last_id: i64, rows_affected: i64 },
    Rows {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Error(String),
}

impl Reply {
    pub fn rows_affected(&self) -> Option<i64> {
        match self {
            Reply::Result { rows_affected, .. } => Some(*rows_affected),
            _ => None,
        }
    }

    pub fn rows(&self) -> Option<&[Vec<String>]> {
        match self {
            Reply::Rows { rows, .. } => Some(rows),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

/// Sink that assembles written frames into replies.
#[derive(Debug, Default)]
pub struct ReplyCollector {
    replies: Vec<Reply>,
    pending: Option<(Vec<String>, Vec<Vec<String>>)>,
}

impl ReplyCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed replies. A row set without its end marker is included.
    pub fn into_replies(mut self) -> Vec<Reply> {
        self.flush_pending();
        self.replies
    }

    /// Record an error that arrived already rendered.
    pub fn push_error(&mut self, message: String) {
        self.flush_pending();
        self.replies.push(Reply::Error(message));
    }

    fn flush_pending(&mut self) {
        if let Some((header, rows)) = self.pending.take() {
            self.replies.push(Reply::Rows { header, rows });
        }
    }
}

impl RowSink for ReplyCollector {
    fn write_result(&mut self, last_id: i64, rows_affected: i64) -> Result<()> {
        self.flush_pending();
        self.replies.push(Reply::Result {
            last_id,
            rows_affected,
        });
        Ok(())
    }

    fn write_error(&mut self, err: &EngineError) -> Result<()> {
        self.push_error(err.to_string());
        Ok(())
    }

    fn write_row_header(&mut self, header: Vec<String>) -> Result<()> {
        self.flush_pending();
        self.pending = Some((header, Vec::new()));
        Ok(())
    }

    fn write_row(&mut self, row: Vec<String>) -> Result<()> {
        match &mut self.pending {
            Some((_, rows)) => {
                rows.push(row);
                Ok(())
            }
            None => Err(EngineError::Connection("row written before header".into())),
        }
    }

    fn write_row_end(&mut self) -> Result<()> {
        self.flush_pending();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_groups_frames() {
        let mut collector = ReplyCollector::new();
        collector.write_result(3, 1).unwrap();
        collector.write_row_header(vec!["a".into()]).unwrap();
        collector.write_row(vec!["1".into()]).unwrap();
        collector.write_row(vec!["2".into()]).unwrap();
        collector.write_row_end().unwrap();
        collector
            .write_error(&EngineError::TableNotFound("t".into()))
            .unwrap();

        let replies = collector.into_replies();
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0].rows_affected(), Some(1));
        assert_eq!(replies[1].rows().unwrap().len(), 2);
        assert_eq!(replies[2], Reply::Error("table t does not exist".into()));
    }

    #[test]
    fn test_row_without_header_is_rejected() {
        let mut collector = ReplyCollector::new();
        assert!(collector.write_row(vec!["x".into()]).is_err());
    }
}
