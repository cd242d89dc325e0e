//! In-process transport over crossbeam channels
//!
//! `ChannelEndpoint::connect` hands the engine a `ChannelConn` and returns
//! the client half, a `DriverConn`. The engine marks the end of each batch
//! when it comes back for the next statement, which lets the driver know
//! how many replies a batch produced.

use super::{EngineConn, Endpoint, Reply, ReplyCollector, RowSink};
use crate::error::{EngineError, Result};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

#[derive(Debug)]
enum Frame {
    Result { last_id: i64, rows_affected: i64 },
    Error(String),
    Header(Vec<String>),
    Row(Vec<String>),
    RowEnd,
    /// Every reply of the previous batch has been written
    Done,
}

/// Engine side of an in-process connection
pub struct ChannelConn {
    statements: Receiver<String>,
    frames: Sender<Frame>,
    served: bool,
}

impl ChannelConn {
    fn send(&self, frame: Frame) -> Result<()> {
        self.frames
            .send(frame)
            .map_err(|_| EngineError::Connection("client hung up".to_string()))
    }
}

impl RowSink for ChannelConn {
    fn write_result(&mut self, last_id: i64, rows_affected: i64) -> Result<()> {
        self.send(Frame::Result {
            last_id,
            rows_affected,
        })
    }

    fn write_error(&mut self, err: &EngineError) -> Result<()> {
        self.send(Frame::Error(err.to_string()))
    }

    fn write_row_header(&mut self, header: Vec<String>) -> Result<()> {
        self.send(Frame::Header(header))
    }

    fn write_row(&mut self, row: Vec<String>) -> Result<()> {
        self.send(Frame::Row(row))
    }

    fn write_row_end(&mut self) -> Result<()> {
        self.send(Frame::RowEnd)
    }
}

impl EngineConn for ChannelConn {
    fn read_statement(&mut self) -> Result<Option<String>> {
        if self.served {
            // A vanished client shows up on the recv below
            let _ = self.frames.send(Frame::Done);
        }
        match self.statements.recv() {
            Ok(text) => {
                self.served = true;
                Ok(Some(text))
            }
            Err(_) => Ok(None),
        }
    }
}

/// Client side of an in-process connection
pub struct DriverConn {
    statements: Sender<String>,
    frames: Receiver<Frame>,
}

impl DriverConn {
    /// Send one batch and collect a reply per executed statement.
    pub fn query_batch(&self, sql: &str) -> Result<Vec<Reply>> {
        self.statements
            .send(sql.to_string())
            .map_err(|_| EngineError::Connection("engine closed the connection".to_string()))?;

        let mut collector = ReplyCollector::new();
        loop {
            let frame = self
                .frames
                .recv()
                .map_err(|_| EngineError::Connection("engine closed the connection".to_string()))?;
            match frame {
                Frame::Result {
                    last_id,
                    rows_affected,
                } => collector.write_result(last_id, rows_affected)?,
                Frame::Error(message) => collector.push_error(message),
                Frame::Header(header) => collector.write_row_header(header)?,
                Frame::Row(row) => collector.write_row(row)?,
                Frame::RowEnd => collector.write_row_end()?,
                Frame::Done => break,
            }
        }

        Ok(collector.into_replies())
    }

    /// Send one batch and return the reply of its last statement.
    pub fn query(&self, sql: &str) -> Result<Reply> {
        Ok(self.query_batch(sql)?.pop().unwrap_or(Reply::Result {
            last_id: 0,
            rows_affected: 0,
        }))
    }
}

/// Endpoint handing out in-process connections
pub struct ChannelEndpoint {
    incoming_tx: Mutex<Option<Sender<ChannelConn>>>,
    incoming_rx: Receiver<ChannelConn>,
    closer_tx: Mutex<Option<Sender<()>>>,
    closer_rx: Receiver<()>,
    capacity: usize,
}

impl ChannelEndpoint {
    /// `capacity` bounds each direction of every connection.
    pub fn new(capacity: usize) -> Self {
        let (incoming_tx, incoming_rx) = channel::unbounded();
        let (closer_tx, closer_rx) = channel::bounded(0);
        Self {
            incoming_tx: Mutex::new(Some(incoming_tx)),
            incoming_rx,
            closer_tx: Mutex::new(Some(closer_tx)),
            closer_rx,
            capacity: capacity.max(1),
        }
    }

    /// Open a new connection. Fails once the endpoint is closed.
    pub fn connect(&self) -> Result<DriverConn> {
        let (statement_tx, statement_rx) = channel::bounded(self.capacity);
        let (frame_tx, frame_rx) = channel::bounded(self.capacity);
        let conn = ChannelConn {
            statements: statement_rx,
            frames: frame_tx,
            served: false,
        };

        let incoming = self.incoming_tx.lock();
        let sender = incoming
            .as_ref()
            .ok_or_else(|| EngineError::Connection("endpoint closed".to_string()))?;
        sender
            .send(conn)
            .map_err(|_| EngineError::Connection("endpoint closed".to_string()))?;

        Ok(DriverConn {
            statements: statement_tx,
            frames: frame_rx,
        })
    }
}

impl Endpoint for ChannelEndpoint {
    fn accept(&self) -> Result<Box<dyn EngineConn>> {
        crossbeam::select! {
            recv(self.incoming_rx) -> conn => match conn {
                Ok(conn) => Ok(Box::new(conn) as Box<dyn EngineConn>),
                Err(_) => Err(EngineError::Connection("endpoint closed".to_string())),
            },
            recv(self.closer_rx) -> _ => Err(EngineError::Connection("endpoint closed".to_string())),
        }
    }

    fn close(&self) {
        self.closer_tx.lock().take();
        self.incoming_tx.lock().take();
    }
}
