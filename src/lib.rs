//! aiondb - embeddable in-memory SQL engine
//!
//! SQL text arrives over an abstract connection, is lexed and parsed into a
//! typed statement tree, and runs against in-memory relations guarded by
//! per-relation read/write locks. Results go back through the same
//! connection as canonical strings.
//!
//! ## Architecture
//! - sql: lexer, parser, clause dispatch, nested-loop join and row consumers
//! - storage: relations, tuples and constraint enforcement
//! - catalog: name to relation map
//! - protocol: connection traits, result decorators, in-process transport
//! - database: the engine, its accept loop and connection threads

pub mod catalog;
pub mod config;
pub mod database;
pub mod protocol;
pub mod sql;
pub mod storage;
pub mod types;

mod error;

pub use config::{EngineConfig, ShutdownPolicy};
pub use database::Engine;
pub use error::{EngineError, Result};
pub use protocol::{ChannelEndpoint, DriverConn, Endpoint, EngineConn, Reply, ReplyCollector, RowSink};
pub use sql::parse;
pub use types::Value;
