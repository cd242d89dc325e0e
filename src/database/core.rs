//! Engine core - construction, accept loop and connection threads
//!
//! `listen` starts two threads: an acceptor blocked in `Endpoint::accept`
//! and a supervisor that waits on either a new connection or the stop
//! signal. Each accepted connection gets its own thread that reads one SQL
//! text at a time and runs it to completion before reading the next.

use super::shutdown::StopSignal;
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::protocol::{EngineConn, Endpoint, RowSink};
use crate::sql::QueryExecutor;
use crossbeam::channel::{self, Receiver};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// State reachable from every connection thread
struct Shared {
    executor: QueryExecutor,
    catalog: Arc<Catalog>,
    config: EngineConfig,
}

impl Shared {
    /// Run one SQL text. A panic inside a handler becomes `RuntimeFault`;
    /// relation locks do not poison, so the engine stays usable.
    fn run_batch(&self, text: &str, sink: &mut dyn RowSink) -> Result<()> {
        if self.config.log_statements {
            debug!(sql = text, "running batch");
        }
        match panic::catch_unwind(AssertUnwindSafe(|| self.executor.execute_sql(text, sink))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(%message, "statement execution panicked");
                Err(EngineError::RuntimeFault(message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "statement execution panicked".to_string()
    }
}

/// Embeddable SQL engine
pub struct Engine {
    shared: Arc<Shared>,
    stop: Arc<StopSignal>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let catalog = Arc::new(Catalog::new());
        Ok(Self {
            shared: Arc::new(Shared {
                executor: QueryExecutor::new(catalog.clone()),
                catalog,
                config,
            }),
            stop: Arc::new(StopSignal::new()),
            supervisor: Mutex::new(None),
            connections: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.shared.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Run SQL text directly, without a connection. Replies go to `sink`;
    /// the first failing statement ends the batch and its error is returned.
    pub fn execute(&self, sql: &str, sink: &mut dyn RowSink) -> Result<()> {
        self.shared.run_batch(sql, sink)
    }

    /// Start serving connections from `endpoint` on background threads.
    ///
    /// An engine listens on at most one endpoint, and not after `stop`.
    pub fn listen(&self, endpoint: Arc<dyn Endpoint>) -> Result<()> {
        let mut supervisor = self.supervisor.lock();
        if self.stop.is_triggered() {
            return Err(EngineError::Connection("engine is stopped".to_string()));
        }
        if supervisor.is_some() {
            return Err(EngineError::Connection("engine is already listening".to_string()));
        }

        let (handoff_tx, handoff_rx) = channel::bounded(self.shared.config.accept_backlog);

        let acceptor_endpoint = endpoint.clone();
        let acceptor_stop = self.stop.clone();
        thread::Builder::new()
            .name("aiondb-accept".to_string())
            .spawn(move || loop {
                match acceptor_endpoint.accept() {
                    Ok(conn) => {
                        if handoff_tx.send(conn).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        if !acceptor_stop.is_triggered() {
                            warn!(error = %err, "accept failed, stopping engine");
                            acceptor_stop.trigger();
                        }
                        break;
                    }
                }
            })?;

        let shared = self.shared.clone();
        let stop = self.stop.clone();
        let connections = self.connections.clone();
        let handle = thread::Builder::new()
            .name("aiondb-supervisor".to_string())
            .spawn(move || supervise(shared, stop, connections, endpoint, handoff_rx))?;
        *supervisor = Some(handle);
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_triggered()
    }

    /// Stop accepting connections. Safe to call any number of times.
    ///
    /// Under `ShutdownPolicy::Drain` this also waits for every connection
    /// thread, which ends when its client hangs up.
    pub fn stop(&self) {
        self.shutdown(self.shared.config.shutdown.waits_for_connections());
    }

    fn shutdown(&self, drain: bool) {
        if self.stop.trigger() {
            info!("stopping engine");
        }
        let supervisor = self.supervisor.lock().take();
        if let Some(handle) = supervisor {
            if handle.join().is_err() {
                warn!("supervisor thread panicked");
            }
        }
        if drain {
            let handles = std::mem::take(&mut *self.connections.lock());
            for handle in handles {
                if handle.join().is_err() {
                    warn!("connection thread panicked");
                }
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Never block on clients from a destructor
        self.shutdown(false);
    }
}

fn supervise(
    shared: Arc<Shared>,
    stop: Arc<StopSignal>,
    connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
    endpoint: Arc<dyn Endpoint>,
    handoff: Receiver<Box<dyn EngineConn>>,
) {
    info!("accept loop started");
    let stopped = stop.receiver();
    let mut next_id: u64 = 0;

    loop {
        crossbeam::select! {
            recv(handoff) -> conn => {
                let Ok(conn) = conn else { break };
                if stop.is_triggered() {
                    break;
                }
                next_id += 1;
                spawn_connection(&shared, &connections, next_id, conn);
            }
            recv(stopped) -> _ => break,
        }
    }

    endpoint.close();
    info!("accept loop stopped");
}

fn spawn_connection(
    shared: &Arc<Shared>,
    connections: &Mutex<Vec<JoinHandle<()>>>,
    id: u64,
    conn: Box<dyn EngineConn>,
) {
    let context = shared.clone();
    let spawned = thread::Builder::new()
        .name(format!("aiondb-conn-{}", id))
        .spawn(move || serve_connection(&context, id, conn));

    match spawned {
        Ok(handle) => {
            let mut handles = connections.lock();
            handles.retain(|h| !h.is_finished());
            handles.push(handle);
        }
        Err(err) => warn!(connection = id, error = %err, "failed to spawn connection thread"),
    }
}

fn serve_connection(shared: &Shared, id: u64, mut conn: Box<dyn EngineConn>) {
    debug!(connection = id, "connection opened");
    loop {
        let text = match conn.read_statement() {
            Ok(Some(text)) => text,
            Ok(None) => break,
            Err(err) => {
                warn!(connection = id, error = %err, "read failed, closing connection");
                break;
            }
        };

        if let Err(err) = shared.run_batch(&text, &mut conn) {
            debug!(connection = id, error = %err, "batch failed");
            if let Err(write_err) = conn.write_error(&err) {
                warn!(connection = id, error = %write_err, "failed to report error");
                break;
            }
        }
    }
    debug!(connection = id, "connection closed");
}
