//! Engine configuration and shutdown policy
//!
//! Every knob has a sensible default, so `EngineConfig::default()` is what
//! embedded callers normally use. The CLI can load the same structure from
//! a JSON file.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// What `Engine::stop` does with connection contexts that are still running.
///
/// In both cases the accept loop ends and the endpoint is closed; running
/// statements are never interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ShutdownPolicy {
    /// Return as soon as the accept loop has ended. Connection threads keep
    /// serving their clients until the client side hangs up.
    #[default]
    Detach,

    /// Wait until every connection thread has exited on its own.
    Drain,
}

impl ShutdownPolicy {
    pub fn waits_for_connections(&self) -> bool {
        matches!(self, Self::Drain)
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Behaviour of `Engine::stop` towards live connections
    pub shutdown: ShutdownPolicy,

    /// Capacity of the hand-off channel between the acceptor thread and
    /// the supervisor loop
    pub accept_backlog: usize,

    /// Capacity of each direction of an in-process channel connection
    pub channel_capacity: usize,

    /// Log every executed statement at debug level
    pub log_statements: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shutdown: ShutdownPolicy::default(),
            accept_backlog: 16,
            channel_capacity: 64,
            log_statements: true,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file. Missing fields take their
    /// default value.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: EngineConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownPolicy) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_accept_backlog(mut self, backlog: usize) -> Self {
        self.accept_backlog = backlog;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.accept_backlog == 0 {
            return Err(EngineError::Config(
                "accept_backlog must be at least 1".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(EngineError::Config(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.shutdown, ShutdownPolicy::Detach);
        assert!(!config.shutdown.waits_for_connections());
    }

    #[test]
    fn test_load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "shutdown": "Drain", "channel_capacity": 8 }}"#).unwrap();

        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.shutdown, ShutdownPolicy::Drain);
        assert_eq!(config.channel_capacity, 8);
        assert_eq!(config.accept_backlog, 16);
    }

    #[test]
    fn test_reject_zero_capacity() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "accept_backlog": 0 }}"#).unwrap();

        let err = EngineConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_json_round_trip_through_builder() {
        let config = EngineConfig::default()
            .with_shutdown(ShutdownPolicy::Drain)
            .with_log_statements(false);
        let json = config.to_json().unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
