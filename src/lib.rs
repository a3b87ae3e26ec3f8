//! Mini DFS
//!
//! A minimal in-process distributed file store. A single coordinator accepts
//! file-level commands and fans them out to a fixed set of storage-node
//! threads, each holding whole-file replicas in memory.

pub mod coordinator;
pub mod namespace;
pub mod placement;
pub mod shell;
pub mod storage;

pub use coordinator::{Command, Coordinator, Outcome};
pub use namespace::{FileRecord, NamespaceStore};
pub use placement::{select_replicas, LeastLoaded, PlacementPolicy};
pub use shell::Shell;
pub use storage::{Cluster, FileId, NodeId};

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced at the coordinator's command boundary
#[derive(Error, Debug)]
pub enum DfsError {
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("input a blank line")]
    EmptyCommand,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no such file in MiniDFS: {0}")]
    NotFound(String),

    #[error("Failed in creating dest file. Please ensure File: {0} does not exist")]
    Conflict(String),

    #[error("Failed in opening src file: file {}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Failed in creating file {} for {node}. Please ensure dest directory exists",
        .path.display()
    )]
    DestinationUnavailable {
        path: PathBuf,
        node: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "inconsistent checksum for files from different data servers \
         ({node}: expected {expected}, got {actual}). File may be corrupted"
    )]
    IntegrityMismatch {
        node: String,
        expected: String,
        actual: String,
    },

    #[error("Mailbox of {0} still holds an unconsumed command")]
    MailboxBusy(String),

    #[error("Failed to spawn storage node thread: {0}")]
    NodeSpawn(#[source] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unexpected outcome: {0}")]
    UnexpectedOutcome(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, DfsError>;

/// Configuration for the coordinator and its storage nodes
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of storage nodes to spawn
    pub node_count: usize,
    /// Number of nodes receiving a copy of every upload
    pub replication_factor: usize,
    /// Prefix for node identities; nodes are numbered from 1
    pub node_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_count: 4,
            replication_factor: 4,
            node_prefix: "data_node_".to_string(),
        }
    }
}

impl Config {
    /// Create a new configuration
    pub fn new(node_count: usize, replication_factor: usize) -> Self {
        Self {
            node_count,
            replication_factor,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.node_count == 0 {
            return Err(DfsError::Config(
                "Node count must be greater than 0".to_string(),
            ));
        }
        if self.replication_factor == 0 {
            return Err(DfsError::Config(
                "Replication factor must be greater than 0".to_string(),
            ));
        }
        if self.replication_factor > self.node_count {
            return Err(DfsError::Config(format!(
                "Replication factor {} exceeds node count {}",
                self.replication_factor, self.node_count
            )));
        }
        Ok(())
    }

    /// Identity of the node at `index` (0-based)
    pub fn node_name(&self, index: NodeId) -> String {
        format!("{}{}", self.node_prefix, index + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.node_name(0), "data_node_1");
        assert_eq!(config.node_name(3), "data_node_4");
    }

    #[test]
    fn test_replication_factor_above_node_count_is_rejected() {
        let config = Config::new(3, 4);
        assert!(matches!(config.validate(), Err(DfsError::Config(_))));
    }

    #[test]
    fn test_zero_values_are_rejected() {
        assert!(Config::new(0, 0).validate().is_err());
        assert!(Config::new(4, 0).validate().is_err());
    }
}
