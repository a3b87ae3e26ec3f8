//! Storage node module
//!
//! Each storage node runs on its own thread and holds whole-file replicas in
//! an in-memory chunk table. The coordinator reaches a node only through its
//! single-slot mailbox.

pub mod cluster;
pub mod mailbox;
pub mod node;

pub use cluster::{Cluster, NodeHandle};
pub use mailbox::{Mailbox, Request, Response};
pub use node::StorageNode;

/// Identifier assigned to an uploaded file
pub type FileId = u64;

/// Index of a storage node inside its cluster
pub type NodeId = usize;

/// Trait for the local chunk table of a storage node
pub trait ChunkStore {
    /// Store a blob under `file_id`, replacing any previous blob for that id
    fn store(&mut self, file_id: FileId, data: Vec<u8>);

    /// Copy out the blob stored under `file_id`
    fn retrieve(&self, file_id: FileId) -> Option<Vec<u8>>;

    /// Whether a blob is stored under `file_id`
    fn contains(&self, file_id: FileId) -> bool;

    /// Get storage statistics
    fn stats(&self) -> StorageStats;
}

/// Storage statistics
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    /// Total number of stored chunks
    pub total_chunks: usize,
    /// Total bytes stored
    pub total_bytes: u64,
    /// Number of write operations
    pub writes: usize,
}

impl StorageStats {
    /// Create new empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write of `bytes`, replacing a previous blob of `replaced` bytes if any
    pub fn record_write(&mut self, bytes: u64, replaced: Option<u64>) {
        self.writes += 1;
        self.total_bytes += bytes;
        match replaced {
            Some(old) => self.total_bytes = self.total_bytes.saturating_sub(old),
            None => self.total_chunks += 1,
        }
    }
}
