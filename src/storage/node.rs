//! Storage node implementation
//!
//! A storage node owns its chunk table and runs an unbounded execution loop:
//! wait for a command in the mailbox, apply it to the chunk table, publish the
//! response and go back to waiting.

use crate::storage::{ChunkStore, FileId, Mailbox, Request, Response, StorageStats};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// A storage node holding whole-file replicas in memory
#[derive(Debug)]
pub struct StorageNode {
    /// Node identity, e.g. `data_node_1`
    name: String,
    /// File id to stored bytes
    chunks: HashMap<FileId, Vec<u8>>,
    /// Storage statistics
    stats: StorageStats,
    /// Aggregate stored bytes, readable by the coordinator between commands
    load: Arc<AtomicU64>,
}

impl StorageNode {
    /// Create an empty node publishing its load through `load`
    pub fn new(name: impl Into<String>, load: Arc<AtomicU64>) -> Self {
        load.store(0, Ordering::SeqCst);
        Self {
            name: name.into(),
            chunks: HashMap::new(),
            stats: StorageStats::new(),
            load,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current aggregate stored bytes
    pub fn load_bytes(&self) -> u64 {
        self.stats.total_bytes
    }

    /// Get the number of chunks stored on this node
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Apply one command to the chunk table
    pub fn execute(&mut self, request: Request) -> Response {
        match request {
            Request::Upload { file_id, payload } => {
                let size = payload.len() as u64;
                self.store(file_id, payload);
                Response::Stored { size }
            }
            // The offset does not narrow the result; the whole blob is returned.
            Request::Download { file_id } | Request::DownloadById { file_id, .. } => {
                Response::Payload(self.retrieve(file_id).unwrap_or_default())
            }
            // Files are never split, so any blob under the id matches every offset.
            Request::Locate { file_id, .. } => Response::Located(self.contains(file_id)),
        }
    }

    /// Serve the mailbox for the lifetime of the process
    pub fn run(mut self, mailbox: Arc<Mailbox>) {
        info!(node = %self.name, "storage node started");
        loop {
            let request = mailbox.wait_request();
            debug!(
                node = %self.name,
                kind = request.kind(),
                file_id = request.file_id(),
                "executing"
            );
            let response = self.execute(request);
            debug!(node = %self.name, payload_size = response.payload_size(), "done");
            mailbox.complete(response);
        }
    }
}

impl ChunkStore for StorageNode {
    fn store(&mut self, file_id: FileId, data: Vec<u8>) {
        let size = data.len() as u64;
        let replaced = self.chunks.insert(file_id, data).map(|old| old.len() as u64);
        self.stats.record_write(size, replaced);
        self.load.store(self.stats.total_bytes, Ordering::SeqCst);
    }

    fn retrieve(&self, file_id: FileId) -> Option<Vec<u8>> {
        self.chunks.get(&file_id).cloned()
    }

    fn contains(&self, file_id: FileId) -> bool {
        self.chunks.contains_key(&file_id)
    }

    fn stats(&self) -> StorageStats {
        self.stats.clone()
    }
}
