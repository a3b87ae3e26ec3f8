//! Namespace store
//!
//! Maps hierarchical path names to file records. Entries are created as
//! placeholders before any replica is placed and receive their id and size
//! once the coordinator assigns them. Nothing is ever removed.

mod tree;

pub use tree::Listing;

use crate::storage::FileId;
use crate::{DfsError, Result};
use tree::{EntryKind, TreeNode};

/// Metadata of one uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRecord {
    pub id: FileId,
    pub size_bytes: u64,
}

/// One row of `ls`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub file_id: FileId,
    /// Always 1: files are stored as a single blob
    pub chunk_count: usize,
    pub path: String,
}

/// In-memory path tree owned by the coordinator
#[derive(Debug, Clone)]
pub struct NamespaceStore {
    root: TreeNode,
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl NamespaceStore {
    pub fn new() -> Self {
        Self {
            root: TreeNode::root(),
        }
    }

    /// Create an empty placeholder at `path`
    ///
    /// With `exclusive` set this fails if anything already exists at `path`.
    /// A failed insert leaves the tree untouched.
    pub fn insert(&mut self, path: &str, exclusive: bool) -> bool {
        self.root.insert(&segments(path), exclusive)
    }

    /// Attach the assigned id and size to the placeholder at `path`
    pub fn record_upload(&mut self, path: &str, file_id: FileId, size_bytes: u64) -> Result<()> {
        match self.root.find_mut(&segments(path)) {
            Some(node) if matches!(node.kind, EntryKind::File(_)) => {
                node.kind = EntryKind::File(Some(FileRecord {
                    id: file_id,
                    size_bytes,
                }));
                Ok(())
            }
            _ => Err(DfsError::NotFound(path.to_string())),
        }
    }

    /// Record of the file at `path`, if its upload was recorded
    pub fn lookup(&self, path: &str) -> Option<FileRecord> {
        let segments = segments(path);
        if segments.is_empty() {
            return None;
        }
        match self.root.find(&segments)?.kind {
            EntryKind::File(record) => record,
            EntryKind::Directory => None,
        }
    }

    /// Lazy pre-order listing of every recorded file
    pub fn list(&self) -> Listing<'_> {
        Listing::new(&self.root)
    }

    /// Number of recorded files
    pub fn len(&self) -> usize {
        self.list().count()
    }

    pub fn is_empty(&self) -> bool {
        self.list().next().is_none()
    }
}

impl Default for NamespaceStore {
    fn default() -> Self {
        Self::new()
    }
}
