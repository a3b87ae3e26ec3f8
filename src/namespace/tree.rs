//! Path tree backing the namespace store

use crate::namespace::{FileRecord, ListEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntryKind {
    Directory,
    /// `None` until the coordinator records the upload
    File(Option<FileRecord>),
}

/// One path segment; children keep insertion order
#[derive(Debug, Clone)]
pub(crate) struct TreeNode {
    pub(crate) name: String,
    /// Full normalized path of this entry
    pub(crate) path: String,
    pub(crate) kind: EntryKind,
    pub(crate) children: Vec<TreeNode>,
}

impl TreeNode {
    pub(crate) fn root() -> Self {
        Self::new(String::new(), String::new(), EntryKind::Directory)
    }

    fn new(name: String, path: String, kind: EntryKind) -> Self {
        Self {
            name,
            path,
            kind,
            children: Vec::new(),
        }
    }

    fn child_index(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|c| c.name == name)
    }

    /// Create a file placeholder at `segments`, creating directories on the way.
    ///
    /// Returns false without touching the tree when an entry already exists at
    /// the path (unless `exclusive` is off and that entry is a file) or when a
    /// file sits where a directory is needed.
    pub(crate) fn insert(&mut self, segments: &[&str], exclusive: bool) -> bool {
        let Some((last, dirs)) = segments.split_last() else {
            return false;
        };

        let mut current = self;
        for (depth, segment) in dirs.iter().enumerate() {
            let index = match current.child_index(segment) {
                Some(i) => {
                    if current.children[i].kind != EntryKind::Directory {
                        return false;
                    }
                    i
                }
                None => {
                    let path = segments[..=depth].join("/");
                    current.children.push(TreeNode::new(
                        segment.to_string(),
                        path,
                        EntryKind::Directory,
                    ));
                    current.children.len() - 1
                }
            };
            current = &mut current.children[index];
        }

        match current.child_index(last) {
            Some(i) => !exclusive && matches!(current.children[i].kind, EntryKind::File(_)),
            None => {
                current.children.push(TreeNode::new(
                    last.to_string(),
                    segments.join("/"),
                    EntryKind::File(None),
                ));
                true
            }
        }
    }

    pub(crate) fn find(&self, segments: &[&str]) -> Option<&TreeNode> {
        let mut current = self;
        for segment in segments {
            let index = current.child_index(segment)?;
            current = &current.children[index];
        }
        Some(current)
    }

    pub(crate) fn find_mut(&mut self, segments: &[&str]) -> Option<&mut TreeNode> {
        let mut current = self;
        for segment in segments {
            let index = current.child_index(segment)?;
            current = &mut current.children[index];
        }
        Some(current)
    }
}

/// Pre-order walk over recorded files
///
/// Placeholders whose upload was never recorded are skipped. A clone
/// continues from the current position; `NamespaceStore::list` starts a new
/// walk from the root.
#[derive(Debug, Clone)]
pub struct Listing<'a> {
    stack: Vec<std::slice::Iter<'a, TreeNode>>,
}

impl<'a> Listing<'a> {
    pub(crate) fn new(root: &'a TreeNode) -> Self {
        Self {
            stack: vec![root.children.iter()],
        }
    }
}

impl<'a> Iterator for Listing<'a> {
    type Item = ListEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(node) => match &node.kind {
                    EntryKind::Directory => self.stack.push(node.children.iter()),
                    EntryKind::File(Some(record)) => {
                        return Some(ListEntry {
                            file_id: record.id,
                            chunk_count: 1,
                            path: node.path.clone(),
                        })
                    }
                    EntryKind::File(None) => {}
                },
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}
