//! Cluster management for coordinating multiple storage nodes
//!
//! The cluster owns one handle per storage node and implements the
//! fan-out/fan-in barrier: every command of a round is posted before the
//! coordinator starts waiting, and no response is read until every
//! participating node has signalled completion.

use crate::placement::NodeLoad;
use crate::storage::{FileId, Mailbox, NodeId, Request, Response, StorageNode};
use crate::{Config, DfsError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

/// Coordinator-side handle of one storage node
#[derive(Debug)]
pub struct NodeHandle {
    /// Position of the node in the cluster
    pub id: NodeId,
    /// Node identity
    name: String,
    /// Aggregate stored bytes published by the node thread
    load: Arc<AtomicU64>,
    /// Command slot shared with the node thread
    mailbox: Arc<Mailbox>,
}

impl NodeHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes currently stored on the node
    pub fn load_bytes(&self) -> u64 {
        self.load.load(Ordering::SeqCst)
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }
}

/// A fixed set of storage nodes, each running on its own thread
#[derive(Debug)]
pub struct Cluster {
    nodes: Vec<NodeHandle>,
}

impl Cluster {
    /// Spawn `config.node_count` storage node threads
    ///
    /// Node threads are detached and serve their mailbox for the lifetime of
    /// the process.
    pub fn spawn(config: &Config) -> Result<Self> {
        let mut nodes = Vec::with_capacity(config.node_count);
        for id in 0..config.node_count {
            let name = config.node_name(id);
            let load = Arc::new(AtomicU64::new(0));
            let mailbox = Arc::new(Mailbox::new(name.clone()));

            let node = StorageNode::new(name.clone(), Arc::clone(&load));
            let node_mailbox = Arc::clone(&mailbox);
            thread::Builder::new()
                .name(name.clone())
                .spawn(move || node.run(node_mailbox))
                .map_err(DfsError::NodeSpawn)?;

            nodes.push(NodeHandle {
                id,
                name,
                load,
                mailbox,
            });
        }
        info!(nodes = nodes.len(), "cluster started");
        Ok(Self { nodes })
    }

    /// Get the number of nodes in the cluster
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get all node handles in cluster order
    pub fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }

    /// Get a reference to a specific node
    pub fn get_node(&self, id: NodeId) -> Option<&NodeHandle> {
        self.nodes.get(id)
    }

    /// Sample the current load of every node
    pub fn loads(&self) -> Vec<NodeLoad> {
        let loads: Vec<NodeLoad> = self
            .nodes
            .iter()
            .map(|node| NodeLoad {
                node: node.id,
                load_bytes: node.load_bytes(),
            })
            .collect();
        debug!(?loads, "sampled node loads");
        loads
    }

    /// Post each request to its node, wait for all of them, then collect the
    /// responses in assignment order.
    pub fn dispatch(&self, assignments: Vec<(NodeId, Request)>) -> Result<Vec<(NodeId, Response)>> {
        let mut posted = Vec::with_capacity(assignments.len());
        let mut failure = None;

        for (id, request) in assignments {
            let Some(node) = self.nodes.get(id) else {
                failure = Some(DfsError::NotFound(format!("storage node #{}", id)));
                break;
            };
            debug!(node = %node.name, kind = request.kind(), "posting command");
            if let Err(e) = node.mailbox.post(request) {
                failure = Some(e);
                break;
            }
            posted.push(node);
        }

        // Barrier: every posted node must finish before any response is read.
        for node in &posted {
            node.mailbox.wait_done();
        }

        let responses: Vec<(NodeId, Response)> = posted
            .iter()
            .filter_map(|node| node.mailbox.take_response().map(|r| (node.id, r)))
            .collect();

        match failure {
            Some(e) => Err(e),
            None => Ok(responses),
        }
    }

    /// Send the same request to every node
    pub fn broadcast(&self, request: Request) -> Result<Vec<(NodeId, Response)>> {
        let assignments = self
            .nodes
            .iter()
            .map(|node| (node.id, request.clone()))
            .collect();
        self.dispatch(assignments)
    }

    /// Overwrite the blob one node holds for `file_id`
    ///
    /// Goes through the node's own upload path, so it simulates node-level
    /// corruption without the coordinator's namespace knowing about it.
    pub fn tamper(&self, node: NodeId, file_id: FileId, bytes: Vec<u8>) -> Result<()> {
        self.dispatch(vec![(
            node,
            Request::Upload {
                file_id,
                payload: bytes,
            },
        )])
        .map(|_| ())
    }
}
