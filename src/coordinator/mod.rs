//! Coordinator
//!
//! Owns the storage-node handles, the namespace store and the file-id
//! counter. Every client command is resolved against the namespace, fanned
//! out to the relevant nodes, awaited on all of them and post-processed.
//! Commands never overlap: each runs to completion before the next starts.

pub mod command;
pub mod integrity;

pub use command::Command;
pub use integrity::{Checksum, ConsecutiveVerifier, Verdict};

use crate::namespace::{ListEntry, NamespaceStore};
use crate::placement::{LeastLoaded, PlacementPolicy};
use crate::storage::{Cluster, FileId, NodeId, Request};
use crate::{Config, DfsError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of one successfully executed command
#[derive(Debug)]
pub enum Outcome {
    Quit,
    Help,
    Listed(Vec<ListEntry>),
    Uploaded(UploadReport),
    Downloaded(DownloadReport),
    Located(LocateReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub file_id: FileId,
    pub size_bytes: u64,
    /// Identities of the nodes that received a replica, in placement order
    pub replicas: Vec<String>,
}

/// What happened to one non-empty replica during a download
#[derive(Debug)]
pub enum ReplicaStatus {
    /// Written; no earlier replica to compare with
    Written,
    /// Written; checksum equals the previous replica's
    ChecksumPassed,
    /// Written; checksum differs from the previous replica's
    Corrupted(DfsError),
    /// Destination could not be written; not checksummed
    WriteFailed(DfsError),
}

#[derive(Debug)]
pub struct ReplicaOutcome {
    pub node: String,
    pub size_bytes: u64,
    pub checksum: Option<Checksum>,
    pub status: ReplicaStatus,
}

#[derive(Debug)]
pub struct DownloadReport {
    pub file_id: FileId,
    pub dest: PathBuf,
    /// One entry per node that returned data, in node order
    pub replicas: Vec<ReplicaOutcome>,
}

impl DownloadReport {
    /// Whether any replica was written to `dest`
    pub fn written(&self) -> bool {
        self.replicas
            .iter()
            .any(|r| !matches!(r.status, ReplicaStatus::WriteFailed(_)))
    }

    /// Whether no consecutive pair of replicas disagreed
    pub fn is_consistent(&self) -> bool {
        !self
            .replicas
            .iter()
            .any(|r| matches!(r.status, ReplicaStatus::Corrupted(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocateReport {
    pub file_id: FileId,
    pub offset: u64,
    /// Identities of the nodes holding the file, in node order
    pub holders: Vec<String>,
}

/// Accepts client commands and drives the storage nodes
pub struct Coordinator {
    config: Config,
    cluster: Cluster,
    namespace: NamespaceStore,
    policy: Box<dyn PlacementPolicy>,
    /// Last issued file id; ids start at 1
    last_file_id: FileId,
}

impl Coordinator {
    /// Validate `config` and start its storage nodes
    pub fn new(config: Config) -> Result<Self> {
        Self::with_policy(config, Box::new(LeastLoaded))
    }

    pub fn with_policy(config: Config, policy: Box<dyn PlacementPolicy>) -> Result<Self> {
        config.validate()?;
        let cluster = Cluster::spawn(&config)?;
        info!(
            nodes = config.node_count,
            replication_factor = config.replication_factor,
            policy = policy.name(),
            "coordinator ready"
        );
        Ok(Self {
            config,
            cluster,
            namespace: NamespaceStore::new(),
            policy,
            last_file_id: 0,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn namespace(&self) -> &NamespaceStore {
        &self.namespace
    }

    pub fn last_file_id(&self) -> FileId {
        self.last_file_id
    }

    /// Parse and execute one input line
    pub fn execute_line(&mut self, line: &str) -> Result<Outcome> {
        let command: Command = line.parse()?;
        self.execute(command)
    }

    /// Execute one command to completion
    pub fn execute(&mut self, command: Command) -> Result<Outcome> {
        match command {
            Command::Quit => Ok(Outcome::Quit),
            Command::Help => Ok(Outcome::Help),
            Command::List => Ok(Outcome::Listed(self.namespace.list().collect())),
            Command::Upload { src, dest } => self.upload(&src, &dest).map(Outcome::Uploaded),
            Command::Download { name, dest } => {
                let record = self
                    .namespace
                    .lookup(&name)
                    .ok_or_else(|| DfsError::NotFound(name.clone()))?;
                self.download(record.id, Request::Download { file_id: record.id }, dest)
                    .map(Outcome::Downloaded)
            }
            Command::DownloadById {
                file_id,
                offset,
                dest,
            } => {
                let report =
                    self.download(file_id, Request::DownloadById { file_id, offset }, dest)?;
                // No bytes anywhere: either an empty file or an id never issued.
                if report.replicas.is_empty()
                    && !self.namespace.list().any(|entry| entry.file_id == file_id)
                {
                    return Err(DfsError::NotFound(format!("File ID={}", file_id)));
                }
                Ok(Outcome::Downloaded(report))
            }
            Command::Locate { file_id, offset } => {
                self.locate(file_id, offset).map(Outcome::Located)
            }
        }
    }

    fn node_name(&self, id: NodeId) -> String {
        self.cluster
            .get_node(id)
            .map(|n| n.name().to_string())
            .unwrap_or_else(|| self.config.node_name(id))
    }

    fn upload(&mut self, src: &Path, dest: &str) -> Result<UploadReport> {
        let payload = fs::read(src).map_err(|source| DfsError::SourceUnavailable {
            path: src.to_path_buf(),
            source,
        })?;

        if !self.namespace.insert(dest, true) {
            return Err(DfsError::Conflict(dest.to_string()));
        }

        let loads = self.cluster.loads();
        let targets = self.policy.select(&loads, self.config.replication_factor);

        self.last_file_id += 1;
        let file_id = self.last_file_id;
        let size_bytes = payload.len() as u64;

        // Every target gets its own copy; the last one takes the original buffer.
        let assignments = match targets.split_last() {
            Some((&last, rest)) => {
                let mut assignments: Vec<(NodeId, Request)> = rest
                    .iter()
                    .map(|&node| {
                        (
                            node,
                            Request::Upload {
                                file_id,
                                payload: payload.clone(),
                            },
                        )
                    })
                    .collect();
                assignments.push((last, Request::Upload { file_id, payload }));
                assignments
            }
            None => Vec::new(),
        };

        self.namespace.record_upload(dest, file_id, size_bytes)?;
        self.cluster.dispatch(assignments)?;

        let replicas: Vec<String> = targets.iter().map(|&n| self.node_name(n)).collect();
        info!(file_id, size_bytes, dest, ?replicas, "upload complete");
        Ok(UploadReport {
            file_id,
            size_bytes,
            replicas,
        })
    }

    /// Ask every node for the file; the coordinator does not remember which
    /// nodes were the replica targets. Nodes holding no bytes are skipped, so
    /// an empty file yields a report without replicas and no `dest` is written.
    fn download(
        &self,
        file_id: FileId,
        request: Request,
        dest: PathBuf,
    ) -> Result<DownloadReport> {
        let responses = self.cluster.broadcast(request)?;

        let mut verifier = ConsecutiveVerifier::new();
        let mut replicas = Vec::new();
        for (node_id, response) in responses {
            let Some(bytes) = response.into_payload() else {
                continue;
            };
            let node = self.node_name(node_id);
            let size_bytes = bytes.len() as u64;

            // Each write replaces the previous one: the last replica wins.
            let (checksum, status) = match fs::write(&dest, &bytes) {
                Err(source) => {
                    warn!(
                        %node,
                        dest = %dest.display(),
                        error = %source,
                        "failed to write replica"
                    );
                    let err = DfsError::DestinationUnavailable {
                        path: dest.clone(),
                        node: node.clone(),
                        source,
                    };
                    (None, ReplicaStatus::WriteFailed(err))
                }
                Ok(()) => {
                    let checksum = Checksum::digest(&bytes);
                    let status = match verifier.observe(checksum) {
                        Verdict::First => ReplicaStatus::Written,
                        Verdict::Passed => ReplicaStatus::ChecksumPassed,
                        Verdict::Mismatch { previous } => {
                            warn!(
                                %node,
                                file_id,
                                %previous,
                                actual = %checksum,
                                "replica checksum mismatch"
                            );
                            ReplicaStatus::Corrupted(DfsError::IntegrityMismatch {
                                node: node.clone(),
                                expected: previous.to_hex(),
                                actual: checksum.to_hex(),
                            })
                        }
                    };
                    (Some(checksum), status)
                }
            };
            debug!(%node, size_bytes, "replica processed");
            replicas.push(ReplicaOutcome {
                node,
                size_bytes,
                checksum,
                status,
            });
        }

        Ok(DownloadReport {
            file_id,
            dest,
            replicas,
        })
    }

    fn locate(&self, file_id: FileId, offset: u64) -> Result<LocateReport> {
        let responses = self.cluster.broadcast(Request::Locate { file_id, offset })?;
        let holders = responses
            .into_iter()
            .filter(|(_, response)| response.payload_size() > 0)
            .map(|(node_id, _)| self.node_name(node_id))
            .collect();
        Ok(LocateReport {
            file_id,
            offset,
            holders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn coordinator(nodes: usize, replicas: usize) -> Coordinator {
        Coordinator::new(Config::new(nodes, replicas)).unwrap()
    }

    fn source(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn upload(coord: &mut Coordinator, src: &Path, dest: &str) -> UploadReport {
        match coord
            .execute(Command::Upload {
                src: src.to_path_buf(),
                dest: dest.to_string(),
            })
            .unwrap()
        {
            Outcome::Uploaded(report) => report,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    fn download(coord: &mut Coordinator, name: &str, dest: &Path) -> Result<DownloadReport> {
        coord
            .execute(Command::Download {
                name: name.to_string(),
                dest: dest.to_path_buf(),
            })
            .map(|outcome| match outcome {
                Outcome::Downloaded(report) => report,
                other => panic!("unexpected outcome {:?}", other),
            })
    }

    fn locate(coord: &mut Coordinator, file_id: FileId, offset: u64) -> LocateReport {
        match coord.execute(Command::Locate { file_id, offset }).unwrap() {
            Outcome::Located(report) => report,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    fn listing(coord: &mut Coordinator) -> Vec<ListEntry> {
        match coord.execute(Command::List).unwrap() {
            Outcome::Listed(entries) => entries,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_invalid_replication_factor_is_rejected_at_startup() {
        let result = Coordinator::new(Config::new(2, 3));
        assert!(matches!(result, Err(DfsError::Config(_))));
    }

    #[test]
    fn test_file_ids_are_sequential() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a.bin", b"data");
        let mut coord = coordinator(4, 2);

        let ids: Vec<FileId> = (0..5)
            .map(|i| upload(&mut coord, &src, &format!("f{}", i)).file_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(coord.last_file_id(), 5);
    }

    #[test]
    fn test_ten_byte_upload_lands_on_first_two_nodes() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "ten.bin", b"0123456789");
        let mut coord = coordinator(4, 2);

        let report = upload(&mut coord, &src, "ten.bin");
        assert_eq!(report.size_bytes, 10);
        assert_eq!(report.replicas, vec!["data_node_1", "data_node_2"]);

        let located = locate(&mut coord, report.file_id, 0);
        assert_eq!(located.holders, vec!["data_node_1", "data_node_2"]);

        let loads: Vec<u64> = coord.cluster().loads().iter().map(|l| l.load_bytes).collect();
        assert_eq!(loads, vec![10, 10, 0, 0]);
    }

    #[test]
    fn test_placement_prefers_least_loaded_nodes() {
        let dir = TempDir::new().unwrap();
        let big = source(&dir, "big.bin", &[1; 100]);
        let small = source(&dir, "small.bin", &[2; 10]);
        let mut coord = coordinator(4, 2);

        upload(&mut coord, &big, "big");
        let second = upload(&mut coord, &small, "small");
        assert_eq!(second.replicas, vec!["data_node_3", "data_node_4"]);

        let third = upload(&mut coord, &small, "small2");
        assert_eq!(third.replicas, vec!["data_node_3", "data_node_4"]);
    }

    #[test]
    fn test_round_trip_by_name_and_by_id() {
        let dir = TempDir::new().unwrap();
        let content: Vec<u8> = (0..=255).collect();
        let src = source(&dir, "blob.bin", &content);
        let mut coord = coordinator(4, 3);
        let file_id = upload(&mut coord, &src, "dir/blob.bin").file_id;

        let by_name = dir.path().join("by_name.bin");
        let report = download(&mut coord, "dir/blob.bin", &by_name).unwrap();
        assert_eq!(fs::read(&by_name).unwrap(), content);
        assert_eq!(report.replicas.len(), 3);
        assert!(report.is_consistent());
        assert!(matches!(report.replicas[0].status, ReplicaStatus::Written));
        assert!(matches!(report.replicas[1].status, ReplicaStatus::ChecksumPassed));

        let by_id = dir.path().join("by_id.bin");
        coord
            .execute(Command::DownloadById {
                file_id,
                offset: 0,
                dest: by_id.clone(),
            })
            .unwrap();
        assert_eq!(fs::read(&by_id).unwrap(), content);
    }

    #[test]
    fn test_download_by_id_returns_whole_blob_for_any_offset() {
        // Current behavior: the offset is not applied to the returned bytes.
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a.bin", b"abcdefghij");
        let mut coord = coordinator(2, 1);
        let file_id = upload(&mut coord, &src, "a.bin").file_id;

        let dest = dir.path().join("out.bin");
        coord
            .execute(Command::DownloadById {
                file_id,
                offset: 5,
                dest: dest.clone(),
            })
            .unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"abcdefghij");
    }

    #[test]
    fn test_listing_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a.bin", b"abc");
        let mut coord = coordinator(4, 2);
        upload(&mut coord, &src, "b/one");
        upload(&mut coord, &src, "a/two");

        let first = listing(&mut coord);
        let second = listing(&mut coord);
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                ListEntry {
                    file_id: 1,
                    chunk_count: 1,
                    path: "b/one".to_string()
                },
                ListEntry {
                    file_id: 2,
                    chunk_count: 1,
                    path: "a/two".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_conflicting_upload_leaves_existing_file_untouched() {
        let dir = TempDir::new().unwrap();
        let first = source(&dir, "first.bin", b"first version");
        let second = source(&dir, "second.bin", b"second!");
        let mut coord = coordinator(4, 2);
        upload(&mut coord, &first, "doc");
        let loads_before = coord.cluster().loads();

        let err = coord
            .execute(Command::Upload {
                src: second,
                dest: "doc".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, DfsError::Conflict(ref p) if p == "doc"));
        assert_eq!(coord.cluster().loads(), loads_before);
        assert_eq!(coord.last_file_id(), 1);

        let out = dir.path().join("out.bin");
        download(&mut coord, "doc", &out).unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"first version");
    }

    #[test]
    fn test_missing_source_creates_no_metadata() {
        let dir = TempDir::new().unwrap();
        let mut coord = coordinator(4, 2);
        let err = coord
            .execute(Command::Upload {
                src: dir.path().join("nope.bin"),
                dest: "nope".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, DfsError::SourceUnavailable { .. }));
        assert!(listing(&mut coord).is_empty());

        // the name is still free and ids were not consumed
        let src = source(&dir, "a.bin", b"x");
        assert_eq!(upload(&mut coord, &src, "nope").file_id, 1);
    }

    #[test]
    fn test_download_unknown_name_creates_no_file() {
        let dir = TempDir::new().unwrap();
        let mut coord = coordinator(4, 2);
        let out = dir.path().join("out.bin");

        let err = download(&mut coord, "nonexistent.txt", &out).unwrap_err();
        assert!(matches!(err, DfsError::NotFound(ref n) if n == "nonexistent.txt"));
        assert!(!out.exists());
    }

    #[test]
    fn test_download_unknown_id_reports_not_found() {
        let dir = TempDir::new().unwrap();
        let mut coord = coordinator(3, 2);
        let out = dir.path().join("out.bin");
        let err = coord
            .execute(Command::DownloadById {
                file_id: 42,
                offset: 0,
                dest: out.clone(),
            })
            .unwrap_err();
        assert!(matches!(err, DfsError::NotFound(_)));
        assert!(!out.exists());
    }

    #[test]
    fn test_corrupted_replica_is_reported_and_last_replica_wins() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a.bin", b"the real content");
        let mut coord = coordinator(4, 2);
        let file_id = upload(&mut coord, &src, "a.bin").file_id;

        coord.cluster().tamper(0, file_id, b"corrupted bytes!".to_vec()).unwrap();

        let out = dir.path().join("out.bin");
        let report = download(&mut coord, "a.bin", &out).unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.replicas.len(), 2);
        assert_eq!(report.replicas[0].node, "data_node_1");
        assert!(matches!(
            report.replicas[1].status,
            ReplicaStatus::Corrupted(DfsError::IntegrityMismatch { ref node, .. })
                if node == "data_node_2"
        ));
        // data_node_2 responds last with the intact copy
        assert_eq!(fs::read(&out).unwrap(), b"the real content");
    }

    #[test]
    fn test_corrupted_last_replica_is_what_gets_written() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a.bin", b"intact");
        let mut coord = coordinator(2, 2);
        let file_id = upload(&mut coord, &src, "a.bin").file_id;
        coord.cluster().tamper(1, file_id, b"broken".to_vec()).unwrap();

        let out = dir.path().join("out.bin");
        let report = download(&mut coord, "a.bin", &out).unwrap();
        assert!(!report.is_consistent());
        assert_eq!(fs::read(&out).unwrap(), b"broken");
    }

    #[test]
    fn test_three_replicas_compare_only_neighbours() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a.bin", b"payload");
        let mut coord = coordinator(3, 3);
        let file_id = upload(&mut coord, &src, "a.bin").file_id;
        coord.cluster().tamper(0, file_id, b"PAYLOAD".to_vec()).unwrap();

        let out = dir.path().join("out.bin");
        let report = download(&mut coord, "a.bin", &out).unwrap();
        let statuses: Vec<&ReplicaStatus> = report.replicas.iter().map(|r| &r.status).collect();
        // Only one mismatch is reported, attributed to the first intact replica.
        assert!(matches!(statuses[0], ReplicaStatus::Written));
        assert!(matches!(statuses[1], ReplicaStatus::Corrupted(_)));
        assert!(matches!(statuses[2], ReplicaStatus::ChecksumPassed));
    }

    #[test]
    fn test_unwritable_destination_is_reported_per_replica() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a.bin", b"abc");
        let mut coord = coordinator(4, 2);
        upload(&mut coord, &src, "a.bin");

        let out = dir.path().join("missing_dir").join("out.bin");
        let report = download(&mut coord, "a.bin", &out).unwrap();
        assert_eq!(report.replicas.len(), 2);
        assert!(!report.written());
        assert!(report.replicas.iter().all(|r| matches!(
            r.status,
            ReplicaStatus::WriteFailed(DfsError::DestinationUnavailable { .. })
        )));
        assert!(!out.exists());
    }

    #[test]
    fn test_empty_file_downloads_by_name_without_error() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "e.bin", b"");
        let mut coord = coordinator(4, 2);
        let file_id = upload(&mut coord, &src, "e").file_id;
        assert_eq!(
            listing(&mut coord),
            vec![ListEntry {
                file_id,
                chunk_count: 1,
                path: "e".to_string()
            }]
        );

        let out = dir.path().join("out.bin");
        let report = download(&mut coord, "e", &out).unwrap();
        assert_eq!(report.file_id, file_id);
        assert!(report.replicas.is_empty());
        assert!(report.is_consistent());
        assert!(!out.exists());
    }

    #[test]
    fn test_empty_file_downloads_by_id_without_error() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "e.bin", b"");
        let mut coord = coordinator(4, 2);
        let file_id = upload(&mut coord, &src, "e").file_id;

        let outcome = coord
            .execute(Command::DownloadById {
                file_id,
                offset: 0,
                dest: dir.path().join("out.bin"),
            })
            .unwrap();
        assert!(matches!(outcome, Outcome::Downloaded(ref r) if r.replicas.is_empty()));
    }

    #[test]
    fn test_config_is_kept_after_validation() {
        let coord = coordinator(3, 2);
        assert_eq!(coord.config().node_count, 3);
        assert_eq!(coord.config().replication_factor, 2);
    }

    #[test]
    fn test_locate_unknown_id_has_no_holders() {
        let mut coord = coordinator(4, 2);
        let report = locate(&mut coord, 99, 0);
        assert!(report.holders.is_empty());
    }

    #[test]
    fn test_execute_line_reports_parse_errors() {
        let mut coord = coordinator(2, 1);
        assert!(matches!(coord.execute_line("frobnicate"), Err(DfsError::UnknownCommand(_))));
        assert!(matches!(coord.execute_line("up onlyone"), Err(DfsError::Usage(_))));
        assert!(matches!(coord.execute_line("quit"), Ok(Outcome::Quit)));
    }

    #[test]
    fn test_coordinators_do_not_share_state() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "a.bin", b"abc");
        let mut first = coordinator(2, 1);
        let mut second = coordinator(2, 1);
        upload(&mut first, &src, "a");
        assert_eq!(upload(&mut second, &src, "a").file_id, 1);
        assert_eq!(first.namespace().len(), 1);
        assert_eq!(second.namespace().len(), 1);
    }
}
