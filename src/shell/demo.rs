//! Demo scenarios module
//!
//! Scripted sessions that exercise the coordinator without an interactive
//! terminal: a basic round trip, replica corruption detection and load-based
//! placement.

use crate::coordinator::{Command, Outcome};
use crate::shell::render;
use crate::storage::{NodeId, Request};
use crate::{Coordinator, DfsError, Result};
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch directory for demo sources and destinations, removed on drop
fn scratch_dir(label: &str) -> Result<TempDir> {
    let dir = tempfile::Builder::new()
        .prefix(&format!("mini-dfs-{}-", label))
        .tempdir()?;
    Ok(dir)
}

fn write_source(dir: &TempDir, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = dir.path().join(name);
    fs::write(&path, bytes)?;
    Ok(path)
}

fn random_payload(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill(&mut bytes[..]);
    bytes
}

fn run(
    coordinator: &mut Coordinator,
    command: Command,
    log: &mut Vec<String>,
) -> Result<Outcome> {
    let outcome = coordinator.execute(command)?;
    log.extend(render(&outcome).into_iter().map(|e| e.message));
    Ok(outcome)
}

fn upload(
    coordinator: &mut Coordinator,
    src: &Path,
    dest: &str,
    log: &mut Vec<String>,
) -> Result<u64> {
    let command = Command::Upload {
        src: src.to_path_buf(),
        dest: dest.to_string(),
    };
    let outcome = run(coordinator, command, log)?;
    uploaded_id(outcome, dest)
}

fn uploaded_id(outcome: Outcome, dest: &str) -> Result<u64> {
    match outcome {
        Outcome::Uploaded(report) => Ok(report.file_id),
        other => Err(DfsError::UnexpectedOutcome(format!(
            "upload to {} returned {:?}",
            dest, other
        ))),
    }
}

fn loads_line(coordinator: &Coordinator) -> String {
    let loads: Vec<String> = coordinator
        .cluster()
        .nodes()
        .iter()
        .map(|n| format!("{}={}B", n.name(), n.load_bytes()))
        .collect();
    format!("  loads: {}", loads.join(" "))
}

/// Predefined demo scenarios
pub struct DemoScenarios;

impl DemoScenarios {
    /// Names accepted by `run_named`
    pub const NAMES: [&'static str; 3] = ["basic", "corruption", "placement"];

    /// Run a scenario by name
    pub fn run_named(coordinator: &mut Coordinator, name: &str) -> Result<Vec<String>> {
        match name {
            "basic" => Self::basic_demo(coordinator),
            "corruption" => Self::corruption_demo(coordinator),
            "placement" => Self::placement_demo(coordinator),
            other => Err(DfsError::UnknownCommand(format!("demo {}", other))),
        }
    }

    /// Basic demo: upload a file, locate it, download it and compare
    pub fn basic_demo(coordinator: &mut Coordinator) -> Result<Vec<String>> {
        let mut log = vec!["=== Basic Round Trip Demo ===".to_string()];
        let scratch = scratch_dir("basic")?;

        let original = random_payload(4096);
        let src = write_source(&scratch, "source.bin", &original)?;
        let file_id = upload(coordinator, &src, "demo/basic.bin", &mut log)?;

        run(coordinator, Command::Locate { file_id, offset: 0 }, &mut log)?;

        let dest = scratch.path().join("basic.out");
        run(
            coordinator,
            Command::Download {
                name: "demo/basic.bin".to_string(),
                dest: dest.clone(),
            },
            &mut log,
        )?;

        match fs::read(&dest) {
            Ok(bytes) if bytes == original => {
                log.push("✓ Downloaded bytes match the original".to_string())
            }
            Ok(_) => log.push("✗ Downloaded bytes differ from the original".to_string()),
            Err(e) => log.push(format!("✗ Could not read download: {}", e)),
        }
        Ok(log)
    }

    /// Corruption demo: damage one replica and watch the checksum check flag it
    pub fn corruption_demo(coordinator: &mut Coordinator) -> Result<Vec<String>> {
        let mut log = vec!["=== Replica Corruption Demo ===".to_string()];
        let scratch = scratch_dir("corruption")?;

        let original = random_payload(1024);
        let src = write_source(&scratch, "source.bin", &original)?;
        let file_id = upload(coordinator, &src, "demo/corruption.bin", &mut log)?;

        let holders: Vec<NodeId> = coordinator
            .cluster()
            .broadcast(Request::Locate { file_id, offset: 0 })?
            .into_iter()
            .filter(|(_, r)| r.payload_size() > 0)
            .map(|(id, _)| id)
            .collect();
        if holders.is_empty() {
            return Err(DfsError::NotFound(format!("File ID={}", file_id)));
        }
        if holders.len() < 2 {
            log.push("⚠ Replication factor below 2: nothing to compare against".to_string());
        }

        let victim = holders[rand::thread_rng().gen_range(0..holders.len())];
        let mut damaged = original.clone();
        let position = rand::thread_rng().gen_range(0..damaged.len());
        damaged[position] ^= 0xFF;
        coordinator.cluster().tamper(victim, file_id, damaged)?;
        if let Some(node) = coordinator.cluster().get_node(victim) {
            log.push(format!(
                "⚡ Flipped byte {} of the replica on {}",
                position,
                node.name()
            ));
        }

        let dest = scratch.path().join("corruption.out");
        let outcome = run(
            coordinator,
            Command::DownloadById {
                file_id,
                offset: 0,
                dest: dest.clone(),
            },
            &mut log,
        )?;
        if let Outcome::Downloaded(report) = outcome {
            if report.is_consistent() {
                log.push("✗ Corruption went unnoticed".to_string());
            } else {
                log.push("✓ Corruption detected by checksum comparison".to_string());
            }
        }
        Ok(log)
    }

    /// Placement demo: uploads of varying size spread across the least-loaded nodes
    pub fn placement_demo(coordinator: &mut Coordinator) -> Result<Vec<String>> {
        let mut log = vec!["=== Placement Demo ===".to_string()];
        let scratch = scratch_dir("placement")?;
        let config = coordinator.config();
        log.push(format!(
            "  replication factor {} over {} nodes",
            config.replication_factor, config.node_count
        ));
        log.push(loads_line(coordinator));

        for i in 0..6 {
            let size = rand::thread_rng().gen_range(64..2048);
            let name = format!("part_{}.bin", i);
            let src = write_source(&scratch, &name, &random_payload(size))?;
            let dest = format!("demo/placement/part_{}.bin", i);
            upload(coordinator, &src, &dest, &mut log)?;
            log.push(loads_line(coordinator));
        }

        run(coordinator, Command::List, &mut log)?;
        Ok(log)
    }
}
