//! Interactive command shell
//!
//! Reads one command per line, runs it on the coordinator and prints the
//! outcome. Errors never end the session; only `quit`/`exit` (or end of
//! input) does.

pub mod demo;

use crate::coordinator::{Outcome, ReplicaStatus};
use crate::{Coordinator, DfsError};
use crossterm::style::{Color, Stylize};
use std::io::{self, IsTerminal, Write};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Log levels for shell messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl LogLevel {
    /// Get the color for this log level
    pub fn color(&self) -> Color {
        match self {
            LogLevel::Info => Color::Reset,
            LogLevel::Warning => Color::Yellow,
            LogLevel::Error => Color::Red,
            LogLevel::Success => Color::Green,
        }
    }

    /// Whether messages of this level go to stderr
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, LogLevel::Warning | LogLevel::Error)
    }
}

/// One message shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }
}

/// Help text for the shell
pub const HELP_TEXT: &str = r#"Mini DFS - Commands

  ls                            list all files in name server
  up <src> <dest>               upload local file <src> as <dest>
  down <name> <dest>            download <name> to local file <dest>
  down_id <id> <offset> <dest>  download by file id to local file <dest>
  loc <id> <offset>             show which data nodes hold the file
  help                          show this help
  quit | exit                   leave the shell"#;

/// Turn a command outcome into user-facing messages
pub fn render(outcome: &Outcome) -> Vec<LogEntry> {
    match outcome {
        Outcome::Quit => Vec::new(),
        Outcome::Help => vec![LogEntry::info(HELP_TEXT)],
        Outcome::Listed(entries) => {
            let mut lines = vec![LogEntry::info("File ID\tChunk Num\tFile Name")];
            lines.extend(entries.iter().map(|e| {
                LogEntry::info(format!("{}\t{}\t{}", e.file_id, e.chunk_count, e.path))
            }));
            lines
        }
        Outcome::Uploaded(report) => vec![
            LogEntry::success(format!("Upload success. File ID is {}", report.file_id)),
            LogEntry::info(format!(
                "{} bytes replicated to {}",
                report.size_bytes,
                report.replicas.join(", ")
            )),
        ],
        Outcome::Downloaded(report) => {
            if report.replicas.is_empty() {
                return vec![LogEntry::info(format!(
                    "File ID={} is empty, nothing written to {}",
                    report.file_id,
                    report.dest.display()
                ))];
            }
            let mut lines = Vec::new();
            for replica in &report.replicas {
                match &replica.status {
                    ReplicaStatus::Written => lines.push(LogEntry::info(format!(
                        "{} bytes from {} written to {}",
                        replica.size_bytes,
                        replica.node,
                        report.dest.display()
                    ))),
                    ReplicaStatus::ChecksumPassed => lines.push(LogEntry::success(format!(
                        "SHA-256 checksum passed ({}).",
                        replica.node
                    ))),
                    ReplicaStatus::Corrupted(err) | ReplicaStatus::WriteFailed(err) => {
                        lines.push(render_error(err))
                    }
                }
            }
            lines
        }
        Outcome::Located(report) => {
            if report.holders.is_empty() {
                return vec![LogEntry::error(format!(
                    "Error, File ID={}, offset={} not found.",
                    report.file_id, report.offset
                ))];
            }
            report
                .holders
                .iter()
                .map(|node| {
                    LogEntry::info(format!(
                        "Found File ID={}, offset={} at {}",
                        report.file_id, report.offset, node
                    ))
                })
                .collect()
        }
    }
}

/// Turn a command error into a user-facing message
pub fn render_error(err: &DfsError) -> LogEntry {
    match err {
        DfsError::Usage(_) | DfsError::EmptyCommand => LogEntry::error(err.to_string()),
        DfsError::IntegrityMismatch { .. } => LogEntry::warn(format!("Error: {}", err)),
        _ => LogEntry::error(format!("Error: {}", err)),
    }
}

/// Line-oriented front end of a coordinator
pub struct Shell {
    coordinator: Coordinator,
    prompt: String,
    colored: bool,
}

impl Shell {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator,
            prompt: "mini-dfs> ".to_string(),
            colored: io::stdout().is_terminal(),
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Run one line; returns the messages to show and whether to quit
    pub fn handle_line(&mut self, line: &str) -> (Vec<LogEntry>, bool) {
        match self.coordinator.execute_line(line) {
            Ok(Outcome::Quit) => (Vec::new(), true),
            Ok(outcome) => (render(&outcome), false),
            Err(err) => (vec![render_error(&err)], false),
        }
    }

    /// Serve commands from `input` until `quit`/`exit` or end of input
    pub async fn run<R>(&mut self, input: R) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            self.print_prompt()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            // The fan-in barrier blocks on the storage nodes.
            let (entries, quit) = tokio::task::block_in_place(|| self.handle_line(&line));
            for entry in &entries {
                self.emit(entry);
            }
            if quit {
                break;
            }
        }
        Ok(())
    }

    fn print_prompt(&self) -> io::Result<()> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", self.prompt)?;
        stdout.flush()
    }

    fn emit(&self, entry: &LogEntry) {
        let text = if self.colored {
            entry.message.as_str().with(entry.level.color()).to_string()
        } else {
            entry.message.clone()
        };
        if entry.level.is_diagnostic() {
            eprintln!("{}", text);
        } else {
            println!("{}", text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use std::fs;
    use tempfile::TempDir;

    fn shell(nodes: usize, replicas: usize) -> Shell {
        Shell::new(Coordinator::new(Config::new(nodes, replicas)).unwrap())
    }

    fn messages(entries: &[LogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.message.as_str()).collect()
    }

    #[test]
    fn test_upload_and_list_messages() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, b"0123456789").unwrap();
        let mut shell = shell(4, 2);

        let (entries, quit) = shell.handle_line(&format!("up {} docs/a.txt", src.display()));
        assert!(!quit);
        assert_eq!(entries[0], LogEntry::success("Upload success. File ID is 1"));
        assert_eq!(entries[1].message, "10 bytes replicated to data_node_1, data_node_2");

        let (entries, _) = shell.handle_line("ls");
        assert_eq!(
            messages(&entries),
            vec!["File ID\tChunk Num\tFile Name", "1\t1\tdocs/a.txt"]
        );

        let (entries, _) = shell.handle_line("loc 1 0");
        assert_eq!(
            messages(&entries),
            vec![
                "Found File ID=1, offset=0 at data_node_1",
                "Found File ID=1, offset=0 at data_node_2"
            ]
        );
    }

    #[test]
    fn test_error_messages_do_not_quit() {
        let mut shell = shell(2, 1);

        let (entries, quit) = shell.handle_line("");
        assert!(!quit);
        assert_eq!(entries, vec![LogEntry::error("input a blank line")]);

        let (entries, _) = shell.handle_line("up onlyone");
        assert_eq!(entries, vec![LogEntry::error("Usage: up src dest")]);

        let (entries, _) = shell.handle_line("bogus");
        assert_eq!(entries[0].level, LogLevel::Error);

        let (entries, _) = shell.handle_line("loc 7 0");
        assert_eq!(
            messages(&entries),
            vec!["Error, File ID=7, offset=0 not found."]
        );

        let (entries, quit) = shell.handle_line("exit");
        assert!(quit);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_download_reports_checksums() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        let out = dir.path().join("out.txt");
        fs::write(&src, b"hello").unwrap();
        let mut shell = shell(3, 3);
        shell.handle_line(&format!("up {} a.txt", src.display()));

        let (entries, _) = shell.handle_line(&format!("down a.txt {}", out.display()));
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1], LogEntry::success("SHA-256 checksum passed (data_node_2)."));
        assert_eq!(fs::read(&out).unwrap(), b"hello");

        shell
            .coordinator()
            .cluster()
            .tamper(2, 1, b"jello".to_vec())
            .unwrap();
        let (entries, _) = shell.handle_line(&format!("down a.txt {}", out.display()));
        assert_eq!(entries[2].level, LogLevel::Warning);
        assert!(entries[2].message.contains("inconsistent checksum"));
    }

    #[test]
    fn test_download_empty_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("e.bin");
        let out = dir.path().join("out.bin");
        fs::write(&src, b"").unwrap();
        let mut shell = shell(4, 2);
        shell.handle_line(&format!("up {} e", src.display()));

        let (entries, quit) = shell.handle_line(&format!("down e {}", out.display()));
        assert!(!quit);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert!(entries[0].message.starts_with("File ID=1 is empty"));
    }

    #[test]
    fn test_download_missing_name() {
        let mut shell = shell(2, 1);
        let (entries, _) = shell.handle_line("down nonexistent.txt out.bin");
        assert_eq!(
            entries,
            vec![LogEntry::error("Error: no such file in MiniDFS: nonexistent.txt")]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_stops_at_quit() {
        let mut shell = shell(2, 1);
        let input: &[u8] = b"ls\nhelp\nquit\nup never.bin never\n";
        shell.run(input).await.unwrap();
        assert_eq!(shell.coordinator().last_file_id(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_stops_at_end_of_input() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.bin");
        fs::write(&src, b"abc").unwrap();
        let mut shell = shell(2, 2);

        let src = src.display();
        let script = format!("up {} a\nup {} a\nup {} b", src, src, src);
        shell.run(script.as_bytes()).await.unwrap();
        assert_eq!(shell.coordinator().last_file_id(), 2);
        assert_eq!(shell.coordinator().namespace().len(), 2);
    }
}
