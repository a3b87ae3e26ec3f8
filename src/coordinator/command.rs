//! Client command parsing

use crate::storage::FileId;
use crate::{DfsError, Result};
use std::path::PathBuf;
use std::str::FromStr;

pub const USAGE_LS: &str = "ls (list all files in name server)";
pub const USAGE_UP: &str = "up src dest";
pub const USAGE_DOWN: &str = "down src dest";
pub const USAGE_DOWN_ID: &str = "down_id file_id offset dest";
pub const USAGE_LOC: &str = "loc file_id offset";

/// A client command, one per input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Help,
    List,
    Upload { src: PathBuf, dest: String },
    Download { name: String, dest: PathBuf },
    DownloadById { file_id: FileId, offset: u64, dest: PathBuf },
    Locate { file_id: FileId, offset: u64 },
}

fn parse_number(token: &str, what: &str) -> Result<u64> {
    token.parse().map_err(|_| {
        DfsError::InvalidArgument(format!(
            "{} must be a non-negative integer, got '{}'",
            what, token
        ))
    })
}

fn expect_args(args: &[&str], count: usize, usage: &'static str) -> Result<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(DfsError::Usage(usage))
    }
}

impl FromStr for Command {
    type Err = DfsError;

    fn from_str(line: &str) -> Result<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, args)) = tokens.split_first() else {
            return Err(DfsError::EmptyCommand);
        };

        match name {
            "quit" | "exit" => Ok(Command::Quit),
            "help" => Ok(Command::Help),
            "ls" => {
                expect_args(args, 0, USAGE_LS)?;
                Ok(Command::List)
            }
            "up" => {
                expect_args(args, 2, USAGE_UP)?;
                Ok(Command::Upload {
                    src: PathBuf::from(args[0]),
                    dest: args[1].to_string(),
                })
            }
            "down" => {
                expect_args(args, 2, USAGE_DOWN)?;
                Ok(Command::Download {
                    name: args[0].to_string(),
                    dest: PathBuf::from(args[1]),
                })
            }
            "down_id" => {
                expect_args(args, 3, USAGE_DOWN_ID)?;
                Ok(Command::DownloadById {
                    file_id: parse_number(args[0], "file_id")?,
                    offset: parse_number(args[1], "offset")?,
                    dest: PathBuf::from(args[2]),
                })
            }
            "loc" => {
                expect_args(args, 2, USAGE_LOC)?;
                Ok(Command::Locate {
                    file_id: parse_number(args[0], "file_id")?,
                    offset: parse_number(args[1], "offset")?,
                })
            }
            other => Err(DfsError::UnknownCommand(other.to_string())),
        }
    }
}
