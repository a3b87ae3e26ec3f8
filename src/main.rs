//! Mini DFS - Main Application
//!
//! Starts the storage nodes and either serves the interactive command shell
//! or runs scripted demo scenarios.

use clap::{value_parser, Arg, ArgAction, Command};
use mini_dfs::shell::demo::DemoScenarios;
use mini_dfs::{Config, Coordinator, Shell};
use tracing_subscriber::EnvFilter;

type MainResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> MainResult {
    let matches = Command::new("Mini DFS")
        .version("0.1.0")
        .about("In-process distributed file store with replicated storage nodes")
        .arg(
            Arg::new("nodes")
                .short('n')
                .long("nodes")
                .value_name("COUNT")
                .help("Number of storage nodes")
                .value_parser(value_parser!(usize))
                .default_value("4"),
        )
        .arg(
            Arg::new("replicas")
                .short('r')
                .long("replicas")
                .value_name("COUNT")
                .help("Number of nodes receiving a copy of every upload")
                .value_parser(value_parser!(usize))
                .default_value("4"),
        )
        .arg(
            Arg::new("prefix")
                .long("prefix")
                .value_name("NAME")
                .help("Prefix of storage node identities")
                .default_value("data_node_"),
        )
        .arg(
            Arg::new("demo")
                .long("demo")
                .value_name("TYPE")
                .help("Run a specific demo: basic, corruption, placement")
                .value_parser(DemoScenarios::NAMES),
        )
        .arg(
            Arg::new("headless")
                .long("headless")
                .help("Run every demo scenario without the interactive shell")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("FILTER")
                .help("Log filter (overrides RUST_LOG), e.g. debug or mini_dfs=info"),
        )
        .get_matches();

    let filter = match matches.get_one::<String>("log-level") {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let defaults = Config::default();
    let config = Config {
        node_count: matches
            .get_one::<usize>("nodes")
            .copied()
            .unwrap_or(defaults.node_count),
        replication_factor: matches
            .get_one::<usize>("replicas")
            .copied()
            .unwrap_or(defaults.replication_factor),
        node_prefix: matches
            .get_one::<String>("prefix")
            .cloned()
            .unwrap_or(defaults.node_prefix),
    };

    let mut coordinator = Coordinator::new(config)?;

    if matches.get_flag("headless") {
        for name in DemoScenarios::NAMES {
            run_demo(&mut coordinator, name)?;
        }
        return Ok(());
    }
    if let Some(name) = matches.get_one::<String>("demo") {
        return run_demo(&mut coordinator, name);
    }

    let mut shell = Shell::new(coordinator);
    shell.run(tokio::io::BufReader::new(tokio::io::stdin())).await?;
    Ok(())
}

/// Run one demo scenario and print its log
fn run_demo(coordinator: &mut Coordinator, name: &str) -> MainResult {
    let log = tokio::task::block_in_place(|| DemoScenarios::run_named(coordinator, name))?;
    for line in log {
        println!("{}", line);
    }
    println!();
    Ok(())
}
