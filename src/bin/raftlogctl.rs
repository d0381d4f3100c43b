//! Demo harness for the replicated-log core.
//!
//! This binary plays the role of "the rest of the node" well enough to drive
//! `propose`/`ingest_batch`/`register_command`/`dispatch` on a single process
//! with no peers: it owns a [`raftlog::LogCore`], a small toy state machine,
//! and a line-oriented REPL. Every typed line is proposed, immediately
//! "committed" (a single-node cluster has a quorum of one), and applied, so
//! the full propose -> append -> sync -> commit -> apply pipeline runs
//! end-to-end without a second node. It is ops/demo tooling, not part of the
//! core's tested surface; cluster membership, RPC framing, and leader
//! election are out of scope and have no code here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use clap::Parser;
use log::{error, info, LevelFilter};
use raftlog::{CommandRegistry, LogCore, Role};
use rustyline::DefaultEditor;
use simplelog::{ColorChoice, Config as LogConfig, TermLogger, TerminalMode};

#[derive(Parser, Debug)]
#[command(name = "raftlogctl", about = "Single-node demo shell for the replicated-log core")]
struct Args {
    /// Path to a TOML config file (optional; see raftlog::config::Config).
    #[arg(long)]
    config: Option<String>,

    /// Override the configured log file path.
    #[arg(long)]
    data_dir: Option<std::path::PathBuf>,

    /// Disable fsync after every applied command (unsafe; for local testing).
    #[arg(long)]
    no_fsync: bool,
}

/// A tiny in-memory key/value state machine: `SET key value`, `GET key`,
/// `INCR key`.
fn build_registry() -> CommandRegistry {
    let state: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));
    let mut registry = CommandRegistry::new();

    let s = state.clone();
    registry.register("SET", 3, move |args| {
        s.lock().unwrap().insert(args[1].clone(), args[2].clone());
    });

    let s = state.clone();
    registry.register("GET", 2, move |args| {
        let value = s.lock().unwrap().get(&args[1]).cloned();
        println!("{}", value.unwrap_or_else(|| "(nil)".to_string()));
    });

    let s = state.clone();
    registry.register("INCR", 2, move |args| {
        let mut state = s.lock().unwrap();
        let entry = state.entry(args[1].clone()).or_insert_with(|| "0".to_string());
        let next = entry.parse::<i64>().unwrap_or(0) + 1;
        *entry = next.to_string();
        println!("{next}");
    });

    registry
}

fn install_logger(level: &str) {
    let level = level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    TermLogger::init(level, LogConfig::default(), TerminalMode::Mixed, ColorChoice::Auto)
        .expect("failed to install logger");
}

fn main() {
    let args = Args::parse();
    let mut config = raftlog::config::Config::load(args.config.as_deref()).unwrap_or_default();
    if let Some(data_dir) = args.data_dir {
        config.log_path = data_dir;
    }
    if args.no_fsync {
        config.fsync = false;
    }

    install_logger(&config.log_level);

    let mut core = match LogCore::open(&config.log_path, build_registry()) {
        Ok(core) => core,
        Err(err) => {
            error!("failed to open log at {:?}: {err}", config.log_path);
            std::process::exit(1);
        }
    };
    info!("raftlogctl ready at {:?}, fsync={}", config.log_path, config.fsync);

    // A single-node cluster is its own quorum: elect ourselves leader at
    // term 1 and proceed. Multi-node election is out of scope.
    core.set_term(core.term().max(1));
    core.set_role(Role::Leader);

    let mut editor = DefaultEditor::new().expect("failed to start line editor");
    loop {
        let line = match editor.readline("raftlog> ") {
            Ok(line) => line,
            Err(_) => break, // EOF / Ctrl-D / Ctrl-C
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        if line == "status" {
            let (last_index, last_term, commit_index) = core.snapshot_state();
            println!(
                "last={last_index}@{last_term} commit={commit_index} applied={}",
                core.last_applied()
            );
            continue;
        }

        let name = match line.split_whitespace().next() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let rest = line[name.len()..].trim_start();

        let (tx, rx) = crossbeam::channel::bounded(1);
        let index = match core.propose(name, rest.as_bytes().to_vec(), tx) {
            Ok(index) => index,
            Err(err) => {
                println!("error: {err}");
                continue;
            }
        };
        if config.fsync {
            if let Err(err) = core.sync_now() {
                println!("error: sync failed: {err}");
                continue;
            }
        }
        core.advance_commit_index(index);
        match rx.try_recv() {
            Ok(outcome) => println!("applied -> {outcome:?}"),
            Err(_) => println!("proposed at index {index} (not yet applied)"),
        }
    }
}
