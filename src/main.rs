use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use gardener::adapter::{self, Ecosystem};
use gardener::config::GardenerConfig;
use gardener::gate::Gate;
use gardener::journal::{AttemptStatus, Journal};
use gardener::scanner::Scanner;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gardener",
    about = "An autonomous, gated code-improvement loop",
    version
)]
struct Args {
    #[command(subcommand)]
    command: CommandArgs,
}

#[derive(Subcommand, Debug)]
enum CommandArgs {
    /// Scan a repository for high-complexity refactor candidates
    Scan {
        /// Path to the target repository
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Number of targets to return
        #[arg(long)]
        top: Option<usize>,

        /// Skip functions that failed within N days
        #[arg(long)]
        skip_days: Option<i64>,

        /// Override ecosystem detection
        #[arg(long)]
        ecosystem: Option<Ecosystem>,
    },

    /// Verify one in-place rewrite: commit it or revert everything
    Gate {
        /// Path to the target repository
        path: PathBuf,

        /// Repository-relative path of the modified file
        file: String,

        /// Qualified name of the rewritten function
        function: String,

        /// Complexity score from the prior scan
        original_cc: u32,

        /// Override ecosystem detection
        #[arg(long)]
        ecosystem: Option<Ecosystem>,
    },

    /// Read or write the attempt ledger
    Journal {
        /// Path to the target repository
        path: PathBuf,

        #[command(subcommand)]
        action: JournalAction,
    },
}

#[derive(Subcommand, Debug)]
enum JournalAction {
    /// Append one attempt record
    Write {
        /// Qualified function identity (file::Class.func)
        #[arg(long)]
        function: String,

        /// Outcome of the attempt
        #[arg(long)]
        result: AttemptStatus,

        /// One-line explanation
        #[arg(long)]
        reason: String,

        /// Original complexity
        #[arg(long, default_value = "0")]
        old_cc: u32,

        /// New complexity
        #[arg(long, default_value = "0")]
        new_cc: u32,
    },

    /// Show recent entries with success/fail counts
    Read {
        /// Show entries from the last N days
        #[arg(long, default_value = "7")]
        days: i64,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        CommandArgs::Scan {
            path,
            top,
            skip_days,
            ecosystem,
        } => run_scan(path, top, skip_days, ecosystem),
        CommandArgs::Gate {
            path,
            file,
            function,
            original_cc,
            ecosystem,
        } => run_gate(path, file, function, original_cc, ecosystem),
        CommandArgs::Journal { path, action } => run_journal(path, action),
    }
}

fn run_scan(
    path: PathBuf,
    top: Option<usize>,
    skip_days: Option<i64>,
    ecosystem: Option<Ecosystem>,
) -> Result<()> {
    let path = path.canonicalize()?;
    if !path.is_dir() {
        bail!("{} is not a directory", path.display());
    }

    let mut config = GardenerConfig::load(&path);
    if let Some(top) = top {
        config.top_targets = top;
    }
    if let Some(days) = skip_days {
        config.skip_days = days;
    }

    let ecosystem = ecosystem.unwrap_or_else(|| adapter::detect(&path));
    eprintln!("Detected ecosystem: {}", ecosystem);

    let adapter = adapter::adapter_for(ecosystem, &config);
    let report = Scanner::new(adapter.as_ref(), &config).scan(&path)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_gate(
    path: PathBuf,
    file: String,
    function: String,
    original_cc: u32,
    ecosystem: Option<Ecosystem>,
) -> Result<()> {
    let path = path.canonicalize()?;
    let config = GardenerConfig::load(&path);
    let ecosystem = ecosystem.unwrap_or_else(|| adapter::detect(&path));
    let adapter = adapter::adapter_for(ecosystem, &config);

    println!(
        "Gate check [{}]: {} (original CC={})",
        ecosystem, function, original_cc
    );

    let outcome = Gate::new(&path, &file, &function, original_cc, adapter.as_ref(), &config).run()?;
    println!("{}", serde_json::to_string(&outcome)?);

    if !outcome.passed() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_journal(path: PathBuf, action: JournalAction) -> Result<()> {
    let path = path.canonicalize()?;
    let config = GardenerConfig::load(&path);
    let journal = Journal::new(&path, &config);

    match action {
        JournalAction::Write {
            function,
            result,
            reason,
            old_cc,
            new_cc,
        } => {
            let entry = journal.append(&function, result, &reason, old_cc, new_cc)?;
            println!(
                "Journal: [{}] {} {} cc {}->{}",
                entry.date, entry.target, entry.status, entry.old_cc, entry.new_cc
            );
        }
        JournalAction::Read { days } => {
            let summary = journal.read_recent(days);
            if summary.entries.is_empty() {
                println!("No entries in the last {} days.", days);
                return Ok(());
            }
            println!("Recent entries (last {} days):", days);
            for entry in &summary.entries {
                println!(
                    "  [{}] | target: {} | status: {} | cc: {}->{} | reason: {}",
                    entry.date, entry.target, entry.status, entry.old_cc, entry.new_cc, entry.reason
                );
            }
            println!(
                "\n  Total: {} | Success {} | Fail {}",
                summary.entries.len(),
                summary.successes,
                summary.fails
            );
        }
    }
    Ok(())
}
