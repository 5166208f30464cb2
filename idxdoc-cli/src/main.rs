use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use idxdoc_core::codec::{self, IndexKind};
use idxdoc_core::config::CheckConfig;
use idxdoc_core::ledger::{self, LedgerIssue};
use idxdoc_core::localize::FluentLoc;
use idxdoc_core::lock::Fs2LockProbe;
use idxdoc_core::orchestrator::IntegrityOrchestrator;
use idxdoc_core::report::{BackupAudit, FileCheck, FileStatus, ProblemReport, RepairOutcome};

#[derive(Parser)]
#[command(name="idxdoc", version, about="Audit and repair modded archive index files")]
struct Cli {
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Message language
    #[arg(long, default_value = "en-GB", global = true)]
    lang: String,
    #[command(subcommand)] cmd: Cmd,
}

#[derive(Args)]
struct Locations {
    /// JSON config file; flags below override its values
    #[arg(long)] config: Option<PathBuf>,
    #[arg(long)] game_dir: Option<PathBuf>,
    #[arg(long)] backup_dir: Option<PathBuf>,
    #[arg(long)] modlist: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run every check: headers (with repair), modlist, entries, backups
    Check {
        #[command(flatten)] loc: Locations,
        /// Report header mismatches without writing
        #[arg(long, default_value_t=false)] no_repair: bool,
        /// Print the full report as JSON
        #[arg(long, default_value_t=false)] json: bool,
    },
    /// Rewrite the shard-count header of every mismatched index
    Repair {
        #[command(flatten)] loc: Locations,
        /// Confirm that the game is closed and the write may proceed
        #[arg(long, default_value_t=false)] yes: bool,
    },
    /// Validate the modlist on its own
    Ledger { #[command(flatten)] loc: Locations },
    /// Dump header fields and shard usage of one index file
    Inspect {
        file: PathBuf,
        /// Treat the file as an .index2 (8-byte records)
        #[arg(long, default_value_t=false)] secondary: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let loc = FluentLoc::builtin(&cli.lang);
    match cli.cmd {
        Cmd::Check { loc: l, no_repair, json } => {
            let mut cfg = load_config(&l)?;
            if no_repair { cfg.auto_repair = false; }
            check(&cfg, json, &loc)?
        }
        Cmd::Repair { loc: l, yes } => repair(&load_config(&l)?, yes, &loc)?,
        Cmd::Ledger { loc: l } => ledger_summary(&load_config(&l)?)?,
        Cmd::Inspect { file, secondary } => inspect(&file, if secondary { IndexKind::Secondary } else { IndexKind::Primary })?,
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose { 0 => "warn", 1 => "info", _ => "debug" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_config(l: &Locations) -> Result<CheckConfig> {
    let mut cfg = match &l.config {
        Some(p) => CheckConfig::load(p).with_context(|| format!("load config {}", p.display()))?,
        None => CheckConfig::default(),
    };
    if let Some(p) = &l.game_dir { cfg.game_dir = p.clone(); }
    if let Some(p) = &l.backup_dir { cfg.backup_dir = p.clone(); }
    if let Some(p) = &l.modlist { cfg.modlist = p.clone(); }
    tracing::debug!(?cfg, "effective config");
    Ok(cfg)
}

fn check(cfg: &CheckConfig, json: bool, loc: &FluentLoc) -> Result<()> {
    let probe = Fs2LockProbe;
    let report = IntegrityOrchestrator::new(cfg, &probe).run_full_check();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    print_report(&report, loc);
    Ok(())
}

fn print_report(report: &ProblemReport, loc: &FluentLoc) {
    println!("Checking index headers....");
    for fc in &report.headers { print_file(fc); }
    if let Some(after) = &report.headers_after_repair {
        println!("Headers after repair:");
        for fc in after { print_file(fc); }
    }
    println!("Checking modlist....");
    let lr = &report.ledger;
    println!("  entries {}  disabled {}  rejected {}  unparsable {}", lr.entries, lr.disabled, lr.issues.len() - lr.parse_errors, lr.parse_errors);
    println!("Checking index values....");
    for fc in &report.entries { print_file(fc); }
    println!("Checking index backups....");
    match &report.backups {
        BackupAudit::NoBackupsFound { dir } => println!("  (none under {})", dir.display()),
        BackupAudit::Checked { files } => for fc in files { print_file(fc); },
    }
    if !report.diagnostics.is_empty() { println!(); }
    for d in &report.diagnostics {
        println!("[{:?}] {}", d.severity, loc.render(d));
    }
    let verdict = if report.has_problems() { "verdict-problems" } else { "verdict-ok" };
    println!("{}", loc.msg(verdict, &[]));
}

fn print_file(fc: &FileCheck) {
    let name = fc.path.file_name().and_then(|s| s.to_str()).unwrap_or("?");
    let mark = match &fc.status {
        FileStatus::Ok => "ok".to_string(),
        FileStatus::Problem { finding } => format!("PROBLEM {:?}", finding),
        FileStatus::Unknown { error } => format!("UNKNOWN ({})", error),
    };
    println!("  {:28} {}", name, mark);
}

fn repair(cfg: &CheckConfig, yes: bool, loc: &FluentLoc) -> Result<()> {
    if !yes { bail!("refusing to write index headers without --yes (close the game first)"); }
    let probe = Fs2LockProbe;
    let outcome = IntegrityOrchestrator::new(cfg, &probe).repair_headers();
    match outcome {
        RepairOutcome::NotNeeded => println!("{}", loc.msg("repair-not-needed", &[])),
        RepairOutcome::Repaired { categories } => {
            println!("{}", loc.msg("repair-done", &[("categories", &categories.join(", "))]));
        }
        RepairOutcome::Blocked { path } => {
            let file = path.display().to_string();
            return Err(anyhow!(loc.msg("repair-blocked", &[("file", &file)])));
        }
        RepairOutcome::Failed { path, detail } => {
            let file = path.display().to_string();
            return Err(anyhow!(loc.msg("repair-failed", &[("file", &file), ("detail", &detail)])));
        }
    }
    Ok(())
}

fn ledger_summary(cfg: &CheckConfig) -> Result<()> {
    let lines = ledger::LedgerLines::open(&cfg.modlist).with_context(|| format!("open modlist {}", cfg.modlist.display()))?;
    let (report, sets) = ledger::reconcile(lines);
    println!("Modlist {}: entries {}, disabled {}, parse errors {}", cfg.modlist.display(), report.entries, report.disabled, report.parse_errors);
    println!("  mod offsets {}, original offsets {}", sets.mod_len(), sets.original_len());
    for issue in &report.issues {
        match issue {
            LedgerIssue::InvalidOriginalOffset { line, name, dat_file, shard } => println!("  line {:5}  {:24} {}  invalid original offset (shard {})", line, name, dat_file, shard),
            LedgerIssue::ZeroModOffset { line, name, dat_file } => println!("  line {:5}  {:24} {}  mod offset is 0", line, name, dat_file),
            LedgerIssue::OffsetOutOfRange { line, name, dat_file, value } => println!("  line {:5}  {:24} {}  offset {} does not fit the index", line, name, dat_file, value),
            LedgerIssue::Parse { line, message } => println!("  line {:5}  unparsable: {}", line, message),
        }
    }
    if report.has_problems() { println!("BAD"); } else { println!("OK"); }
    Ok(())
}

fn inspect(path: &Path, kind: IndexKind) -> Result<()> {
    let mut r = codec::open_index(path).with_context(|| format!("open {}", path.display()))?;
    let shards = codec::read_shard_count(&mut r).context("read shard count")?;
    let count = codec::read_entry_count(&mut r).context("read entry count")?;
    println!("{}: shard count {}, {} record(s) of {} bytes", path.display(), shards, count, kind.record_size());

    let mut per_shard: BTreeMap<u8, usize> = BTreeMap::new();
    let mut zero = 0usize;
    for item in codec::entries(r, kind)? {
        match item {
            Ok(off) => {
                if off.is_zero() { zero += 1; }
                *per_shard.entry(off.shard()).or_default() += 1;
            }
            Err(e) => { eprintln!("entry table truncated: {}", e); break; }
        }
    }
    for (shard, n) in per_shard { println!("  shard {:2}: {:8} entries", shard, n); }
    println!("  zero offsets: {}", zero);
    Ok(())
}
