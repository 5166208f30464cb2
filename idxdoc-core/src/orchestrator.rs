//! Sequences the audit phases and folds their results into one report.
//!
//! ```text
//! Start -> HeaderCheck -> [mismatch: LockCheck -> Repair -> HeaderCheck]
//!       -> LedgerReconcile -> EntryScan -> BackupAudit -> Done
//! ```
//!
//! Every phase runs regardless of what earlier phases found. The entry scan
//! always follows the ledger pass because it consumes the reconciled sets.

use crate::backup;
use crate::category::CategorySpec;
use crate::config::CheckConfig;
use crate::error::IdxError;
use crate::header::{self, HeaderCheck};
use crate::ledger::{self, LedgerIssue, LedgerReport};
use crate::lock::LockProbe;
use crate::report::{
    BackupAudit, Diagnostic, FileCheck, FileStatus, Finding, ProblemFlags, ProblemReport,
    RepairOutcome, Severity,
};
use crate::scan;
use tracing::{error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Start,
    HeaderCheck,
    LockCheck,
    Repair,
    Recheck,
    LedgerReconcile,
    EntryScan,
    BackupAudit,
    Done,
}

pub struct IntegrityOrchestrator<'a> {
    config: &'a CheckConfig,
    probe: &'a dyn LockProbe,
}

impl<'a> IntegrityOrchestrator<'a> {
    pub fn new(config: &'a CheckConfig, probe: &'a dyn LockProbe) -> Self {
        Self { config, probe }
    }

    fn enter(&self, from: Phase, to: Phase) -> Phase {
        info!(?from, ?to, "phase");
        to
    }

    /// Run every phase and return the accumulated report.
    pub fn run_full_check(&self) -> ProblemReport {
        let specs = self.config.category_specs();
        let mut diagnostics = Vec::new();
        let mut flags = ProblemFlags::default();

        let mut phase = self.enter(Phase::Start, Phase::HeaderCheck);
        let checks: Vec<HeaderCheck> = specs.iter().map(header::check).collect();
        let headers: Vec<FileCheck> = checks.iter().flat_map(|c| c.files.iter().cloned()).collect();
        for fc in &headers {
            if let Some(d) = file_diagnostic(fc, "header") {
                diagnostics.push(d);
            }
        }
        let mismatched: Vec<&CategorySpec> =
            specs.iter().zip(&checks).filter(|(_, c)| c.problem()).map(|(s, _)| s).collect();
        flags.header_mismatch = !mismatched.is_empty();

        let mut repair = None;
        let mut headers_after_repair = None;
        if flags.header_mismatch {
            if self.config.auto_repair {
                let (outcome, after, last) = self.repair_specs(&mismatched, phase);
                phase = last;
                flags.header_mismatch = !matches!(outcome, RepairOutcome::Repaired { .. });
                diagnostics.push(repair_diagnostic(&outcome));
                repair = Some(outcome);
                headers_after_repair = after;
            } else {
                diagnostics.push(Diagnostic::new(Severity::Warning, "repair-skipped"));
            }
        }

        let phase = self.enter(phase, Phase::LedgerReconcile);
        let (ledger, reconciled) = ledger::reconcile_path(&self.config.modlist);
        flags.ledger_inconsistent = ledger.has_problems();
        ledger_diagnostics(&ledger, &self.config.modlist, &mut diagnostics);

        let phase = self.enter(phase, Phase::EntryScan);
        let entries = scan::scan_all(&specs, &reconciled);
        for fc in &entries {
            if let Some(d) = file_diagnostic(fc, "entry") {
                diagnostics.push(d);
            }
        }
        flags.suspect_entries = entries.iter().any(FileCheck::is_problem);
        if flags.suspect_entries {
            diagnostics.push(Diagnostic::new(Severity::Warning, "entries-unknown-to-modlist"));
        }

        let phase = self.enter(phase, Phase::BackupAudit);
        let backups = backup::audit(&specs, &self.config.backup_dir);
        match &backups {
            BackupAudit::NoBackupsFound { dir } => diagnostics.push(
                Diagnostic::new(Severity::Warning, "backup-none").arg("dir", dir.display()),
            ),
            BackupAudit::Checked { files } => {
                for fc in files {
                    if let Some(d) = file_diagnostic(fc, "backup") {
                        diagnostics.push(d);
                    }
                }
            }
        }
        flags.backup_corrupt = backups.is_corrupt();
        if flags.backup_corrupt {
            diagnostics.push(Diagnostic::new(Severity::Warning, "backup-corrupt"));
        }

        self.enter(phase, Phase::Done);
        ProblemReport {
            created_utc: chrono::Utc::now().to_rfc3339(),
            flags,
            headers,
            repair,
            headers_after_repair,
            ledger,
            entries,
            backups,
            diagnostics,
        }
    }

    /// Repair every category whose header is wrong. Intended to run after
    /// the user has confirmed.
    pub fn repair_headers(&self) -> RepairOutcome {
        let specs = self.config.category_specs();
        let mismatched: Vec<&CategorySpec> =
            specs.iter().filter(|s| header::check(s).problem()).collect();
        if mismatched.is_empty() {
            return RepairOutcome::NotNeeded;
        }
        let (outcome, _, _) = self.repair_specs(&mismatched, Phase::HeaderCheck);
        outcome
    }

    /// Lock check for every file first, then write, then re-read. Nothing is
    /// written if any file is held.
    fn repair_specs(
        &self,
        specs: &[&CategorySpec],
        from: Phase,
    ) -> (RepairOutcome, Option<Vec<FileCheck>>, Phase) {
        let phase = self.enter(from, Phase::LockCheck);
        for spec in specs {
            if let Err(IdxError::RepairBlocked { path }) = header::ensure_unlocked(spec, self.probe) {
                error!(path = ?path, "repair blocked, game is running");
                return (RepairOutcome::Blocked { path }, None, phase);
            }
        }

        let phase = self.enter(phase, Phase::Repair);
        for spec in specs {
            if let Err(e) = header::write_expected(spec) {
                error!(error = %e, "header repair failed");
                return (failed(e), None, phase);
            }
        }

        let phase = self.enter(phase, Phase::Recheck);
        let mut after = Vec::new();
        for spec in specs {
            match header::confirm(spec) {
                Ok(c) => after.extend(c.files),
                Err(e) => {
                    error!(error = %e, "header repair did not converge");
                    after.extend(header::check(spec).files);
                    return (failed(e), Some(after), phase);
                }
            }
        }
        let categories = specs.iter().map(|s| s.category.to_string()).collect();
        (RepairOutcome::Repaired { categories }, Some(after), phase)
    }
}

fn failed(e: IdxError) -> RepairOutcome {
    let path = match &e {
        IdxError::Io { path, .. }
        | IdxError::RepairFailed { path, .. }
        | IdxError::RepairBlocked { path } => path.clone(),
        _ => Default::default(),
    };
    RepairOutcome::Failed { path, detail: e.to_string() }
}

fn repair_diagnostic(outcome: &RepairOutcome) -> Diagnostic {
    match outcome {
        RepairOutcome::NotNeeded => Diagnostic::new(Severity::Info, "repair-not-needed"),
        RepairOutcome::Repaired { categories } => {
            Diagnostic::new(Severity::Info, "repair-done").arg("categories", categories.join(", "))
        }
        RepairOutcome::Blocked { path } => {
            Diagnostic::new(Severity::Error, "repair-blocked").arg("file", path.display())
        }
        RepairOutcome::Failed { path, detail } => Diagnostic::new(Severity::Error, "repair-failed")
            .arg("file", path.display())
            .arg("detail", detail),
    }
}

/// Diagnostic for one file outcome; `phase` prefixes the message code.
fn file_diagnostic(fc: &FileCheck, phase: &str) -> Option<Diagnostic> {
    let file = fc.path.display();
    let d = match &fc.status {
        FileStatus::Ok => return None,
        FileStatus::Unknown { error } => Diagnostic::new(Severity::Warning, "file-unreadable")
            .arg("file", file)
            .arg("error", error),
        FileStatus::Problem { finding } => match finding {
            Finding::ShardCountMismatch { expected, found } => {
                Diagnostic::new(Severity::Error, "header-mismatch")
                    .arg("category", &fc.category)
                    .arg("file", file)
                    .arg("expected", expected)
                    .arg("found", found)
            }
            Finding::OrphanedRedirection { entry, offset } => {
                Diagnostic::new(Severity::Error, &format!("{phase}-orphaned"))
                    .arg("file", file)
                    .arg("entry", entry)
                    .arg("offset", offset)
            }
            Finding::ShardOutOfRange { entry, shard, max, .. } => {
                Diagnostic::new(Severity::Error, &format!("{phase}-out-of-range"))
                    .arg("file", file)
                    .arg("entry", entry)
                    .arg("shard", shard)
                    .arg("max", max)
            }
            Finding::ZeroOffset { entry } => Diagnostic::new(Severity::Error, &format!("{phase}-zero"))
                .arg("file", file)
                .arg("entry", entry),
            Finding::ModdedBackupEntry { entry, shard, .. } => {
                Diagnostic::new(Severity::Error, "backup-modded")
                    .arg("file", file)
                    .arg("entry", entry)
                    .arg("shard", shard)
            }
        },
    };
    Some(d)
}

fn ledger_diagnostics(report: &LedgerReport, path: &std::path::Path, out: &mut Vec<Diagnostic>) {
    if let Some(err) = &report.io_error {
        out.push(
            Diagnostic::new(Severity::Warning, "ledger-unreadable")
                .arg("file", path.display())
                .arg("error", err),
        );
        if report.entries == 0 && report.parse_errors == 0 {
            return;
        }
    }
    if report.is_empty() {
        out.push(Diagnostic::new(Severity::Warning, "ledger-empty"));
        return;
    }
    let mut bad_original = false;
    for issue in &report.issues {
        match issue {
            LedgerIssue::InvalidOriginalOffset { line, name, .. } => {
                bad_original = true;
                out.push(
                    Diagnostic::new(Severity::Error, "ledger-invalid-original")
                        .arg("name", name)
                        .arg("line", line),
                );
            }
            LedgerIssue::ZeroModOffset { line, name, .. } => out.push(
                Diagnostic::new(Severity::Error, "ledger-zero-mod").arg("name", name).arg("line", line),
            ),
            LedgerIssue::OffsetOutOfRange { line, name, value, .. } => out.push(
                Diagnostic::new(Severity::Error, "ledger-offset-out-of-range")
                    .arg("name", name)
                    .arg("line", line)
                    .arg("value", value),
            ),
            LedgerIssue::Parse { .. } => {}
        }
    }
    if report.parse_errors > 0 {
        out.push(Diagnostic::new(Severity::Warning, "ledger-parse-errors").arg("count", report.parse_errors));
    }
    if bad_original {
        out.push(Diagnostic::new(Severity::Warning, "ledger-start-over"));
    }
}
