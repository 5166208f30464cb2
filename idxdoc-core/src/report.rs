use crate::category::Category;
use crate::codec::{IndexKind, PackedOffset};
use crate::ledger::LedgerReport;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Why an entry or header was rejected.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    ShardCountMismatch { expected: u16, found: u16 },
    /// Live entry in the mod shard that the modlist never recorded.
    OrphanedRedirection { entry: u32, offset: PackedOffset },
    ShardOutOfRange { entry: u32, offset: PackedOffset, shard: u8, max: u8 },
    ZeroOffset { entry: u32 },
    /// Backup entry that already points into the mod shard.
    ModdedBackupEntry { entry: u32, offset: PackedOffset, shard: u8 },
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Ok,
    Problem { finding: Finding },
    /// Could not be read; the message is the IO error.
    Unknown { error: String },
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct FileCheck {
    pub category: Category,
    pub kind: IndexKind,
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileCheck {
    pub fn is_problem(&self) -> bool {
        matches!(self.status, FileStatus::Problem { .. })
    }

    pub fn finding(&self) -> Option<&Finding> {
        match &self.status {
            FileStatus::Problem { finding } => Some(finding),
            _ => None,
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RepairOutcome {
    NotNeeded,
    Repaired { categories: Vec<String> },
    /// Game still running; nothing was written.
    Blocked { path: PathBuf },
    Failed { path: PathBuf, detail: String },
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BackupAudit {
    NoBackupsFound { dir: PathBuf },
    Checked { files: Vec<FileCheck> },
}

impl BackupAudit {
    pub fn is_corrupt(&self) -> bool {
        match self {
            BackupAudit::NoBackupsFound { .. } => false,
            BackupAudit::Checked { files } => files.iter().any(FileCheck::is_problem),
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A message code plus named arguments, rendered by `localize::FluentLoc`.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub args: BTreeMap<String, String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: &str) -> Self {
        Self { severity, code: code.to_string(), args: BTreeMap::new() }
    }

    pub fn arg(mut self, name: &str, value: impl ToString) -> Self {
        self.args.insert(name.to_string(), value.to_string());
        self
    }
}

/// Problems still present when the check finished.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProblemFlags {
    /// Reflects the headers after any repair. A mismatch that was found and
    /// then repaired is cleared here; it stays visible in
    /// `ProblemReport::headers` and `ProblemReport::repair`.
    pub header_mismatch: bool,
    pub ledger_inconsistent: bool,
    pub suspect_entries: bool,
    pub backup_corrupt: bool,
}

impl ProblemFlags {
    pub fn any(&self) -> bool {
        self.header_mismatch || self.ledger_inconsistent || self.suspect_entries || self.backup_corrupt
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct ProblemReport {
    pub created_utc: String,
    pub flags: ProblemFlags,
    /// Header state as first read, before any repair.
    pub headers: Vec<FileCheck>,
    pub repair: Option<RepairOutcome>,
    /// Header state after a repair attempt, when one was made.
    pub headers_after_repair: Option<Vec<FileCheck>>,
    pub ledger: LedgerReport,
    pub entries: Vec<FileCheck>,
    pub backups: BackupAudit,
    pub diagnostics: Vec<Diagnostic>,
}

impl ProblemReport {
    pub fn has_problems(&self) -> bool {
        self.flags.any()
    }
}

/// Shorthand used by the phases when folding a file walk into a check.
pub(crate) fn file_check(
    category: &Category,
    kind: IndexKind,
    path: &std::path::Path,
    status: FileStatus,
) -> FileCheck {
    FileCheck { category: category.clone(), kind, path: path.to_path_buf(), status }
}
