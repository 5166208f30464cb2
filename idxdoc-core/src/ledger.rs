//! Reader for the patcher's modlist, the append-only ledger of every offset
//! redirection it has applied.
//!
//! Each non-empty line is one JSON object. Offsets in the ledger are eight
//! times the packed field stored in the index, so they are scaled down with
//! [`PackedOffset::from_ledger`] before anything is compared.

use crate::category::Category;
use crate::codec::PackedOffset;
use crate::error::{IdxError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind, Lines, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    #[serde(default)]
    pub category: String,
    pub name: String,
    pub full_path: String,
    pub dat_file: String,
    pub original_offset: u64,
    pub mod_offset: u64,
    #[serde(default)]
    pub mod_size: u64,
}

impl LedgerEntry {
    /// The patcher blanks the name of entries it has removed.
    pub fn is_disabled(&self) -> bool {
        self.name.is_empty()
    }

    pub fn original(&self) -> Option<PackedOffset> {
        PackedOffset::from_ledger(self.original_offset)
    }

    pub fn modded(&self) -> Option<PackedOffset> {
        PackedOffset::from_ledger(self.mod_offset)
    }

    /// File name shown in diagnostics.
    pub fn display_name(&self) -> &str {
        self.full_path.rsplit(['/', '\\']).next().unwrap_or(&self.full_path)
    }
}

/// One pass over the ledger, yielding `(line number, entry)` for every
/// non-blank line. Open it again for another pass.
///
/// A line with undecodable bytes is yielded as a parse error and skipped.
/// Any other read failure is yielded once as `IdxError::Io` and ends the
/// pass.
pub struct LedgerLines<R> {
    lines: Lines<BufReader<R>>,
    line_no: usize,
    path: PathBuf,
    done: bool,
}

impl<R: Read> LedgerLines<R> {
    pub fn new(reader: R) -> Self {
        Self { lines: BufReader::new(reader).lines(), line_no: 0, path: PathBuf::new(), done: false }
    }
}

impl LedgerLines<File> {
    pub fn open(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path).map_err(|e| IdxError::io(path, e))?;
        if !meta.is_file() {
            let e = io::Error::new(ErrorKind::InvalidInput, "modlist is not a regular file");
            return Err(IdxError::io(path, e));
        }
        let f = File::open(path).map_err(|e| IdxError::io(path, e))?;
        Ok(Self { path: path.to_path_buf(), ..Self::new(f) })
    }
}

impl<R: Read> Iterator for LedgerLines<R> {
    type Item = (usize, Result<LedgerEntry>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            let line_no = self.line_no;
            match line {
                Ok(s) if s.trim().is_empty() => continue,
                Ok(s) => {
                    let parsed = serde_json::from_str::<LedgerEntry>(s.trim())
                        .map_err(|e| IdxError::LedgerParse { line: line_no, reason: e.to_string() });
                    return Some((line_no, parsed));
                }
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    let reason = e.to_string();
                    return Some((line_no, Err(IdxError::LedgerParse { line: line_no, reason })));
                }
                Err(e) => {
                    self.done = true;
                    return Some((line_no, Err(IdxError::io(&self.path, e))));
                }
            }
        }
    }
}

/// Offsets collected from the whole ledger, in index (packed) units.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconciledOffsets {
    mod_offsets: HashSet<PackedOffset>,
    original_offsets: HashSet<PackedOffset>,
}

impl ReconciledOffsets {
    pub fn contains_mod(&self, offset: PackedOffset) -> bool {
        self.mod_offsets.contains(&offset)
    }

    pub fn contains_original(&self, offset: PackedOffset) -> bool {
        self.original_offsets.contains(&offset)
    }

    pub fn mod_len(&self) -> usize {
        self.mod_offsets.len()
    }

    pub fn original_len(&self) -> usize {
        self.original_offsets.len()
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerIssue {
    /// Original offset is zero or points outside the untouched shards;
    /// reverting this entry would break the asset.
    InvalidOriginalOffset { line: usize, name: String, dat_file: String, shard: u8 },
    /// The import never relocated the asset.
    ZeroModOffset { line: usize, name: String, dat_file: String },
    /// An offset too large for the index field; it can match nothing.
    OffsetOutOfRange { line: usize, name: String, dat_file: String, value: u64 },
    Parse { line: usize, message: String },
}

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerReport {
    pub entries: usize,
    pub disabled: usize,
    pub parse_errors: usize,
    pub issues: Vec<LedgerIssue>,
    /// The ledger could not be opened, or reading stopped early. Entries
    /// read before the failure are still counted.
    pub io_error: Option<String>,
}

impl LedgerReport {
    /// Any entry failed validation. Parse errors alone do not count; they
    /// are reported through `parse_errors`.
    pub fn has_problems(&self) -> bool {
        self.issues.iter().any(|i| !matches!(i, LedgerIssue::Parse { .. }))
    }

    pub fn is_empty(&self) -> bool {
        self.io_error.is_none() && self.entries == 0 && self.parse_errors == 0
    }
}

/// Validate one entry against its category's shard rule.
pub fn validate(line: usize, entry: &LedgerEntry) -> Option<LedgerIssue> {
    let name = || entry.display_name().to_string();
    let (Some(original), Some(modded)) = (entry.original(), entry.modded()) else {
        let value = if entry.original().is_none() { entry.original_offset } else { entry.mod_offset };
        return Some(LedgerIssue::OffsetOutOfRange { line, name: name(), dat_file: entry.dat_file.clone(), value });
    };
    let rule = Category::from_key(&entry.dat_file).rule();
    let shard = original.shard();
    let out_of_range = rule.max_original_shard().map(|max| shard > max).unwrap_or(false);
    if original.is_zero() || out_of_range {
        return Some(LedgerIssue::InvalidOriginalOffset { line, name: name(), dat_file: entry.dat_file.clone(), shard });
    }
    if modded.is_zero() {
        return Some(LedgerIssue::ZeroModOffset { line, name: name(), dat_file: entry.dat_file.clone() });
    }
    None
}

/// Run the whole ledger once, validating every entry and building the
/// offset sets the entry scan cross-references.
pub fn reconcile<R: Read>(lines: LedgerLines<R>) -> (LedgerReport, ReconciledOffsets) {
    let mut report = LedgerReport::default();
    let mut sets = ReconciledOffsets::default();
    for (line, parsed) in lines {
        let entry = match parsed {
            Ok(e) => e,
            Err(e @ IdxError::Io { .. }) => {
                warn!(line, error = %e, "modlist read failed, pass ends here");
                report.io_error = Some(e.to_string());
                break;
            }
            Err(e) => {
                warn!(line, error = %e, "skipping malformed modlist line");
                report.parse_errors += 1;
                report.issues.push(LedgerIssue::Parse { line, message: e.to_string() });
                continue;
            }
        };
        if entry.is_disabled() {
            report.disabled += 1;
            continue;
        }
        report.entries += 1;
        match validate(line, &entry) {
            Some(issue) => {
                warn!(line, name = entry.display_name(), ?issue, "modlist entry rejected");
                report.issues.push(issue);
            }
            None => debug!(line, name = entry.display_name(), "modlist entry ok"),
        }
        // Originals are kept even for rejected entries; a zero mod offset
        // never matches a live entry so it is left out.
        if let Some(original) = entry.original() {
            sets.original_offsets.insert(original);
        }
        if let Some(modded) = entry.modded().filter(|m| !m.is_zero()) {
            sets.mod_offsets.insert(modded);
        }
    }
    info!(
        entries = report.entries,
        rejected = report.issues.len() - report.parse_errors,
        parse_errors = report.parse_errors,
        "modlist reconciled"
    );
    (report, sets)
}

/// Open and reconcile the ledger at `path`. A missing file, or a path that
/// is not a regular file, yields empty sets and records the error instead of
/// failing.
pub fn reconcile_path(path: &Path) -> (LedgerReport, ReconciledOffsets) {
    match LedgerLines::open(path) {
        Ok(lines) => reconcile(lines),
        Err(e) => {
            warn!(path = ?path, error = %e, "modlist unavailable");
            let report = LedgerReport { io_error: Some(e.to_string()), ..LedgerReport::default() };
            (report, ReconciledOffsets::default())
        }
    }
}
