use crate::category::CategorySpec;
use crate::codec::{self, IndexKind};
use crate::error::{IdxError, Result};
use crate::lock::LockProbe;
use crate::report::{file_check, FileCheck, FileStatus, Finding};
use tracing::{debug, info, warn};

/// Shard-count state of one category's index pair.
#[derive(Clone, Debug)]
pub struct HeaderCheck {
    pub files: Vec<FileCheck>,
}

impl HeaderCheck {
    /// True when either file disagrees with the expected shard count.
    pub fn problem(&self) -> bool {
        self.files.iter().any(FileCheck::is_problem)
    }
}

/// Read the shard count of both files and compare with the expected value.
pub fn check(spec: &CategorySpec) -> HeaderCheck {
    let files = IndexKind::BOTH
        .iter()
        .map(|&kind| {
            let path = spec.paths.live(kind);
            let status = match codec::open_index(path).and_then(|mut r| codec::read_shard_count(&mut r)) {
                Ok(found) if found == spec.expected_shards => FileStatus::Ok,
                Ok(found) => {
                    warn!(category = %spec.category, ?kind, found, expected = spec.expected_shards, "shard count mismatch");
                    FileStatus::Problem {
                        finding: Finding::ShardCountMismatch { expected: spec.expected_shards, found },
                    }
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "cannot read index header");
                    FileStatus::Unknown { error: e.to_string() }
                }
            };
            debug!(category = %spec.category, ?kind, ?status, "header checked");
            file_check(&spec.category, kind, path, status)
        })
        .collect();
    HeaderCheck { files }
}

/// Write the expected shard count into both files of the pair.
///
/// The lock probe is consulted for both files before the first byte is
/// written, so a held lock leaves both headers untouched.
pub fn repair(spec: &CategorySpec, probe: &dyn LockProbe) -> Result<()> {
    ensure_unlocked(spec, probe)?;
    write_expected(spec)
}

pub fn ensure_unlocked(spec: &CategorySpec, probe: &dyn LockProbe) -> Result<()> {
    for kind in IndexKind::BOTH {
        let path = spec.paths.live(kind);
        if probe.is_lock_held(path) {
            return Err(IdxError::RepairBlocked { path: path.clone() });
        }
    }
    Ok(())
}

/// Unconditional write of the expected byte; callers check the lock first.
pub fn write_expected(spec: &CategorySpec) -> Result<()> {
    let value = spec.expected_shards as u8;
    for kind in IndexKind::BOTH {
        let path = spec.paths.live(kind);
        let mut f = codec::open_index_for_write(path).map_err(|e| IdxError::io(path, e))?;
        codec::write_shard_count(&mut f, value).map_err(|e| IdxError::io(path, e))?;
        f.sync_data().map_err(|e| IdxError::io(path, e))?;
        info!(category = %spec.category, ?kind, value, "shard count rewritten");
    }
    Ok(())
}

/// Re-read both headers after a repair and turn a residual mismatch into
/// `RepairFailed`.
pub fn confirm(spec: &CategorySpec) -> Result<HeaderCheck> {
    let recheck = check(spec);
    for fc in &recheck.files {
        if let Some(Finding::ShardCountMismatch { expected, found }) = fc.finding() {
            return Err(IdxError::RepairFailed {
                path: fc.path.clone(),
                expected: *expected,
                found: *found,
            });
        }
    }
    Ok(recheck)
}
