use crate::category::{Category, CategorySpec};
use crate::codec::{self, IndexKind, PackedOffset};
use crate::ledger::ReconciledOffsets;
use crate::report::{file_check, FileCheck, FileStatus, Finding};
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, warn};

/// Classify one live entry. The category's own rule decides first; the
/// zero-offset rule only applies to categories without a mod shard.
pub fn classify(
    category: &Category,
    entry: u32,
    offset: PackedOffset,
    reconciled: &ReconciledOffsets,
) -> Option<Finding> {
    let rule = category.rule();
    match rule.mod_shard {
        Some(mod_shard) => {
            let shard = offset.shard();
            if shard > mod_shard {
                Some(Finding::ShardOutOfRange { entry, offset, shard, max: mod_shard })
            } else if shard == mod_shard && !reconciled.contains_mod(offset) {
                Some(Finding::OrphanedRedirection { entry, offset })
            } else {
                None
            }
        }
        None if offset.is_zero() => Some(Finding::ZeroOffset { entry }),
        None => None,
    }
}

/// Walk every record of `path` and stop at the first one `judge` rejects.
pub(crate) fn walk<F>(path: &Path, kind: IndexKind, mut judge: F) -> FileStatus
where
    F: FnMut(u32, PackedOffset) -> Option<Finding>,
{
    let iter = match codec::open_index(path).and_then(|r| codec::entries(r, kind)) {
        Ok(it) => it,
        Err(e) => {
            warn!(path = ?path, error = %e, "cannot open entry table");
            return FileStatus::Unknown { error: e.to_string() };
        }
    };
    for (i, item) in iter.enumerate() {
        let offset = match item {
            Ok(o) => o,
            Err(e) => {
                warn!(path = ?path, entry = i, error = %e, "entry table truncated");
                return FileStatus::Unknown { error: e.to_string() };
            }
        };
        if let Some(finding) = judge(i as u32, offset) {
            warn!(path = ?path, ?finding, "suspect entry");
            return FileStatus::Problem { finding };
        }
    }
    FileStatus::Ok
}

pub fn scan_file(
    category: &Category,
    kind: IndexKind,
    path: &Path,
    reconciled: &ReconciledOffsets,
) -> FileCheck {
    let status = walk(path, kind, |i, off| classify(category, i, off, reconciled));
    debug!(category = %category, ?kind, ?status, "entries scanned");
    file_check(category, kind, path, status)
}

/// Scan both live files of every category. Categories are independent and
/// run in parallel; results keep the input order.
pub fn scan_all(specs: &[CategorySpec], reconciled: &ReconciledOffsets) -> Vec<FileCheck> {
    specs
        .par_iter()
        .flat_map_iter(|spec| {
            IndexKind::BOTH.into_iter().map(move |kind| {
                scan_file(&spec.category, kind, spec.paths.live(kind), reconciled)
            })
        })
        .collect()
}
