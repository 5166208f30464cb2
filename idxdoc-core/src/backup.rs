use crate::category::{Category, CategorySpec};
use crate::codec::{IndexKind, PackedOffset};
use crate::report::{file_check, BackupAudit, FileCheck, Finding};
use crate::scan::walk;
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// A backup must look untouched: nothing may point at or past the mod shard.
pub fn classify_backup(category: &Category, entry: u32, offset: PackedOffset) -> Option<Finding> {
    match category.rule().mod_shard {
        Some(mod_shard) => {
            let shard = offset.shard();
            (shard >= mod_shard).then_some(Finding::ModdedBackupEntry { entry, offset, shard })
        }
        None if offset.is_zero() => Some(Finding::ZeroOffset { entry }),
        None => None,
    }
}

pub fn audit_file(category: &Category, kind: IndexKind, path: &Path) -> FileCheck {
    let status = walk(path, kind, |i, off| classify_backup(category, i, off));
    debug!(category = %category, ?kind, ?status, "backup scanned");
    file_check(category, kind, path, status)
}

/// Audit the backup pair of every category under `backup_dir`.
pub fn audit(specs: &[CategorySpec], backup_dir: &Path) -> BackupAudit {
    if !backup_dir.is_dir() {
        warn!(dir = ?backup_dir, "no index backups found");
        return BackupAudit::NoBackupsFound { dir: backup_dir.to_path_buf() };
    }
    let files: Vec<FileCheck> = specs
        .par_iter()
        .flat_map_iter(|spec| {
            IndexKind::BOTH
                .into_iter()
                .map(move |kind| audit_file(&spec.category, kind, spec.paths.backup(kind)))
        })
        .collect();
    info!(files = files.len(), corrupt = files.iter().filter(|f| f.is_problem()).count(), "backups audited");
    BackupAudit::Checked { files }
}
