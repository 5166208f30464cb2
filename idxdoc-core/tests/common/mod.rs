#![allow(dead_code)]

use idxdoc_core::codec::{IndexKind, ENTRY_COUNT_AT, SHARD_COUNT_AT, TABLE_START};
use idxdoc_core::config::CheckConfig;
use std::collections::BTreeMap;
use std::path::Path;

/// Packed field for `block` inside `shard`.
pub fn packed(shard: u8, block: u32) -> u32 {
    (block << 4) | (shard as u32 * 2)
}

/// Build an index image with the given records. Hash bytes are filled with
/// non-zero noise so a reader looking at the wrong field notices.
pub fn index_bytes(kind: IndexKind, shard_count: u16, offsets: &[u32]) -> Vec<u8> {
    let rs = kind.record_size();
    let mut buf = vec![0u8; TABLE_START as usize + offsets.len() * rs];
    let count = offsets.len() as u32;
    buf[ENTRY_COUNT_AT as usize..ENTRY_COUNT_AT as usize + 4].copy_from_slice(&count.to_le_bytes());
    buf[SHARD_COUNT_AT as usize..SHARD_COUNT_AT as usize + 2].copy_from_slice(&shard_count.to_le_bytes());
    for (i, off) in offsets.iter().enumerate() {
        let rec = TABLE_START as usize + i * rs;
        for b in &mut buf[rec..rec + rs] {
            *b = 0xEE;
        }
        let at = rec + kind.packed_at();
        buf[at..at + 4].copy_from_slice(&off.to_le_bytes());
    }
    buf
}

pub fn write_index(path: &Path, kind: IndexKind, shard_count: u16, offsets: &[u32]) {
    std::fs::write(path, index_bytes(kind, shard_count, offsets)).unwrap();
}

/// Write both files of a pair with the same offsets.
pub fn write_pair(dir: &Path, key: &str, shard_count: u16, offsets: &[u32]) {
    for kind in IndexKind::BOTH {
        let path = dir.join(format!("{}.{}", key, kind.file_suffix()));
        write_index(&path, kind, shard_count, offsets);
    }
}

pub fn ledger_line(dat_file: &str, name: &str, original: u32, modded: u32) -> String {
    format!(
        r#"{{"category":"Gear","name":"{name}","fullPath":"chara/equipment/{name}.tex","datFile":"{dat_file}","originalOffset":{},"modOffset":{},"modSize":1024}}"#,
        original as u64 * 8,
        modded as u64 * 8
    )
}

pub struct Layout {
    pub _td: tempfile::TempDir,
    pub cfg: CheckConfig,
}

/// Game dir, backup dir and modlist inside a fresh temp dir, with the two
/// bespoke categories plus one generic category configured.
pub fn layout() -> Layout {
    let td = tempfile::tempdir().unwrap();
    let game_dir = td.path().join("sqpack");
    let backup_dir = td.path().join("index_backup");
    std::fs::create_dir_all(&game_dir).unwrap();
    std::fs::create_dir_all(&backup_dir).unwrap();
    let mut categories = BTreeMap::new();
    categories.insert("040000".to_string(), 5);
    categories.insert("060000".to_string(), 2);
    categories.insert("0a0000".to_string(), 1);
    let cfg = CheckConfig {
        game_dir,
        backup_dir,
        modlist: td.path().join("modlist.dat"),
        auto_repair: true,
        categories,
    };
    Layout { _td: td, cfg }
}
