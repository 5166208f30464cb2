mod common;

use common::{ledger_line, packed};
use idxdoc_core::codec::PackedOffset;
use idxdoc_core::ledger::{self, LedgerIssue, LedgerLines};
use std::io::{self, Cursor, Read};

fn run(text: &str) -> (ledger::LedgerReport, ledger::ReconciledOffsets) {
    ledger::reconcile(LedgerLines::new(Cursor::new(text.to_string())))
}

#[test]
fn consistent_ledger_has_no_problems() {
    let text = [
        ledger_line("040000", "a_d", packed(1, 10), packed(4, 100)),
        ledger_line("060000", "icon", packed(0, 20), packed(1, 200)),
    ]
    .join("\n");
    let (report, sets) = run(&text);
    assert_eq!(report.entries, 2);
    assert!(!report.has_problems());
    assert!(report.issues.is_empty());
    assert!(sets.contains_mod(PackedOffset(packed(4, 100))));
    assert!(sets.contains_mod(PackedOffset(packed(1, 200))));
    assert!(sets.contains_original(PackedOffset(packed(1, 10))));
    assert_eq!(sets.mod_len(), 2);
}

#[test]
fn zero_original_offset_is_invalid() {
    let (report, _) = run(r#"{"name":"x","fullPath":"a/b/x.tex","datFile":"040000","originalOffset":0,"modOffset":800}"#);
    assert!(report.has_problems());
    assert!(matches!(report.issues[0], LedgerIssue::InvalidOriginalOffset { line: 1, .. }));
}

#[test]
fn zero_mod_offset_flags_but_keeps_original() {
    let text = ledger_line("040000", "broken", packed(2, 33), 0);
    let (report, sets) = run(&text);
    assert!(report.has_problems());
    match &report.issues[0] {
        LedgerIssue::ZeroModOffset { name, dat_file, .. } => {
            assert_eq!(name, "broken.tex");
            assert_eq!(dat_file, "040000");
        }
        other => panic!("unexpected issue {:?}", other),
    }
    assert!(sets.contains_original(PackedOffset(packed(2, 33))));
    assert_eq!(sets.mod_len(), 0);
}

#[test]
fn original_outside_unmodified_shards_is_invalid() {
    // Items keep originals in shards 0..=3, UI only in shard 0.
    let text = [
        ledger_line("040000", "items_in_mod_shard", packed(4, 1), packed(4, 2)),
        ledger_line("060000", "ui_in_mod_shard", packed(1, 1), packed(1, 2)),
        ledger_line("040000", "items_ok", packed(3, 1), packed(4, 3)),
    ]
    .join("\n");
    let (report, _) = run(&text);
    let shards: Vec<u8> = report
        .issues
        .iter()
        .map(|i| match i {
            LedgerIssue::InvalidOriginalOffset { shard, .. } => *shard,
            other => panic!("unexpected issue {:?}", other),
        })
        .collect();
    assert_eq!(shards, vec![4, 1]);
}

#[test]
fn generic_category_only_needs_nonzero_offsets() {
    let text = [
        ledger_line("0a0000", "far_shard", packed(6, 1), packed(7, 2)),
        ledger_line("0a0000", "zero_mod", packed(0, 1), 0),
    ]
    .join("\n");
    let (report, _) = run(&text);
    assert_eq!(report.issues.len(), 1);
    assert!(matches!(report.issues[0], LedgerIssue::ZeroModOffset { line: 2, .. }));
}

#[test]
fn malformed_lines_are_counted_and_skipped() {
    let text = format!(
        "{}\nnot json at all\n\n{{\"name\":\"half\"}}\n{}\n",
        ledger_line("040000", "first", packed(0, 1), packed(4, 1)),
        ledger_line("040000", "last", packed(0, 2), packed(4, 2)),
    );
    let (report, sets) = run(&text);
    assert_eq!(report.entries, 2);
    assert_eq!(report.parse_errors, 2);
    // Parse failures alone are not inconsistencies.
    assert!(!report.has_problems());
    let lines: Vec<usize> = report
        .issues
        .iter()
        .filter_map(|i| match i {
            LedgerIssue::Parse { line, .. } => Some(*line),
            _ => None,
        })
        .collect();
    assert_eq!(lines, vec![2, 4]);
    assert_eq!(sets.mod_len(), 2);
}

#[test]
fn disabled_entries_are_skipped() {
    let text = [
        ledger_line("040000", "", 0, 0),
        ledger_line("040000", "live", packed(0, 5), packed(4, 5)),
    ]
    .join("\n");
    let (report, sets) = run(&text);
    assert_eq!(report.disabled, 1);
    assert_eq!(report.entries, 1);
    assert!(!report.has_problems());
    assert!(!sets.contains_original(PackedOffset(0)));
}

#[test]
fn empty_and_missing_ledgers() {
    let (report, sets) = run("\n\n");
    assert!(report.is_empty());
    assert_eq!(sets.mod_len(), 0);

    let td = tempfile::tempdir().unwrap();
    let (report, _) = ledger::reconcile_path(&td.path().join("modlist.dat"));
    assert!(report.io_error.is_some());
    assert!(!report.is_empty());
    assert!(!report.has_problems());
}

#[test]
fn each_open_is_a_fresh_pass() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("modlist.dat");
    std::fs::write(&path, ledger_line("040000", "a", packed(0, 1), packed(4, 1))).unwrap();
    let (r1, s1) = ledger::reconcile(LedgerLines::open(&path).unwrap());
    let (r2, s2) = ledger::reconcile(LedgerLines::open(&path).unwrap());
    assert_eq!(r1, r2);
    assert_eq!(s1, s2);
}

#[test]
fn directory_modlist_is_unreadable_not_endless() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("modlist.dat");
    std::fs::create_dir(&path).unwrap();
    assert!(LedgerLines::open(&path).is_err());
    let (report, sets) = ledger::reconcile_path(&path);
    assert!(report.io_error.is_some());
    assert!(report.issues.is_empty());
    assert_eq!(sets.mod_len(), 0);
}

/// Hands out `data` once, then fails every read after it.
struct FailsAfter {
    data: Option<Vec<u8>>,
}

impl Read for FailsAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.take() {
            Some(d) => {
                buf[..d.len()].copy_from_slice(&d);
                Ok(d.len())
            }
            None => Err(io::Error::new(io::ErrorKind::Other, "device gone")),
        }
    }
}

#[test]
fn read_failure_ends_the_pass_and_keeps_what_was_read() {
    let first = ledger_line("040000", "kept", packed(0, 1), packed(4, 1)) + "\n";
    let lines = LedgerLines::new(FailsAfter { data: Some(first.into_bytes()) });
    let (report, sets) = ledger::reconcile(lines);
    assert_eq!(report.entries, 1);
    assert_eq!(report.parse_errors, 0);
    assert!(report.io_error.as_deref().unwrap().contains("device gone"));
    assert!(sets.contains_mod(PackedOffset(packed(4, 1))));
}

#[test]
fn undecodable_line_is_skipped_like_bad_json() {
    let mut bytes = b"\xff\xfe garbage\n".to_vec();
    bytes.extend(ledger_line("060000", "after", packed(0, 3), packed(1, 3)).into_bytes());
    let (report, sets) = ledger::reconcile(LedgerLines::new(Cursor::new(bytes)));
    assert_eq!(report.parse_errors, 1);
    assert_eq!(report.entries, 1);
    assert!(report.io_error.is_none());
    assert!(sets.contains_mod(PackedOffset(packed(1, 3))));
}

#[test]
fn offsets_past_the_index_field_are_rejected_not_truncated() {
    // (2^32 + 5) * 8 would alias packed value 5 if cut down to 32 bits.
    let huge = ((1u64 << 32) + 5) * 8;
    let text = format!(
        r#"{{"name":"big","fullPath":"chara/big.tex","datFile":"040000","originalOffset":{},"modOffset":{}}}"#,
        packed(0, 1) as u64 * 8,
        huge
    );
    let (report, sets) = run(&text);
    assert!(report.has_problems());
    assert_eq!(
        report.issues[0],
        LedgerIssue::OffsetOutOfRange { line: 1, name: "big.tex".into(), dat_file: "040000".into(), value: huge }
    );
    assert!(!sets.contains_mod(PackedOffset(5)));
    assert_eq!(sets.mod_len(), 0);
    assert!(sets.contains_original(PackedOffset(packed(0, 1))));
}
