//! Tests for Engine
//!
//! These tests verify:
//! - Upsert and list round-trips
//! - Cursor semantics (exclusive, non-existent cursors, default page size)
//! - Pagination completeness across MemTable and SSTables
//! - Persistence across close/reopen and WAL replay after a crash
//! - Cancellation leaves no trace
//! - Concurrent readers and writers

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use portdb::config::{Config, WalSyncStrategy};
use portdb::engine::Engine;
use portdb::{CancelToken, Port, PortDetails, PortError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite) // Sync every write for test reliability
        .memtable_size_limit(1024 * 1024) // 1 MB
        .build();
    let engine = Engine::open(config).unwrap();
    (temp_dir, engine)
}

fn setup_temp_engine_with_small_memtable() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(small_memtable_config(&temp_dir)).unwrap();
    (temp_dir, engine)
}

fn small_memtable_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .memtable_size_limit(512) // Very small to trigger flushes
        .compaction_threshold(1_000) // Keep every flushed table around
        .build()
}

fn details(tag: &str) -> PortDetails {
    PortDetails {
        name: Some(format!("Port {}", tag)),
        city: Some(format!("City {}", tag)),
        country: Some(format!("Country {}", tag)),
        coordinates: Some([1.1, 2.2]),
        province: Some(format!("Province {}", tag)),
        timezone: Some(format!("TZ {}", tag)),
        unlocs: vec![tag.to_string()],
        code: Some("1234".to_string()),
        ..Default::default()
    }
}

fn upsert(engine: &Engine, id: &str, d: &PortDetails) {
    engine.upsert(&CancelToken::new(), id, d).unwrap();
}

fn list(engine: &Engine, after: &str, max: usize) -> Vec<Port> {
    engine.list(&CancelToken::new(), after, max).unwrap()
}

fn ids(ports: &[Port]) -> Vec<&str> {
    ports.iter().map(|p| p.id.as_str()).collect()
}

fn seed_abc(engine: &Engine) {
    for id in ["C", "A", "B"] {
        upsert(engine, id, &details(id));
    }
}

/// Page through the whole store
fn list_all(engine: &Engine, page_size: usize) -> Vec<Port> {
    let mut all = Vec::new();
    let mut cursor = String::new();
    loop {
        let page = list(engine, &cursor, page_size);
        if page.is_empty() {
            return all;
        }
        cursor = page.last().unwrap().id.clone();
        all.extend(page);
    }
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_engine_open_creates_directories() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("mydb");

    let _engine = Engine::open(Config::builder().data_dir(&data_dir).build()).unwrap();

    assert!(data_dir.exists());
    assert!(data_dir.join("sstables").exists());
    assert!(data_dir.join("wal.log").exists());
}

#[test]
fn test_engine_open_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .default_page_size(0)
        .build();

    assert!(matches!(Engine::open(config), Err(PortError::Config(_))));
}

// =============================================================================
// Upsert / List Tests
// =============================================================================

#[test]
fn test_upsert_then_list_round_trip() {
    let (_temp, engine) = setup_temp_engine();
    let d = details("ABCDE");

    upsert(&engine, "ABCDE", &d);
    let ports = list(&engine, "", 0);

    assert_eq!(ports, vec![Port::new("ABCDE", d)]);
}

#[test]
fn test_round_trip_keeps_empty_details() {
    let (_temp, engine) = setup_temp_engine();

    upsert(&engine, "EMPTY", &PortDetails::default());

    assert_eq!(list(&engine, "", 0)[0].details, PortDetails::default());
}

#[test]
fn test_upsert_overwrites() {
    let (_temp, engine) = setup_temp_engine();

    upsert(&engine, "KEY", &details("first"));
    upsert(&engine, "KEY", &details("second"));

    let ports = list(&engine, "", 0);
    assert_eq!(ports.len(), 1);
    assert_eq!(ports[0].details, details("second"));
}

#[test]
fn test_upsert_rejects_empty_id() {
    let (_temp, engine) = setup_temp_engine();

    let result = engine.upsert(&CancelToken::new(), "", &details("x"));

    assert!(matches!(result, Err(PortError::Storage(_))));
    assert!(list(&engine, "", 0).is_empty());
}

#[test]
fn test_list_empty_store() {
    let (_temp, engine) = setup_temp_engine();

    assert!(list(&engine, "", 0).is_empty());
    assert!(list(&engine, "anything", 10).is_empty());
}

#[test]
fn test_list_scenario_abc() {
    let (_temp, engine) = setup_temp_engine();
    seed_abc(&engine);

    assert_eq!(ids(&list(&engine, "", 0)), vec!["A", "B", "C"]);
    assert_eq!(ids(&list(&engine, "B", 0)), vec!["C"]);
    assert_eq!(ids(&list(&engine, "BBBBB", 0)), vec!["C"]);
    assert_eq!(ids(&list(&engine, "", 2)), vec!["A", "B"]);
    assert!(list(&engine, "C", 0).is_empty());
}

#[test]
fn test_list_scenario_abc_from_sstable() {
    let (_temp, engine) = setup_temp_engine();
    seed_abc(&engine);
    engine.flush().unwrap();
    assert_eq!(engine.memtable_entry_count(), 0);

    assert_eq!(ids(&list(&engine, "", 0)), vec!["A", "B", "C"]);
    assert_eq!(ids(&list(&engine, "B", 0)), vec!["C"]);
    assert_eq!(ids(&list(&engine, "BBBBB", 0)), vec!["C"]);
    assert_eq!(ids(&list(&engine, "", 2)), vec!["A", "B"]);
    assert_eq!(list(&engine, "", 0)[1].details, details("B"));
}

#[test]
fn test_nonexistent_cursor_between_keys() {
    let (_temp, engine) = setup_temp_engine();
    for id in ["ABCDE", "BCDEF", "CDEFG"] {
        upsert(&engine, id, &details(id));
    }

    assert_eq!(ids(&list(&engine, "BBBBB", 0)), vec!["BCDEF", "CDEFG"]);
    assert_eq!(ids(&list(&engine, "0", 0)), vec!["ABCDE", "BCDEF", "CDEFG"]);
    assert!(list(&engine, "ZZZZZ", 0).is_empty());
}

#[test]
fn test_keys_are_byte_ordered() {
    let (_temp, engine) = setup_temp_engine();
    for id in ["b", "B", "a", "A", "Ä", "10", "9"] {
        upsert(&engine, id, &PortDetails::default());
    }

    assert_eq!(
        ids(&list(&engine, "", 0)),
        vec!["10", "9", "A", "B", "a", "b", "Ä"]
    );
}

#[test]
fn test_default_page_size_applies() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .default_page_size(3)
        .build();
    let engine = Engine::open(config).unwrap();
    for i in 0..5 {
        upsert(&engine, &format!("K{}", i), &PortDetails::default());
    }

    assert_eq!(list(&engine, "", 0).len(), 3);
    assert_eq!(list(&engine, "", 4).len(), 4);
}

#[test]
fn test_default_page_size_is_one_thousand() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open_path(temp_dir.path()).unwrap();
    for i in 0..1_005 {
        upsert(&engine, &format!("K{:05}", i), &PortDetails::default());
    }

    assert_eq!(list(&engine, "", 0).len(), 1_000);
    assert_eq!(list(&engine, "K00999", 0).len(), 5);
}

// =============================================================================
// Pagination Across Flushes
// =============================================================================

#[test]
fn test_pagination_completeness_for_all_page_sizes() {
    let (_temp, engine) = setup_temp_engine_with_small_memtable();

    // Insert in scrambled order so several SSTables overlap in key range
    let total = 97;
    for i in 0..total {
        let n = (i * 37) % total;
        upsert(&engine, &format!("ID{:03}", n), &details(&n.to_string()));
    }
    assert!(engine.sstable_count() > 1, "expected several flushes");

    let expected: Vec<String> = (0..total).map(|n| format!("ID{:03}", n)).collect();
    for page_size in [1, 2, 3, 7, 10, 50, 96, 97, 1000] {
        let all = list_all(&engine, page_size);
        let got: Vec<String> = all.iter().map(|p| p.id.clone()).collect();
        assert_eq!(got, expected, "page size {}", page_size);
    }
}

#[test]
fn test_newest_value_wins_across_sstables() {
    let (_temp, engine) = setup_temp_engine();

    upsert(&engine, "A", &details("v1"));
    upsert(&engine, "B", &details("v1"));
    engine.flush().unwrap();
    upsert(&engine, "A", &details("v2"));
    engine.flush().unwrap();
    upsert(&engine, "B", &details("v3")); // Still in memtable
    assert_eq!(engine.sstable_count(), 2);

    let ports = list(&engine, "", 0);
    assert_eq!(ids(&ports), vec!["A", "B"]);
    assert_eq!(ports[0].details, details("v2"));
    assert_eq!(ports[1].details, details("v3"));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_close_and_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open_path(temp_dir.path()).unwrap();
        seed_abc(&engine);
        engine.close().unwrap();
    }

    let engine = Engine::open_path(temp_dir.path()).unwrap();
    let ports = list(&engine, "", 0);
    assert_eq!(ids(&ports), vec!["A", "B", "C"]);
    assert_eq!(ports[2].details, details("C"));
}

#[test]
fn test_wal_replay_after_crash() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .build();
    {
        let engine = Engine::open(config.clone()).unwrap();
        seed_abc(&engine);
        upsert(&engine, "B", &details("B2"));
        assert_eq!(engine.sstable_count(), 0);
        // Dropped without close: only the WAL holds the writes
    }

    let engine = Engine::open(config).unwrap();
    assert_eq!(engine.sstable_count(), 1);
    assert_eq!(engine.memtable_entry_count(), 0);

    let ports = list(&engine, "", 0);
    assert_eq!(ids(&ports), vec!["A", "B", "C"]);
    assert_eq!(ports[1].details, details("B2"));
}

#[test]
fn test_reopen_after_flushes_and_crash() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(small_memtable_config(&temp_dir)).unwrap();
        for i in 0..40 {
            upsert(&engine, &format!("P{:02}", i), &details("x"));
        }
    }

    let engine = Engine::open(small_memtable_config(&temp_dir)).unwrap();
    assert_eq!(list_all(&engine, 6).len(), 40);
}

#[test]
fn test_repeated_runs_keep_sstable_count_bounded() {
    let temp_dir = TempDir::new().unwrap();

    for round in 0..6 {
        let engine = Engine::open_path(temp_dir.path()).unwrap();
        assert!(engine.sstable_count() <= 1, "round {}: {}", round, engine.sstable_count());
        seed_abc(&engine);
        upsert(&engine, "B", &details(&format!("B{}", round)));
        engine.close().unwrap();
    }

    let engine = Engine::open_path(temp_dir.path()).unwrap();
    assert_eq!(engine.sstable_count(), 1);
    let files = std::fs::read_dir(engine.storage_dir()).unwrap().count();
    assert_eq!(files, 1);

    let ports = list(&engine, "", 0);
    assert_eq!(ids(&ports), vec!["A", "B", "C"]);
    assert_eq!(ports[1].details, details("B5"));
}

#[test]
fn test_flushes_past_threshold_are_compacted() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        compaction_threshold: 3,
        ..small_memtable_config(&temp_dir)
    };
    let engine = Engine::open(config).unwrap();

    let total = 120;
    for i in 0..total {
        let n = (i * 53) % total;
        upsert(&engine, &format!("K{:03}", n), &details(&format!("{}", i)));
        assert!(engine.sstable_count() <= 3);
    }
    for i in 0..total {
        upsert(&engine, &format!("K{:03}", i), &details("final"));
    }

    let all = list_all(&engine, 11);
    assert_eq!(all.len(), total);
    assert!(all.iter().all(|p| p.details == details("final")));
}

#[test]
fn test_failed_flush_does_not_fail_applied_write() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(small_memtable_config(&temp_dir)).unwrap();

    // A plain file where the table directory was makes every flush fail
    let storage_dir = engine.storage_dir().to_path_buf();
    std::fs::remove_dir(&storage_dir).unwrap();
    std::fs::write(&storage_dir, b"not a directory").unwrap();

    for i in 0..10 {
        upsert(&engine, &format!("P{:02}", i), &details("x"));
    }
    assert_eq!(engine.sstable_count(), 0);
    assert_eq!(list(&engine, "", 0).len(), 10);

    // The next write retries the flush
    std::fs::remove_file(&storage_dir).unwrap();
    std::fs::create_dir(&storage_dir).unwrap();
    upsert(&engine, "P10", &details("x"));
    assert_eq!(engine.sstable_count(), 1);
    assert_eq!(engine.memtable_entry_count(), 0);
    assert_eq!(list(&engine, "", 0).len(), 11);
}

// =============================================================================
// Cancellation Tests
// =============================================================================

#[test]
fn test_cancelled_upsert_writes_nothing() {
    let (_temp, engine) = setup_temp_engine();
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = engine.upsert(&cancel, "A", &details("A"));

    assert!(matches!(result, Err(PortError::Cancelled)));
    assert!(list(&engine, "", 0).is_empty());
    assert_eq!(engine.memtable_entry_count(), 0);
}

#[test]
fn test_cancelled_list() {
    let (_temp, engine) = setup_temp_engine();
    seed_abc(&engine);
    let cancel = CancelToken::new();
    cancel.cancel();

    assert!(matches!(engine.list(&cancel, "", 0), Err(PortError::Cancelled)));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_and_readers() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        compaction_threshold: 2,
        ..small_memtable_config(&temp_dir)
    };
    let engine = Arc::new(Engine::open(config).unwrap());

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..50 {
                    let id = format!("W{}-{:03}", w, i);
                    engine.upsert(&CancelToken::new(), &id, &details(&id)).unwrap();
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..20 {
                    let page = engine.list(&CancelToken::new(), "", 0).unwrap();
                    // Every visible record is complete and pages are sorted
                    for pair in page.windows(2) {
                        assert!(pair[0].id < pair[1].id);
                    }
                    for port in &page {
                        assert_eq!(port.details, details(&port.id));
                    }
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    let all: BTreeSet<String> = list_all(&engine, 33).into_iter().map(|p| p.id).collect();
    assert_eq!(all.len(), 200);
}
