//! Tests for Engine
//!
//! These tests verify:
//! - Engine lifecycle (open/close/reopen)
//! - Recovery determinism across restarts
//! - Partial recovery from a damaged journal tail
//! - Kind-agnostic key operations
//! - Command execution

use std::fs::OpenOptions;
use std::io::Write;
use std::time::Duration;

use emberkv::clock::now_millis;
use emberkv::config::{Config, SyncStrategy};
use emberkv::error::EmberError;
use emberkv::protocol::{Command, Reply};
use emberkv::{Engine, Kind, Ttl};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config_for(temp_dir: &TempDir) -> Config {
    Config::builder()
        .data_dir(temp_dir.path())
        .sync_strategy(SyncStrategy::EveryWrite)
        .value_log_capacity(4096)
        .build()
}

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config_for(&temp_dir)).unwrap();
    (temp_dir, engine)
}

fn run(engine: &Engine, parts: &[&str]) -> Reply {
    let args = parts.iter().map(|p| p.as_bytes().to_vec()).collect();
    engine.execute(Command::from_args(args).unwrap())
}

fn bulk(s: &str) -> Reply {
    Reply::Bulk(s.as_bytes().to_vec())
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_engine_open_creates_files() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("mydb");

    let config = Config::builder().data_dir(&data_dir).build();
    let engine = Engine::open(config).unwrap();

    for stem in ["scalar", "list", "hash"] {
        assert!(data_dir.join(format!("{}.vlog", stem)).exists());
        assert!(data_dir.join(format!("{}.idx", stem)).exists());
    }
    assert!(engine.recovery_report().is_clean());
    assert_eq!(engine.recovery_report().restored_key_count, 0);
}

#[test]
fn test_engine_rejects_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .value_log_capacity(0)
        .build();

    assert!(matches!(Engine::open(config), Err(EmberError::Config(_))));
}

#[test]
fn test_engine_rejects_zero_index_capacity() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .index_capacity(0)
        .build();

    assert!(matches!(Engine::open(config), Err(EmberError::Config(_))));
}

#[test]
fn test_engine_open_path() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open_path(temp_dir.path()).unwrap();

    engine.scalar().write("k", b"v").unwrap();
    assert_eq!(engine.data_dir(), temp_dir.path());
}

#[test]
fn test_close_and_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(config_for(&temp_dir)).unwrap();
        engine.scalar().write("s", b"scalar").unwrap();
        engine.list().write("l", b"one").unwrap();
        engine.list().write("l", b"two").unwrap();
        engine.hash().write("h", "f", b"field").unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open(config_for(&temp_dir)).unwrap();
    let report = engine.recovery_report();

    assert_eq!(report.restored_key_count, 3);
    assert!(report.is_clean());
    assert_eq!(engine.scalar().read("s").unwrap(), b"scalar");
    assert_eq!(
        engine.list().read("l", 0, -1).unwrap(),
        vec![b"one".to_vec(), b"two".to_vec()]
    );
    assert_eq!(engine.hash().read("h", "f").unwrap(), b"field");
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recovery_determinism() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(config_for(&temp_dir)).unwrap();
        for i in 0..30 {
            engine.scalar().write(&format!("s{}", i % 7), format!("v{}", i).as_bytes()).unwrap();
            engine.list().write(&format!("l{}", i % 3), format!("e{}", i).as_bytes()).unwrap();
            engine.hash().write("h", &format!("f{}", i % 5), &vec![b'x'; i]).unwrap();
        }
        engine.scalar().remove("s3").unwrap();
        engine.hash().remove_field("h", "f0").unwrap();
        engine.scalar().expire_at("s1", now_millis() + 3_600_000).unwrap();
        // Dropped without close: journal writers flush on drop
    }

    let snapshot = |engine: &Engine| {
        let scalars: Vec<_> = (0..7)
            .map(|i| engine.scalar().read(&format!("s{}", i)).ok())
            .collect();
        let lists: Vec<_> = (0..3)
            .map(|i| engine.list().read(&format!("l{}", i), 0, -1).unwrap())
            .collect();
        let hash = engine.hash().read_all("h").unwrap();
        (scalars, lists, hash)
    };

    let first = {
        let engine = Engine::open(config_for(&temp_dir)).unwrap();
        assert!(matches!(engine.scalar().ttl("s1").unwrap(), Ttl::ExpiresIn(_)));
        snapshot(&engine)
    };
    let engine = Engine::open(config_for(&temp_dir)).unwrap();
    let second = snapshot(&engine);

    assert_eq!(first, second);
    assert_eq!(first.0[3], None);
    assert_eq!(first.0[6], Some(b"v27".to_vec()));
    assert_eq!(first.1[0].len(), 10);
    assert_eq!(first.2.len(), 4);

    // Re-running recovery on a live engine rebuilds the same state
    let report = engine.recover().unwrap();
    assert!(report.is_clean());
    assert_eq!(snapshot(&engine), second);
}

#[test]
fn test_partial_recovery_keeps_valid_prefix() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = Engine::open(config_for(&temp_dir)).unwrap();
        engine.list().write("L", b"a").unwrap();
        engine.list().write("L", b"b").unwrap();
        engine.scalar().write("s", b"untouched").unwrap();
    }
    {
        let mut file = OpenOptions::new()
            .append(true)
            .open(temp_dir.path().join("list.idx"))
            .unwrap();
        file.write_all(&[0x13, 0x37, 0x00, 0x00, 0x42]).unwrap();
    }

    {
        let engine = Engine::open(config_for(&temp_dir)).unwrap();
        let report = engine.recovery_report();

        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(report.warnings[0], EmberError::PartialRecovery(_)));
        assert_eq!(
            engine.list().read("L", 0, -1).unwrap(),
            vec![b"a".to_vec(), b"b".to_vec()]
        );
        assert_eq!(engine.scalar().read("s").unwrap(), b"untouched");

        engine.list().write("L", b"c").unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open(config_for(&temp_dir)).unwrap();
    assert!(engine.recovery_report().is_clean());
    assert_eq!(engine.list().len("L").unwrap(), 3);
}

#[test]
fn test_relocated_values_survive_restart() {
    let temp_dir = TempDir::new().unwrap();
    let large = vec![b'z'; 1000];
    {
        let engine = Engine::open(config_for(&temp_dir)).unwrap();
        engine.scalar().write("k", &[b'a'; 10]).unwrap();
        engine.scalar().write("k", &large).unwrap();
        engine.scalar().write("other", b"after").unwrap();
    }

    let engine = Engine::open(config_for(&temp_dir)).unwrap();
    assert_eq!(engine.scalar().read("k").unwrap(), large);
    assert_eq!(engine.scalar().read("other").unwrap(), b"after");
}

// =============================================================================
// Kind-agnostic Operation Tests
// =============================================================================

#[test]
fn test_key_type_and_del() {
    let (_temp, engine) = setup_temp_engine();

    engine.scalar().write("s", b"1").unwrap();
    engine.list().write("l", b"1").unwrap();
    engine.hash().write("h", "f", b"1").unwrap();

    assert_eq!(engine.key_type("s"), Some(Kind::Scalar));
    assert_eq!(engine.key_type("l"), Some(Kind::List));
    assert_eq!(engine.key_type("h"), Some(Kind::Hash));
    assert_eq!(engine.key_type("none"), None);
    assert_eq!(engine.key_count(), 3);

    assert!(engine.del("l").unwrap());
    assert!(!engine.del("l").unwrap());
    assert!(!engine.exists("l"));
    assert_eq!(engine.key_count(), 2);
}

#[test]
fn test_expire_and_persist() {
    let (_temp, engine) = setup_temp_engine();

    engine.hash().write("h", "f", b"1").unwrap();
    assert!(engine.expire("h", Duration::from_secs(60)).unwrap());
    assert!(matches!(engine.ttl("h").unwrap(), Ttl::ExpiresIn(_)));

    assert!(engine.persist("h").unwrap());
    assert!(!engine.persist("h").unwrap());
    assert_eq!(engine.ttl("h").unwrap(), Ttl::Persistent);

    assert!(!engine.expire("missing", Duration::from_secs(1)).unwrap());
    assert!(matches!(engine.ttl("missing"), Err(EmberError::NotFound)));
}

// =============================================================================
// Command Execution Tests
// =============================================================================

#[test]
fn test_execute_ping() {
    let (_temp, engine) = setup_temp_engine();

    assert_eq!(run(&engine, &["PING"]), Reply::Simple("PONG".to_string()));
    assert_eq!(run(&engine, &["PING", "hi"]), bulk("hi"));
}

#[test]
fn test_execute_strings() {
    let (_temp, engine) = setup_temp_engine();

    assert_eq!(run(&engine, &["SET", "k", "v"]), Reply::ok());
    assert_eq!(run(&engine, &["GET", "k"]), bulk("v"));
    assert_eq!(run(&engine, &["GET", "missing"]), Reply::Null);
    assert_eq!(run(&engine, &["TYPE", "k"]), Reply::Simple("string".to_string()));
    assert_eq!(run(&engine, &["TTL", "k"]), Reply::Integer(-1));
    assert_eq!(run(&engine, &["TTL", "missing"]), Reply::Integer(-2));

    assert_eq!(run(&engine, &["SET", "t", "v", "EX", "100"]), Reply::ok());
    match run(&engine, &["TTL", "t"]) {
        Reply::Integer(secs) => assert!(secs > 0 && secs <= 100),
        other => panic!("unexpected reply: {:?}", other),
    }

    assert_eq!(run(&engine, &["EXISTS", "k", "t", "missing"]), Reply::Integer(2));
    assert_eq!(run(&engine, &["DEL", "k", "t", "missing"]), Reply::Integer(2));
    assert_eq!(run(&engine, &["DBSIZE"]), Reply::Integer(0));
}

#[test]
fn test_execute_expire_commands() {
    let (_temp, engine) = setup_temp_engine();

    run(&engine, &["SET", "k", "v"]);
    assert_eq!(run(&engine, &["PEXPIRE", "k", "60000"]), Reply::Integer(1));
    assert_eq!(run(&engine, &["PERSIST", "k"]), Reply::Integer(1));
    assert_eq!(run(&engine, &["PTTL", "k"]), Reply::Integer(-1));

    // A non-positive lifetime deletes the key
    assert_eq!(run(&engine, &["EXPIRE", "k", "0"]), Reply::Integer(1));
    assert_eq!(run(&engine, &["GET", "k"]), Reply::Null);
    assert_eq!(run(&engine, &["EXPIRE", "k", "10"]), Reply::Integer(0));
}

#[test]
fn test_execute_lists() {
    let (_temp, engine) = setup_temp_engine();

    assert_eq!(run(&engine, &["RPUSH", "L", "a", "b", "c"]), Reply::Integer(3));
    assert_eq!(run(&engine, &["LLEN", "L"]), Reply::Integer(3));
    assert_eq!(
        run(&engine, &["LRANGE", "L", "0", "-1"]),
        Reply::Array(vec![bulk("a"), bulk("b"), bulk("c")])
    );
    assert_eq!(
        run(&engine, &["LRANGE", "L", "1", "1"]),
        Reply::Array(vec![bulk("b")])
    );
    assert_eq!(
        run(&engine, &["LRANGE", "L", "-2", "-1"]),
        Reply::Array(vec![bulk("b"), bulk("c")])
    );
    assert_eq!(run(&engine, &["LRANGE", "L", "2", "1"]), Reply::Array(vec![]));
    assert_eq!(run(&engine, &["LRANGE", "nope", "0", "-1"]), Reply::Array(vec![]));
    assert_eq!(run(&engine, &["LLEN", "nope"]), Reply::Integer(0));
    assert_eq!(run(&engine, &["TYPE", "L"]), Reply::Simple("list".to_string()));
}

#[test]
fn test_execute_hashes() {
    let (_temp, engine) = setup_temp_engine();

    assert_eq!(run(&engine, &["HSET", "h", "b", "2", "a", "1"]), Reply::Integer(2));
    assert_eq!(run(&engine, &["HSET", "h", "a", "one"]), Reply::Integer(0));
    assert_eq!(run(&engine, &["HGET", "h", "a"]), bulk("one"));
    assert_eq!(run(&engine, &["HGET", "h", "zzz"]), Reply::Null);
    assert_eq!(run(&engine, &["HLEN", "h"]), Reply::Integer(2));
    assert_eq!(
        run(&engine, &["HGETALL", "h"]),
        Reply::Array(vec![bulk("a"), bulk("one"), bulk("b"), bulk("2")])
    );
    assert_eq!(run(&engine, &["HDEL", "h", "a", "zzz"]), Reply::Integer(1));
    assert_eq!(run(&engine, &["TYPE", "h"]), Reply::Simple("hash".to_string()));
    assert_eq!(run(&engine, &["TYPE", "nothing"]), Reply::Simple("none".to_string()));
}

#[test]
fn test_execute_wrong_type_reply() {
    let (_temp, engine) = setup_temp_engine();

    run(&engine, &["RPUSH", "L", "a"]);

    match run(&engine, &["GET", "L"]) {
        Reply::Error(message) => assert!(message.starts_with("WRONGTYPE")),
        other => panic!("unexpected reply: {:?}", other),
    }
    match run(&engine, &["HSET", "L", "f", "v"]) {
        Reply::Error(message) => assert!(message.starts_with("WRONGTYPE")),
        other => panic!("unexpected reply: {:?}", other),
    }
}
