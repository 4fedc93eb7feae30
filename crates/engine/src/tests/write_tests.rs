use super::helpers::{count_segment_files, key, val};
use crate::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

// --------------------- Basic set / get / delete ---------------------

#[test]
fn set_and_get() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Options::default())?;

    engine.set(b"name", b"alice")?;
    assert_eq!(engine.get(b"name")?.unwrap(), b"alice");
    Ok(())
}

#[test]
fn get_missing_key() -> Result<()> {
    let dir = tempdir()?;
    let engine = Engine::open(dir.path(), Options::default())?;

    assert!(engine.get(b"nope")?.is_none());
    Ok(())
}

#[test]
fn delete_removes_key() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Options::default())?;

    engine.set(b"k", b"v")?;
    assert!(engine.get(b"k")?.is_some());

    engine.delete(b"k")?;
    assert!(engine.get(b"k")?.is_none());
    Ok(())
}

#[test]
fn overwrite_key() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Options::default())?;

    engine.set(b"k", b"v1")?;
    engine.set(b"k", b"v2")?;
    assert_eq!(engine.get(b"k")?.unwrap(), b"v2");
    Ok(())
}

#[test]
fn set_after_delete_resurrects() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Options::default())?;

    engine.set(b"k", b"v1")?;
    engine.delete(b"k")?;
    engine.set(b"k", b"v2")?;
    assert_eq!(engine.get(b"k")?.unwrap(), b"v2");
    Ok(())
}

#[test]
fn delete_absent_key_still_writes_tombstone() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Options::default())?;

    engine.delete(b"ghost")?;
    assert!(engine.get(b"ghost")?.is_none());

    // One tombstone record on disk: 16 + 5 + 4 bytes.
    let meta = fs::metadata(dir.path().join("00001.dat"))?;
    assert_eq!(meta.len(), 25);
    Ok(())
}

#[test]
fn empty_key_and_empty_value_are_legal() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Options::default())?;

    engine.set(b"", b"")?;
    assert_eq!(engine.get(b"")?.unwrap(), b"");

    engine.set(b"k", b"")?;
    assert_eq!(engine.get(b"k")?.unwrap(), b"");
    Ok(())
}

// --------------------- On-disk record layout ---------------------

#[test]
fn set_writes_exactly_header_plus_payload() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Options::default())?;
    engine.set(b"foo", b"bar")?;
    engine.close();

    let bytes = fs::read(dir.path().join("00001.dat"))?;
    assert_eq!(bytes.len(), 22); // 16 + 3 + 3

    let (_, key_size, value_size) = codec::decode_header(&bytes, 0);
    assert_eq!(key_size, 3);
    assert_eq!(value_size, 3);
    assert_eq!(&bytes[16..19], b"foo");
    assert_eq!(&bytes[19..22], b"bar");
    Ok(())
}

#[test]
fn records_concatenate_without_padding() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Options::default())?;
    engine.set(b"a", b"1")?;
    engine.set(b"bb", b"22")?;
    engine.delete(b"a")?;

    let meta = fs::metadata(dir.path().join("00001.dat"))?;
    // (16+1+1) + (16+2+2) + (16+1+4)
    assert_eq!(meta.len(), 18 + 20 + 21);
    Ok(())
}

// --------------------- Tombstone value semantics ---------------------

#[test]
fn setting_the_tombstone_bytes_acts_as_delete() -> Result<()> {
    let dir = tempdir()?;
    {
        let mut engine = Engine::open(dir.path(), Options::default())?;
        engine.set(b"k", b"v")?;
        engine.set(b"k", TOMBSTONE)?;
        assert!(engine.get(b"k")?.is_none());
        assert!(engine.list_keys().is_empty());
    }

    // The record on disk is a tombstone, so replay agrees.
    let engine = Engine::open(dir.path(), Options::default())?;
    assert!(engine.get(b"k")?.is_none());
    Ok(())
}

// --------------------- Rollover ---------------------

#[test]
fn rollover_seals_segment_before_it_would_overflow() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Options { max_log_size: 1024 })?;

    // 26-byte records: 39 fit in 1024 bytes, the 40th rolls over.
    for i in 1..=40 {
        engine.set(&key(i), &val(i))?;
    }

    assert_eq!(count_segment_files(dir.path()), 2);
    assert_eq!(engine.segment_count(), 2);
    assert_eq!(engine.active_segment_id(), 2);

    let sealed = fs::metadata(dir.path().join("00001.dat"))?;
    assert_eq!(sealed.len(), 39 * 26);
    assert!(sealed.len() <= 1024);

    let active = fs::metadata(dir.path().join("00002.dat"))?;
    assert_eq!(active.len(), 26);
    Ok(())
}

#[test]
fn all_keys_survive_rollover() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Options { max_log_size: 1024 })?;

    for i in 1..=100 {
        engine.set(&key(i), &val(i))?;
    }
    assert!(engine.segment_count() >= 3);

    for i in 1..=100 {
        assert_eq!(engine.get(&key(i))?.unwrap(), val(i), "k{:04} wrong", i);
    }
    Ok(())
}

// --------------------- Option validation ---------------------

#[test]
fn open_rejects_out_of_range_max_log_size() {
    let dir = tempdir().unwrap();

    for bad in [0, 1, 1023, 16385, u64::MAX] {
        let result = Engine::open(dir.path(), Options { max_log_size: bad });
        assert!(
            matches!(result, Err(StoreError::InvalidArgument(_))),
            "max_log_size {} should be rejected",
            bad
        );
    }
}

#[test]
fn open_accepts_range_bounds() -> Result<()> {
    let dir = tempdir()?;
    Engine::open(dir.path().join("lo"), Options { max_log_size: 1024 })?;
    Engine::open(dir.path().join("hi"), Options { max_log_size: 16384 })?;
    Ok(())
}

#[test]
fn default_max_log_size_is_4096() {
    assert_eq!(Options::default().max_log_size, DEFAULT_MAX_LOG_SIZE);
    assert_eq!(DEFAULT_MAX_LOG_SIZE, 4096);
}

// --------------------- Oversized records ---------------------

#[test]
fn record_larger_than_a_segment_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Options { max_log_size: 1024 })?;

    // 16 + 3 + 1020 = 1039 > 1024: could never be replayed, so refused.
    let big = vec![b'x'; 1020];
    let result = engine.set(b"big", &big);
    assert!(matches!(result, Err(StoreError::InvalidArgument(_))));

    // Engine state did not advance and the store stays usable.
    assert!(engine.get(b"big")?.is_none());
    assert_eq!(count_segment_files(dir.path()), 1);
    engine.set(b"small", b"fits")?;
    assert_eq!(engine.get(b"small")?.unwrap(), b"fits");
    Ok(())
}

#[test]
fn largest_fitting_record_is_accepted() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Options { max_log_size: 1024 })?;

    // 16 + 3 + 1005 = 1024 exactly.
    let value = vec![b'y'; 1005];
    engine.set(b"max", &value)?;
    assert_eq!(engine.get(b"max")?.unwrap(), value);
    assert_eq!(fs::metadata(dir.path().join("00001.dat"))?.len(), 1024);
    Ok(())
}

// --------------------- sync ---------------------

#[test]
fn explicit_sync_is_a_noop_after_synced_writes() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = Engine::open(dir.path(), Options::default())?;
    engine.set(b"k", b"v")?;
    engine.sync()?;
    assert_eq!(engine.get(b"k")?.unwrap(), b"v");
    Ok(())
}
