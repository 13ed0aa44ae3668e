//! Tests for FileHandle sessions
//!
//! These tests verify:
//! - Save/load round trips in raw and compressed modes
//! - Mode upgrades on open (gzip detection, write -> append)
//! - Append keeps earlier variables and the original header
//! - Mode errors, missing names and header errors
//! - Close compression, including failure reporting

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use octbin::compress::{detect, gz_path, wrap_for_read, wrap_for_write};
use octbin::error::{CodecError, ModeError, OpenError};
use octbin::{
    ByteOrder, Config, FileHandle, FloatFormat, FormatHeader, LoadStrategy, OctbinError, OpenMode,
    SessionState, Value,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_path() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.octbin");
    (temp_dir, path)
}

/// The map saved by the original demo program: x = 0.1413 * i, n = i
fn the_map() -> Value {
    let n: Vec<i64> = (0..10).collect();
    let x: Vec<f64> = n.iter().map(|&i| i as f64 * 0.1413).collect();
    Value::map([("x", Value::real_column(x)), ("n", Value::int_column(n))]).unwrap()
}

fn write_file(path: &PathBuf, mode: OpenMode, records: &[(&str, Value)]) -> Option<PathBuf> {
    let mut handle = FileHandle::open(path, mode).unwrap();
    for (name, value) in records {
        handle.save(name, value).unwrap();
    }
    handle.close().unwrap()
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_raw_round_trip() {
    let (_temp, path) = setup_temp_path();

    let mut handle = FileHandle::open(&path, OpenMode::Write).unwrap();
    assert_eq!(handle.state(), SessionState::WriteRaw);
    handle.save("the_map", &the_map()).unwrap();
    assert_eq!(handle.close().unwrap(), None);

    let mut handle = FileHandle::open(&path, OpenMode::Read).unwrap();
    assert_eq!(handle.state(), SessionState::ReadRaw);
    assert_eq!(handle.load("the_map").unwrap(), the_map());
    handle.close().unwrap();
}

#[test]
fn test_compressed_round_trip() {
    let (_temp, path) = setup_temp_path();

    let mut handle = FileHandle::open(&path, OpenMode::WriteCompressed).unwrap();
    assert_eq!(handle.state(), SessionState::WriteCompressed);
    assert_eq!(handle.compressed_path(), Some(gz_path(&path).as_path()));
    handle.save("the_map", &the_map()).unwrap();
    let gz = handle.close().unwrap().unwrap();

    assert_eq!(gz, gz_path(&path));
    assert!(!path.exists());

    // Plain read request is upgraded by content
    let mut handle = FileHandle::open(&gz, OpenMode::Read).unwrap();
    assert_eq!(handle.state(), SessionState::ReadCompressed);
    assert_eq!(handle.load("the_map").unwrap(), the_map());
}

#[test]
fn test_round_trip_every_kind() {
    let (_temp, path) = setup_temp_path();
    let records = vec![
        ("s", Value::scalar(std::f64::consts::PI)),
        ("i", Value::int_array(vec![2, 3], vec![1, -2, 3, -4, 5, -6]).unwrap()),
        ("r", Value::real_array(vec![3], vec![0.1, 0.2, 0.3]).unwrap()),
        ("t", Value::text("octbin")),
        ("m", the_map()),
    ];
    let gz = write_file(&path, OpenMode::WriteCompressed, &records).unwrap();

    let mut handle = FileHandle::open(&gz, OpenMode::Read).unwrap();
    // out of order, and repeated: every load rescans from the start
    for (name, value) in records.iter().rev().chain(records.iter()) {
        assert_eq!(&handle.load(name).unwrap(), value);
    }
}

#[test]
fn test_compressed_output_matches_raw_bytes() {
    let temp = TempDir::new().unwrap();
    let raw_path = temp.path().join("raw.octbin");
    let gz_source = temp.path().join("packed.octbin");
    let records = [("the_map", the_map()), ("label", Value::text("same bytes"))];

    write_file(&raw_path, OpenMode::Write, &records);
    let gz = write_file(&gz_source, OpenMode::WriteCompressed, &records).unwrap();

    let mut inflated = Vec::new();
    wrap_for_read(fs::File::open(&gz).unwrap())
        .read_to_end(&mut inflated)
        .unwrap();
    assert_eq!(inflated, fs::read(&raw_path).unwrap());
}

#[test]
fn test_zero_length_array_round_trip() {
    let (_temp, path) = setup_temp_path();
    let empty = Value::int_array(vec![0], vec![]).unwrap();
    write_file(&path, OpenMode::Write, &[("empty", empty.clone())]);

    let mut handle = FileHandle::open(&path, OpenMode::Read).unwrap();
    let loaded = handle.load("empty").unwrap();
    assert_eq!(loaded, empty);
    assert_eq!(loaded.as_ints(), Some(&[][..]));
}

#[test]
fn test_empty_session_compresses_header_only() {
    let (_temp, path) = setup_temp_path();
    let gz = write_file(&path, OpenMode::WriteCompressed, &[]).unwrap();

    let mut handle = FileHandle::open(&gz, OpenMode::Read).unwrap();
    assert!(handle.names().unwrap().is_empty());
    assert_eq!(*handle.header(), FormatHeader::canonical());
}

// =============================================================================
// Append Tests
// =============================================================================

#[test]
fn test_write_on_existing_file_appends() {
    let (_temp, path) = setup_temp_path();
    write_file(&path, OpenMode::Write, &[("x", Value::scalar(1.0))]);

    let mut handle = FileHandle::open(&path, OpenMode::Write).unwrap();
    assert_eq!(handle.state(), SessionState::AppendRaw);
    assert_eq!(handle.names().unwrap(), vec!["x".to_string()]);
    handle.save("y", &Value::scalar(2.0)).unwrap();
    handle.close().unwrap();

    let mut handle = FileHandle::open(&path, OpenMode::Read).unwrap();
    assert_eq!(handle.names().unwrap(), vec!["x".to_string(), "y".to_string()]);
    assert_eq!(handle.load("x").unwrap(), Value::scalar(1.0));
    assert_eq!(handle.load("y").unwrap(), Value::scalar(2.0));
}

#[test]
fn test_append_mode_on_missing_file_creates_it() {
    let (_temp, path) = setup_temp_path();

    let mut handle = FileHandle::open(&path, OpenMode::Append).unwrap();
    assert_eq!(handle.state(), SessionState::WriteRaw);
    handle.save("a", &Value::text("new")).unwrap();
    handle.close().unwrap();

    let mut handle = FileHandle::open(&path, OpenMode::Read).unwrap();
    assert_eq!(handle.load("a").unwrap(), Value::text("new"));
}

#[test]
fn test_write_on_empty_file_writes_header() {
    let (_temp, path) = setup_temp_path();
    fs::write(&path, b"").unwrap();

    let mut handle = FileHandle::open(&path, OpenMode::Write).unwrap();
    assert_eq!(handle.state(), SessionState::WriteRaw);
    handle.save("a", &Value::scalar(1.0)).unwrap();
    handle.close().unwrap();

    let mut handle = FileHandle::open(&path, OpenMode::Read).unwrap();
    assert_eq!(handle.load("a").unwrap(), Value::scalar(1.0));
}

#[test]
fn test_append_to_gzip_file() {
    let (_temp, path) = setup_temp_path();
    let gz = write_file(&path, OpenMode::WriteCompressed, &[("first", the_map())]).unwrap();

    let mut handle = FileHandle::open(&gz, OpenMode::Write).unwrap();
    assert_eq!(handle.state(), SessionState::AppendCompressed);
    assert_eq!(handle.compressed_path(), Some(gz.as_path()));
    handle.save("second", &Value::scalar(2.0)).unwrap();
    assert_eq!(handle.close().unwrap(), Some(gz.clone()));

    assert!(detect(&gz));
    // the working copy is gone
    let leftovers: Vec<_> = fs::read_dir(gz.parent().unwrap()).unwrap().collect();
    assert_eq!(leftovers.len(), 1);

    let mut handle = FileHandle::open(&gz, OpenMode::Read).unwrap();
    assert_eq!(handle.load("first").unwrap(), the_map());
    assert_eq!(handle.load("second").unwrap(), Value::scalar(2.0));
}

#[test]
fn test_append_compressed_on_raw_file() {
    let (_temp, path) = setup_temp_path();
    write_file(&path, OpenMode::Write, &[("a", Value::scalar(1.0))]);

    let gz = write_file(&path, OpenMode::AppendCompressed, &[("b", Value::scalar(2.0))]).unwrap();
    assert_eq!(gz, gz_path(&path));
    assert!(!path.exists());

    let mut handle = FileHandle::open(&gz, OpenMode::Read).unwrap();
    assert_eq!(handle.names().unwrap(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_append_keeps_existing_header() {
    let (_temp, path) = setup_temp_path();
    let big = FormatHeader::new(FloatFormat::IeeeBig, ByteOrder::Big);

    let config = Config::builder().write_format(big).build();
    let mut handle = FileHandle::open_with_config(&path, OpenMode::Write, config).unwrap();
    handle.save("a", &Value::real_column(vec![1.5])).unwrap();
    handle.close().unwrap();

    // Default config would create little-endian files, but the file wins
    let mut handle = FileHandle::open(&path, OpenMode::Write).unwrap();
    assert_eq!(*handle.header(), big);
    handle.save("b", &Value::real_column(vec![2.5])).unwrap();
    handle.close().unwrap();

    let mut handle = FileHandle::open(&path, OpenMode::Read).unwrap();
    assert_eq!(*handle.header(), big);
    assert_eq!(handle.load("a").unwrap(), Value::real_column(vec![1.5]));
    assert_eq!(handle.load("b").unwrap(), Value::real_column(vec![2.5]));
}

#[test]
fn test_save_rejects_existing_name() {
    let (_temp, path) = setup_temp_path();
    write_file(&path, OpenMode::Write, &[("x", Value::scalar(1.0))]);

    let mut handle = FileHandle::open(&path, OpenMode::Write).unwrap();
    let err = handle.save("x", &Value::scalar(2.0)).unwrap_err();
    assert!(matches!(err, OctbinError::Codec(CodecError::DuplicateName(_))));
    handle.close().unwrap();

    let mut handle = FileHandle::open(&path, OpenMode::Read).unwrap();
    assert_eq!(handle.load("x").unwrap(), Value::scalar(1.0));
}

#[test]
fn test_reopen_compressed_file_by_original_path() {
    let (_temp, path) = setup_temp_path();
    let gz = write_file(&path, OpenMode::WriteCompressed, &[("x", Value::scalar(1.0))]).unwrap();
    assert!(!path.exists());

    let mut handle = FileHandle::open(&path, OpenMode::Read).unwrap();
    assert_eq!(handle.state(), SessionState::ReadCompressed);
    assert_eq!(handle.path(), gz.as_path());
    assert_eq!(handle.load("x").unwrap(), Value::scalar(1.0));
}

#[test]
fn test_compressed_write_by_original_path_appends() {
    let (_temp, path) = setup_temp_path();
    let gz = write_file(&path, OpenMode::WriteCompressed, &[("x", Value::scalar(1.0))]).unwrap();

    let mut handle = FileHandle::open(&path, OpenMode::WriteCompressed).unwrap();
    assert_eq!(handle.state(), SessionState::AppendCompressed);
    assert_eq!(handle.compressed_path(), Some(gz.as_path()));
    handle.save("y", &Value::scalar(2.0)).unwrap();
    assert_eq!(handle.close().unwrap(), Some(gz.clone()));

    // a plain write request goes through the .gz as well
    let written = write_file(&path, OpenMode::Write, &[("z", Value::scalar(3.0))]);
    assert_eq!(written, Some(gz.clone()));
    assert!(!path.exists());

    let mut handle = FileHandle::open(&path, OpenMode::Read).unwrap();
    assert_eq!(
        handle.names().unwrap(),
        vec!["x".to_string(), "y".to_string(), "z".to_string()]
    );
    assert_eq!(handle.load("x").unwrap(), Value::scalar(1.0));
}

#[test]
fn test_compressed_write_never_replaces_existing_gz() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("test.octbin");
    let gz = write_file(&path, OpenMode::WriteCompressed, &[("old", Value::scalar(1.0))]).unwrap();

    // a raw file appears next to the older .gz
    let other = temp.path().join("other.octbin");
    write_file(&other, OpenMode::Write, &[("new", Value::scalar(2.0))]);
    fs::rename(&other, &path).unwrap();

    let err = FileHandle::open(&path, OpenMode::AppendCompressed).err().unwrap();
    assert!(matches!(
        err,
        OctbinError::Open(OpenError::CompressedCopyExists(ref p)) if p == &gz
    ));
    let config = Config::builder().compress_on_close(true).build();
    let err = FileHandle::open_with_config(&path, OpenMode::Write, config).err().unwrap();
    assert!(matches!(err, OctbinError::Open(OpenError::CompressedCopyExists(_))));

    // both files are untouched
    let mut handle = FileHandle::open(&gz, OpenMode::Read).unwrap();
    assert_eq!(handle.names().unwrap(), vec!["old".to_string()]);
    let mut handle = FileHandle::open(&path, OpenMode::Read).unwrap();
    assert_eq!(handle.state(), SessionState::ReadRaw);
    assert_eq!(handle.names().unwrap(), vec!["new".to_string()]);

    // a raw append is still allowed
    let handle = FileHandle::open(&path, OpenMode::Write).unwrap();
    assert_eq!(handle.state(), SessionState::AppendRaw);
}

#[test]
fn test_drop_during_gzip_append_removes_working_copy() {
    let (_temp, path) = setup_temp_path();
    let gz = write_file(&path, OpenMode::WriteCompressed, &[("x", Value::scalar(1.0))]).unwrap();
    let mut part = gz.clone().into_os_string();
    part.push(".part");
    let part = PathBuf::from(part);

    {
        let mut handle = FileHandle::open(&gz, OpenMode::Write).unwrap();
        handle.save("y", &Value::scalar(2.0)).unwrap();
        assert!(part.exists());
    }

    assert!(!part.exists());
    let mut handle = FileHandle::open(&gz, OpenMode::Read).unwrap();
    assert_eq!(handle.names().unwrap(), vec!["x".to_string()]);
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_read_missing_file() {
    let (_temp, path) = setup_temp_path();
    let err = FileHandle::open(&path, OpenMode::Read).err().unwrap();
    assert!(matches!(err, OctbinError::Open(OpenError::FileNotFound(_))));
}

#[test]
fn test_open_invalid_header() {
    let (_temp, path) = setup_temp_path();
    fs::write(&path, b"not an octbin file").unwrap();

    let err = FileHandle::open(&path, OpenMode::Read).err().unwrap();
    assert!(matches!(err, OctbinError::Open(OpenError::HeaderError { .. })));

    // appending to it is refused too, and the file is untouched
    let err = FileHandle::open(&path, OpenMode::Write).err().unwrap();
    assert!(matches!(err, OctbinError::Open(OpenError::HeaderError { .. })));
    assert_eq!(fs::read(&path).unwrap(), b"not an octbin file");
}

#[test]
fn test_append_to_bad_gzip_file_cleans_up() {
    let temp = TempDir::new().unwrap();
    let gz = temp.path().join("bad.octbin.gz");
    let mut encoder = wrap_for_write(Vec::new(), 6);
    encoder.write_all(b"not an octbin file").unwrap();
    fs::write(&gz, encoder.finish().unwrap()).unwrap();

    let err = FileHandle::open(&gz, OpenMode::Write).err().unwrap();
    assert!(matches!(err, OctbinError::Open(OpenError::HeaderError { .. })));

    // only the original .gz is left
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    assert!(detect(&gz));
}

#[cfg(unix)]
#[test]
fn test_open_without_permission() {
    use std::os::unix::fs::PermissionsExt;

    let (_temp, path) = setup_temp_path();
    write_file(&path, OpenMode::Write, &[("x", Value::scalar(1.0))]);
    fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

    // permission bits are not enforced for root
    if fs::File::open(&path).is_err() {
        let err = FileHandle::open(&path, OpenMode::Read).err().unwrap();
        assert!(matches!(err, OctbinError::Open(OpenError::PermissionDenied(_))));

        let err = FileHandle::open(&path, OpenMode::Write).err().unwrap();
        assert!(matches!(err, OctbinError::Open(OpenError::PermissionDenied(_))));
    }

    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
}

#[test]
fn test_missing_name() {
    let (_temp, path) = setup_temp_path();
    write_file(&path, OpenMode::Write, &[("x", Value::scalar(1.0))]);

    let mut handle = FileHandle::open(&path, OpenMode::Read).unwrap();
    let err = handle.load("nonexistent").unwrap_err();
    assert!(matches!(
        err,
        OctbinError::Codec(CodecError::NameNotFound(ref n)) if n == "nonexistent"
    ));

    // a failed lookup doesn't disturb the next one
    assert_eq!(handle.load("x").unwrap(), Value::scalar(1.0));
}

#[test]
fn test_save_in_read_mode() {
    let (_temp, path) = setup_temp_path();
    write_file(&path, OpenMode::Write, &[("x", Value::scalar(1.0))]);

    let mut handle = FileHandle::open(&path, OpenMode::Read).unwrap();
    let err = handle.save("y", &Value::scalar(2.0)).unwrap_err();
    assert!(matches!(
        err,
        OctbinError::Mode(ModeError::InvalidModeForWrite(SessionState::ReadRaw))
    ));
}

#[test]
fn test_load_in_write_mode() {
    let (_temp, path) = setup_temp_path();
    let mut handle = FileHandle::open(&path, OpenMode::Write).unwrap();
    handle.save("x", &Value::scalar(1.0)).unwrap();

    let err = handle.load("x").unwrap_err();
    assert!(matches!(
        err,
        OctbinError::Mode(ModeError::InvalidModeForRead(SessionState::WriteRaw))
    ));
}

#[test]
fn test_operations_after_close() {
    let (_temp, path) = setup_temp_path();
    let mut handle = FileHandle::open(&path, OpenMode::Write).unwrap();
    handle.close().unwrap();

    assert_eq!(handle.state(), SessionState::Closed);
    assert!(!handle.is_open());
    assert!(matches!(
        handle.save("x", &Value::scalar(1.0)),
        Err(OctbinError::Mode(ModeError::InvalidModeForWrite(SessionState::Closed)))
    ));
    assert!(matches!(
        handle.load("x"),
        Err(OctbinError::Mode(ModeError::InvalidModeForRead(SessionState::Closed)))
    ));
    // closing again is harmless
    assert_eq!(handle.close().unwrap(), None);
}

#[test]
fn test_failed_save_leaves_file_usable() {
    let (_temp, path) = setup_temp_path();
    let mut handle = FileHandle::open(&path, OpenMode::Write).unwrap();
    let bad = Value::IntArray {
        shape: vec![5],
        data: vec![1],
    };
    assert!(handle.save("bad", &bad).is_err());
    handle.save("good", &Value::scalar(1.0)).unwrap();
    handle.close().unwrap();

    let mut handle = FileHandle::open(&path, OpenMode::Read).unwrap();
    assert_eq!(handle.names().unwrap(), vec!["good".to_string()]);
}

#[test]
fn test_non_ieee_write_format_rejected() {
    let (_temp, path) = setup_temp_path();
    let config = Config::builder()
        .write_format(FormatHeader::new(FloatFormat::VaxG, ByteOrder::Little))
        .build();

    let err = FileHandle::open_with_config(&path, OpenMode::Write, config).err().unwrap();
    assert!(matches!(err, OctbinError::Config(_)));
    assert!(!path.exists());
}

#[test]
fn test_close_reports_compression_failure() {
    let (_temp, path) = setup_temp_path();
    let config = Config::builder().max_compress_buffer(16).build();

    let mut handle = FileHandle::open_with_config(&path, OpenMode::WriteCompressed, config).unwrap();
    handle.save("the_map", &the_map()).unwrap();
    let err = handle.close().unwrap_err();

    assert!(matches!(err, OctbinError::Compression { .. }));
    assert_eq!(handle.state(), SessionState::Closed);
    // raw data survives and is readable
    assert!(!gz_path(&path).exists());
    let mut handle = FileHandle::open(&path, OpenMode::Read).unwrap();
    assert_eq!(handle.load("the_map").unwrap(), the_map());
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_compress_on_close_config() {
    let (_temp, path) = setup_temp_path();
    let config = Config::builder().compress_on_close(true).build();

    let mut handle = FileHandle::open_with_config(&path, OpenMode::Write, config).unwrap();
    assert_eq!(handle.state(), SessionState::WriteCompressed);
    handle.save("x", &Value::scalar(1.0)).unwrap();
    let gz = handle.close().unwrap().unwrap();
    assert!(detect(&gz));
}

#[test]
fn test_read_compressed_request_on_raw_file() {
    let (_temp, path) = setup_temp_path();
    write_file(&path, OpenMode::Write, &[("x", Value::scalar(1.0))]);

    let handle = FileHandle::open(&path, OpenMode::ReadCompressed).unwrap();
    assert_eq!(handle.state(), SessionState::ReadRaw);
}

#[test]
fn test_cache_strategy() {
    let (_temp, path) = setup_temp_path();
    let gz = write_file(
        &path,
        OpenMode::WriteCompressed,
        &[("a", Value::scalar(1.0)), ("b", the_map())],
    )
    .unwrap();

    let config = Config::builder().load_strategy(LoadStrategy::Cache).build();
    let mut handle = FileHandle::open_with_config(&gz, OpenMode::Read, config).unwrap();
    assert_eq!(handle.load("b").unwrap(), the_map());
    assert_eq!(handle.load("a").unwrap(), Value::scalar(1.0));
    assert!(handle.load("c").unwrap_err().is_name_not_found());

    handle.clear();
    assert_eq!(handle.load("a").unwrap(), Value::scalar(1.0));
}

#[test]
fn test_drop_without_close_keeps_raw_data() {
    let (_temp, path) = setup_temp_path();
    {
        let mut handle = FileHandle::open(&path, OpenMode::WriteCompressed).unwrap();
        handle.save("x", &Value::scalar(1.0)).unwrap();
    }

    assert!(!gz_path(&path).exists());
    let mut handle = FileHandle::open(&path, OpenMode::Read).unwrap();
    assert_eq!(handle.load("x").unwrap(), Value::scalar(1.0));
}
