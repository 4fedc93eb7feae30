use std::fs;
use std::path::Path;

pub fn count_segment_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext == "dat")
                .unwrap_or(false)
        })
        .count()
}

/// Five-byte key, so that key + five-byte value encodes to a 26-byte record.
pub fn key(i: u32) -> Vec<u8> {
    format!("k{:04}", i).into_bytes()
}

pub fn val(i: u32) -> Vec<u8> {
    format!("v{:04}", i).into_bytes()
}

/// Overwrite value, distinguishable from the original by its prefix.
pub fn val_upper(i: u32) -> Vec<u8> {
    format!("V{:04}", i).into_bytes()
}
