//! Source records: on-disk copies of a cache key used to verify that a
//! candidate item is an exact match before its binary is trusted.
//!
//! The directory layout addresses items by hash, so two distinct keys can
//! in principle land in the same directory. Every fetch therefore compares
//! the live key against the record written alongside the binary; the hash
//! only narrows the search.
//!
//! Record layout: four `(u64 length, raw bytes)` pairs in fixed order:
//! device identity string, build options, specialization constants, image
//! bytes. Lengths are native-endian, matching the binary file format.

use crate::types::{CacheError, CacheKey};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// Write the verification record for `key` to `path`.
pub fn write_record(path: &Path, key: &CacheKey) -> Result<(), CacheError> {
    let mut writer = BufWriter::new(File::create(path)?);

    write_field(&mut writer, key.device.id_string().as_bytes())?;
    write_field(&mut writer, key.build_options.as_bytes())?;
    write_field(&mut writer, &key.spec_constants)?;
    write_field(&mut writer, &key.image.bytes)?;
    writer.flush()?;

    Ok(())
}

/// Compare the record at `path` against a live key.
///
/// Fields are checked in the order they were written: device identity
/// first because mismatches there are the common case and the cheapest
/// reject. Any read failure (missing file, truncation, I/O error) counts
/// as a non-match, never an error; the caller just moves to the next
/// candidate.
pub fn matches(path: &Path, key: &CacheKey) -> bool {
    match compare(path, key) {
        Ok(equal) => equal,
        Err(err) => {
            debug!("failed to read source record {}: {}", path.display(), err);
            false
        }
    }
}

fn compare(path: &Path, key: &CacheKey) -> Result<bool, CacheError> {
    let mut reader = BufReader::new(File::open(path)?);

    let id_string = key.device.id_string();
    let fields: [&[u8]; 4] = [
        id_string.as_bytes(),
        key.build_options.as_bytes(),
        &key.spec_constants,
        &key.image.bytes,
    ];

    for expected in fields {
        if !field_matches(&mut reader, expected)? {
            return Ok(false);
        }
    }

    Ok(true)
}

fn write_field(writer: &mut impl Write, bytes: &[u8]) -> Result<(), CacheError> {
    writer.write_all(&(bytes.len() as u64).to_ne_bytes())?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Read one length-prefixed field and compare it to `expected`.
///
/// A length mismatch short-circuits without reading the payload, so a
/// record for a different key never forces an allocation.
fn field_matches(reader: &mut impl Read, expected: &[u8]) -> Result<bool, CacheError> {
    let mut len_buf = [0u8; 8];
    reader.read_exact(&mut len_buf)?;
    if u64::from_ne_bytes(len_buf) != expected.len() as u64 {
        return Ok(false);
    }

    let mut stored = vec![0u8; expected.len()];
    reader.read_exact(&mut stored)?;
    Ok(stored == expected)
}
