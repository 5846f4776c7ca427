//! Length-prefixed binary blob file format.
//!
//! A binary file holds the compiled binaries of one cache item, one blob
//! per target sub-device:
//!
//! ```text
//! u64 blob_count
//! repeat blob_count times: u64 blob_length, blob_length raw bytes
//! ```
//!
//! Integers are native-endian. Cache entries are local-machine artifacts
//! and the format makes no cross-machine portability promises.

use crate::types::CacheError;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

/// Write an ordered sequence of binary blobs to `path`.
pub fn write_blobs(path: &Path, blobs: &[Vec<u8>]) -> Result<(), CacheError> {
    let mut writer = BufWriter::new(File::create(path)?);

    writer.write_all(&(blobs.len() as u64).to_ne_bytes())?;
    for blob in blobs {
        writer.write_all(&(blob.len() as u64).to_ne_bytes())?;
        writer.write_all(blob)?;
    }
    writer.flush()?;

    Ok(())
}

/// Read back the blob sequence stored at `path`.
///
/// Any short read or a declared length that exceeds the bytes actually
/// present yields [`CacheError::CorruptEntry`]; partial data is never
/// returned. Callers treat this as a cache miss.
pub fn read_blobs(path: &Path) -> Result<Vec<Vec<u8>>, CacheError> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let count = read_u64(&mut reader, path)?;
    let mut remaining = file_len.saturating_sub(8);

    // A corrupt count would otherwise spin through the whole file before
    // the first short read surfaces it.
    if count > remaining / 8 {
        return Err(CacheError::CorruptEntry(format!(
            "{}: blob count {} exceeds file size",
            path.display(),
            count
        )));
    }

    let mut blobs = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = read_u64(&mut reader, path)?;
        remaining = remaining.saturating_sub(8);
        if len > remaining {
            return Err(CacheError::CorruptEntry(format!(
                "{}: blob length {} exceeds remaining {} bytes",
                path.display(),
                len,
                remaining
            )));
        }

        let mut blob = vec![0u8; len as usize];
        reader
            .read_exact(&mut blob)
            .map_err(|err| truncated(path, err))?;
        remaining -= len;
        blobs.push(blob);
    }

    Ok(blobs)
}

fn read_u64(reader: &mut impl Read, path: &Path) -> Result<u64, CacheError> {
    let mut buf = [0u8; 8];
    reader
        .read_exact(&mut buf)
        .map_err(|err| truncated(path, err))?;
    Ok(u64::from_ne_bytes(buf))
}

fn truncated(path: &Path, err: std::io::Error) -> CacheError {
    if err.kind() == ErrorKind::UnexpectedEof {
        CacheError::CorruptEntry(format!("{}: truncated", path.display()))
    } else {
        CacheError::Io(err)
    }
}
