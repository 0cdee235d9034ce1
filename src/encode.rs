//! Saving toggle data.
//!
//! The primary output is the bare sequence of toggle counts, each a
//! 4-byte unsigned integer in native byte order, without header or
//! separators. The cycle indices can be saved alongside in a CBOR
//! file.

use crate::error::{Result, ToggleError};
use crate::toggle::ToggleDataPoint;
use ciborium::{ from_reader, into_writer };
use std::fs::File;
use std::io::{ self, BufReader, BufWriter, Read, Write };
use std::path::Path;

/// Write the toggle counts of `points`, in order.
pub fn write_counts<W: Write>(w: W, points: &[ToggleDataPoint]) -> io::Result<()> {
    let mut w = BufWriter::new(w);
    for p in points {
        w.write_all(&p.count.to_ne_bytes())?;
    }
    w.flush()
}

/// Read back a flat sequence of toggle counts.
///
/// A trailing partial value is an `UnexpectedEof` error.
pub fn read_counts<R: Read>(mut r: R) -> io::Result<Vec<u32>> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    let chunks = buf.chunks_exact(4);
    if !chunks.remainder().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} trailing bytes", chunks.remainder().len())
        ));
    }
    Ok(chunks.map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]])).collect())
}

/// Create (or truncate) `path` and write the toggle counts to it.
pub fn save_counts(path: impl AsRef<Path>, points: &[ToggleDataPoint]) -> Result<()> {
    let path = path.as_ref();
    let save_err = |source| ToggleError::Save { path: path.to_owned(), source };
    let f = File::create(path).map_err(save_err)?;
    write_counts(f, points).map_err(save_err)?;
    clilog::info!("saved {} toggle counts to {}", points.len(), path.display());
    Ok(())
}

/// Save the full points, cycle indices included, as CBOR.
pub fn save_points(path: impl AsRef<Path>, points: &[ToggleDataPoint]) -> Result<()> {
    let path = path.as_ref();
    let f = File::create(path).map_err(|source| ToggleError::Save {
        path: path.to_owned(), source
    })?;
    let mut w = BufWriter::new(f);
    into_writer(&points, &mut w)?;
    w.flush()?;
    Ok(())
}

pub fn load_points(path: impl AsRef<Path>) -> Result<Vec<ToggleDataPoint>> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|source| ToggleError::Open {
        path: path.to_owned(), source
    })?;
    Ok(from_reader(BufReader::new(f))?)
}
