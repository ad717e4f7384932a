//! Leader-side access to surface files.
//!
//! Only the leader ever constructs a [`SurfReader`]; the other ranks pass `None`
//! wherever a reader is expected and receive the data by broadcast instead.

pub mod compression;

use crate::error::SurfError;
use anyhow::Result;
use compression::decompressing_reader;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Line-oriented reader over a plain or decompressed byte stream.
pub struct SurfReader {
    inner: Box<dyn BufRead>,
    line_no: usize,
}

impl SurfReader {
    /// Wrap any byte source, e.g. an in-memory `Cursor`.
    pub fn from_reader<R: Read + 'static>(reader: R) -> Self {
        Self {
            inner: Box::new(BufReader::new(reader)),
            line_no: 0,
        }
    }

    /// Next line including its terminator, or `None` at end of stream.
    ///
    /// Bytes that are not UTF-8 become `U+FFFD`; they only matter where a
    /// number or keyword is parsed, and fail there.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        if !self.next_raw(&mut buf)? {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Consume one line without decoding it. Returns `false` at end of stream.
    pub fn skip_line(&mut self) -> Result<bool> {
        let mut buf = Vec::new();
        self.next_raw(&mut buf)
    }

    fn next_raw(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        let n = self
            .inner
            .read_until(b'\n', buf)
            .map_err(|e| SurfError::ReadFailed {
                line: self.line_no + 1,
                reason: e.to_string(),
            })?;
        if n == 0 {
            return Ok(false);
        }
        self.line_no += 1;
        Ok(true)
    }

    /// Number of lines consumed so far.
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

/// Open `path` for reading, decompressing when its suffix names a registered codec.
///
/// # Errors
/// [`SurfError::CannotOpen`] when the file cannot be opened, and
/// [`SurfError::GzipUnsupported`] for a `.gz` path when the gzip codec is not
/// compiled in.
pub fn open_surf_file(path: impl AsRef<Path>) -> Result<SurfReader> {
    let path = path.as_ref();
    let shown = path.display().to_string();
    if compression::detect_from_extension(path).is_none() && shown.ends_with(".gz") {
        return Err(SurfError::GzipUnsupported { path: shown }.into());
    }
    let f = File::open(path).map_err(|e| SurfError::CannotOpen {
        path: shown.clone(),
        reason: e.to_string(),
    })?;
    let rdr = decompressing_reader(f, path).map_err(|e| SurfError::CannotOpen {
        path: shown.clone(),
        reason: format!("{e:#}"),
    })?;
    Ok(SurfReader::from_reader(rdr))
}
