//! Locate the next section keyword.

use crate::collective::{Collective, broadcast_flag, broadcast_line};
use crate::header::{is_blank, leader_reader};
use crate::io::SurfReader;
use anyhow::Result;
use tracing::debug;

const TRIM: &[char] = &[' ', '\t', '\n', '\r'];

/// Read the next section keyword on every rank.
///
/// With `first` set, the search starts from `pending` (the line that ended the
/// header) instead of reading a fresh line. The leader skips blank lines until a
/// non-blank one, then consumes one more line as the separator. If any of those
/// reads hits end of stream the keyword is empty on every rank.
///
/// The keyword is returned trimmed and uninterpreted.
pub fn next_keyword<C: Collective + ?Sized>(
    comm: &C,
    reader: Option<&mut SurfReader>,
    first: bool,
    pending: &str,
) -> Result<String> {
    let mut line = String::new();
    let mut eof = false;

    if comm.is_leader() {
        let rdr = leader_reader(reader)?;
        if first {
            line.push_str(pending);
        } else {
            match rdr.next_line()? {
                Some(l) => line = l,
                None => eof = true,
            }
        }
        while !eof && is_blank(&line) {
            match rdr.next_line()? {
                Some(l) => line = l,
                None => eof = true,
            }
        }
        if rdr.next_line()?.is_none() {
            eof = true;
        }
    }

    if broadcast_flag(comm, eof)? {
        debug!("end of surf file while looking for a section keyword");
        return Ok(String::new());
    }

    let line = broadcast_line(comm, comm.is_leader().then_some(line.as_str()))?.unwrap_or_default();
    Ok(line.trim_matches(TRIM).to_string())
}
