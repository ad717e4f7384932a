//! Free-format header of a surface file.
//!
//! The first line is a title and is skipped. Each following line is cut at `#`,
//! blank lines are skipped, and a line containing `points`, `lines` or `tris`
//! sets the matching count from its leading integer. The first line that
//! mentions none of them ends the header and is kept for the keyword scanner.

use crate::collective::{Collective, broadcast_line};
use crate::error::SurfError;
use crate::geometry::Dimension;
use crate::io::SurfReader;
use anyhow::Result;

/// Counts declared by the header, plus the line that ended it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub npoint: usize,
    pub nline: usize,
    pub ntri: usize,
    /// Comment-stripped line that ended the header; empty when the stream ran out.
    pub pending: String,
}

/// Whether `line` holds only spaces, tabs, newlines and carriage returns.
pub(crate) fn is_blank(line: &str) -> bool {
    line.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

/// Leading integer of `line` in the manner of `%d`: optional whitespace, an
/// optional sign and at least one digit.
pub(crate) fn leading_int(line: &str) -> Option<i64> {
    let s = line.trim_start();
    let sign_len = usize::from(s.starts_with(['+', '-']));
    let digits = s[sign_len..].bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    s[..sign_len + digits].parse().ok()
}

fn set_count(slot: &mut usize, line: &str) -> Result<()> {
    if let Some(v) = leading_int(line) {
        *slot = usize::try_from(v).map_err(|_| SurfError::InvalidCount {
            line: line.to_string(),
        })?;
    }
    Ok(())
}

/// Parse the header on every rank. The leader passes its reader, followers pass `None`.
pub fn read_header<C: Collective + ?Sized>(
    comm: &C,
    mut reader: Option<&mut SurfReader>,
    dimension: Dimension,
) -> Result<Header> {
    if comm.is_leader() {
        let rdr = leader_reader(reader.as_deref_mut())?;
        if !rdr.skip_line()? {
            return Err(SurfError::UnexpectedEof { what: "data file" }.into());
        }
    }

    let mut header = Header::default();
    loop {
        let raw = match reader.as_deref_mut() {
            Some(rdr) if comm.is_leader() => rdr.next_line()?,
            _ => None,
        };
        let Some(line) = broadcast_line(comm, raw.as_deref())? else {
            return Ok(header);
        };

        let line = match line.find('#') {
            Some(pos) => line[..pos].to_string(),
            None => line,
        };
        if is_blank(&line) {
            continue;
        }

        if line.contains("points") {
            set_count(&mut header.npoint, &line)?;
        } else if line.contains("lines") {
            if dimension == Dimension::Three {
                return Err(SurfError::WrongDimension {
                    section: "lines",
                    dimension: 3,
                }
                .into());
            }
            set_count(&mut header.nline, &line)?;
        } else if line.contains("tris") {
            if dimension == Dimension::Two {
                return Err(SurfError::WrongDimension {
                    section: "triangles",
                    dimension: 2,
                }
                .into());
            }
            set_count(&mut header.ntri, &line)?;
        } else {
            header.pending = line;
            break;
        }
    }

    if header.npoint == 0 {
        return Err(SurfError::MissingPoints.into());
    }
    match dimension {
        Dimension::Two if header.nline == 0 => {
            Err(SurfError::MissingElements { section: "lines" }.into())
        }
        Dimension::Three if header.ntri == 0 => {
            Err(SurfError::MissingElements { section: "triangles" }.into())
        }
        _ => Ok(header),
    }
}

pub(crate) fn leader_reader(reader: Option<&mut SurfReader>) -> Result<&mut SurfReader> {
    reader.ok_or_else(|| {
        SurfError::Collective {
            detail: "leader has no open surf file".to_string(),
        }
        .into()
    })
}
