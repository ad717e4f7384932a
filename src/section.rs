//! Chunked, broadcast-based parsing of the `Points`, `Lines` and `Triangles`
//! sections.
//!
//! The leader gathers up to `chunk_size` raw data lines into one text buffer and
//! broadcasts it (length, then bytes). Every rank then parses the same buffer,
//! so every rank builds identical records and hits identical errors. Chunking
//! bounds both peak memory and the size of a single broadcast no matter how
//! large the section is.
//!
//! A data line is `<index> <field>...`. The leading index is file-local and
//! ignored. Only the first line of each chunk has its token count checked;
//! later lines must merely supply enough fields.

use crate::collective::Collective;
use crate::error::SurfError;
use crate::geometry::{Dimension, Line, Point, Tri};
use crate::header::leader_reader;
use crate::io::SurfReader;
use crate::validation::{Validate, ValidationResult, combine_validations, format_errors, validators};
use anyhow::Result;
use tracing::{info, trace};

/// Default number of records per broadcast.
pub const CHUNK: usize = 1024;

/// Characters that separate tokens within a data line.
pub const DELIMITERS: [char; 5] = [' ', '\t', '\n', '\r', '\x0c'];

/// Tokens of `line` in textual order.
pub fn tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split(DELIMITERS).filter(|t| !t.is_empty())
}

/// Number of tokens before any `#` comment.
pub fn count_words(line: &str) -> usize {
    let body = line.split('#').next().unwrap_or_default();
    tokens(body).count()
}

/// What a record needs to know about the call it is read in.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext {
    pub dimension: Dimension,
    /// Surface id stamped on every element.
    pub surface_id: usize,
    /// Points declared by the header for this call.
    pub npoint: usize,
}

/// One kind of section data line.
pub trait SectionRecord: Sized {
    /// Singular name used in error messages ("point", "line", "triangle").
    const KIND: &'static str;
    /// Plural name used in log lines.
    const PLURAL: &'static str;

    /// Number of fields after the leading index.
    fn arity(dimension: Dimension) -> usize;

    /// Build a record from exactly `arity` fields.
    fn from_fields(fields: &[&str], ctx: &RecordContext) -> Result<Self>;
}

fn parse_field<T: std::str::FromStr>(kind: &'static str, field: &str) -> Result<T> {
    field.parse::<T>().map_err(|_| {
        SurfError::IncorrectFormat {
            kind,
            line: format!("bad field '{field}'"),
        }
        .into()
    })
}

fn check<V: Validate>(kind: &'static str, record: &V, npoint: usize) -> Result<()> {
    record.validate(npoint).map_err(|errors| {
        SurfError::InvalidIndex {
            kind,
            detail: format_errors(&errors),
        }
        .into()
    })
}

impl SectionRecord for Point {
    const KIND: &'static str = "point";
    const PLURAL: &'static str = "points";

    fn arity(dimension: Dimension) -> usize {
        dimension.as_usize()
    }

    fn from_fields(fields: &[&str], ctx: &RecordContext) -> Result<Self> {
        let x = parse_field::<f64>(Self::KIND, fields[0])?;
        let y = parse_field::<f64>(Self::KIND, fields[1])?;
        let z = match ctx.dimension {
            Dimension::Three => parse_field::<f64>(Self::KIND, fields[2])?,
            Dimension::Two => 0.0,
        };
        Ok(Point { x: [x, y, z] })
    }
}

struct LineIndices {
    p1: i64,
    p2: i64,
}

impl Validate for LineIndices {
    fn validate(&self, npoint: usize) -> ValidationResult {
        combine_validations(vec![
            validators::index_in_range("p1", self.p1, npoint),
            validators::index_in_range("p2", self.p2, npoint),
            validators::distinct("p1", self.p1, "p2", self.p2),
        ])
    }
}

impl SectionRecord for Line {
    const KIND: &'static str = "line";
    const PLURAL: &'static str = "lines";

    fn arity(_: Dimension) -> usize {
        2
    }

    fn from_fields(fields: &[&str], ctx: &RecordContext) -> Result<Self> {
        let idx = LineIndices {
            p1: parse_field(Self::KIND, fields[0])?,
            p2: parse_field(Self::KIND, fields[1])?,
        };
        check(Self::KIND, &idx, ctx.npoint)?;
        Ok(Line {
            id: ctx.surface_id,
            p1: idx.p1 as usize,
            p2: idx.p2 as usize,
        })
    }
}

struct TriIndices {
    p1: i64,
    p2: i64,
    p3: i64,
}

impl Validate for TriIndices {
    // p1 == p3 is accepted
    fn validate(&self, npoint: usize) -> ValidationResult {
        combine_validations(vec![
            validators::index_in_range("p1", self.p1, npoint),
            validators::index_in_range("p2", self.p2, npoint),
            validators::index_in_range("p3", self.p3, npoint),
            validators::distinct("p1", self.p1, "p2", self.p2),
            validators::distinct("p2", self.p2, "p3", self.p3),
        ])
    }
}

impl SectionRecord for Tri {
    const KIND: &'static str = "triangle";
    const PLURAL: &'static str = "triangles";

    fn arity(_: Dimension) -> usize {
        3
    }

    fn from_fields(fields: &[&str], ctx: &RecordContext) -> Result<Self> {
        let idx = TriIndices {
            p1: parse_field(Self::KIND, fields[0])?,
            p2: parse_field(Self::KIND, fields[1])?,
            p3: parse_field(Self::KIND, fields[2])?,
        };
        check(Self::KIND, &idx, ctx.npoint)?;
        Ok(Tri {
            id: ctx.surface_id,
            p1: idx.p1 as usize,
            p2: idx.p2 as usize,
            p3: idx.p3 as usize,
        })
    }
}

/// Read `count` records of type `R` on every rank and append them to `out`.
///
/// The leader passes its reader; followers pass `None`. `out` should already
/// have room for `count` more records.
pub fn read_section<R, C>(
    comm: &C,
    mut reader: Option<&mut SurfReader>,
    count: usize,
    ctx: &RecordContext,
    chunk_size: usize,
    out: &mut Vec<R>,
) -> Result<()>
where
    R: SectionRecord,
    C: Collective + ?Sized,
{
    let arity = R::arity(ctx.dimension);
    let chunk_size = chunk_size.max(1);
    let mut nread = 0;

    while nread < count {
        let nchunk = (count - nread).min(chunk_size);

        let mut buffer = String::new();
        if comm.is_leader() {
            let rdr = leader_reader(reader.as_deref_mut())?;
            for _ in 0..nchunk {
                let Some(line) = rdr.next_line()? else {
                    return Err(SurfError::UnexpectedEof { what: "surf file" }.into());
                };
                buffer.push_str(&line);
                if !line.ends_with('\n') {
                    buffer.push('\n');
                }
            }
        }
        let n = comm.broadcast_len(buffer.len())?;
        let bytes = comm.broadcast_bytes(buffer.into_bytes(), n)?;
        let text = String::from_utf8(bytes).map_err(|e| SurfError::IncorrectFormat {
            kind: R::KIND,
            line: format!("chunk is not valid UTF-8: {e}"),
        })?;
        trace!(kind = R::KIND, nchunk, bytes = n, "parsing broadcast chunk");

        for (i, line) in text.split_terminator('\n').take(nchunk).enumerate() {
            if i == 0 && count_words(line) != arity + 1 {
                return Err(SurfError::IncorrectFormat {
                    kind: R::KIND,
                    line: line.to_string(),
                }
                .into());
            }
            let fields: Vec<&str> = tokens(line).skip(1).take(arity).collect();
            if fields.len() < arity {
                return Err(SurfError::IncorrectFormat {
                    kind: R::KIND,
                    line: line.to_string(),
                }
                .into());
            }
            out.push(R::from_fields(&fields, ctx)?);
        }

        nread += nchunk;
    }

    if comm.is_leader() {
        info!("  {} {}", count, R::PLURAL);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collective::Solo;
    use crate::error::surf_error;
    use std::io::Cursor;

    fn ctx(dimension: Dimension, npoint: usize) -> RecordContext {
        RecordContext {
            dimension,
            surface_id: 7,
            npoint,
        }
    }

    fn read<R: SectionRecord>(
        text: &'static str,
        count: usize,
        ctx: RecordContext,
        chunk: usize,
    ) -> Result<Vec<R>> {
        let mut r = SurfReader::from_reader(Cursor::new(text));
        let mut out = Vec::new();
        read_section(&Solo, Some(&mut r), count, &ctx, chunk, &mut out)?;
        Ok(out)
    }

    #[test]
    fn tokenizer_is_pure_and_restartable() {
        let line = "1\t0.5  2.5\r\x0c";
        let first: Vec<_> = tokens(line).collect();
        let second: Vec<_> = tokens(line).collect();
        assert_eq!(first, ["1", "0.5", "2.5"]);
        assert_eq!(first, second);
        assert_eq!(line, "1\t0.5  2.5\r\x0c");
    }

    #[test]
    fn count_words_ignores_comments() {
        assert_eq!(count_words("1 0 0 # origin corner"), 3);
        assert_eq!(count_words("   "), 0);
    }

    #[test]
    fn points_2d_get_zero_z() -> Result<()> {
        let pts: Vec<Point> = read("1 0.5 1.5\n2 -1 2\n", 2, ctx(Dimension::Two, 2), CHUNK)?;
        assert_eq!(pts, [Point { x: [0.5, 1.5, 0.0] }, Point { x: [-1.0, 2.0, 0.0] }]);
        Ok(())
    }

    #[test]
    fn chunks_cover_whole_section() -> Result<()> {
        let text = "1 1 1 1\n2 2 2 2\n3 3 3 3\n4 4 4 4\n5 5 5 5\n";
        let pts: Vec<Point> = read(text, 5, ctx(Dimension::Three, 5), 2)?;
        assert_eq!(pts.len(), 5);
        assert_eq!(pts[4].x, [5.0, 5.0, 5.0]);
        Ok(())
    }

    #[test]
    fn last_line_without_newline() -> Result<()> {
        let lines: Vec<Line> = read("1 1 2\n2 2 3", 2, ctx(Dimension::Two, 3), CHUNK)?;
        assert_eq!(lines[1], Line { id: 7, p1: 2, p2: 3 });
        Ok(())
    }

    #[test]
    fn wrong_arity_on_first_record_is_fatal() {
        let err = read::<Point>("1 0 0 0\n", 1, ctx(Dimension::Two, 1), CHUNK).unwrap_err();
        assert!(matches!(surf_error(&err), Some(SurfError::IncorrectFormat { kind: "point", .. })));
    }

    #[test]
    fn only_first_record_of_chunk_is_counted() -> Result<()> {
        let lines: Vec<Line> = read("1 1 2\n2 2 3 extra\n", 2, ctx(Dimension::Two, 3), CHUNK)?;
        assert_eq!(lines.len(), 2);
        let err = read::<Line>("1 1 2\n2 2 3 extra\n", 2, ctx(Dimension::Two, 3), 1).unwrap_err();
        assert!(matches!(surf_error(&err), Some(SurfError::IncorrectFormat { .. })));
        Ok(())
    }

    #[test]
    fn short_later_record_is_fatal() {
        let err = read::<Line>("1 1 2\n2 3\n", 2, ctx(Dimension::Two, 3), CHUNK).unwrap_err();
        assert!(matches!(surf_error(&err), Some(SurfError::IncorrectFormat { .. })));
    }

    #[test]
    fn line_indices_are_validated() {
        for text in ["1 0 1\n", "1 1 4\n", "1 2 2\n", "1 -1 2\n"] {
            let err = read::<Line>(text, 1, ctx(Dimension::Two, 3), CHUNK).unwrap_err();
            assert!(matches!(surf_error(&err), Some(SurfError::InvalidIndex { kind: "line", .. })));
        }
    }

    #[test]
    fn triangle_indices_are_validated() {
        for text in ["1 0 1 2\n", "1 1 2 9\n", "1 1 -2 3\n", "1 1 2 0\n", "1 2 2 3\n"] {
            let err = read::<Tri>(text, 1, ctx(Dimension::Three, 3), CHUNK).unwrap_err();
            assert!(
                matches!(surf_error(&err), Some(SurfError::InvalidIndex { kind: "triangle", .. })),
                "{text:?}"
            );
        }
    }

    #[test]
    fn triangle_allows_p1_equal_p3() -> Result<()> {
        let tris: Vec<Tri> = read("1 1 2 1\n", 1, ctx(Dimension::Three, 2), CHUNK)?;
        assert_eq!(tris[0], Tri { id: 7, p1: 1, p2: 2, p3: 1 });
        let err = read::<Tri>("1 1 2 2\n", 1, ctx(Dimension::Three, 2), CHUNK).unwrap_err();
        assert!(matches!(surf_error(&err), Some(SurfError::InvalidIndex { .. })));
        Ok(())
    }

    #[test]
    fn early_end_of_file_is_leader_fatal() {
        let err = read::<Point>("1 0 0\n", 2, ctx(Dimension::Two, 2), CHUNK).unwrap_err();
        assert_eq!(surf_error(&err), Some(&SurfError::UnexpectedEof { what: "surf file" }));
    }

    #[test]
    fn unparsable_field_is_fatal() {
        let err = read::<Point>("1 0 abc\n", 1, ctx(Dimension::Two, 1), CHUNK).unwrap_err();
        assert!(matches!(surf_error(&err), Some(SurfError::IncorrectFormat { .. })));
    }
}
