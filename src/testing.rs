//! Fixtures for exercising `read_surf` in tests.
//!
//! - [`SurfFileBuilder`] renders surface files and writes them to temp files
//! - [`StubGrid`] stands in for the spatial partition
//! - [`run_group`] runs one closure per rank of an in-process group
//!
//! # Example
//!
//! ```
//! use surfread::testing::{sample_square_2d, StubGrid};
//! use surfread::{Dimension, Domain, GeometryStore, ReadSurf, Solo};
//! # fn main() -> anyhow::Result<()> {
//! let file = sample_square_2d().write_temp()?;
//! let domain = Domain::new(Dimension::Two, [0.0; 3], [10.0, 10.0, 1.0]);
//! let mut store = GeometryStore::new();
//! let path = file.path().to_string_lossy().to_string();
//! let args = ["sq", path.as_str()];
//! ReadSurf::new(&Solo, &domain).command(&StubGrid::defined(), &mut store, &args, |_, _| {})?;
//! assert_eq!(store.nline(), 4);
//! # Ok(())
//! # }
//! ```

use crate::collective::{ThreadComm, ThreadGroup};
use crate::geometry::{Dimension, SpatialPartition};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::io::Write;
use tempfile::NamedTempFile;

/// A spatial partition that either exists or does not.
#[derive(Debug, Clone, Copy)]
pub struct StubGrid {
    pub defined: bool,
}

impl StubGrid {
    pub fn defined() -> Self {
        Self { defined: true }
    }

    pub fn undefined() -> Self {
        Self { defined: false }
    }
}

impl SpatialPartition for StubGrid {
    fn exists(&self) -> bool {
        self.defined
    }
}

/// Renders a surface file in the standard layout.
#[derive(Debug, Clone)]
pub struct SurfFileBuilder {
    dimension: Dimension,
    title: String,
    points: Vec<[f64; 3]>,
    lines: Vec<[usize; 2]>,
    tris: Vec<[usize; 3]>,
}

impl SurfFileBuilder {
    pub fn new(dimension: Dimension) -> Self {
        Self {
            dimension,
            title: "surf file written by surfread::testing".to_string(),
            points: Vec::new(),
            lines: Vec::new(),
            tris: Vec::new(),
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Add a point; `z` is not written for 2-D files.
    pub fn point(mut self, x: f64, y: f64, z: f64) -> Self {
        self.points.push([x, y, z]);
        self
    }

    pub fn line(mut self, p1: usize, p2: usize) -> Self {
        self.lines.push([p1, p2]);
        self
    }

    pub fn tri(mut self, p1: usize, p2: usize, p3: usize) -> Self {
        self.tris.push([p1, p2, p3]);
        self
    }

    /// The full file text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "{}", self.title);
        let _ = writeln!(s);
        let _ = writeln!(s, "{} points", self.points.len());
        match self.dimension {
            Dimension::Two => {
                let _ = writeln!(s, "{} lines", self.lines.len());
            }
            Dimension::Three => {
                let _ = writeln!(s, "{} tris", self.tris.len());
            }
        }
        let _ = writeln!(s, "\nPoints\n");
        for (i, p) in self.points.iter().enumerate() {
            let _ = match self.dimension {
                Dimension::Two => writeln!(s, "{} {} {}", i + 1, p[0], p[1]),
                Dimension::Three => writeln!(s, "{} {} {} {}", i + 1, p[0], p[1], p[2]),
            };
        }
        match self.dimension {
            Dimension::Two => {
                let _ = writeln!(s, "\nLines\n");
                for (i, l) in self.lines.iter().enumerate() {
                    let _ = writeln!(s, "{} {} {}", i + 1, l[0], l[1]);
                }
            }
            Dimension::Three => {
                let _ = writeln!(s, "\nTriangles\n");
                for (i, t) in self.tris.iter().enumerate() {
                    let _ = writeln!(s, "{} {} {} {}", i + 1, t[0], t[1], t[2]);
                }
            }
        }
        s
    }

    /// Write the rendered text to a fresh `.surf` temp file.
    pub fn write_temp(&self) -> Result<NamedTempFile> {
        write_temp_text(&self.render())
    }

    /// Write the rendered text gzip-compressed to a fresh `.surf.gz` temp file.
    #[cfg(feature = "compression-gzip")]
    pub fn write_temp_gz(&self) -> Result<NamedTempFile> {
        use flate2::Compression;
        use flate2::write::GzEncoder;

        let file = tempfile::Builder::new()
            .suffix(".surf.gz")
            .tempfile()
            .context("create gzip temp surf file")?;
        let mut enc = GzEncoder::new(file.reopen()?, Compression::default());
        enc.write_all(self.render().as_bytes())?;
        enc.finish()?.flush()?;
        Ok(file)
    }
}

/// Write arbitrary text (possibly malformed) to a fresh `.surf` temp file.
pub fn write_temp_text(text: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .suffix(".surf")
        .tempfile()
        .context("create temp surf file")?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Unit square in 2-D, wound counter-clockwise.
#[must_use]
pub fn sample_square_2d() -> SurfFileBuilder {
    SurfFileBuilder::new(Dimension::Two)
        .title("unit square")
        .point(0.0, 0.0, 0.0)
        .point(1.0, 0.0, 0.0)
        .point(1.0, 1.0, 0.0)
        .point(0.0, 1.0, 0.0)
        .line(1, 2)
        .line(2, 3)
        .line(3, 4)
        .line(4, 1)
}

/// Unit tetrahedron in 3-D.
#[must_use]
pub fn sample_tetra_3d() -> SurfFileBuilder {
    SurfFileBuilder::new(Dimension::Three)
        .title("unit tetrahedron")
        .point(0.0, 0.0, 0.0)
        .point(1.0, 0.0, 0.0)
        .point(0.0, 1.0, 0.0)
        .point(0.0, 0.0, 1.0)
        .tri(1, 3, 2)
        .tri(1, 2, 4)
        .tri(1, 4, 3)
        .tri(2, 3, 4)
}

/// Run `f` on every rank of a fresh [`ThreadGroup`] of `size` ranks, each on its
/// own scoped thread, and collect the results in rank order.
///
/// Each rank owns its handle, so a rank that returns early (for example the
/// leader after a fatal error) tears the group down for the others.
pub fn run_group<T, F>(size: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(ThreadComm) -> T + Sync,
{
    let comms = ThreadGroup::new(size);
    std::thread::scope(|s| {
        let f = &f;
        let handles: Vec<_> = comms.into_iter().map(|comm| s.spawn(move || f(comm))).collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}
