//! Surface records and the shared geometry store they are appended to.

use crate::error::SurfError;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Dimensionality of the simulation, fixed for a whole ingestion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    /// Surfaces are line segments; points carry `z = 0`.
    Two,
    /// Surfaces are triangles.
    Three,
}

impl Dimension {
    /// `2` or `3`.
    pub fn as_usize(self) -> usize {
        match self {
            Dimension::Two => 2,
            Dimension::Three => 3,
        }
    }
}

/// A surface vertex.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: [f64; 3],
}

/// A 2-D surface element. `p1`/`p2` are 1-based indices into the points added
/// by the same ingestion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub id: usize,
    pub p1: usize,
    pub p2: usize,
}

/// A 3-D surface element. Indices follow the same convention as [`Line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tri {
    pub id: usize,
    pub p1: usize,
    pub p2: usize,
    pub p3: usize,
}

/// The simulation box: lower corner and extent along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub dimension: Dimension,
    pub boxlo: [f64; 3],
    pub prd: [f64; 3],
}

impl Domain {
    pub fn new(dimension: Dimension, boxlo: [f64; 3], boxhi: [f64; 3]) -> Self {
        Self {
            dimension,
            boxlo,
            prd: [boxhi[0] - boxlo[0], boxhi[1] - boxlo[1], boxhi[2] - boxlo[2]],
        }
    }

    /// Absolute position of the fractional box coordinate `f`. The third axis
    /// is pinned to zero in 2-D.
    pub fn fractional(&self, f: [f64; 3]) -> [f64; 3] {
        let z = match self.dimension {
            Dimension::Three => self.boxlo[2] + f[2] * self.prd[2],
            Dimension::Two => 0.0,
        };
        [
            self.boxlo[0] + f[0] * self.prd[0],
            self.boxlo[1] + f[1] * self.prd[1],
            z,
        ]
    }
}

/// A spatial partition of the domain. Surfaces may only be read once it exists.
pub trait SpatialPartition {
    fn exists(&self) -> bool;
}

/// Elements freshly appended to the store, handed to the normal-vector callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewElements {
    Lines { start: usize, count: usize },
    Tris { start: usize, count: usize },
}

/// Records of one ingestion call, built and transformed before they are
/// appended to the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfBatch {
    pub points: Vec<Point>,
    pub lines: Vec<Line>,
    pub tris: Vec<Tri>,
}

impl SurfBatch {
    /// An empty batch with exact room for the declared counts.
    pub fn with_capacity(npoint: usize, nline: usize, ntri: usize) -> Result<Self> {
        let mut batch = SurfBatch::default();
        reserve(&mut batch.points, npoint, "points")?;
        reserve(&mut batch.lines, nline, "lines")?;
        reserve(&mut batch.tris, ntri, "triangles")?;
        Ok(batch)
    }
}

/// Append-only collections of points, lines and triangles shared by every
/// ingestion call, plus the table of surface names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryStore {
    surf_exist: bool,
    ids: Vec<String>,
    points: Vec<Point>,
    lines: Vec<Line>,
    tris: Vec<Tri>,
}

impl GeometryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a surface read has been started on this store. Set by every
    /// call that gets past the grid check, even one that later fails.
    pub fn surf_exist(&self) -> bool {
        self.surf_exist
    }

    pub fn mark_surf_exist(&mut self) {
        self.surf_exist = true;
    }

    /// Index of the surface called `name`, registering it if it is new.
    pub fn add_id(&mut self, name: &str) -> usize {
        if let Some(i) = self.ids.iter().position(|n| n == name) {
            return i;
        }
        self.ids.push(name.to_string());
        self.ids.len() - 1
    }

    pub fn surface_names(&self) -> &[String] {
        &self.ids
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn tris(&self) -> &[Tri] {
        &self.tris
    }

    pub fn npoint(&self) -> usize {
        self.points.len()
    }

    pub fn nline(&self) -> usize {
        self.lines.len()
    }

    pub fn ntri(&self) -> usize {
        self.tris.len()
    }

    /// Make room for `npoint`/`nline`/`ntri` more records so a later
    /// [`commit`](GeometryStore::commit) cannot fail part way.
    pub fn grow(&mut self, npoint: usize, nline: usize, ntri: usize) -> Result<()> {
        reserve(&mut self.points, npoint, "points")?;
        reserve(&mut self.lines, nline, "lines")?;
        reserve(&mut self.tris, ntri, "triangles")?;
        Ok(())
    }

    /// Append a finished batch after the current records.
    pub fn commit(&mut self, batch: SurfBatch) {
        self.points.extend(batch.points);
        self.lines.extend(batch.lines);
        self.tris.extend(batch.tris);
    }
}

fn reserve<T>(v: &mut Vec<T>, additional: usize, what: &'static str) -> Result<()> {
    v.try_reserve_exact(additional).map_err(|_| SurfError::Allocation {
        what,
        count: additional,
    })?;
    Ok(())
}
