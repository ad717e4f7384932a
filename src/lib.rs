//! # surfread
//!
//! Collective ingestion of **surface meshes** into the shared geometry store of
//! a parallel particle simulation.
//!
//! A surface file describes either 2-D line segments or 3-D triangles together
//! with the points they connect. Exactly one rank of the group, the *leader*,
//! reads the file; every other rank receives the same bytes through a
//! [`Collective`] broadcast and parses them itself, so all ranks end up with
//! identical records and take identical decisions.
//!
//! ## Quick Start
//!
//! ```no_run
//! use surfread::*;
//! use surfread::testing::StubGrid;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let domain = Domain::new(Dimension::Three, [0.0; 3], [10.0; 3]);
//! let mut store = GeometryStore::new();
//!
//! let summary = ReadSurf::new(&Solo, &domain).command(
//!     &StubGrid::defined(),
//!     &mut store,
//!     &["sphere", "data.sphere.gz", "ftrans", "0.5", "0.5", "0.5", "invert"],
//!     |_store, new| println!("recompute normals for {new:?}"),
//! )?;
//! println!("{}", summary.to_json()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## File Format
//!
//! ```text
//! title line (ignored)
//!
//! 4 points          # header: leading integer + keyword substring
//! 4 tris
//!
//! Points
//!
//! 1 0 0 0           # <index> x y z   (no z in 2-D)
//! ...
//!
//! Triangles         # or Lines in 2-D
//!
//! 1 1 3 2           # <index> p1 p2 p3 (1-based, local to this file)
//! ...
//! ```
//!
//! ## Pipeline
//!
//! 1. [`header`] - counts of points, lines and triangles
//! 2. [`keyword`] - locate `Points`, then `Lines` or `Triangles`
//! 3. [`section`] - chunked broadcast and parsing of the data lines
//! 4. [`transform`] - `origin`, `trans`, `atrans`, `ftrans`, `scale`, `rotate`, `invert`
//! 5. commit to the [`GeometryStore`] and call back for normal recomputation
//!
//! Any violation is fatal for the whole call and is reported as a
//! [`SurfError`] inside an [`anyhow::Error`]; nothing is appended to the store.
//!
//! ## Feature Flags
//!
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`, `compression-xz` -
//!   transparent decompression selected by file suffix
//! - `parallel` - Rayon-backed point transforms for [`ExecMode::Parallel`]

pub mod collective;
pub mod config;
pub mod error;
pub mod geometry;
pub mod header;
pub mod io;
pub mod keyword;
pub mod reader;
pub mod section;
pub mod testing;
pub mod transform;
pub mod validation;

pub use collective::{Collective, Solo, ThreadComm, ThreadGroup};
pub use config::{ExecMode, ReadSurfConfig};
pub use error::{FatalScope, SurfError, surf_error};
pub use geometry::{
    Dimension, Domain, GeometryStore, Line, NewElements, Point, SpatialPartition, SurfBatch, Tri,
};
pub use reader::{IngestSummary, ReadSurf};
pub use transform::Transform;
