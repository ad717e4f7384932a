//! The `read_surf` command: read a surface file on the leader, share it with
//! every rank, transform the new records and append them to the store.

use crate::collective::Collective;
use crate::config::ReadSurfConfig;
use crate::error::SurfError;
use crate::geometry::{
    Dimension, Domain, GeometryStore, Line, NewElements, Point, SpatialPartition, SurfBatch, Tri,
};
use crate::header::read_header;
use crate::io::{SurfReader, open_surf_file};
use crate::keyword::next_keyword;
use crate::section::{RecordContext, read_section};
use crate::transform::{Transform, TransformPipeline};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// What one successful call added to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub surface_id: usize,
    pub surface: String,
    pub dimension: Dimension,
    /// Store index of the first new point.
    pub point_offset: usize,
    pub npoint: usize,
    pub line_offset: usize,
    pub nline: usize,
    pub tri_offset: usize,
    pub ntri: usize,
    pub transforms: Vec<Transform>,
    /// Transform origin after the last transform.
    pub origin: [f64; 3],
    pub elapsed_secs: f64,
}

impl IngestSummary {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize ingest summary")
    }
}

/// Surface reader bound to one rank of a collective group.
///
/// Every rank of the group must call [`command`](ReadSurf::command) with the
/// same arguments; only the leader opens the file.
pub struct ReadSurf<'a, C: Collective + ?Sized> {
    comm: &'a C,
    domain: &'a Domain,
    config: ReadSurfConfig,
}

impl<'a, C: Collective + ?Sized> ReadSurf<'a, C> {
    pub fn new(comm: &'a C, domain: &'a Domain) -> Self {
        Self {
            comm,
            domain,
            config: ReadSurfConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReadSurfConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ReadSurfConfig {
        &self.config
    }

    /// Run `read_surf <name> <path> [transform ...]`.
    ///
    /// `normals` is called once, after the commit, with the range of new lines
    /// (2-D) or triangles (3-D).
    ///
    /// On error nothing is appended to `store`; the surface name may already be
    /// registered.
    pub fn command<S, G, F>(
        &self,
        grid: &G,
        store: &mut GeometryStore,
        args: &[S],
        mut normals: F,
    ) -> Result<IngestSummary>
    where
        S: AsRef<str>,
        G: SpatialPartition + ?Sized,
        F: FnMut(&GeometryStore, NewElements),
    {
        let started = Instant::now();
        if !grid.exists() {
            return Err(SurfError::GridNotDefined.into());
        }
        store.mark_surf_exist();
        if args.len() < 2 {
            return Err(SurfError::IllegalCommand.into());
        }
        self.config.validate()?;

        let comm = self.comm;
        let dimension = self.domain.dimension;
        let name = args[0].as_ref();
        let surface_id = store.add_id(name);

        let mut reader: Option<SurfReader> = None;
        if comm.is_leader() {
            info!("Reading surf file ...");
            reader = Some(open_surf_file(args[1].as_ref())?);
        }

        let header = read_header(comm, reader.as_mut(), dimension)?;

        let (npoint_old, nline_old, ntri_old) = (store.npoint(), store.nline(), store.ntri());
        let mut batch = SurfBatch::with_capacity(header.npoint, header.nline, header.ntri)?;
        store.grow(header.npoint, header.nline, header.ntri)?;

        let ctx = RecordContext {
            dimension,
            surface_id,
            npoint: header.npoint,
        };
        let chunk = self.config.chunk_size;

        let keyword = next_keyword(comm, reader.as_mut(), true, &header.pending)?;
        expect_section("Points", &keyword)?;
        let points = &mut batch.points;
        read_section::<Point, _>(comm, reader.as_mut(), header.npoint, &ctx, chunk, points)?;

        let keyword = next_keyword(comm, reader.as_mut(), false, "")?;
        match dimension {
            Dimension::Two => {
                expect_section("Lines", &keyword)?;
                let lines = &mut batch.lines;
                read_section::<Line, _>(comm, reader.as_mut(), header.nline, &ctx, chunk, lines)?;
            }
            Dimension::Three => {
                expect_section("Triangles", &keyword)?;
                let tris = &mut batch.tris;
                read_section::<Tri, _>(comm, reader.as_mut(), header.ntri, &ctx, chunk, tris)?;
            }
        }

        // close file
        drop(reader);

        let mut pipeline = TransformPipeline::new(self.domain, &self.config);
        let transforms = pipeline.run(&args[2..], &mut batch)?;

        let (nline, ntri) = (batch.lines.len(), batch.tris.len());
        store.commit(batch);
        debug!(
            surface = name,
            points = store.npoint(),
            lines = store.nline(),
            tris = store.ntri(),
            "committed surf batch"
        );

        match dimension {
            Dimension::Two => normals(
                store,
                NewElements::Lines {
                    start: nline_old,
                    count: nline,
                },
            ),
            Dimension::Three => normals(
                store,
                NewElements::Tris {
                    start: ntri_old,
                    count: ntri,
                },
            ),
        }

        Ok(IngestSummary {
            surface_id,
            surface: name.to_string(),
            dimension,
            point_offset: npoint_old,
            npoint: header.npoint,
            line_offset: nline_old,
            nline,
            tri_offset: ntri_old,
            ntri,
            transforms,
            origin: pipeline.origin(),
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }
}

fn expect_section(expected: &'static str, found: &str) -> Result<()> {
    if found != expected {
        return Err(SurfError::SectionMismatch {
            expected,
            found: found.to_string(),
        }
        .into());
    }
    debug!(section = expected, "found surf section");
    Ok(())
}
