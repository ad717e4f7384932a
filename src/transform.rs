//! Geometric transforms applied to the records of one ingestion call.
//!
//! Transform keywords follow the file path on the command line and are handled
//! strictly left to right. Each keyword is parsed, checked and applied before
//! the next one is looked at, so an invalid keyword late in the list fails the
//! call after earlier transforms already moved the batch. Nothing reaches the
//! store in that case.
//!
//! | keyword  | args        | effect |
//! |----------|-------------|--------|
//! | `origin` | x y z       | set the reference point |
//! | `trans`  | dx dy dz    | move points and origin by d |
//! | `atrans` | ax ay az    | move origin to a, points by a - origin |
//! | `ftrans` | fx fy fz    | `atrans` to a fractional box position |
//! | `scale`  | sx sy sz    | scale points about origin |
//! | `rotate` | θ ax ay az  | rotate points about origin by θ radians around the axis |
//! | `invert` |             | reverse element winding |
//!
//! In 2-D the third axis is never written by `scale` or `rotate`, so it stays
//! exactly zero.

use crate::config::{ExecMode, ReadSurfConfig};
use crate::error::SurfError;
use crate::geometry::{Dimension, Domain, Point, SurfBatch};
use anyhow::Result;
use nalgebra::{Matrix3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One parsed transform keyword with its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    Origin([f64; 3]),
    Trans([f64; 3]),
    Atrans([f64; 3]),
    Ftrans([f64; 3]),
    Scale([f64; 3]),
    Rotate { theta: f64, axis: [f64; 3] },
    Invert,
}

impl Transform {
    pub fn keyword(&self) -> &'static str {
        match self {
            Transform::Origin(_) => "origin",
            Transform::Trans(_) => "trans",
            Transform::Atrans(_) => "atrans",
            Transform::Ftrans(_) => "ftrans",
            Transform::Scale(_) => "scale",
            Transform::Rotate { .. } => "rotate",
            Transform::Invert => "invert",
        }
    }

    /// Reject arguments that are not allowed for this dimension.
    fn check(&self, dimension: Dimension) -> Result<()> {
        let flat = dimension == Dimension::Two;
        let bad_2d = match *self {
            Transform::Origin(v) | Transform::Trans(v) | Transform::Atrans(v) => {
                flat && v[2] != 0.0
            }
            Transform::Ftrans(f) => flat && f[2] != 0.5,
            Transform::Scale(s) => flat && s[2] != 1.0,
            Transform::Rotate { axis, .. } => flat && axis != [0.0, 0.0, 1.0],
            Transform::Invert => false,
        };
        if bad_2d {
            return Err(SurfError::Invalid2dTransform {
                keyword: self.keyword(),
            }
            .into());
        }
        if let Transform::Rotate { axis, .. } = *self
            && axis == [0.0; 3]
        {
            return Err(SurfError::ZeroRotationAxis.into());
        }
        Ok(())
    }
}

/// Left-to-right parser over transform tokens. Each item is checked for the
/// dimension as it is produced.
pub struct TransformArgs<'a, S> {
    args: &'a [S],
    pos: usize,
    dimension: Dimension,
}

impl<'a, S: AsRef<str>> TransformArgs<'a, S> {
    pub fn new(args: &'a [S], dimension: Dimension) -> Self {
        Self {
            args,
            pos: 0,
            dimension,
        }
    }

    fn numbers<const N: usize>(&self, keyword: &str) -> Result<[f64; N]> {
        let start = self.pos + 1;
        if start + N > self.args.len() {
            return Err(SurfError::InvalidCommand {
                detail: format!("{keyword} expects {N} arguments"),
            }
            .into());
        }
        let mut out = [0.0; N];
        for (slot, arg) in out.iter_mut().zip(&self.args[start..start + N]) {
            let arg = arg.as_ref();
            *slot = arg.parse().map_err(|_| SurfError::InvalidCommand {
                detail: format!("{keyword} argument '{arg}' is not a number"),
            })?;
        }
        Ok(out)
    }

    fn parse_next(&mut self) -> Result<Transform> {
        let args = self.args;
        let keyword = args[self.pos].as_ref();
        let (op, consumed) = match keyword {
            "origin" => (Transform::Origin(self.numbers::<3>(keyword)?), 4),
            "trans" => (Transform::Trans(self.numbers::<3>(keyword)?), 4),
            "atrans" => (Transform::Atrans(self.numbers::<3>(keyword)?), 4),
            "ftrans" => (Transform::Ftrans(self.numbers::<3>(keyword)?), 4),
            "scale" => (Transform::Scale(self.numbers::<3>(keyword)?), 4),
            "rotate" => {
                let [theta, ax, ay, az] = self.numbers::<4>(keyword)?;
                (
                    Transform::Rotate {
                        theta,
                        axis: [ax, ay, az],
                    },
                    5,
                )
            }
            "invert" => (Transform::Invert, 1),
            other => {
                return Err(SurfError::InvalidCommand {
                    detail: format!("unknown keyword '{other}'"),
                }
                .into());
            }
        };
        op.check(self.dimension)?;
        self.pos += consumed;
        Ok(op)
    }
}

impl<S: AsRef<str>> Iterator for TransformArgs<'_, S> {
    type Item = Result<Transform>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.args.len() {
            return None;
        }
        let item = self.parse_next();
        if item.is_err() {
            // stop after the first error
            self.pos = self.args.len();
        }
        Some(item)
    }
}

/// Rotation by `theta` radians around `axis` (normalized here), built through
/// a unit quaternion.
pub fn rotation_matrix(theta: f64, axis: [f64; 3]) -> Matrix3<f64> {
    let axis = Unit::new_normalize(Vector3::from(axis));
    UnitQuaternion::from_axis_angle(&axis, theta)
        .to_rotation_matrix()
        .into_inner()
}

/// Stateful transform applier for one ingestion call.
pub struct TransformPipeline<'a> {
    origin: [f64; 3],
    domain: &'a Domain,
    mode: ExecMode,
    parallel_threshold: usize,
}

impl<'a> TransformPipeline<'a> {
    /// A pipeline with the origin at zero.
    pub fn new(domain: &'a Domain, config: &ReadSurfConfig) -> Self {
        Self {
            origin: [0.0; 3],
            domain,
            mode: config.exec_mode,
            parallel_threshold: config.parallel_threshold,
        }
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// Parse and apply every transform in `args`, in order, and return them.
    ///
    /// Stops at the first bad keyword; transforms before it have already been
    /// applied to `batch`.
    pub fn run<S: AsRef<str>>(
        &mut self,
        args: &[S],
        batch: &mut SurfBatch,
    ) -> Result<Vec<Transform>> {
        let mut applied = Vec::new();
        for op in TransformArgs::new(args, self.domain.dimension) {
            let op = op?;
            self.apply(&op, batch);
            applied.push(op);
        }
        Ok(applied)
    }

    /// Apply one already-checked transform.
    pub fn apply(&mut self, op: &Transform, batch: &mut SurfBatch) {
        debug!(keyword = op.keyword(), ?op, "applying surf transform");
        match *op {
            Transform::Origin(o) => self.origin = o,
            Transform::Trans(d) => {
                for (o, dv) in self.origin.iter_mut().zip(d) {
                    *o += dv;
                }
                self.translate(d, &mut batch.points);
            }
            Transform::Atrans(a) => self.move_origin_to(a, &mut batch.points),
            Transform::Ftrans(f) => {
                let a = self.domain.fractional(f);
                self.move_origin_to(a, &mut batch.points);
            }
            Transform::Scale(s) => {
                let origin = self.origin;
                let axes = self.axes();
                self.for_each_point(&mut batch.points, move |p| {
                    for k in 0..axes {
                        p.x[k] = s[k] * (p.x[k] - origin[k]) + origin[k];
                    }
                });
            }
            Transform::Rotate { theta, axis } => {
                let origin = self.origin;
                let axes = self.axes();
                let rot = rotation_matrix(theta, axis);
                self.for_each_point(&mut batch.points, move |p| {
                    let d = Vector3::from(p.x) - Vector3::from(origin);
                    let dnew = rot * d;
                    for k in 0..axes {
                        p.x[k] = dnew[k] + origin[k];
                    }
                });
            }
            Transform::Invert => match self.domain.dimension {
                Dimension::Two => {
                    for line in &mut batch.lines {
                        std::mem::swap(&mut line.p1, &mut line.p2);
                    }
                }
                Dimension::Three => {
                    for tri in &mut batch.tris {
                        std::mem::swap(&mut tri.p2, &mut tri.p3);
                    }
                }
            },
        }
    }

    /// Axes that scale and rotate are allowed to write.
    fn axes(&self) -> usize {
        self.domain.dimension.as_usize()
    }

    fn move_origin_to(&mut self, a: [f64; 3], points: &mut [Point]) {
        let d = [a[0] - self.origin[0], a[1] - self.origin[1], a[2] - self.origin[2]];
        self.origin = a;
        self.translate(d, points);
    }

    fn translate(&self, d: [f64; 3], points: &mut [Point]) {
        self.for_each_point(points, move |p| {
            p.x[0] += d[0];
            p.x[1] += d[1];
            p.x[2] += d[2];
        });
    }

    fn for_each_point<F>(&self, points: &mut [Point], f: F)
    where
        F: Fn(&mut Point) + Send + Sync,
    {
        #[cfg(feature = "parallel")]
        {
            if self.mode == ExecMode::Parallel && points.len() >= self.parallel_threshold {
                use rayon::prelude::*;
                points.par_iter_mut().for_each(f);
                return;
            }
        }
        points.iter_mut().for_each(f);
    }
}
