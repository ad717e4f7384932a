//! Fatal conditions raised while reading a surface file.
//!
//! Every variant aborts the whole ingestion call. Functions in this crate return
//! [`anyhow::Result`] and raise these values through `anyhow`, so callers can
//! recover the typed condition with `err.downcast_ref::<SurfError>()`.

use std::fmt;

/// Which ranks are able to observe a fatal condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalScope {
    /// Every rank reaches the same condition from broadcast data.
    Group,
    /// Only the leader can see it (file system, end of stream). The surrounding
    /// runtime must still tear the whole group down.
    Leader,
}

/// A fatal error of a `read_surf` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfError {
    /// No spatial partition exists yet.
    GridNotDefined,
    /// Fewer than two command arguments, or an unusable argument list.
    IllegalCommand,
    /// The leader could not open the file.
    CannotOpen { path: String, reason: String },
    /// The path asks for gzip but the gzip codec is not compiled in.
    GzipUnsupported { path: String },
    /// Reading from the open file failed.
    ReadFailed { line: usize, reason: String },
    /// The stream ended where more data was required.
    UnexpectedEof { what: &'static str },
    /// The header did not declare a point count.
    MissingPoints,
    /// The header did not declare the element count required by the dimension.
    MissingElements { section: &'static str },
    /// A header count that is negative.
    InvalidCount { line: String },
    /// A `lines` count in a 3-D run or a `tris` count in a 2-D run.
    WrongDimension { section: &'static str, dimension: usize },
    /// A section keyword did not match the expected name.
    SectionMismatch { expected: &'static str, found: String },
    /// Wrong token count or an unparsable field in a data line.
    IncorrectFormat { kind: &'static str, line: String },
    /// An element references a point outside the batch or repeats a point.
    InvalidIndex { kind: &'static str, detail: String },
    /// Unknown transform keyword, missing arguments or an unparsable argument.
    InvalidCommand { detail: String },
    /// A transform that is not allowed in a 2-D run.
    Invalid2dTransform { keyword: &'static str },
    /// A rotation axis of zero length.
    ZeroRotationAxis,
    /// Reserving storage for the new records failed.
    Allocation { what: &'static str, count: usize },
    /// The collective group lost a member or two ranks disagreed on the protocol.
    Collective { detail: String },
    /// An invalid configuration value.
    Config { detail: String },
}

impl SurfError {
    /// The set of ranks that detect this condition.
    pub fn scope(&self) -> FatalScope {
        match self {
            SurfError::CannotOpen { .. }
            | SurfError::GzipUnsupported { .. }
            | SurfError::ReadFailed { .. }
            | SurfError::UnexpectedEof { .. } => FatalScope::Leader,
            _ => FatalScope::Group,
        }
    }
}

impl fmt::Display for SurfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfError::GridNotDefined => write!(f, "Cannot read_surf before grid is defined"),
            SurfError::IllegalCommand => write!(f, "Illegal read_surf command"),
            SurfError::CannotOpen { path, reason } => {
                write!(f, "Cannot open file {path}: {reason}")
            }
            SurfError::GzipUnsupported { path } => write!(f, "Cannot open gzipped file {path}"),
            SurfError::ReadFailed { line, reason } => {
                write!(f, "Failed reading line {line} of surf file: {reason}")
            }
            SurfError::UnexpectedEof { what } => write!(f, "Unexpected end of {what}"),
            SurfError::MissingPoints => write!(f, "Surf file does not contain points"),
            SurfError::MissingElements { section } => {
                write!(f, "Surf file does not contain {section}")
            }
            SurfError::InvalidCount { line } => {
                write!(f, "Invalid count in surf file header: {}", line.trim_end())
            }
            SurfError::WrongDimension { section, dimension } => write!(
                f,
                "Surf file cannot contain {section} for {dimension}d simulation"
            ),
            SurfError::SectionMismatch { expected, found } => write!(
                f,
                "Surf file cannot parse {expected} section (found '{found}')"
            ),
            SurfError::IncorrectFormat { kind, line } => {
                write!(f, "Incorrect {kind} format in surf file: {}", line.trim_end())
            }
            SurfError::InvalidIndex { kind, detail } => {
                write!(f, "Invalid point index in {kind}: {detail}")
            }
            SurfError::InvalidCommand { detail } => {
                write!(f, "Invalid read_surf command: {detail}")
            }
            SurfError::Invalid2dTransform { keyword } => write!(
                f,
                "Invalid read_surf geometry transformation for 2d simulation ({keyword})"
            ),
            SurfError::ZeroRotationAxis => {
                write!(f, "Invalid read_surf geometry transformation (zero rotation axis)")
            }
            SurfError::Allocation { what, count } => {
                write!(f, "Failed to allocate {count} new {what}")
            }
            SurfError::Collective { detail } => write!(f, "Collective broadcast failed: {detail}"),
            SurfError::Config { detail } => write!(f, "Invalid read_surf configuration: {detail}"),
        }
    }
}

impl std::error::Error for SurfError {}

/// Find the [`SurfError`] carried by an `anyhow` error chain, if any.
pub fn surf_error(err: &anyhow::Error) -> Option<&SurfError> {
    err.chain().find_map(|e| e.downcast_ref::<SurfError>())
}
