//! Pluggable decompression for surface files.
//!
//! Compressed input is selected purely by the path suffix, never by peeking at
//! the content: a plain-text title line may legitimately begin with bytes that
//! look like a codec signature.
//!
//! ## Built-in Codecs
//!
//! When enabled via feature flags, the following codecs are available:
//! - **Gzip** (`.gz`, `.gzip`) - via `flate2` (feature: `compression-gzip`)
//! - **Zstd** (`.zst`, `.zstd`) - via `zstd` (feature: `compression-zstd`)
//! - **Bzip2** (`.bz2`, `.bzip2`) - via `bzip2` (feature: `compression-bzip2`)
//! - **Xz** (`.xz`) - via `xz2` (feature: `compression-xz`)
//!
//! ## Custom Codecs
//! ```
//! use surfread::io::compression::{register_codec, CompressionCodec};
//! use std::io::Read;
//! use std::sync::Arc;
//!
//! struct Identity;
//!
//! impl CompressionCodec for Identity {
//!     fn name(&self) -> &str { "identity" }
//!     fn extensions(&self) -> &[&str] { &[".raw"] }
//!     fn wrap_reader_dyn(&self, r: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
//!         Ok(r)
//!     }
//! }
//!
//! register_codec(Arc::new(Identity));
//! ```

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Global codec registry.
static CODEC_REGISTRY: RwLock<Option<Vec<Arc<dyn CompressionCodec>>>> = RwLock::new(None);

fn init_registry() -> Vec<Arc<dyn CompressionCodec>> {
    vec![
        #[cfg(feature = "compression-gzip")]
        Arc::new(GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Arc::new(ZstdCodec),
        #[cfg(feature = "compression-bzip2")]
        Arc::new(Bzip2Codec),
        #[cfg(feature = "compression-xz")]
        Arc::new(XzCodec),
    ]
}

fn get_registry() -> Vec<Arc<dyn CompressionCodec>> {
    let mut lock = CODEC_REGISTRY.write().unwrap_or_else(|e| e.into_inner());
    lock.get_or_insert_with(init_registry).clone()
}

/// Register a custom decompression codec globally.
///
/// Codecs registered later are consulted after the built-in ones.
pub fn register_codec(codec: Arc<dyn CompressionCodec>) {
    let mut lock = CODEC_REGISTRY.write().unwrap_or_else(|e| e.into_inner());
    lock.get_or_insert_with(init_registry).push(codec);
}

/// A decompression algorithm selected by file suffix.
///
/// Implementations must be `Send + Sync` as they live in a global registry.
pub trait CompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g., "gzip").
    fn name(&self) -> &str;

    /// Suffixes associated with this codec, lowercase with the leading dot.
    fn extensions(&self) -> &[&str];

    /// Wrap a reader with decompression.
    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>>;
}

/// The first registered codec whose suffix ends the path (case-insensitive).
pub fn detect_from_extension(path: impl AsRef<Path>) -> Option<Arc<dyn CompressionCodec>> {
    let path_str = path.as_ref().to_string_lossy().to_lowercase();
    get_registry()
        .into_iter()
        .find(|codec| codec.extensions().iter().any(|ext| path_str.ends_with(ext)))
}

/// Wrap `reader` with the codec matching `path_hint`, or return it unchanged.
pub fn decompressing_reader<R: Read + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read>> {
    match detect_from_extension(&path_hint) {
        Some(codec) => codec
            .wrap_reader_dyn(Box::new(reader))
            .with_context(|| format!("wrap reader with {} codec", codec.name())),
        None => Ok(Box::new(reader)),
    }
}

// ============================================================================
// Built-in Codec Implementations
// ============================================================================

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        use flate2::read::MultiGzDecoder;
        Ok(Box::new(MultiGzDecoder::new(reader)))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as Box<dyn Read>)
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl CompressionCodec for Bzip2Codec {
    fn name(&self) -> &str {
        "bzip2"
    }

    fn extensions(&self) -> &[&str] {
        &[".bz2", ".bzip2"]
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        use bzip2::read::BzDecoder;
        Ok(Box::new(BzDecoder::new(reader)))
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &str {
        "xz"
    }

    fn extensions(&self) -> &[&str] {
        &[".xz"]
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        use xz2::read::XzDecoder;
        Ok(Box::new(XzDecoder::new(reader)))
    }
}
