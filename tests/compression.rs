use anyhow::Result;
use std::io::{Read, Write};
use std::sync::Arc;
use surfread::io::compression::{CompressionCodec, detect_from_extension, register_codec};
use surfread::testing::{StubGrid, sample_tetra_3d};
use surfread::*;

fn domain() -> Domain {
    Domain::new(Dimension::Three, [0.0; 3], [10.0; 3])
}

fn read_path(path: &std::path::Path) -> Result<GeometryStore> {
    let path = path.to_string_lossy().to_string();
    let mut store = GeometryStore::new();
    let d = domain();
    let args = ["s", path.as_str()];
    ReadSurf::new(&Solo, &d).command(&StubGrid::defined(), &mut store, &args, |_, _| {})?;
    Ok(store)
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_file_reads_like_plain() -> Result<()> {
    let plain = sample_tetra_3d().write_temp()?;
    let gz = sample_tetra_3d().write_temp_gz()?;
    assert_eq!(read_path(plain.path())?, read_path(gz.path())?);
    Ok(())
}

#[cfg(feature = "compression-zstd")]
#[test]
fn zstd_file_reads_like_plain() -> Result<()> {
    let text = sample_tetra_3d().render();
    let mut file = tempfile::Builder::new().suffix(".surf.zst").tempfile()?;
    file.write_all(&zstd::stream::encode_all(text.as_bytes(), 0)?)?;
    file.flush()?;

    let plain = sample_tetra_3d().write_temp()?;
    assert_eq!(read_path(plain.path())?, read_path(file.path())?);
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn suffix_match_ignores_case() {
    let codec = detect_from_extension("data.SURF.GZ");
    assert_eq!(codec.map(|c| c.name().to_string()).as_deref(), Some("gzip"));
    assert!(detect_from_extension("data.surf").is_none());
}

#[cfg(not(feature = "compression-gzip"))]
#[test]
fn gz_without_codec_is_leader_fatal() {
    let mut store = GeometryStore::new();
    let err = ReadSurf::new(&Solo, &domain())
        .command(&StubGrid::defined(), &mut store, &["s", "data.surf.gz"], |_, _| {})
        .unwrap_err();
    let e = surf_error(&err).expect("typed error");
    assert!(matches!(e, SurfError::GzipUnsupported { .. }));
    assert_eq!(e.scope(), FatalScope::Leader);
}

/// Drops a fixed three-byte preamble.
struct Preamble;

impl CompressionCodec for Preamble {
    fn name(&self) -> &str {
        "preamble"
    }

    fn extensions(&self) -> &[&str] {
        &[".pre"]
    }

    fn wrap_reader_dyn(&self, mut reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        let mut skip = [0u8; 3];
        reader.read_exact(&mut skip)?;
        Ok(reader)
    }
}

#[test]
fn custom_codec_is_used_for_its_suffix() -> Result<()> {
    register_codec(Arc::new(Preamble));

    let mut file = tempfile::Builder::new().suffix(".surf.pre").tempfile()?;
    write!(file, "XYZ{}", sample_tetra_3d().render())?;
    file.flush()?;

    let plain = sample_tetra_3d().write_temp()?;
    assert_eq!(read_path(plain.path())?, read_path(file.path())?);
    Ok(())
}
