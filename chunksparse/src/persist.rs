//! Saving and loading matrices as a directory of flat arrays
//!
//! Layout of a saved matrix:
//!
//! ```text
//! <dir>/meta.json     shape, element type, layout, version, nnz
//! <dir>/values.bin    nnz elements
//! <dir>/indices.bin   nnz u64 minor indices
//! <dir>/indptr.bin    major_dim + 1 u64 pointers
//! ```
//!
//! Arrays are raw native little-endian element bytes with no header, so a
//! loaded array can be mapped and read in place. Every file is written to a
//! sibling `.tmp` and renamed into place, so saving over the directory a
//! matrix was loaded from never truncates a file that is still mapped.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chunksparse_core::{MatrixElement, MatrixMetadata};
use log::info;
use serde::{Deserialize, Serialize};

use crate::chunked_backend::{ChunkConfig, ChunkedArray};
use crate::matrix::CompressedMatrix;
use crate::{Error, Result};

pub const META_FILE: &str = "meta.json";
pub const VALUES_FILE: &str = "values.bin";
pub const INDICES_FILE: &str = "indices.bin";
pub const INDPTR_FILE: &str = "indptr.bin";

/// Contents of `meta.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(flatten)]
    pub metadata: MatrixMetadata,
    pub nnz: usize,
}

impl Manifest {
    fn check<T: MatrixElement>(&self) -> Result<()> {
        if !self.metadata.is_valid() {
            return Err(Error::Storage(format!(
                "unsupported layout version {}",
                self.metadata.version
            )));
        }
        if self.metadata.data_type != T::data_type() {
            return Err(Error::DataTypeMismatch {
                stored: self.metadata.data_type,
                requested: T::data_type(),
            });
        }
        Ok(())
    }

    fn major_dim(&self) -> usize {
        self.metadata.shape.major(self.metadata.format)
    }
}

/// Write a file through a temporary sibling and rename it over `path`
fn replace_file<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let written = File::create(&tmp).map_err(Error::from).and_then(|file| {
        let mut writer = BufWriter::new(file);
        fill(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    });
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Stream `len` elements of `array` to `path` in batches
fn write_array<E: MatrixElement>(
    array: &dyn ChunkedArray<E>,
    len: usize,
    path: &Path,
    batch: usize,
) -> Result<()> {
    replace_file(path, |writer| {
        let mut start = 0;
        while start < len {
            let stop = (start + batch).min(len);
            writer.write_all(bytemuck::cast_slice(&array.range_read(start, stop)?))?;
            start = stop;
        }
        Ok(())
    })
}

/// Replace `meta.json` under `dir`
pub(crate) fn write_manifest(dir: &Path, manifest: &Manifest) -> Result<()> {
    replace_file(&dir.join(META_FILE), |writer| {
        serde_json::to_writer_pretty(&mut *writer, manifest)?;
        Ok(())
    })
}

/// Write `matrix` under `dir` and seal it
///
/// The directory is created if needed; existing files are replaced. The
/// directory may be the one `matrix` was loaded from.
pub fn save<T: MatrixElement, P: AsRef<Path>>(matrix: &mut CompressedMatrix<T>, dir: P) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let major_dim = matrix.major_dim();
    let indptr = matrix.indptr().range_read(major_dim, major_dim + 1)?;
    let nnz = indptr.first().copied().unwrap_or(0) as usize;
    let batch = matrix.config().read_batch_len.max(1);

    write_array(&**matrix.values(), nnz, &dir.join(VALUES_FILE), batch)?;
    write_array(&**matrix.indices(), nnz, &dir.join(INDICES_FILE), batch)?;
    write_array(&**matrix.indptr(), major_dim + 1, &dir.join(INDPTR_FILE), batch)?;

    let manifest = Manifest {
        metadata: MatrixMetadata::new(matrix.shape(), T::data_type(), matrix.format()),
        nnz,
    };
    write_manifest(dir, &manifest)?;

    matrix.seal();
    info!(
        "saved {} {} matrix ({} stored) to {}",
        matrix.format(),
        matrix.shape(),
        nnz,
        dir.display()
    );
    Ok(())
}

/// Read `meta.json` from a saved directory
pub fn read_manifest<P: AsRef<Path>>(dir: P) -> Result<Manifest> {
    let bytes = fs::read(dir.as_ref().join(META_FILE))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Map a saved matrix from `dir`
///
/// Only the metadata is read eagerly. The loaded matrix accepts appends,
/// which extend the files in place and rewrite `meta.json`.
#[cfg(feature = "mmap")]
pub fn load<T: MatrixElement, P: AsRef<Path>>(
    dir: P,
    config: ChunkConfig,
) -> Result<CompressedMatrix<T>> {
    use std::sync::Arc;

    use crate::matrix::Canonical;
    use crate::mmap_backend::MmapArray;

    let dir = dir.as_ref();
    let manifest = read_manifest(dir)?;
    manifest.check::<T>()?;

    let chunk_size = config.chunk_size();
    let values = MmapArray::<T>::open(dir.join(VALUES_FILE), chunk_size)?;
    if values.len() != manifest.nnz {
        return Err(Error::NotCanonical("values length differs from recorded nnz"));
    }

    let mut matrix = CompressedMatrix::from_arrays(
        manifest.metadata.shape,
        manifest.metadata.format,
        Arc::new(values),
        Arc::new(MmapArray::<u64>::open(dir.join(INDICES_FILE), chunk_size)?),
        Arc::new(MmapArray::<u64>::open(dir.join(INDPTR_FILE), chunk_size)?),
        config,
        Canonical::Trusted,
    )?;
    matrix.set_backing_dir(dir.to_path_buf());
    info!(
        "loaded {} {} matrix ({} stored) from {}",
        matrix.format(),
        matrix.shape(),
        matrix.nnz(),
        dir.display()
    );
    Ok(matrix)
}

/// Open a saved matrix served over HTTP under `base_url`
///
/// Arrays are fetched lazily with range requests. The result is frozen
/// since remote arrays cannot grow.
#[cfg(feature = "http")]
pub fn load_remote<T: MatrixElement>(base_url: &str, config: ChunkConfig) -> Result<CompressedMatrix<T>> {
    use std::sync::Arc;

    use reqwest::blocking::Client;

    use crate::http_backend::HttpArray;
    use crate::matrix::Canonical;

    let base = base_url.trim_end_matches('/');
    let url = |name: &str| format!("{base}/{name}");
    let client = Client::new();

    let body = client.get(url(META_FILE)).send()?.error_for_status()?.text()?;
    let manifest: Manifest = serde_json::from_str(&body)?;
    manifest.check::<T>()?;

    let nnz = manifest.nnz;
    let values = HttpArray::<T>::new(client.clone(), url(VALUES_FILE), nnz, &config);
    let indices = HttpArray::<u64>::new(client.clone(), url(INDICES_FILE), nnz, &config);
    let indptr = HttpArray::<u64>::new(client, url(INDPTR_FILE), manifest.major_dim() + 1, &config);

    let mut matrix = CompressedMatrix::from_arrays(
        manifest.metadata.shape,
        manifest.metadata.format,
        Arc::new(values),
        Arc::new(indices),
        Arc::new(indptr),
        config,
        Canonical::Trusted,
    )?;
    matrix.seal();
    info!("opened remote {} {} matrix at {}", matrix.format(), matrix.shape(), base);
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunksparse_core::{DataType, MatrixFormat, Shape};

    #[test]
    fn test_manifest_json_shape() {
        let manifest = Manifest {
            metadata: MatrixMetadata::new(Shape::new(4, 6), DataType::F32, MatrixFormat::Csc),
            nnz: 9,
        };
        let json: serde_json::Value = serde_json::to_value(manifest).unwrap();

        assert_eq!(json["shape"]["rows"], 4);
        assert_eq!(json["data_type"], "f32");
        assert_eq!(json["format"], "csc");
        assert_eq!(json["nnz"], 9);

        let back: Manifest = serde_json::from_value(json).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn test_manifest_rejects_wrong_type() {
        let manifest = Manifest {
            metadata: MatrixMetadata::new(Shape::new(1, 1), DataType::I64, MatrixFormat::Csr),
            nnz: 0,
        };
        assert!(manifest.check::<i64>().is_ok());
        assert!(matches!(
            manifest.check::<f64>(),
            Err(Error::DataTypeMismatch { stored: DataType::I64, requested: DataType::F64 })
        ));
    }
}
