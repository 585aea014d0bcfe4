#![cfg(all(feature = "serde", feature = "mmap"))]

mod common;

use chunksparse::persist::{self, Manifest};
use chunksparse::{ChunkConfig, CompressedMatrix, DataType, Error, MatrixFormat, MatrixState, Shape};
use common::{densify, five_by_five, small_chunks, Dense, FORMATS};

#[test]
fn test_save_seals_and_load_round_trips() {
    let dense = Dense::random(30, 12, 9, 0.3);
    for format in FORMATS {
        let dir = tempfile::tempdir().unwrap();
        let mut m = dense.compress(format, small_chunks());

        persist::save(&mut m, dir.path()).unwrap();
        assert_eq!(m.state(), MatrixState::Frozen);

        let manifest: Manifest = persist::read_manifest(dir.path()).unwrap();
        assert_eq!(manifest.metadata.shape, Shape::new(12, 9));
        assert_eq!(manifest.metadata.format, format);
        assert_eq!(manifest.metadata.data_type, DataType::F64);
        assert_eq!(manifest.nnz, m.nnz());

        let loaded = persist::load::<f64, _>(dir.path(), small_chunks()).unwrap();
        assert_eq!(loaded.state(), MatrixState::Growing);
        assert!(loaded.content_eq(&m).unwrap());
        assert_eq!(densify(&loaded.slice(2..7, vec![8, 0]).unwrap()), dense.select(&[2, 3, 4, 5, 6], &[8, 0]));
    }
}

#[test]
fn test_append_and_save_in_place() {
    let dense = five_by_five();
    for format in FORMATS {
        let dir = tempfile::tempdir().unwrap();
        let mut m = dense.compress(format, ChunkConfig::default());
        persist::save(&mut m, dir.path()).unwrap();

        let mut loaded = persist::load::<f64, _>(dir.path(), small_chunks()).unwrap();
        assert_eq!(loaded.backing_dir(), Some(dir.path()));
        loaded.append(&m).unwrap();
        let expected = dense.stacked(&dense, format);

        // the manifest follows the arrays
        let manifest = persist::read_manifest(dir.path()).unwrap();
        assert_eq!(manifest.metadata.shape, loaded.shape());
        assert_eq!(manifest.nnz, 8);
        let reloaded = persist::load::<f64, _>(dir.path(), ChunkConfig::default()).unwrap();
        assert_eq!(densify(&reloaded), expected);

        // saving over the files the matrix is mapped from
        persist::save(&mut loaded, dir.path()).unwrap();
        assert_eq!(loaded.state(), MatrixState::Frozen);
        assert_eq!(densify(&loaded), expected);
        assert_eq!(densify(&reloaded), expected);

        let saved = persist::load::<f64, _>(dir.path(), ChunkConfig::default()).unwrap();
        assert!(saved.content_eq(&loaded).unwrap());
        assert!(!dir.path().join("values.bin.tmp").exists());
        assert!(!dir.path().join("meta.json.tmp").exists());
    }
}

#[test]
fn test_corrupt_pointer_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut m = five_by_five().compress(MatrixFormat::Csr, ChunkConfig::default());
    persist::save(&mut m, dir.path()).unwrap();

    // row 1 now ends before it starts
    let pointers: Vec<u8> = [0u64, 3, 1, 3, 4, 4].iter().flat_map(|p| p.to_ne_bytes()).collect();
    std::fs::write(dir.path().join(persist::INDPTR_FILE), pointers).unwrap();

    let loaded = persist::load::<f64, _>(dir.path(), ChunkConfig::default()).unwrap();
    assert!(matches!(loaded.slice(.., 0..3), Err(Error::NotCanonical(_))));
    assert!(matches!(loaded.lookup(1, 0), Err(Error::NotCanonical(_))));
    assert_eq!(loaded.lookup(3, 4).unwrap(), 9.0);
}

#[test]
fn test_load_rejects_other_element_type() {
    let dir = tempfile::tempdir().unwrap();
    let mut m = CompressedMatrix::from_parts(
        Shape::new(2, 2),
        MatrixFormat::Csc,
        vec![4i32, 5],
        vec![0, 1],
        vec![0, 1, 2],
        ChunkConfig::default(),
    )
    .unwrap();
    persist::save(&mut m, dir.path()).unwrap();

    assert!(matches!(
        persist::load::<f32, _>(dir.path(), ChunkConfig::default()),
        Err(Error::DataTypeMismatch { stored: DataType::I32, requested: DataType::F32 })
    ));
    let loaded = persist::load::<i32, _>(dir.path(), ChunkConfig::default()).unwrap();
    assert_eq!(loaded.lookup(1, 1).unwrap(), 5);
}

#[test]
fn test_load_missing_directory_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        persist::load::<f64, _>(dir.path().join("absent"), ChunkConfig::default()),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_saved_empty_matrix() {
    let dir = tempfile::tempdir().unwrap();
    let mut m = Dense::zeros(3, 4).compress(MatrixFormat::Csr, ChunkConfig::default());
    persist::save(&mut m, dir.path()).unwrap();

    let loaded = persist::load::<f64, _>(dir.path(), ChunkConfig::default()).unwrap();
    assert_eq!(loaded.nnz(), 0);
    assert_eq!(loaded.lookup(2, 3).unwrap(), 0.0);
    assert_eq!(loaded.slice(.., 1..3).unwrap().shape(), Shape::new(3, 2));
}
