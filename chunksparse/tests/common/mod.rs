#![allow(dead_code)]

use chunksparse::{ChunkConfig, CompressedMatrix, MatrixFormat, Shape};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Row-major dense reference matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Dense {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Dense {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn from_entries(rows: usize, cols: usize, entries: &[(usize, usize, f64)]) -> Self {
        let mut dense = Self::zeros(rows, cols);
        for &(r, c, v) in entries {
            dense.set(r, c, v);
        }
        dense
    }

    pub fn random(seed: u64, rows: usize, cols: usize, density: f64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut dense = Self::zeros(rows, cols);
        for value in dense.data.iter_mut() {
            if rng.gen_bool(density) {
                *value = rng.gen_range(1..1000) as f64;
            }
        }
        dense
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// Cross product of row and column positions, in the given order
    pub fn select(&self, rows: &[usize], cols: &[usize]) -> Dense {
        let mut out = Dense::zeros(rows.len(), cols.len());
        for (r, &row) in rows.iter().enumerate() {
            for (c, &col) in cols.iter().enumerate() {
                out.set(r, c, self.get(row, col));
            }
        }
        out
    }

    pub fn transposed(&self) -> Dense {
        let mut out = Dense::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.set(c, r, self.get(r, c));
            }
        }
        out
    }

    /// Stack `other` below (CSR) or to the right of (CSC) this matrix
    pub fn stacked(&self, other: &Dense, format: MatrixFormat) -> Dense {
        match format {
            MatrixFormat::Csr => {
                let mut data = self.data.clone();
                data.extend_from_slice(&other.data);
                Dense {
                    rows: self.rows + other.rows,
                    cols: self.cols,
                    data,
                }
            }
            MatrixFormat::Csc => self
                .transposed()
                .stacked(&other.transposed(), MatrixFormat::Csr)
                .transposed(),
        }
    }

    /// Compress into the given layout
    pub fn compress(&self, format: MatrixFormat, config: ChunkConfig) -> CompressedMatrix<f64> {
        let shape = Shape::new(self.rows, self.cols);
        let (major_dim, minor_dim) = (shape.major(format), shape.minor(format));
        let mut values = Vec::new();
        let mut indices = Vec::new();
        let mut indptr = vec![0u64];

        for major in 0..major_dim {
            for minor in 0..minor_dim {
                let (row, col) = Shape::to_major_minor(format, major, minor);
                let value = self.get(row, col);
                if value != 0.0 {
                    values.push(value);
                    indices.push(minor as u64);
                }
            }
            indptr.push(indices.len() as u64);
        }

        CompressedMatrix::from_parts(shape, format, values, indices, indptr, config).unwrap()
    }
}

/// Densify a compressed matrix for comparison
pub fn densify(matrix: &CompressedMatrix<f64>) -> Dense {
    Dense {
        rows: matrix.shape().rows,
        cols: matrix.shape().cols,
        data: matrix.to_dense().unwrap(),
    }
}

/// Small chunks so reads cross chunk boundaries
pub fn small_chunks() -> ChunkConfig {
    ChunkConfig::default().with_chunk_size(5).with_read_batch_len(8)
}

/// The 5x5 matrix used throughout the indexing tests
pub fn five_by_five() -> Dense {
    Dense::from_entries(5, 5, &[(0, 1, 5.0), (2, 0, 2.0), (2, 3, 1.0), (3, 4, 9.0)])
}

pub const FORMATS: [MatrixFormat; 2] = [MatrixFormat::Csr, MatrixFormat::Csc];
