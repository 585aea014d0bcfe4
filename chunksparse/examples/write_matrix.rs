//! Build a random sparse matrix and save it as a directory of arrays

use chunksparse::{persist, ChunkConfig, CompressedMatrix, MatrixFormat, Shape};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

fn main() -> chunksparse::Result<()> {
    let dir = std::env::args().nth(1).unwrap_or_else(|| "example_matrix".to_string());

    let nrows = 200_000;
    let ncols = 50_000;
    let per_row = 40;
    println!("Building {nrows} x {ncols} CSR matrix, {per_row} stored per row...");

    let start = Instant::now();
    let mut rng = StdRng::seed_from_u64(7);
    let mut values = Vec::with_capacity(nrows * per_row);
    let mut indices = Vec::with_capacity(nrows * per_row);
    let mut indptr = Vec::with_capacity(nrows + 1);
    indptr.push(0u64);

    for _ in 0..nrows {
        let mut cols: Vec<u64> = (0..per_row).map(|_| rng.gen_range(0..ncols as u64)).collect();
        cols.sort_unstable();
        cols.dedup();
        for col in cols {
            values.push(rng.gen_range(-1.0..1.0f64));
            indices.push(col);
        }
        indptr.push(indices.len() as u64);
    }
    println!("Built triple in {:?}", start.elapsed());

    let config = ChunkConfig::default().with_chunk_size(1 << 20);
    let mut matrix = CompressedMatrix::from_parts(
        Shape::new(nrows, ncols),
        MatrixFormat::Csr,
        values,
        indices,
        indptr,
        config,
    )?;
    println!(
        "Matrix: {} stored, density {:.6}, {} bytes in {} chunks",
        matrix.nnz(),
        matrix.density(),
        matrix.nbytes(),
        matrix.nchunks()
    );

    let start = Instant::now();
    persist::save(&mut matrix, &dir)?;
    println!("Saved to '{dir}' in {:?} (state: {:?})", start.elapsed(), matrix.state());
    println!("\nRun 'cargo run --example read_matrix -- {dir}' to read it back!");
    Ok(())
}
