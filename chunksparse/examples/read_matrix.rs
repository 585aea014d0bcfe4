//! Map a saved matrix and time lookups and slices against it

use chunksparse::{persist, ChunkConfig, Selection};
use std::time::Instant;

fn main() -> chunksparse::Result<()> {
    let dir = std::env::args().nth(1).unwrap_or_else(|| "example_matrix".to_string());
    if !std::path::Path::new(&dir).exists() {
        println!("Directory '{dir}' not found!");
        println!("   Run 'cargo run --example write_matrix' first");
        return Ok(());
    }

    let start = Instant::now();
    let matrix = persist::load::<f64, _>(&dir, ChunkConfig::default())?;
    println!("Mapped '{dir}' in {:.3}ms", start.elapsed().as_secs_f64() * 1000.0);

    let shape = matrix.shape();
    println!("\nMatrix Information:");
    println!("   Dimensions: {shape}");
    println!("   Non-zeros: {}", matrix.nnz());
    println!("   Format: {}", matrix.format());
    println!("   Data type: {}", matrix.data_type());
    println!("   Density: {:.6}%", matrix.density() * 100.0);

    println!("\nElement lookups:");
    for (row, col) in [(0, 0), (shape.rows / 2, shape.cols / 3), (shape.rows - 1, shape.cols - 1)] {
        let start = Instant::now();
        let value = matrix.lookup(row, col)?;
        println!(
            "   matrix[{row}, {col}] = {value:.4} in {:.3}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    println!("\nSlices:");
    let rows = shape.rows / 4..shape.rows / 4 + 1000;
    let start = Instant::now();
    let block = matrix.slice(rows.clone(), ..)?;
    println!(
        "   rows {rows:?}: {} stored in {:.3}ms",
        block.nnz(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    let start = Instant::now();
    let picked = matrix.slice(vec![shape.rows - 1, 0, 42], 100..2_000)?;
    println!(
        "   rows [last, 0, 42] x cols 100..2000: {} stored in {:.3}ms",
        picked.nnz(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    let start = Instant::now();
    let column = matrix.slice(.., 5usize)?;
    println!(
        "   column 5: {} stored in {:.3}ms",
        column.nnz(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    if let Selection::Matrix(sub) = matrix.get(0usize, vec![3, 1, 2])? {
        println!("   row 0 at cols [3, 1, 2]: {:?}", sub.to_dense()?);
    }
    Ok(())
}
