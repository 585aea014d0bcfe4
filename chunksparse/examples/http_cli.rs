//! Inspect and slice a matrix saved with `persist::save` and served over HTTP

use chunksparse::{persist, AxisIndex, ChunkConfig};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, long_about = None)]
#[command(about = "Query a saved sparse matrix over HTTP range requests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select part of the remote matrix
    Query {
        /// Base URL of the saved matrix directory
        url: String,

        /// Row expression: "3", "2:5", ":" or "[4,0]"
        #[arg(long, default_value = ":", value_parser = parse_axis)]
        rows: AxisIndex,

        /// Column expression, same forms as rows
        #[arg(long, default_value = ":", value_parser = parse_axis)]
        cols: AxisIndex,

        /// Print the dense result
        #[arg(long)]
        dense: bool,
    },
    /// Show remote matrix info
    Info {
        /// Base URL of the saved matrix directory
        url: String,
    },
}

fn parse_axis(text: &str) -> Result<AxisIndex, String> {
    text.parse().map_err(|err: chunksparse::CoreError| err.to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let start_time = std::time::Instant::now();

    match cli.command {
        Commands::Query { url, rows, cols, dense } => {
            let matrix = persist::load_remote::<f64>(&url, ChunkConfig::default())?;
            let result = matrix.slice(rows, cols)?;
            println!("Result: {} {}, {} stored", result.format(), result.shape(), result.nnz());

            if dense {
                let values = result.to_dense()?;
                for row in values.chunks(result.shape().cols.max(1)) {
                    let line: Vec<String> = row.iter().map(|v| format!("{v:8.3}")).collect();
                    println!("{}", line.join(" "));
                }
            }
        }
        Commands::Info { url } => {
            let matrix = persist::load_remote::<f64>(&url, ChunkConfig::default())?;
            println!("Matrix Information:");
            println!("   Dimensions: {}", matrix.shape());
            println!("   Non-zeros: {}", matrix.nnz());
            println!("   Format: {}", matrix.format());
            println!("   Data type: {}", matrix.data_type());
            println!("   State: {:?}", matrix.state());
        }
    }

    println!("\nCompleted in {:.3}ms", start_time.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}
