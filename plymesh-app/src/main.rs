//! Plymesh Application
//!
//! Command-line inspector for PLY triangle meshes.
//!
//! Features:
//! - Full mesh extraction with polygon triangulation
//! - Header-only inspection
//! - Text or JSON reports

mod app;
mod errors;
mod summary;

use app::{AppBuilder, LoggingConfig, OutputFormat};
use clap::Parser;
use plymesh_data::MeshRequest;
use std::path::PathBuf;

/// Plymesh - decode a PLY file into a triangle mesh and report what it holds
#[derive(Parser, Debug)]
#[command(name = "plymesh")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the PLY file to load
    file: PathBuf,

    /// Skip vertex normals
    #[arg(long)]
    no_normals: bool,

    /// Skip texture coordinates
    #[arg(long)]
    no_uv: bool,

    /// Skip vertex colors
    #[arg(long)]
    no_color: bool,

    /// Fail instead of fanning polygons when faces precede vertices
    #[arg(long)]
    require_vertex_positions: bool,

    /// Only parse and print the header
    #[arg(long)]
    header: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn request(&self) -> MeshRequest {
        MeshRequest::default()
            .with_normals(!self.no_normals)
            .with_uv(!self.no_uv)
            .with_color(!self.no_color)
            .with_required_vertex_positions(self.require_vertex_positions)
    }

    fn output(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

fn main() {
    let args = Args::parse();

    let app = AppBuilder::new(&args.file)
        .with_request(args.request())
        .with_header_only(args.header)
        .with_output(args.output())
        .with_logging(LoggingConfig {
            level: args.log_level.clone(),
            enable_tracy: cfg!(feature = "tracy"),
        });

    if let Err(e) = app.run() {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
