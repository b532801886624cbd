//! Offline reference area tool.
//!
//! Validates GeoJSON area files and checks points (or addresses) against them.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geoprotec::center::representative_point;
use geoprotec::config::{api_key_from_env, Config};
use geoprotec::geocode::GeminiGeocoder;
use geoprotec::pip::{ReferenceArea, VerificationStatus};
use geoprotec::{contains, validate_with, AreaFeature, LonLat, ValidationOptions};

#[derive(Parser, Debug)]
#[command(name = "areacheck")]
#[command(about = "Validate reference areas and check points against them")]
struct Args {
    /// Enforce closed rings and coordinate ranges
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a GeoJSON area file
    Validate {
        file: PathBuf,
    },
    /// Check one point against an area
    Point {
        file: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
    },
    /// Check a CSV of points (`lon,lat` with optional `id`) against an area
    Batch {
        file: PathBuf,
        points: PathBuf,
    },
    /// Geocode an address and check it against an area
    Verify {
        file: PathBuf,
        #[arg(long)]
        address: String,
        /// TOML config with geocoder settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Deserialize)]
struct PointRow {
    #[serde(default)]
    id: Option<String>,
    lon: f64,
    lat: f64,
}

#[derive(Debug, Serialize)]
struct ResultRow {
    id: String,
    lon: f64,
    lat: f64,
    inside: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (stderr, stdout carries results)
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let options = if args.strict {
        ValidationOptions::strict()
    } else {
        ValidationOptions::default()
    };

    match args.command {
        Command::Validate { file } => {
            let feature = load_area(&file, options)?;
            let anchor = representative_point(&feature.shape());
            println!(
                "valid {} with {} part(s), first coordinate {}",
                feature.shape().kind(),
                feature.shape().polygons().len(),
                anchor
            );
            if let Some(rect) = feature.shape().bbox() {
                println!(
                    "bbox {},{},{},{}",
                    rect.min().x,
                    rect.min().y,
                    rect.max().x,
                    rect.max().y
                );
            }
        }
        Command::Point { file, lon, lat } => {
            let feature = load_area(&file, options)?;
            let inside = contains(LonLat::new(lon, lat), &feature.shape())?;
            println!("{}", if inside { "inside" } else { "outside" });
        }
        Command::Batch { file, points } => {
            let feature = load_area(&file, options)?;
            let reader = BufReader::new(
                File::open(&points)
                    .with_context(|| format!("Failed to open {}", points.display()))?,
            );
            run_batch(&feature, reader, std::io::stdout().lock())?;
        }
        Command::Verify {
            file,
            address,
            config,
        } => {
            let config = match config {
                Some(path) => Config::load_from_file(path)?,
                None => Config::default(),
            };
            let feature = load_area(&file, options)?;
            let geocoder = GeminiGeocoder::new(
                config
                    .geocoder
                    .gemini(&api_key_from_env().unwrap_or_default()),
            )?;

            let verification = ReferenceArea::with_area(feature)
                .verify(&geocoder, &address)
                .await;
            println!("{}", serde_json::to_string_pretty(&verification)?);
            if matches!(
                verification.status,
                VerificationStatus::Error | VerificationStatus::NoPolygon
            ) {
                anyhow::bail!("verification failed");
            }
        }
    }

    Ok(())
}

fn load_area(path: &Path, options: ValidationOptions) -> Result<AreaFeature> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    validate_with(&text, options).map_err(|e| {
        anyhow::anyhow!("{}: {} ({})", path.display(), e, e.kind())
    })
}

/// Check every row of a points CSV and write `id,lon,lat,inside` rows in
/// input order. Returns the number of rows checked.
fn run_batch<R: Read, W: Write>(feature: &AreaFeature, reader: R, writer: W) -> Result<usize> {
    let rows: Vec<PointRow> = csv::Reader::from_reader(reader)
        .deserialize()
        .collect::<std::result::Result<_, _>>()
        .context("Failed to parse points CSV")?;

    info!("Checking {} points", rows.len());

    let results: Vec<ResultRow> = rows
        .par_iter()
        .enumerate()
        .map(|(index, row)| ResultRow {
            id: row.id.clone().unwrap_or_else(|| index.to_string()),
            lon: row.lon,
            lat: row.lat,
            inside: match contains(LonLat::new(row.lon, row.lat), feature.shape()) {
                Ok(inside) => inside.to_string(),
                Err(e) => format!("error: {}", e.message),
            },
        })
        .collect();

    let mut writer = csv::Writer::from_writer(writer);
    for row in &results {
        writer.serialize(row)?;
    }
    writer.flush()?;

    let inside = results.iter().filter(|r| r.inside == "true").count();
    info!("{} of {} points inside", inside, results.len());
    Ok(results.len())
}
