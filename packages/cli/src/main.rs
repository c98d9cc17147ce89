#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! CLI for the EV access toolchain.
//!
//! Runs the enrichment pipeline stages (tract, admin, ZIP) over the input
//! layers and writes the scored `GeoJSON` artifacts, plus read-only query
//! subcommands for spot-checking the enriched table from a shell.

use std::path::PathBuf;

use charge_map_analytics::AccessTable;
use charge_map_analytics_models::{DEFAULT_RANK_LIMIT, POPULATION_FLOOR, QueryOutcome};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "charge_map_cli", about = "EV access enrichment toolchain")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Input layer and output locations, shared by the pipeline subcommands.
#[derive(Args)]
struct LayerPaths {
    /// Census tract layer with demographics.
    #[arg(long, default_value = "data/census/merged_tracts_tx.geojson")]
    tracts: PathBuf,

    /// ZIP code area layer.
    #[arg(long, default_value = "data/census/zips_tx.geojson")]
    zips: PathBuf,

    /// ACS B01003 population export for ZIPs.
    #[arg(long, default_value = "data/census/ACS_B01003_TX.csv")]
    population: PathBuf,

    /// EV charger point layer.
    #[arg(long, default_value = "data/chargers/ev_charging_locations.geojson")]
    chargers: PathBuf,

    /// Administrative division layer.
    #[arg(long, default_value = "data/overture/admin_tx.geojson")]
    admin: PathBuf,

    /// Directory for the scored artifacts.
    #[arg(long, default_value = "outputs")]
    output_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Score census tracts
    Tracts {
        #[command(flatten)]
        paths: LayerPaths,
    },
    /// Score administrative divisions
    Admin {
        #[command(flatten)]
        paths: LayerPaths,
    },
    /// Enrich ZIP areas (the primary artifact)
    Zips {
        #[command(flatten)]
        paths: LayerPaths,
    },
    /// Run every stage
    All {
        #[command(flatten)]
        paths: LayerPaths,
    },
    /// List cities available in the enriched table
    Cities {
        /// Enriched ZIP artifact to query.
        #[arg(long, default_value = "outputs/zip_ev_score_enriched.geojson")]
        table: PathBuf,
    },
    /// Rank the most underserved ZIPs of a city
    Rank {
        /// City name (case-insensitive).
        city: String,

        /// Number of ZIPs to return.
        #[arg(long, default_value_t = DEFAULT_RANK_LIMIT)]
        limit: usize,

        /// Enriched ZIP artifact to query.
        #[arg(long, default_value = "outputs/zip_ev_score_enriched.geojson")]
        table: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Tracts { paths } => run_tracts(&paths)?,
        Commands::Admin { paths } => run_admin(&paths)?,
        Commands::Zips { paths } => run_zips(&paths)?,
        Commands::All { paths } => {
            run_tracts(&paths)?;
            run_admin(&paths)?;
            run_zips(&paths)?;
        }
        Commands::Cities { table } => {
            let table = AccessTable::load(&table)?;
            for city in table.list_areas() {
                println!("{city}");
            }
        }
        Commands::Rank { city, limit, table } => {
            let table = AccessTable::load(&table)?;
            match table.rank_underserved(&city, POPULATION_FLOOR, limit) {
                QueryOutcome::Found(ranked) => {
                    println!("{}", serde_json::to_string_pretty(&ranked)?);
                }
                QueryOutcome::NotFound { message } | QueryOutcome::Excluded { message } => {
                    println!("{message}");
                }
            }
        }
    }

    Ok(())
}

fn run_tracts(paths: &LayerPaths) -> Result<(), charge_map_enrich::EnrichError> {
    log::info!("Scoring census tracts...");
    charge_map_enrich::run_tract_stage(
        &paths.tracts,
        &paths.chargers,
        &paths.output_dir.join("ev_tracts_with_score.geojson"),
    )
}

fn run_admin(paths: &LayerPaths) -> Result<(), charge_map_enrich::EnrichError> {
    log::info!("Scoring administrative divisions...");
    charge_map_enrich::run_admin_stage(
        &paths.tracts,
        &paths.admin,
        &paths.chargers,
        &paths.output_dir.join("admin_with_score.geojson"),
    )
}

fn run_zips(paths: &LayerPaths) -> Result<(), charge_map_enrich::EnrichError> {
    log::info!("Enriching ZIP areas...");
    charge_map_enrich::run_zip_stage(
        &paths.zips,
        &paths.population,
        &paths.chargers,
        &paths.admin,
        &paths.output_dir.join("zip_ev_score_enriched.geojson"),
        &paths.output_dir.join("ev_zip_underserved_ranking.csv"),
    )
}
