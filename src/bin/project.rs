use anyhow::{Context, Result, anyhow};

use gridiron_elo::cli;
use gridiron_elo::logging;
use gridiron_elo::projection::{self, NoiseSource, ProjectionBook, ProjectionConfig};
use gridiron_elo::storage;

const DEFAULT_RUN: &str = "baseline";
const DEFAULT_HORIZON: usize = 4;

fn main() -> Result<()> {
    cli::load_env_files();
    logging::init();
    let args = cli::args();

    let db_path = cli::path_arg(&args, "--db").unwrap_or_else(storage::default_db_path);
    let run_name = cli::string_arg(&args, "--run").unwrap_or_else(|| DEFAULT_RUN.to_string());
    let horizon = cli::usize_arg(&args, "--horizon")
        .unwrap_or(DEFAULT_HORIZON)
        .clamp(1, 22);
    let noise = cli::u64_arg(&args, "--seed")
        .map(NoiseSource::Seeded)
        .unwrap_or_default();

    let defaults = ProjectionConfig::default();
    let config = ProjectionConfig {
        window: cli::usize_arg(&args, "--window").unwrap_or(defaults.window),
        volatility_cap: cli::f64_arg(&args, "--volatility-cap").unwrap_or(defaults.volatility_cap),
        decay_rate: cli::f64_arg(&args, "--decay-rate").unwrap_or(defaults.decay_rate),
        time_decay: cli::f64_arg(&args, "--time-decay").unwrap_or(defaults.time_decay),
        noise_scale: cli::f64_arg(&args, "--noise-scale").unwrap_or(defaults.noise_scale),
        ..defaults
    };
    config.validate().context("invalid projection config")?;

    let mut conn = storage::open_db(&db_path)?;
    let team = cli::string_arg(&args, "--team");
    let history = storage::load_history(&conn, &run_name, team.as_deref())?;
    if history.is_empty() {
        return Err(anyhow!(
            "no rating history for run {run_name} in {}",
            db_path.display()
        ));
    }

    let horizon = u8::try_from(horizon).unwrap_or(u8::MAX);
    let records = projection::project_league(&history, horizon, &config, noise)?;

    let mut book = ProjectionBook::default();
    book.upsert_all(records.iter().cloned());

    println!("Projections from run {run_name} ({} records)", book.len());
    for r in book.records() {
        println!(
            "  {:<6} {} wk{:<2} {:>7.1}  conf={:.2}  trend={:+.2} vol={:.2} {}",
            r.team,
            r.season,
            r.week,
            r.projected_rating,
            r.confidence_score,
            r.trend,
            r.volatility,
            r.method.as_str()
        );
    }

    if !cli::has_flag(&args, "--dry-run") {
        let written = storage::upsert_projections(&mut conn, &records)?;
        println!();
        println!("Upserted {written} projections into {}", db_path.display());
    }

    Ok(())
}
