
use anyhow::{Context, Result, anyhow};

use gridiron_elo::backtest::BacktestEngine;
use gridiron_elo::calibration::{self, CalibrationReport};
use gridiron_elo::cli::{self, ScheduleSource};
use gridiron_elo::dataset;
use gridiron_elo::export;
use gridiron_elo::logging;
use gridiron_elo::model::GameRecord;
use gridiron_elo::projection::{self, NoiseSource, ProjectionConfig};
use gridiron_elo::situational::SituationalDatabase;
use gridiron_elo::storage;

fn main() -> Result<()> {
    cli::load_env_files();
    logging::init();
    let args = cli::args();

    let config = cli::resolve_config(&args).context("resolve adjustment config")?;
    let situational = match cli::path_arg(&args, "--situational") {
        Some(path) => dataset::load_situational(&path)?,
        None => SituationalDatabase::empty("none"),
    };
    let games = load_games(&args)?;
    if games.is_empty() {
        return Err(anyhow!("schedule is empty"));
    }

    let engine = BacktestEngine::new(&config, &situational)?;
    let run = engine.run(&games)?;

    println!("Backtest: {} ({})", run.config_name, run.config_fingerprint);
    println!(
        "Games: {} scored, {} skipped",
        run.predictions.len(),
        run.skipped_games
    );
    println!("Modules: {:?}", config.modules.enabled_kinds());
    println!();

    let report = run
        .report
        .as_ref()
        .context("backtest did not complete")?;
    print_report(report);

    println!();
    println!("Final ratings:");
    let mut teams = run.snapshot.teams().collect::<Vec<_>>();
    teams.sort_by(|a, b| b.1.rating.total_cmp(&a.1.rating));
    for (team, state) in teams {
        println!(
            "  {team:<6} {:>7.1}  {}-{}-{}",
            state.rating, state.wins, state.losses, state.ties
        );
    }

    let projections = match cli::usize_arg(&args, "--horizon") {
        Some(horizon) if horizon > 0 => {
            let cfg = ProjectionConfig {
                bounds: config.bounds(),
                ..ProjectionConfig::default()
            };
            let noise = cli::u64_arg(&args, "--seed")
                .map(NoiseSource::Seeded)
                .unwrap_or_default();
            let horizon = u8::try_from(horizon.min(usize::from(u8::MAX))).unwrap_or(u8::MAX);
            projection::project_league(&run.history, horizon, &cfg, noise)?
        }
        _ => Vec::new(),
    };

    if cli::has_flag(&args, "--persist") {
        let db_path = cli::path_arg(&args, "--db").unwrap_or_else(storage::default_db_path);
        let mut conn = storage::open_db(&db_path)?;
        storage::upsert_games(&mut conn, &games)?;
        let rows = storage::persist_run(&mut conn, &run)?;
        storage::upsert_projections(&mut conn, &projections)?;
        println!();
        println!("Persisted {rows} rating rows to {}", db_path.display());
    }

    if let Some(path) = cli::path_arg(&args, "--json") {
        dataset::save_json(&path, &run)?;
        println!("Wrote run to {}", path.display());
    }

    if let Some(path) = cli::path_arg(&args, "--export") {
        let summary = export::export_run(&path, &run, &projections)?;
        println!(
            "Exported {} ratings, {} predictions, {} projections to {}",
            summary.ratings,
            summary.predictions,
            summary.projections,
            path.display()
        );
    }

    Ok(())
}

fn load_games(args: &[String]) -> Result<Vec<GameRecord>> {
    match cli::schedule_source(args)? {
        ScheduleSource::File(path) => dataset::load_schedule(&path),
        ScheduleSource::Database(db_path) => {
            let conn = storage::open_db(&db_path)?;
            storage::load_games(&conn)
        }
    }
}

fn print_report(report: &CalibrationReport) {
    print_metrics("Model", report.metrics);
    print_metrics("Baseline (coin flip)", report.baselines.coin_flip);
    print_metrics(
        &format!(
            "Baseline (home rate {:.3})",
            report.baselines.home_rate_value
        ),
        report.baselines.home_rate,
    );
    println!();
    println!("Reliability:");
    for bin in report.bins.iter().filter(|b| b.count > 0) {
        println!(
            "  [{:.1}, {:.1})  n={:<4} pred={:.3} actual={:.3}",
            bin.bucket_start, bin.bucket_end, bin.count, bin.avg_pred, bin.actual_rate
        );
    }
}

fn print_metrics(label: &str, metrics: calibration::Metrics) {
    println!("{label}:");
    println!(
        "  samples={} accuracy={:.3} brier={:.4} log_loss={:.4} ece={:.4} sharpness={:.4}",
        metrics.samples,
        metrics.accuracy,
        metrics.brier,
        metrics.log_loss,
        metrics.ece,
        metrics.sharpness
    );
}
