use anyhow::{Context, Result, anyhow};

use gridiron_elo::cli;
use gridiron_elo::compare::{self, ConfigOutcome};
use gridiron_elo::config::AdjustmentConfig;
use gridiron_elo::dataset;
use gridiron_elo::logging;
use gridiron_elo::situational::SituationalDatabase;
use gridiron_elo::storage;

const DEFAULT_TOP: usize = 20;

fn main() -> Result<()> {
    cli::load_env_files();
    logging::init();
    let args = cli::args();

    let schedule = cli::path_arg(&args, "--schedule").context("--schedule is required")?;
    let games = dataset::load_schedule(&schedule)?;
    let situational = match cli::path_arg(&args, "--situational") {
        Some(path) => dataset::load_situational(&path)?,
        None => SituationalDatabase::empty("none"),
    };

    let base = cli::resolve_config(&args).context("resolve base config")?;
    let mut configs: Vec<AdjustmentConfig> = match cli::path_arg(&args, "--configs") {
        Some(path) => dataset::load_configs(&path)?,
        None => Vec::new(),
    };
    if cli::has_flag(&args, "--ablation") {
        configs.extend(compare::ablation_configs(&base));
    }
    if let Some(k_values) = cli::f64_list_arg(&args, "--k-values") {
        configs.extend(compare::k_factor_sweep(&base, &k_values));
    }
    if configs.is_empty() {
        configs = vec![base.clone(), AdjustmentConfig::full_adjustments()];
    }

    let top = cli::usize_arg(&args, "--top")
        .unwrap_or(DEFAULT_TOP)
        .clamp(1, 200);

    let outcomes = compare::compare_configs(&configs, &games, &situational)?;
    if outcomes.is_empty() {
        return Err(anyhow!("no config produced a calibration report"));
    }

    println!(
        "Compared {} configs over {} games",
        outcomes.len(),
        games.len()
    );
    println!();
    for (rank, outcome) in outcomes.iter().take(top).enumerate() {
        print_outcome(rank + 1, outcome);
    }

    if cli::has_flag(&args, "--persist") {
        let db_path = cli::path_arg(&args, "--db").unwrap_or_else(storage::default_db_path);
        let mut conn = storage::open_db(&db_path)?;
        for outcome in &outcomes {
            storage::save_calibration_report(&mut conn, &outcome.report)?;
        }
        println!();
        println!(
            "Saved {} calibration reports to {}",
            outcomes.len(),
            db_path.display()
        );
    }

    Ok(())
}

fn print_outcome(rank: usize, outcome: &ConfigOutcome) {
    let m = &outcome.report.metrics;
    println!(
        "#{rank:<3} {:<32} ll={:.4} brier={:.4} acc={:.3} ece={:.4} sharp={:.4} gain_vs_home={:+.4} skipped={}",
        outcome.config_name(),
        m.log_loss,
        m.brier,
        m.accuracy,
        m.ece,
        m.sharpness,
        outcome.gain_vs_home_rate,
        outcome.skipped_games
    );
}
