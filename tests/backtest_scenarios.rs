use std::fs;
use std::path::PathBuf;

use gridiron_elo::EngineError;
use gridiron_elo::backtest::{AbortSignal, BacktestEngine, RunStatus};
use gridiron_elo::config::{AdjustmentConfig, ModuleKind};
use gridiron_elo::dataset;
use gridiron_elo::model::GameRecord;
use gridiron_elo::rating::{RatingBounds, RatingSnapshot, TeamState};
use gridiron_elo::situational::SituationalDatabase;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn read_schedule(name: &str) -> Vec<GameRecord> {
    dataset::load_schedule(&fixture_path(name)).expect("fixture schedule should load")
}

fn read_situational() -> SituationalDatabase {
    dataset::load_situational(&fixture_path("situational_2023.json"))
        .expect("fixture situational feed should load")
}

#[test]
fn two_team_two_week_scenario() {
    let games = read_schedule("two_team_two_week.json");
    let cfg = AdjustmentConfig::default();
    let db = SituationalDatabase::empty("2023");
    let run = BacktestEngine::new(&cfg, &db).unwrap().run(&games).unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.predictions.len(), 2);
    assert_eq!(run.history.len(), 4);

    let week1 = &run.predictions[0];
    assert!((week1.p_home - 0.578).abs() < 1e-3, "p_home={}", week1.p_home);
    assert!((week1.home_delta - 8.43).abs() < 0.02, "delta={}", week1.home_delta);

    let a1 = run.history.iter().find(|r| r.team_id == "A" && r.week == 1).unwrap();
    let b1 = run.history.iter().find(|r| r.team_id == "B" && r.week == 1).unwrap();
    assert!((a1.rating - 1508.43).abs() < 0.02);
    assert!((b1.rating - 1491.57).abs() < 0.02);

    // Week 2: B is home and wins, so the home delta is positive for B.
    let week2 = &run.predictions[1];
    assert_eq!(week2.home_team, "B");
    assert!(week2.home_delta > 0.0);
    assert_eq!(week2.home_delta, -week2.away_delta);

    let a = run.snapshot.rating("A").unwrap();
    let b = run.snapshot.rating("B").unwrap();
    assert!(a < 1508.43 && b > 1491.57);
    assert!((a + b - 3000.0).abs() < 1e-9);
}

#[test]
fn season_transition_regresses_toward_mean() {
    let mut snap = RatingSnapshot::new(2022);
    snap.insert("HI", TeamState::seeded(1620.0));
    snap.insert("LO", TeamState::seeded(1380.0));
    snap.begin_season(2023, 0.30, RatingBounds::default());
    assert_eq!(snap.rating("HI"), Some(1536.0));
    assert_eq!(snap.rating("LO"), Some(1464.0));
    assert_eq!(snap.season, 2023);
    assert_eq!(snap.state("HI").unwrap().games(), 0);
}

#[test]
fn replay_regresses_between_seasons() {
    let games = read_schedule("schedule_two_seasons.json");
    let cfg = AdjustmentConfig::default();
    let db = SituationalDatabase::empty("none");
    let run = BacktestEngine::new(&cfg, &db).unwrap().run(&games).unwrap();

    let last_2022 = run
        .history
        .iter()
        .filter(|r| r.season == 2022 && r.week == 3)
        .collect::<Vec<_>>();
    let first_2023 = run
        .history
        .iter()
        .filter(|r| r.season == 2023 && r.week == 1)
        .collect::<Vec<_>>();
    let mean = last_2022.iter().map(|r| r.rating).sum::<f64>() / last_2022.len() as f64;

    for end in &last_2022 {
        let start = first_2023.iter().find(|r| r.team_id == end.team_id).unwrap();
        let expected_preseason = mean + 0.30 * (end.rating - mean);
        assert!((start.rating - start.rating_change - expected_preseason).abs() < 1e-9);
        // Records reset with the new season.
        assert!(start.wins + start.losses + start.ties <= 1);
    }
}

#[test]
fn missing_scores_are_skipped_not_scored() {
    let games = read_schedule("schedule_two_seasons.json");
    let cfg = AdjustmentConfig::default();
    let db = SituationalDatabase::empty("none");
    let run = BacktestEngine::new(&cfg, &db).unwrap().run(&games).unwrap();

    assert_eq!(run.skipped_games, 3);
    assert_eq!(run.predictions.len(), 11);
    assert!(
        !run.predictions
            .iter()
            .any(|p| p.season == 2023 && p.week == 3 && p.home_team == "BUF")
    );

    // Week 4 has no completed games, so no rows are written for it.
    assert!(!run.history.iter().any(|r| r.season == 2023 && r.week == 4));
    assert_eq!(run.history.len(), 6 * 4);

    let week2 = |team: &str| {
        run.history
            .iter()
            .find(|r| r.team_id == team && r.season == 2023 && r.week == 2)
            .cloned()
            .unwrap()
    };
    let week3 = |team: &str| {
        run.history
            .iter()
            .find(|r| r.team_id == team && r.season == 2023 && r.week == 3)
            .cloned()
            .unwrap()
    };
    for team in ["BUF", "DET"] {
        let (before, after) = (week2(team), week3(team));
        assert_eq!(after.rating_change, 0.0);
        assert_eq!(after.rating, before.rating);
        assert_eq!(after.ties, before.ties);
    }
}

#[test]
fn every_update_is_zero_sum() {
    let games = read_schedule("schedule_two_seasons.json");
    let cfg = AdjustmentConfig::full_adjustments();
    let db = read_situational();
    let run = BacktestEngine::new(&cfg, &db).unwrap().run(&games).unwrap();

    for p in &run.predictions {
        assert_eq!(p.home_delta, -p.away_delta);
        assert!(p.p_home > 0.0 && p.p_home < 1.0);
    }
    for season in [2022u16, 2023] {
        for week in 1..=3u8 {
            let total: f64 = run
                .history
                .iter()
                .filter(|r| r.season == season && r.week == week)
                .map(|r| r.rating)
                .sum();
            assert!((total - 6000.0).abs() < 1e-6, "{season} week {week}: {total}");
        }
    }
}

#[test]
fn adjustments_move_predictions() {
    let games = read_schedule("schedule_two_seasons.json");
    let db = read_situational();
    let plain = AdjustmentConfig::default();
    let full = AdjustmentConfig::full_adjustments();
    let plain_run = BacktestEngine::new(&plain, &db).unwrap().run(&games).unwrap();
    let full_run = BacktestEngine::new(&full, &db).unwrap().run(&games).unwrap();

    assert!(plain_run.predictions.iter().all(|p| p.adjustment_diff == 0.0));
    assert!(full_run.predictions.iter().any(|p| p.adjustment_diff != 0.0));
    assert_ne!(
        plain_run.report.unwrap().config_fingerprint,
        full_run.report.unwrap().config_fingerprint
    );
}

#[test]
fn replay_is_idempotent() {
    let games = read_schedule("schedule_two_seasons.json");
    let cfg = AdjustmentConfig::full_adjustments();
    let db = read_situational();
    let engine = BacktestEngine::new(&cfg, &db).unwrap();
    let first = engine.run(&games).unwrap();
    let second = engine.run(&games).unwrap();
    assert_eq!(first.history_digest().unwrap(), second.history_digest().unwrap());
    assert_eq!(first.report, second.report);
}

#[test]
fn input_order_does_not_matter_for_run() {
    let games = read_schedule("schedule_two_seasons.json");
    let mut reversed = games.clone();
    reversed.reverse();

    let cfg = AdjustmentConfig::default();
    let db = SituationalDatabase::empty("none");
    let engine = BacktestEngine::new(&cfg, &db).unwrap();

    let err = engine
        .replay_ordered(&reversed, &AbortSignal::default())
        .unwrap_err();
    assert!(matches!(err, EngineError::OrderingViolation { .. }));
    assert!(err.is_fatal());

    let sorted = engine.run(&games).unwrap();
    let shuffled = engine.run(&reversed).unwrap();
    assert_eq!(sorted.history_digest().unwrap(), shuffled.history_digest().unwrap());
}

#[test]
fn toml_config_fixture_loads() {
    let cfg = AdjustmentConfig::from_path(&fixture_path("config_full.toml")).unwrap();
    assert_eq!(cfg.name, "full_toml");
    assert_eq!(cfg.k_factor, 24.0);
    assert!(cfg.margin_of_victory);
    assert_eq!(
        cfg.modules.enabled_kinds(),
        vec![ModuleKind::RedZone, ModuleKind::Quarterback, ModuleKind::Weather]
    );
}

#[test]
fn invalid_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, r#"{"name":"bad","logistic_scale":0.0}"#).unwrap();
    let err = AdjustmentConfig::from_path(&path).unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));
}
