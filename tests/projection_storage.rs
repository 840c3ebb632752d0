use std::path::PathBuf;

use gridiron_elo::backtest::{AbortSignal, BacktestEngine};
use gridiron_elo::config::AdjustmentConfig;
use gridiron_elo::dataset;
use gridiron_elo::model::ProjectionMethod;
use gridiron_elo::projection::{self, NoiseSource, ProjectionBook, ProjectionConfig};
use gridiron_elo::situational::SituationalDatabase;
use gridiron_elo::storage;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn run_fixture() -> gridiron_elo::backtest::BacktestRun {
    let games = dataset::load_schedule(&fixture_path("schedule_two_seasons.json")).unwrap();
    let cfg = AdjustmentConfig::default();
    let db = SituationalDatabase::empty("none");
    BacktestEngine::new(&cfg, &db).unwrap().run(&games).unwrap()
}

#[test]
fn league_projection_covers_every_team_and_week() {
    let run = run_fixture();
    let cfg = ProjectionConfig::default();
    let records =
        projection::project_league(&run.history, 3, &cfg, NoiseSource::Seeded(7)).unwrap();

    assert_eq!(records.len(), 4 * 3);
    for r in &records {
        assert_eq!(r.season, 2023);
        assert!((4..=6).contains(&r.week), "week {}", r.week);
        assert_ne!(r.method, ProjectionMethod::Current);
        assert!(r.confidence_score > 0.0 && r.confidence_score <= 0.9);
        assert!(r.projected_rating >= cfg.bounds.floor && r.projected_rating <= cfg.bounds.ceiling);
    }

    let again = projection::project_league(&run.history, 3, &cfg, NoiseSource::Seeded(7)).unwrap();
    assert_eq!(records, again);
}

#[test]
fn projection_confidence_decays_per_team() {
    let run = run_fixture();
    let records = projection::project_league(
        &run.history,
        6,
        &ProjectionConfig::default(),
        NoiseSource::None,
    )
    .unwrap();
    for team in ["BUF", "DET", "KC", "SF"] {
        let confs = records
            .iter()
            .filter(|r| r.team == team)
            .map(|r| r.confidence_score)
            .collect::<Vec<_>>();
        assert_eq!(confs.len(), 6);
        assert!(confs.windows(2).all(|w| w[1] <= w[0]), "{team}: {confs:?}");
    }
}

#[test]
fn run_round_trips_through_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("gridiron.sqlite");
    let run = run_fixture();
    let games = dataset::load_schedule(&fixture_path("schedule_two_seasons.json")).unwrap();

    {
        let mut conn = storage::open_db(&db_path).unwrap();
        storage::upsert_games(&mut conn, &games).unwrap();
        assert_eq!(storage::persist_run(&mut conn, &run).unwrap(), run.history.len());
        // Persisting again replaces rather than duplicates.
        storage::persist_run(&mut conn, &run).unwrap();
    }

    let conn = storage::open_db(&db_path).unwrap();
    let stored_games = storage::load_games(&conn).unwrap();
    assert_eq!(stored_games.len(), games.len());
    assert!(stored_games.iter().any(|g| g.conditions.is_some()));

    let history = storage::load_history(&conn, &run.config_name, None).unwrap();
    assert_eq!(history.len(), run.history.len());
    let kc = storage::load_history(&conn, &run.config_name, Some("KC")).unwrap();
    assert_eq!(kc, run.team_history("KC"));

    let report = storage::load_calibration_report(&conn, &run.config_name)
        .unwrap()
        .unwrap();
    let expected = run.report.as_ref().unwrap();
    assert_eq!(report.config_fingerprint, expected.config_fingerprint);
    assert_eq!(report.metrics.samples, expected.metrics.samples);
    assert_eq!(report.bins.len(), expected.bins.len());
    assert!((report.metrics.log_loss - expected.metrics.log_loss).abs() < 1e-12);
}

#[test]
fn aborted_run_is_not_persisted_over_a_complete_one() {
    let mut conn = storage::open_in_memory().unwrap();
    let run = run_fixture();
    storage::persist_run(&mut conn, &run).unwrap();

    let games = dataset::load_schedule(&fixture_path("schedule_two_seasons.json")).unwrap();
    let cfg = AdjustmentConfig::default();
    let db = SituationalDatabase::empty("none");
    let abort = AbortSignal::default();
    abort.request();
    let aborted = BacktestEngine::new(&cfg, &db)
        .unwrap()
        .run_with_abort(&games, &abort)
        .unwrap();
    assert!(!aborted.is_complete());
    assert_eq!(aborted.config_name, run.config_name);

    assert!(storage::persist_run(&mut conn, &aborted).is_err());

    let history = storage::load_history(&conn, &run.config_name, None).unwrap();
    assert_eq!(history.len(), run.history.len());
    assert!(history.iter().any(|r| r.season == 2023));
    let report = storage::load_calibration_report(&conn, &run.config_name)
        .unwrap()
        .unwrap();
    assert_eq!(report.metrics.samples, 11);
}

#[test]
fn projections_upsert_by_key() {
    let run = run_fixture();
    let mut conn = storage::open_in_memory().unwrap();
    let cfg = ProjectionConfig::default();

    let first = projection::project_league(&run.history, 2, &cfg, NoiseSource::Seeded(1)).unwrap();
    let second = projection::project_league(&run.history, 2, &cfg, NoiseSource::Seeded(2)).unwrap();
    storage::upsert_projections(&mut conn, &first).unwrap();
    storage::upsert_projections(&mut conn, &second).unwrap();

    let stored = storage::load_projections(&conn, 2023).unwrap();
    assert_eq!(stored.len(), first.len());

    let mut book = ProjectionBook::default();
    book.upsert_all(first);
    book.upsert_all(second.clone());
    assert_eq!(book.len(), stored.len());
    for r in &second {
        assert_eq!(book.get(&r.team, r.season, r.week), Some(r));
    }
}

#[test]
fn workbook_export_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.xlsx");
    let run = run_fixture();
    let projections =
        projection::project_league(&run.history, 2, &ProjectionConfig::default(), NoiseSource::None)
            .unwrap();
    let summary = gridiron_elo::export::export_run(&path, &run, &projections).unwrap();
    assert_eq!(summary.ratings, run.history.len());
    assert_eq!(summary.projections, 8);
    assert_eq!(summary.calibration_bins, 10);
    assert!(path.exists());
}
