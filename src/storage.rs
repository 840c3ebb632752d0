//! SQLite persistence for schedules, rating history, projections and
//! calibration reports.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, Transaction, params};
use tracing::info;

use crate::backtest::BacktestRun;
use crate::calibration::CalibrationReport;
use crate::model::{GameConditions, GameRecord, ProjectionMethod, ProjectionRecord, TeamRating};

pub const DB_PATH_ENV: &str = "GRIDIRON_DB_PATH";

pub fn default_db_path() -> PathBuf {
    env::var(DB_PATH_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data").join("gridiron.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS games (
            season INTEGER NOT NULL,
            week INTEGER NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            game_date TEXT NOT NULL,
            completed INTEGER NOT NULL,
            conditions_json TEXT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (season, week, home_team, away_team)
        );
        CREATE INDEX IF NOT EXISTS idx_games_date ON games(game_date);

        CREATE TABLE IF NOT EXISTS team_ratings (
            run_name TEXT NOT NULL,
            team_id TEXT NOT NULL,
            season INTEGER NOT NULL,
            week INTEGER NOT NULL,
            rating REAL NOT NULL,
            rating_change REAL NOT NULL,
            wins INTEGER NOT NULL,
            losses INTEGER NOT NULL,
            ties INTEGER NOT NULL,
            win_pct REAL NOT NULL,
            PRIMARY KEY (run_name, team_id, season, week)
        );
        CREATE INDEX IF NOT EXISTS idx_team_ratings_week ON team_ratings(run_name, season, week);

        CREATE TABLE IF NOT EXISTS projections (
            team TEXT NOT NULL,
            season INTEGER NOT NULL,
            week INTEGER NOT NULL,
            projected_rating REAL NOT NULL,
            confidence_score REAL NOT NULL,
            method TEXT NOT NULL,
            trend REAL NOT NULL,
            volatility REAL NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (team, season, week)
        );

        CREATE TABLE IF NOT EXISTS calibration_reports (
            config_name TEXT PRIMARY KEY,
            config_fingerprint TEXT NOT NULL,
            samples INTEGER NOT NULL,
            accuracy REAL NOT NULL,
            brier REAL NOT NULL,
            log_loss REAL NOT NULL,
            ece REAL NOT NULL,
            sharpness REAL NOT NULL,
            report_json TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn upsert_games(conn: &mut Connection, games: &[GameRecord]) -> Result<usize> {
    let tx = conn.transaction().context("begin games transaction")?;
    for game in games {
        upsert_game(&tx, game)?;
    }
    tx.commit().context("commit games transaction")?;
    Ok(games.len())
}

fn upsert_game(tx: &Transaction<'_>, g: &GameRecord) -> Result<()> {
    let conditions = g
        .conditions
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("serialize game conditions")?;
    tx.execute(
        r#"
        INSERT INTO games (
            season, week, home_team, away_team, home_score, away_score,
            game_date, completed, conditions_json, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(season, week, home_team, away_team) DO UPDATE SET
            home_score = excluded.home_score,
            away_score = excluded.away_score,
            game_date = excluded.game_date,
            completed = excluded.completed,
            conditions_json = excluded.conditions_json,
            updated_at = excluded.updated_at
        "#,
        params![
            g.season,
            g.week,
            g.home_team,
            g.away_team,
            g.home_score,
            g.away_score,
            g.game_date.to_string(),
            bool_to_i64(g.completed),
            conditions,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert game")?;
    Ok(())
}

pub fn load_games(conn: &Connection) -> Result<Vec<GameRecord>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT season, week, home_team, away_team, home_score, away_score,
                   game_date, completed, conditions_json
            FROM games
            ORDER BY season ASC, week ASC, game_date ASC, home_team ASC, away_team ASC
            "#,
        )
        .context("prepare load games query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, u16>(0)?,
                row.get::<_, u8>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<u16>>(4)?,
                row.get::<_, Option<u16>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, i64>(7)? != 0,
                row.get::<_, Option<String>>(8)?,
            ))
        })
        .context("query load games")?;

    let mut out = Vec::new();
    for row in rows {
        let (season, week, home_team, away_team, home_score, away_score, date, completed, cond) =
            row.context("decode game row")?;
        let game_date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .with_context(|| format!("parse game_date {date}"))?;
        let conditions = cond
            .map(|raw| serde_json::from_str::<GameConditions>(&raw))
            .transpose()
            .context("decode game conditions")?;
        out.push(GameRecord {
            season,
            week,
            home_team,
            away_team,
            home_score,
            away_score,
            game_date,
            completed,
            conditions,
        });
    }
    Ok(out)
}

/// Writes a run's history and report in one transaction, replacing any
/// earlier rows stored under the same config name. Aborted runs are refused
/// so stored history always matches its calibration report.
pub fn persist_run(conn: &mut Connection, run: &BacktestRun) -> Result<usize> {
    if !run.is_complete() {
        bail!("refusing to persist incomplete run {}", run.config_name);
    }
    let tx = conn.transaction().context("begin run transaction")?;
    tx.execute(
        "DELETE FROM team_ratings WHERE run_name = ?1",
        params![run.config_name],
    )
    .context("clear previous run history")?;
    for row in &run.history {
        insert_rating(&tx, &run.config_name, row)?;
    }
    if let Some(report) = &run.report {
        upsert_report(&tx, report)?;
    }
    tx.commit().context("commit run transaction")?;
    info!(run = %run.config_name, rows = run.history.len(), "persisted run");
    Ok(run.history.len())
}

fn insert_rating(tx: &Transaction<'_>, run_name: &str, r: &TeamRating) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO team_ratings (
            run_name, team_id, season, week, rating, rating_change,
            wins, losses, ties, win_pct
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            run_name,
            r.team_id,
            r.season,
            r.week,
            r.rating,
            r.rating_change,
            r.wins,
            r.losses,
            r.ties,
            r.win_pct,
        ],
    )
    .context("insert team rating")?;
    Ok(())
}

/// All rows for a run, or for one team when `team` is given, in replay order.
pub fn load_history(
    conn: &Connection,
    run_name: &str,
    team: Option<&str>,
) -> Result<Vec<TeamRating>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT team_id, season, week, rating, rating_change, wins, losses, ties, win_pct
            FROM team_ratings
            WHERE run_name = ?1 AND (?2 IS NULL OR team_id = ?2)
            ORDER BY season ASC, week ASC, team_id ASC
            "#,
        )
        .context("prepare load history query")?;

    let rows = stmt
        .query_map(params![run_name, team], |row| {
            Ok(TeamRating {
                team_id: row.get(0)?,
                season: row.get(1)?,
                week: row.get(2)?,
                rating: row.get(3)?,
                rating_change: row.get(4)?,
                wins: row.get(5)?,
                losses: row.get(6)?,
                ties: row.get(7)?,
                win_pct: row.get(8)?,
            })
        })
        .context("query load history")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode rating row")?);
    }
    Ok(out)
}

pub fn upsert_projections(conn: &mut Connection, records: &[ProjectionRecord]) -> Result<usize> {
    let tx = conn.transaction().context("begin projection transaction")?;
    for r in records {
        tx.execute(
            r#"
            INSERT INTO projections (
                team, season, week, projected_rating, confidence_score,
                method, trend, volatility, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(team, season, week) DO UPDATE SET
                projected_rating = excluded.projected_rating,
                confidence_score = excluded.confidence_score,
                method = excluded.method,
                trend = excluded.trend,
                volatility = excluded.volatility,
                updated_at = excluded.updated_at
            "#,
            params![
                r.team,
                r.season,
                r.week,
                r.projected_rating,
                r.confidence_score,
                r.method.as_str(),
                r.trend,
                r.volatility,
                Utc::now().to_rfc3339(),
            ],
        )
        .context("upsert projection")?;
    }
    tx.commit().context("commit projection transaction")?;
    Ok(records.len())
}

pub fn load_projections(conn: &Connection, season: u16) -> Result<Vec<ProjectionRecord>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT team, season, week, projected_rating, confidence_score, method, trend, volatility
            FROM projections
            WHERE season = ?1
            ORDER BY team ASC, week ASC
            "#,
        )
        .context("prepare load projections query")?;

    let rows = stmt
        .query_map(params![season], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u16>(1)?,
                row.get::<_, u8>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, f64>(7)?,
            ))
        })
        .context("query load projections")?;

    let mut out = Vec::new();
    for row in rows {
        let (team, season, week, projected_rating, confidence_score, method, trend, volatility) =
            row.context("decode projection row")?;
        let method = ProjectionMethod::parse(&method)
            .ok_or_else(|| anyhow!("unknown projection method {method}"))?;
        out.push(ProjectionRecord {
            team,
            season,
            week,
            projected_rating,
            confidence_score,
            method,
            trend,
            volatility,
        });
    }
    Ok(out)
}

pub fn save_calibration_report(conn: &mut Connection, report: &CalibrationReport) -> Result<()> {
    let tx = conn.transaction().context("begin report transaction")?;
    upsert_report(&tx, report)?;
    tx.commit().context("commit report transaction")?;
    Ok(())
}

fn upsert_report(tx: &Transaction<'_>, report: &CalibrationReport) -> Result<()> {
    let m = &report.metrics;
    let json = serde_json::to_string(report).context("serialize calibration report")?;
    tx.execute(
        r#"
        INSERT INTO calibration_reports (
            config_name, config_fingerprint, samples, accuracy, brier,
            log_loss, ece, sharpness, report_json, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(config_name) DO UPDATE SET
            config_fingerprint = excluded.config_fingerprint,
            samples = excluded.samples,
            accuracy = excluded.accuracy,
            brier = excluded.brier,
            log_loss = excluded.log_loss,
            ece = excluded.ece,
            sharpness = excluded.sharpness,
            report_json = excluded.report_json,
            updated_at = excluded.updated_at
        "#,
        params![
            report.config_name,
            report.config_fingerprint,
            m.samples as i64,
            m.accuracy,
            m.brier,
            m.log_loss,
            m.ece,
            m.sharpness,
            json,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert calibration report")?;
    Ok(())
}

pub fn load_calibration_report(
    conn: &Connection,
    config_name: &str,
) -> Result<Option<CalibrationReport>> {
    let mut stmt = conn
        .prepare("SELECT report_json FROM calibration_reports WHERE config_name = ?1")
        .context("prepare load report query")?;
    let mut rows = stmt
        .query(params![config_name])
        .context("query load report")?;
    let Some(row) = rows.next().context("read report row")? else {
        return Ok(None);
    };
    let raw: String = row.get(0).context("decode report json")?;
    let report = serde_json::from_str(&raw).context("parse calibration report")?;
    Ok(Some(report))
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}
