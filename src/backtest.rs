use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::adjustments::{AdjustmentBreakdown, AdjustmentContext, AdjustmentPipeline};
use crate::calibration::CalibrationReport;
use crate::config::AdjustmentConfig;
use crate::error::{EngineError, Result};
use crate::model::{GamePrediction, GameRecord, TeamRating};
use crate::rating::{self, RatingSnapshot, WeekDeltas};
use crate::situational::SituationalDatabase;

/// Lets a caller stop a long replay. Checked only at season boundaries, so
/// every week already in the history is complete.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn request(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    /// Stopped before regressing into `next_season`.
    Aborted { next_season: u16 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRun {
    pub config_name: String,
    pub config_fingerprint: String,
    pub status: RunStatus,
    pub history: Vec<TeamRating>,
    pub predictions: Vec<GamePrediction>,
    pub snapshot: RatingSnapshot,
    pub skipped_games: usize,
    /// Only present for completed runs.
    pub report: Option<CalibrationReport>,
}

impl BacktestRun {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Weekly rows for one team in replay order.
    pub fn team_history(&self, team: &str) -> Vec<TeamRating> {
        self.history
            .iter()
            .filter(|r| r.team_id == team)
            .cloned()
            .collect()
    }

    /// Hash of the rating history and predictions. Two replays of the same
    /// inputs produce the same digest.
    pub fn history_digest(&self) -> Result<String> {
        let bytes = serde_json::to_vec(&(&self.history, &self.predictions))?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }
}

/// Pre-game forecast for one matchup.
#[derive(Debug, Clone, PartialEq)]
pub struct GameForecast {
    pub home_rating: f64,
    pub away_rating: f64,
    pub p_home: f64,
    pub adjustments: AdjustmentBreakdown,
}

pub struct BacktestEngine<'a> {
    config: &'a AdjustmentConfig,
    situational: &'a SituationalDatabase,
    pipeline: AdjustmentPipeline,
    fingerprint: String,
}

impl<'a> BacktestEngine<'a> {
    /// Rejects an invalid config before anything is replayed.
    pub fn new(config: &'a AdjustmentConfig, situational: &'a SituationalDatabase) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            situational,
            pipeline: AdjustmentPipeline::standard(),
            fingerprint: config.fingerprint()?,
        })
    }

    /// Replaces the built-in modules. Settings are still looked up by each
    /// module's kind in the config.
    pub fn with_pipeline(mut self, pipeline: AdjustmentPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Forecast from a snapshot without touching it. Unknown teams are read at
    /// `base_rating`.
    pub fn forecast(&self, snapshot: &RatingSnapshot, game: &GameRecord) -> GameForecast {
        let home_rating = snapshot
            .rating(&game.home_team)
            .unwrap_or(self.config.base_rating);
        let away_rating = snapshot
            .rating(&game.away_team)
            .unwrap_or(self.config.base_rating);
        let ctx = AdjustmentContext {
            game,
            situational: self.situational,
        };
        let adjustments = self.pipeline.evaluate(&self.config.modules, &ctx);
        let p_home = rating::win_probability(
            home_rating,
            away_rating,
            self.config.home_field_advantage,
            self.config.logistic_scale,
            &adjustments.differentials(),
        );
        GameForecast {
            home_rating,
            away_rating,
            p_home,
            adjustments,
        }
    }

    pub fn run(&self, games: &[GameRecord]) -> Result<BacktestRun> {
        self.run_with_abort(games, &AbortSignal::default())
    }

    /// Sorts the schedule chronologically, then replays it.
    pub fn run_with_abort(&self, games: &[GameRecord], abort: &AbortSignal) -> Result<BacktestRun> {
        let mut ordered = games.to_vec();
        ordered.sort_by(chronological);
        self.replay_ordered(&ordered, abort)
    }

    /// Replays games that are already in chronological order.
    ///
    /// Every game in a week is scored against the ratings as they stood before
    /// the week; the week's deltas are applied together once all of its games
    /// are scored.
    pub fn replay_ordered(&self, games: &[GameRecord], abort: &AbortSignal) -> Result<BacktestRun> {
        ensure_ordered(games)?;
        let cfg = self.config;
        let bounds = cfg.bounds();

        info!(
            config = %cfg.name,
            fingerprint = %self.fingerprint,
            games = games.len(),
            modules = ?cfg.modules.enabled_kinds(),
            "starting backtest"
        );

        let mut snapshot = RatingSnapshot::new(games.first().map(|g| g.season).unwrap_or(0));
        let mut history = Vec::new();
        let mut predictions = Vec::new();
        let mut skipped_games = 0usize;
        let mut current_season: Option<u16> = None;
        let mut status = RunStatus::Completed;

        let mut idx = 0usize;
        while idx < games.len() {
            let (season, week) = (games[idx].season, games[idx].week);
            let len = games[idx..]
                .iter()
                .take_while(|g| g.season == season && g.week == week)
                .count();
            let slate = &games[idx..idx + len];
            idx += len;

            if current_season != Some(season) {
                if current_season.is_some() {
                    if abort.is_requested() {
                        info!(next_season = season, "backtest aborted at season boundary");
                        status = RunStatus::Aborted {
                            next_season: season,
                        };
                        break;
                    }
                    let mean = snapshot.mean_rating();
                    snapshot.begin_season(season, cfg.preseason_regress, bounds);
                    debug!(season, mean = ?mean, "regressed ratings toward mean");
                } else {
                    snapshot.begin_season(season, cfg.preseason_regress, bounds);
                }
                current_season = Some(season);
            }

            let pending =
                self.score_week(&mut snapshot, slate, &mut predictions, &mut skipped_games);
            if pending.is_empty() {
                debug!(season, week, "no completed games, week not closed");
                continue;
            }
            let rows = snapshot.close_week(week, pending, bounds);
            debug!(season, week, teams = rows.len(), "closed week");
            history.extend(rows);
        }

        let report = (status == RunStatus::Completed).then(|| {
            CalibrationReport::from_predictions(&cfg.name, &self.fingerprint, &predictions)
        });
        if let Some(r) = &report {
            info!(
                config = %cfg.name,
                samples = r.metrics.samples,
                accuracy = r.metrics.accuracy,
                brier = r.metrics.brier,
                log_loss = r.metrics.log_loss,
                skipped = skipped_games,
                "backtest complete"
            );
        }

        Ok(BacktestRun {
            config_name: cfg.name.clone(),
            config_fingerprint: self.fingerprint.clone(),
            status,
            history,
            predictions,
            snapshot,
            skipped_games,
            report,
        })
    }

    fn score_week(
        &self,
        snapshot: &mut RatingSnapshot,
        slate: &[GameRecord],
        predictions: &mut Vec<GamePrediction>,
        skipped_games: &mut usize,
    ) -> WeekDeltas {
        let cfg = self.config;
        let mut pending = WeekDeltas::default();

        for game in slate {
            let (Some((home_score, away_score)), Some(actual)) =
                (game.final_score(), game.home_actual())
            else {
                *skipped_games += 1;
                let err = EngineError::IncompleteGame {
                    season: game.season,
                    week: game.week,
                    home: game.home_team.clone(),
                    away: game.away_team.clone(),
                };
                debug!(%err, "skipping game");
                continue;
            };

            // Seeding never changes an existing team, so the pre-week ratings
            // of teams already scored this week are untouched.
            snapshot.ensure_team(&game.home_team, cfg.base_rating);
            snapshot.ensure_team(&game.away_team, cfg.base_rating);
            let forecast = self.forecast(snapshot, game);

            let mov = cfg.margin_of_victory.then(|| {
                let point_diff = i32::from(home_score) - i32::from(away_score);
                let diff = forecast.home_rating - forecast.away_rating
                    + cfg.home_field_advantage
                    + forecast.adjustments.net();
                let winner_gap = if point_diff >= 0 { diff } else { -diff };
                rating::mov_multiplier(point_diff, winner_gap)
            });
            let delta = rating::rating_delta(actual, forecast.p_home, cfg.k_factor, mov);

            pending.add(&game.home_team, delta, actual);
            pending.add(&game.away_team, -delta, 1.0 - actual);
            predictions.push(GamePrediction {
                season: game.season,
                week: game.week,
                home_team: game.home_team.clone(),
                away_team: game.away_team.clone(),
                p_home: forecast.p_home,
                actual,
                home_delta: delta,
                away_delta: -delta,
                adjustment_diff: forecast.adjustments.net(),
            });
        }
        pending
    }
}

/// Season, week, date, then team names so ties sort the same way every run.
pub fn chronological(a: &GameRecord, b: &GameRecord) -> Ordering {
    a.season
        .cmp(&b.season)
        .then(a.week.cmp(&b.week))
        .then(a.game_date.cmp(&b.game_date))
        .then_with(|| a.home_team.cmp(&b.home_team))
        .then_with(|| a.away_team.cmp(&b.away_team))
}

/// Fails if (season, week) ever goes backwards.
pub fn ensure_ordered(games: &[GameRecord]) -> Result<()> {
    for pair in games.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if (next.season, next.week) < (prev.season, prev.week) {
            return Err(EngineError::OrderingViolation {
                prev_season: prev.season,
                prev_week: prev.week,
                season: next.season,
                week: next.week,
            });
        }
    }
    Ok(())
}
