//! Forward projection of team ratings from recent weekly changes.
//!
//! A team's recent `rating_change` values give a trend and a volatility. The
//! trend fades geometrically week over week, optional seeded noise scaled by
//! volatility is added per step, and confidence shrinks with both volatility
//! and distance from the last known week.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::model::{ProjectionMethod, ProjectionRecord, TeamId, TeamRating};
use crate::parallel::with_engine_pool;
use crate::rating::RatingBounds;

const MIN_CONFIDENCE: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.9;
const NEUTRAL_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Weeks of history used for trend and volatility.
    pub window: usize,
    /// Volatility at which base confidence bottoms out.
    pub volatility_cap: f64,
    /// Per-week fade of the trend, in (0, 1).
    pub decay_rate: f64,
    /// Per-week confidence multiplier, in (0, 1].
    pub time_decay: f64,
    /// Noise amplitude as a fraction of volatility.
    pub noise_scale: f64,
    pub bounds: RatingBounds,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            window: 4,
            volatility_cap: 25.0,
            decay_rate: 0.85,
            time_decay: 0.95,
            noise_scale: 0.25,
            bounds: RatingBounds::default(),
        }
    }
}

impl ProjectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window < 2 {
            return Err(EngineError::config(format!(
                "projection window must be at least 2, got {}",
                self.window
            )));
        }
        if !self.volatility_cap.is_finite() || self.volatility_cap <= 0.0 {
            return Err(EngineError::config("volatility_cap must be positive"));
        }
        if !(self.decay_rate > 0.0 && self.decay_rate < 1.0) {
            return Err(EngineError::config(format!(
                "decay_rate must be within (0, 1), got {}",
                self.decay_rate
            )));
        }
        if !(self.time_decay > 0.0 && self.time_decay <= 1.0) {
            return Err(EngineError::config(format!(
                "time_decay must be within (0, 1], got {}",
                self.time_decay
            )));
        }
        if !self.noise_scale.is_finite() || self.noise_scale < 0.0 {
            return Err(EngineError::config("noise_scale must be non-negative"));
        }
        if self.bounds.floor >= self.bounds.ceiling {
            return Err(EngineError::config("projection bounds are inverted"));
        }
        Ok(())
    }
}

/// Where per-step noise comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoiseSource {
    /// Deterministic extrapolation.
    #[default]
    None,
    /// Noise drawn from a generator seeded with this value and the team id.
    Seeded(u64),
}

impl NoiseSource {
    fn rng_for(self, team: &str) -> Option<StdRng> {
        match self {
            NoiseSource::None => None,
            NoiseSource::Seeded(seed) => Some(StdRng::seed_from_u64(seed ^ team_hash(team))),
        }
    }
}

/// FNV-1a, stable across runs and platforms.
fn team_hash(team: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in team.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendEstimate {
    pub trend: f64,
    pub volatility: f64,
    pub confidence: f64,
    pub samples: usize,
}

impl TrendEstimate {
    pub fn neutral(samples: usize) -> Self {
        Self {
            trend: 0.0,
            volatility: 0.0,
            confidence: NEUTRAL_CONFIDENCE,
            samples,
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.samples < 2
    }
}

/// Mean and sample standard deviation of the last `window` weekly changes.
pub fn trend_and_volatility(
    history: &[TeamRating],
    window: usize,
    volatility_cap: f64,
) -> TrendEstimate {
    let start = history.len().saturating_sub(window);
    let changes: Vec<f64> = history[start..].iter().map(|r| r.rating_change).collect();
    if changes.len() < 2 {
        return TrendEstimate::neutral(changes.len());
    }

    let n = changes.len() as f64;
    let trend = changes.iter().sum::<f64>() / n;
    let variance = changes.iter().map(|c| (c - trend).powi(2)).sum::<f64>() / (n - 1.0);
    let volatility = variance.sqrt();
    let confidence = (1.0 - volatility / volatility_cap).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);

    TrendEstimate {
        trend,
        volatility,
        confidence,
        samples: changes.len(),
    }
}

/// Rating after `steps` weeks: each step adds the faded trend plus noise.
pub fn extrapolate(
    current: f64,
    estimate: &TrendEstimate,
    steps: u32,
    config: &ProjectionConfig,
    mut rng: Option<&mut StdRng>,
) -> f64 {
    let amplitude = estimate.volatility * config.noise_scale;
    let mut rating = current;
    let mut fade = 1.0;
    for _ in 0..steps {
        fade *= config.decay_rate;
        let noise = match rng.as_deref_mut() {
            Some(rng) if amplitude > 0.0 => rng.gen_range(-1.0_f64..=1.0) * amplitude,
            _ => 0.0,
        };
        rating += estimate.trend * fade + noise;
    }
    config.bounds.clamp(rating)
}

/// Confidence after `steps` weeks; never increases with `steps`.
pub fn decayed_confidence(base: f64, steps: u32, time_decay: f64) -> f64 {
    let exp = i32::try_from(steps).unwrap_or(i32::MAX);
    (base * time_decay.powi(exp)).clamp(0.0, 1.0)
}

/// Projects one team to `target_week` of its latest season.
///
/// `history` holds this team's rows in replay order. A target at or before the
/// last known week returns the current rating with confidence 1.0.
pub fn project_team(
    team: &str,
    history: &[TeamRating],
    target_week: u8,
    config: &ProjectionConfig,
    noise: NoiseSource,
) -> Result<ProjectionRecord> {
    config.validate()?;
    let Some(last) = history.last() else {
        return Err(EngineError::DataGap {
            team: team.to_string(),
            window: "rating history".to_string(),
        });
    };
    let estimate = trend_and_volatility(history, config.window, config.volatility_cap);

    if target_week <= last.week {
        return Ok(ProjectionRecord {
            team: team.to_string(),
            season: last.season,
            week: target_week,
            projected_rating: last.rating,
            confidence_score: 1.0,
            method: ProjectionMethod::Current,
            trend: estimate.trend,
            volatility: estimate.volatility,
        });
    }

    let steps = u32::from(target_week - last.week);
    let mut rng = noise.rng_for(team);
    let projected_rating = extrapolate(last.rating, &estimate, steps, config, rng.as_mut());
    let method = if estimate.is_neutral() {
        ProjectionMethod::Neutral
    } else {
        ProjectionMethod::TrendDecay
    };

    Ok(ProjectionRecord {
        team: team.to_string(),
        season: last.season,
        week: target_week,
        projected_rating,
        confidence_score: decayed_confidence(estimate.confidence, steps, config.time_decay),
        method,
        trend: estimate.trend,
        volatility: estimate.volatility,
    })
}

/// Splits a league-wide history into per-team histories, preserving order.
pub fn group_by_team(history: &[TeamRating]) -> BTreeMap<TeamId, Vec<TeamRating>> {
    let mut out: BTreeMap<TeamId, Vec<TeamRating>> = BTreeMap::new();
    for row in history {
        out.entry(row.team_id.clone()).or_default().push(row.clone());
    }
    out
}

/// Projects every team that has a row in the latest season `horizon` weeks
/// past its last known week. Teams are processed in parallel; output is
/// ordered by team then week.
pub fn project_league(
    history: &[TeamRating],
    horizon: u8,
    config: &ProjectionConfig,
    noise: NoiseSource,
) -> Result<Vec<ProjectionRecord>> {
    config.validate()?;
    let Some(latest_season) = history.iter().map(|r| r.season).max() else {
        return Ok(Vec::new());
    };
    let by_team: Vec<(TeamId, Vec<TeamRating>)> = group_by_team(history)
        .into_iter()
        .filter(|(_, rows)| rows.last().is_some_and(|r| r.season == latest_season))
        .collect();

    info!(
        teams = by_team.len(),
        season = latest_season,
        horizon,
        "projecting league"
    );

    let per_team: Vec<Result<Vec<ProjectionRecord>>> = with_engine_pool(|| {
        by_team
            .par_iter()
            .map(|(team, rows)| {
                let current = rows.last().map(|r| r.week).unwrap_or(0);
                (1..=horizon)
                    .filter_map(|step| current.checked_add(step))
                    .map(|week| project_team(team, rows, week, config, noise))
                    .collect()
            })
            .collect()
    });

    let mut out = Vec::new();
    for team_rows in per_team {
        out.extend(team_rows?);
    }
    debug!(records = out.len(), "league projection complete");
    Ok(out)
}

/// In-memory projection store keyed by (team, season, week). Writing the same
/// key twice replaces the earlier record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionBook {
    records: BTreeMap<(TeamId, u16, u8), ProjectionRecord>,
}

impl ProjectionBook {
    pub fn upsert(&mut self, record: ProjectionRecord) {
        let key = (record.team.clone(), record.season, record.week);
        self.records.insert(key, record);
    }

    pub fn upsert_all(&mut self, records: impl IntoIterator<Item = ProjectionRecord>) {
        for record in records {
            self.upsert(record);
        }
    }

    pub fn get(&self, team: &str, season: u16, week: u8) -> Option<&ProjectionRecord> {
        self.records.get(&(team.to_string(), season, week))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ProjectionRecord> {
        self.records.values()
    }
}
