use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::model::TeamId;

pub const RED_ZONE_EFFICIENCY: &str = "red_zone_efficiency";
pub const THIRD_DOWN_EFFICIENCY: &str = "third_down_efficiency";
pub const FOURTH_DOWN_EFFICIENCY: &str = "fourth_down_efficiency";
pub const TWO_MINUTE_EFFICIENCY: &str = "two_minute_efficiency";
pub const LATE_GAME_EFFICIENCY: &str = "late_game_efficiency";

/// Metrics that feed the composite impact score.
pub const CORE_METRICS: [&str; 5] = [
    RED_ZONE_EFFICIENCY,
    THIRD_DOWN_EFFICIENCY,
    FOURTH_DOWN_EFFICIENCY,
    TWO_MINUTE_EFFICIENCY,
    LATE_GAME_EFFICIENCY,
];

/// League average used when no team carries a metric at all.
const NEUTRAL_METRIC: f64 = 0.5;

/// Z-scores are capped at this magnitude before normalizing the composite.
const COMPOSITE_Z_CAP: f64 = 3.0;

/// Raw aggregated counts for one team over an analysis window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamSituationalCounts {
    pub red_zone_trips: u32,
    pub red_zone_touchdowns: u32,
    pub third_down_attempts: u32,
    pub third_down_conversions: u32,
    pub fourth_down_attempts: u32,
    pub fourth_down_conversions: u32,
    pub two_minute_drives: u32,
    pub two_minute_scores: u32,
    pub late_game_possessions: u32,
    pub late_game_successes: u32,
}

impl TeamSituationalCounts {
    fn pairs(&self) -> [(&'static str, u32, u32, f64); 5] {
        // (metric, successes, attempts, attempts needed for full trust)
        [
            (
                RED_ZONE_EFFICIENCY,
                self.red_zone_touchdowns,
                self.red_zone_trips,
                40.0,
            ),
            (
                THIRD_DOWN_EFFICIENCY,
                self.third_down_conversions,
                self.third_down_attempts,
                150.0,
            ),
            (
                FOURTH_DOWN_EFFICIENCY,
                self.fourth_down_conversions,
                self.fourth_down_attempts,
                20.0,
            ),
            (
                TWO_MINUTE_EFFICIENCY,
                self.two_minute_scores,
                self.two_minute_drives,
                25.0,
            ),
            (
                LATE_GAME_EFFICIENCY,
                self.late_game_successes,
                self.late_game_possessions,
                40.0,
            ),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamProfile {
    pub metrics: BTreeMap<String, f64>,
    /// Normalized composite in [-1, 1]; 0 is league average.
    pub composite_impact: f64,
}

/// Read-only situational metrics for one analysis window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SituationalDatabase {
    window: String,
    teams: BTreeMap<TeamId, TeamProfile>,
    league_average: BTreeMap<String, f64>,
}

impl SituationalDatabase {
    pub fn empty(window: impl Into<String>) -> Self {
        Self {
            window: window.into(),
            ..Self::default()
        }
    }

    /// Builds from per-team efficiency values. Values are clamped to [0, 1].
    pub fn from_metrics(
        window: impl Into<String>,
        teams: BTreeMap<TeamId, BTreeMap<String, f64>>,
    ) -> Self {
        let teams: BTreeMap<TeamId, TeamProfile> = teams
            .into_iter()
            .map(|(team, metrics)| {
                let metrics = metrics
                    .into_iter()
                    .filter(|(_, v)| v.is_finite())
                    .map(|(k, v)| (k, v.clamp(0.0, 1.0)))
                    .collect();
                (
                    team,
                    TeamProfile {
                        metrics,
                        composite_impact: 0.0,
                    },
                )
            })
            .collect();

        let mut db = Self {
            window: window.into(),
            teams,
            league_average: BTreeMap::new(),
        };
        db.league_average = db.compute_league_average();
        db.fill_composites();
        db
    }

    /// Builds from raw counts. Rates from small samples are shrunk toward the
    /// pooled league rate; a metric with zero attempts is left out so lookups
    /// fall back to the league average.
    pub fn from_counts(
        window: impl Into<String>,
        counts: &BTreeMap<TeamId, TeamSituationalCounts>,
    ) -> Self {
        let mut pooled: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
        for c in counts.values() {
            for (metric, made, att, _) in c.pairs() {
                let slot = pooled.entry(metric).or_insert((0, 0));
                slot.0 += u64::from(made.min(att));
                slot.1 += u64::from(att);
            }
        }
        let league_rate = |metric: &str| -> f64 {
            match pooled.get(metric) {
                Some((made, att)) if *att > 0 => *made as f64 / *att as f64,
                _ => NEUTRAL_METRIC,
            }
        };

        let mut metrics_by_team = BTreeMap::new();
        for (team, c) in counts {
            let mut metrics = BTreeMap::new();
            for (metric, made, att, min_n) in c.pairs() {
                if att == 0 {
                    continue;
                }
                let raw = f64::from(made.min(att)) / f64::from(att);
                let w = (f64::from(att) / min_n).clamp(0.0, 1.0);
                metrics.insert(
                    metric.to_string(),
                    (1.0 - w) * league_rate(metric) + w * raw,
                );
            }
            metrics_by_team.insert(team.clone(), metrics);
        }
        Self::from_metrics(window, metrics_by_team)
    }

    pub fn window(&self) -> &str {
        &self.window
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn contains(&self, team: &str) -> bool {
        self.teams.contains_key(team)
    }

    pub fn profile(&self, team: &str) -> Result<&TeamProfile, EngineError> {
        self.teams.get(team).ok_or_else(|| EngineError::DataGap {
            team: team.to_string(),
            window: self.window.clone(),
        })
    }

    pub fn league_average(&self, metric: &str) -> f64 {
        self.league_average
            .get(metric)
            .copied()
            .unwrap_or(NEUTRAL_METRIC)
    }

    /// The team's value for `metric`, or the league average when the team or
    /// the metric is missing.
    pub fn metric_or_neutral(&self, team: &str, metric: &str) -> f64 {
        match self.profile(team) {
            Ok(profile) => match profile.metrics.get(metric) {
                Some(v) => *v,
                None => {
                    debug!(
                        team,
                        metric,
                        window = %self.window,
                        "metric missing, using league average"
                    );
                    self.league_average(metric)
                }
            },
            Err(err) => {
                warn!(%err, metric, "substituting league average");
                self.league_average(metric)
            }
        }
    }

    /// Team value minus league average; 0 for missing data.
    pub fn relative_metric(&self, team: &str, metric: &str) -> f64 {
        self.metric_or_neutral(team, metric) - self.league_average(metric)
    }

    pub fn composite_or_neutral(&self, team: &str) -> f64 {
        match self.profile(team) {
            Ok(profile) => profile.composite_impact,
            Err(err) => {
                warn!(%err, "substituting neutral composite impact");
                0.0
            }
        }
    }

    fn compute_league_average(&self) -> BTreeMap<String, f64> {
        let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for profile in self.teams.values() {
            for (metric, v) in &profile.metrics {
                let slot = sums.entry(metric.as_str()).or_insert((0.0, 0));
                slot.0 += v;
                slot.1 += 1;
            }
        }
        sums.into_iter()
            .map(|(metric, (sum, n))| (metric.to_string(), sum / n as f64))
            .collect()
    }

    fn fill_composites(&mut self) {
        let mut spread: BTreeMap<&str, f64> = BTreeMap::new();
        for metric in CORE_METRICS {
            let avg = self.league_average(metric);
            let values: Vec<f64> = self
                .teams
                .values()
                .filter_map(|p| p.metrics.get(metric).copied())
                .collect();
            if values.len() < 2 {
                continue;
            }
            let var = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
            spread.insert(metric, var.sqrt());
        }

        let averages: BTreeMap<&str, f64> = CORE_METRICS
            .iter()
            .map(|m| (*m, self.league_average(m)))
            .collect();
        for profile in self.teams.values_mut() {
            let mut z_sum = 0.0;
            for metric in CORE_METRICS {
                let (Some(v), Some(sd)) = (profile.metrics.get(metric), spread.get(metric)) else {
                    continue;
                };
                if *sd < 1e-9 {
                    continue;
                }
                let z = (v - averages[metric]) / sd;
                z_sum += z.clamp(-COMPOSITE_Z_CAP, COMPOSITE_Z_CAP);
            }
            let mean_z = z_sum / CORE_METRICS.len() as f64;
            profile.composite_impact = (mean_z / COMPOSITE_Z_CAP).clamp(-1.0, 1.0);
        }
    }
}
