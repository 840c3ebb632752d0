use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{TeamId, TeamRating};

/// Keeps probabilities strictly inside (0, 1) so log loss stays finite.
const PROB_EPS: f64 = 1e-9;

const MOV_GAP_LIMIT: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingBounds {
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for RatingBounds {
    fn default() -> Self {
        Self {
            floor: 1000.0,
            ceiling: 2000.0,
        }
    }
}

impl RatingBounds {
    pub fn clamp(&self, rating: f64) -> f64 {
        rating.clamp(self.floor, self.ceiling)
    }
}

/// Home win probability. Adjustment deltas are added to the rating
/// differential before the logistic transform.
pub fn win_probability(
    home_rating: f64,
    away_rating: f64,
    hfa: f64,
    scale: f64,
    situational_deltas: &[f64],
) -> f64 {
    let adj: f64 = situational_deltas.iter().sum();
    let diff = home_rating - away_rating + hfa + adj;
    let p = 1.0 / (1.0 + 10.0_f64.powf(-diff / scale));
    p.clamp(PROB_EPS, 1.0 - PROB_EPS)
}

/// Margin-of-victory multiplier: grows with the log of the point differential
/// and shrinks as the winner's pre-game rating edge grows.
///
/// `winner_gap` is the winner's effective rating minus the loser's (home field
/// included). A tie returns 1.0.
pub fn mov_multiplier(point_diff: i32, winner_gap: f64) -> f64 {
    if point_diff == 0 {
        return 1.0;
    }
    let gap = winner_gap.clamp(-MOV_GAP_LIMIT, MOV_GAP_LIMIT);
    (f64::from(point_diff.unsigned_abs()) + 1.0).ln() * (2.2 / (gap * 0.001 + 2.2))
}

/// Rating change for the home side; the away side receives the negation.
pub fn rating_delta(actual: f64, predicted: f64, k_factor: f64, mov: Option<f64>) -> f64 {
    k_factor * (actual - predicted) * mov.unwrap_or(1.0)
}

/// Keeps `fraction` of the distance from `mean`.
pub fn regress_to_mean(rating: f64, mean: f64, fraction: f64) -> f64 {
    mean + fraction * (rating - mean)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamState {
    pub rating: f64,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl TeamState {
    pub fn seeded(rating: f64) -> Self {
        Self {
            rating,
            wins: 0,
            losses: 0,
            ties: 0,
        }
    }

    pub fn games(&self) -> u32 {
        self.wins + self.losses + self.ties
    }

    pub fn win_pct(&self) -> f64 {
        let games = self.games();
        if games == 0 {
            return 0.0;
        }
        (f64::from(self.wins) + 0.5 * f64::from(self.ties)) / f64::from(games)
    }

    fn record(&mut self, actual: f64) {
        if actual > 0.5 {
            self.wins += 1;
        } else if actual < 0.5 {
            self.losses += 1;
        } else {
            self.ties += 1;
        }
    }
}

/// Ratings for every known team at one point in the replay.
///
/// Ordered by team id so iteration (and everything derived from it) is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSnapshot {
    pub season: u16,
    pub week: u8,
    teams: BTreeMap<TeamId, TeamState>,
}

/// Pending changes for one week, applied all at once.
#[derive(Debug, Clone, Default)]
pub struct WeekDeltas {
    deltas: BTreeMap<TeamId, f64>,
    results: Vec<(TeamId, f64)>,
}

impl WeekDeltas {
    pub fn add(&mut self, team: &str, delta: f64, actual: f64) {
        *self.deltas.entry(team.to_string()).or_insert(0.0) += delta;
        self.results.push((team.to_string(), actual));
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl RatingSnapshot {
    pub fn new(season: u16) -> Self {
        Self {
            season,
            week: 0,
            teams: BTreeMap::new(),
        }
    }

    pub fn rating(&self, team: &str) -> Option<f64> {
        self.teams.get(team).map(|s| s.rating)
    }

    pub fn state(&self, team: &str) -> Option<&TeamState> {
        self.teams.get(team)
    }

    pub fn teams(&self) -> impl Iterator<Item = (&TeamId, &TeamState)> {
        self.teams.iter()
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Seeds a team at `rating` if it has never been seen; returns its rating.
    pub fn ensure_team(&mut self, team: &str, rating: f64) -> f64 {
        self.teams
            .entry(team.to_string())
            .or_insert_with(|| TeamState::seeded(rating))
            .rating
    }

    pub fn insert(&mut self, team: &str, state: TeamState) {
        self.teams.insert(team.to_string(), state);
    }

    pub fn mean_rating(&self) -> Option<f64> {
        if self.teams.is_empty() {
            return None;
        }
        let sum: f64 = self.teams.values().map(|s| s.rating).sum();
        Some(sum / self.teams.len() as f64)
    }

    pub fn total_rating(&self) -> f64 {
        self.teams.values().map(|s| s.rating).sum()
    }

    /// Moves every team toward the cross-team mean and clears season records.
    pub fn begin_season(&mut self, season: u16, carry_over: f64, bounds: RatingBounds) {
        if let Some(mean) = self.mean_rating() {
            for state in self.teams.values_mut() {
                let regressed = regress_to_mean(state.rating, mean, carry_over);
                *state = TeamState::seeded(bounds.clamp(regressed));
            }
        }
        self.season = season;
        self.week = 0;
    }

    /// Applies a week's accumulated deltas and returns one row per known team.
    pub fn close_week(
        &mut self,
        week: u8,
        pending: WeekDeltas,
        bounds: RatingBounds,
    ) -> Vec<TeamRating> {
        let mut changes: BTreeMap<&str, f64> = BTreeMap::new();
        for (team, delta) in &pending.deltas {
            if let Some(state) = self.teams.get_mut(team) {
                let before = state.rating;
                state.rating = bounds.clamp(before + delta);
                changes.insert(team.as_str(), state.rating - before);
            }
        }
        for (team, actual) in &pending.results {
            if let Some(state) = self.teams.get_mut(team) {
                state.record(*actual);
            }
        }
        self.week = week;

        self.teams
            .iter()
            .map(|(team, state)| TeamRating {
                team_id: team.clone(),
                season: self.season,
                week,
                rating: state.rating,
                rating_change: changes.get(team.as_str()).copied().unwrap_or(0.0),
                wins: state.wins,
                losses: state.losses,
                ties: state.ties,
                win_pct: state.win_pct(),
            })
            .collect()
    }
}
