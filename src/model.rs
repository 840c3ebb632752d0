use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type TeamId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Home,
    Away,
}

/// One scheduled or played game, as supplied by the schedule feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub season: u16,
    pub week: u8,
    pub home_team: TeamId,
    pub away_team: TeamId,
    #[serde(default)]
    pub home_score: Option<u16>,
    #[serde(default)]
    pub away_score: Option<u16>,
    pub game_date: NaiveDate,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub conditions: Option<GameConditions>,
}

impl GameRecord {
    /// Final score, only for completed games with both scores present.
    pub fn final_score(&self) -> Option<(u16, u16)> {
        if !self.completed {
            return None;
        }
        match (self.home_score, self.away_score) {
            (Some(h), Some(a)) => Some((h, a)),
            _ => None,
        }
    }

    /// Home team's result: 1 win, 0.5 tie, 0 loss.
    pub fn home_actual(&self) -> Option<f64> {
        let (h, a) = self.final_score()?;
        Some(if h > a {
            1.0
        } else if h < a {
            0.0
        } else {
            0.5
        })
    }

    pub fn team(&self, side: Side) -> &str {
        match side {
            Side::Home => &self.home_team,
            Side::Away => &self.away_team,
        }
    }

    pub fn team_conditions(&self, side: Side) -> Option<&TeamConditions> {
        let c = self.conditions.as_ref()?;
        Some(match side {
            Side::Home => &c.home,
            Side::Away => &c.away,
        })
    }

    pub fn weather(&self) -> Option<&Weather> {
        self.conditions.as_ref()?.weather.as_ref()
    }
}

/// Per-game context for the QB, injury, weather and travel modules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameConditions {
    #[serde(default)]
    pub home: TeamConditions,
    #[serde(default)]
    pub away: TeamConditions,
    #[serde(default)]
    pub weather: Option<Weather>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamConditions {
    #[serde(default)]
    pub starting_qb_out: bool,
    /// Expected quality loss from the backup QB, 0 (none) to 1 (total).
    #[serde(default)]
    pub qb_drop_off: f64,
    #[serde(default)]
    pub injured_starters: u32,
    #[serde(default)]
    pub travel_miles: f64,
    #[serde(default)]
    pub rest_days: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub temperature_f: f64,
    pub wind_mph: f64,
    #[serde(default)]
    pub precipitation: bool,
    #[serde(default)]
    pub indoor: bool,
}

/// A team's rating at the close of a week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRating {
    pub team_id: TeamId,
    pub season: u16,
    pub week: u8,
    pub rating: f64,
    pub rating_change: f64,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub win_pct: f64,
}

/// Predicted and realized outcome for one scored game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamePrediction {
    pub season: u16,
    pub week: u8,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub p_home: f64,
    pub actual: f64,
    pub home_delta: f64,
    pub away_delta: f64,
    pub adjustment_diff: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMethod {
    /// Target at or before the last known week.
    Current,
    /// Not enough history for a trend; neutral defaults were used.
    Neutral,
    TrendDecay,
}

impl ProjectionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Neutral => "neutral",
            Self::TrendDecay => "trend_decay",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "current" => Some(Self::Current),
            "neutral" => Some(Self::Neutral),
            "trend_decay" => Some(Self::TrendDecay),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRecord {
    pub team: TeamId,
    pub season: u16,
    pub week: u8,
    pub projected_rating: f64,
    pub confidence_score: f64,
    pub method: ProjectionMethod,
    pub trend: f64,
    pub volatility: f64,
}
