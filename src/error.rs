use thiserror::Error;

/// Errors raised by the rating engine.
///
/// `DataGap` and `IncompleteGame` are recovered where they occur (the caller
/// substitutes a neutral value or skips the game) and only surface through
/// logs. `Configuration` and `OrderingViolation` abort a run before any rating
/// history is produced.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no situational data for team {team} in window {window}")]
    DataGap { team: String, window: String },

    #[error("game {home} vs {away} (season {season}, week {week}) has no final score")]
    IncompleteGame {
        season: u16,
        week: u8,
        home: String,
        away: String,
    },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error(
        "games out of order: ({season}, week {week}) follows ({prev_season}, week {prev_week})"
    )]
    OrderingViolation {
        prev_season: u16,
        prev_week: u8,
        season: u16,
        week: u8,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// True for errors that must abort a run instead of being handled locally.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::DataGap { .. } | Self::IncompleteGame { .. })
    }
}
