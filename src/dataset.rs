//! File-based inputs: schedule feed, situational feed and run configs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AdjustmentConfig;
use crate::model::{GameRecord, TeamId};
use crate::situational::{SituationalDatabase, TeamSituationalCounts};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScheduleFile {
    Games(Vec<GameRecord>),
    Wrapped { games: Vec<GameRecord> },
}

/// Situational feed as stored on disk. Either per-team efficiency values or
/// raw per-team counts; counts win when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SituationalFeed {
    pub window: String,
    pub metrics: BTreeMap<TeamId, BTreeMap<String, f64>>,
    pub counts: BTreeMap<TeamId, TeamSituationalCounts>,
}

impl SituationalFeed {
    pub fn into_database(self) -> SituationalDatabase {
        if self.counts.is_empty() {
            SituationalDatabase::from_metrics(self.window, self.metrics)
        } else {
            SituationalDatabase::from_counts(self.window, &self.counts)
        }
    }
}

/// Loads a schedule from a JSON array of games, or an object with a `games`
/// array.
pub fn load_schedule(path: &Path) -> Result<Vec<GameRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read schedule {}", path.display()))?;
    let parsed: ScheduleFile = serde_json::from_str(&raw)
        .with_context(|| format!("parse schedule {}", path.display()))?;
    let games = match parsed {
        ScheduleFile::Games(games) | ScheduleFile::Wrapped { games } => games,
    };
    let completed = games.iter().filter(|g| g.final_score().is_some()).count();
    info!(
        path = %path.display(),
        games = games.len(),
        completed,
        "loaded schedule"
    );
    Ok(games)
}

pub fn load_situational(path: &Path) -> Result<SituationalDatabase> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read situational feed {}", path.display()))?;
    let feed: SituationalFeed = serde_json::from_str(&raw)
        .with_context(|| format!("parse situational feed {}", path.display()))?;
    let db = feed.into_database();
    info!(
        path = %path.display(),
        window = db.window(),
        teams = db.len(),
        "loaded situational feed"
    );
    Ok(db)
}

/// One config file, or every `.json`/`.toml` config in a directory sorted by
/// file name.
pub fn load_configs(path: &Path) -> Result<Vec<AdjustmentConfig>> {
    if !path.is_dir() {
        let cfg = AdjustmentConfig::from_path(path)
            .with_context(|| format!("load config {}", path.display()))?;
        return Ok(vec![cfg]);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path).with_context(|| format!("read dir {}", path.display()))? {
        let file = entry.context("read dir entry")?.path();
        if matches!(
            file.extension().and_then(|e| e.to_str()),
            Some("json" | "toml")
        ) {
            files.push(file);
        }
    }
    files.sort();

    let mut out = Vec::with_capacity(files.len());
    for file in files {
        let cfg = AdjustmentConfig::from_path(&file)
            .with_context(|| format!("load config {}", file.display()))?;
        out.push(cfg);
    }
    if out.is_empty() {
        return Err(anyhow!("no configs found in {}", path.display()));
    }
    Ok(out)
}

pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(value).context("serialize json")?;
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_accepts_bare_and_wrapped_arrays() {
        let game = r#"{"season":2023,"week":1,"home_team":"KC","away_team":"DET",
            "home_score":20,"away_score":21,"game_date":"2023-09-07","completed":true}"#;
        let bare: ScheduleFile = serde_json::from_str(&format!("[{game}]")).unwrap();
        let wrapped: ScheduleFile =
            serde_json::from_str(&format!(r#"{{"games":[{game}]}}"#)).unwrap();
        for parsed in [bare, wrapped] {
            let (ScheduleFile::Games(games) | ScheduleFile::Wrapped { games }) = parsed;
            assert_eq!(games.len(), 1);
            assert_eq!(games[0].home_actual(), Some(0.0));
        }
    }

    #[test]
    fn counts_take_precedence_over_metrics() {
        let feed: SituationalFeed = serde_json::from_str(
            r#"{"window":"2023",
                "metrics":{"KC":{"red_zone_efficiency":0.9}},
                "counts":{"KC":{"red_zone_trips":40,"red_zone_touchdowns":20},
                          "DET":{"red_zone_trips":40,"red_zone_touchdowns":30}}}"#,
        )
        .unwrap();
        let db = feed.into_database();
        assert_eq!(db.len(), 2);
        assert!((db.metric_or_neutral("KC", "red_zone_efficiency") - 0.5).abs() < 1e-12);
    }
}
