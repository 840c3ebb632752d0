//! Flag parsing shared by the binaries. Accepts both `--name value` and
//! `--name=value`.

use std::path::PathBuf;

use crate::config::AdjustmentConfig;
use crate::error::{EngineError, Result};

pub const CONFIG_PATH_ENV: &str = "GRIDIRON_CONFIG";

pub fn args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

/// Reads `.env.local` then `.env`; earlier files win.
pub fn load_env_files() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

pub fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|arg| arg == name)
}

pub fn string_arg(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
            && !next.starts_with("--")
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

pub fn path_arg(args: &[String], name: &str) -> Option<PathBuf> {
    string_arg(args, name).map(PathBuf::from)
}

pub fn f64_arg(args: &[String], name: &str) -> Option<f64> {
    string_arg(args, name).and_then(|raw| raw.parse::<f64>().ok())
}

pub fn u64_arg(args: &[String], name: &str) -> Option<u64> {
    string_arg(args, name).and_then(|raw| raw.parse::<u64>().ok())
}

pub fn usize_arg(args: &[String], name: &str) -> Option<usize> {
    string_arg(args, name).and_then(|raw| raw.parse::<usize>().ok())
}

pub fn f64_list_arg(args: &[String], name: &str) -> Option<Vec<f64>> {
    let raw = string_arg(args, name)?;
    let values = raw
        .split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<f64>().ok())
        .collect::<Vec<_>>();
    (!values.is_empty()).then_some(values)
}

/// `--config`, then `GRIDIRON_CONFIG`, then the built-in preset (`--full`
/// selects every module).
pub fn resolve_config(args: &[String]) -> Result<AdjustmentConfig> {
    let path = path_arg(args, "--config").or_else(|| {
        std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    });
    match path {
        Some(path) => AdjustmentConfig::from_path(&path),
        None if has_flag(args, "--full") => Ok(AdjustmentConfig::full_adjustments()),
        None => Ok(AdjustmentConfig::default()),
    }
}

/// Where a binary reads its games from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleSource {
    File(PathBuf),
    Database(PathBuf),
}

/// `--schedule` wins over `--db`. One of them is required.
pub fn schedule_source(args: &[String]) -> Result<ScheduleSource> {
    if let Some(path) = path_arg(args, "--schedule") {
        return Ok(ScheduleSource::File(path));
    }
    if let Some(path) = path_arg(args, "--db") {
        return Ok(ScheduleSource::Database(path));
    }
    Err(EngineError::config("missing --schedule <path> or --db <path>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn both_flag_forms_parse() {
        let args = argv(&["--horizon", "6", "--seed=42", "--persist"]);
        assert_eq!(usize_arg(&args, "--horizon"), Some(6));
        assert_eq!(u64_arg(&args, "--seed"), Some(42));
        assert!(has_flag(&args, "--persist"));
        assert_eq!(string_arg(&args, "--missing"), None);
    }

    #[test]
    fn flag_value_cannot_be_another_flag() {
        let args = argv(&["--config", "--full"]);
        assert_eq!(string_arg(&args, "--config"), None);
    }

    #[test]
    fn list_arg_splits_on_commas() {
        let args = argv(&["--k-values=10,20, 32"]);
        assert_eq!(f64_list_arg(&args, "--k-values"), Some(vec![10.0, 20.0, 32.0]));
    }

    #[test]
    fn schedule_source_is_required() {
        assert!(matches!(
            schedule_source(&argv(&["--persist"])),
            Err(EngineError::Configuration(_))
        ));
        assert_eq!(
            schedule_source(&argv(&["--db", "ratings.sqlite"])).unwrap(),
            ScheduleSource::Database(PathBuf::from("ratings.sqlite"))
        );
        assert_eq!(
            schedule_source(&argv(&["--db=x.sqlite", "--schedule", "games.json"])).unwrap(),
            ScheduleSource::File(PathBuf::from("games.json"))
        );
    }
}
