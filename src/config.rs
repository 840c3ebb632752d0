use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};
use crate::rating::RatingBounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    RedZone,
    ThirdDown,
    FourthDown,
    ClockManagement,
    SituationalEfficiency,
    Quarterback,
    Injury,
    Weather,
    Travel,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 9] = [
        ModuleKind::RedZone,
        ModuleKind::ThirdDown,
        ModuleKind::FourthDown,
        ModuleKind::ClockManagement,
        ModuleKind::SituationalEfficiency,
        ModuleKind::Quarterback,
        ModuleKind::Injury,
        ModuleKind::Weather,
        ModuleKind::Travel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RedZone => "red_zone",
            Self::ThirdDown => "third_down",
            Self::FourthDown => "fourth_down",
            Self::ClockManagement => "clock_management",
            Self::SituationalEfficiency => "situational_efficiency",
            Self::Quarterback => "quarterback",
            Self::Injury => "injury",
            Self::Weather => "weather",
            Self::Travel => "travel",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weighting and bounds for one adjustment module.
///
/// `weight` converts a module's raw impact into rating points; `max_delta` is
/// in rating points; `impact_threshold` is compared against the raw impact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModuleSettings {
    #[serde(default)]
    pub enabled: bool,
    pub weight: f64,
    pub max_delta: f64,
    #[serde(default)]
    pub impact_threshold: f64,
}

impl ModuleSettings {
    pub const fn disabled(weight: f64, max_delta: f64, impact_threshold: f64) -> Self {
        Self {
            enabled: false,
            weight,
            max_delta,
            impact_threshold,
        }
    }

    pub const fn enabled(self) -> Self {
        Self {
            enabled: true,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleTable {
    pub red_zone: ModuleSettings,
    pub third_down: ModuleSettings,
    pub fourth_down: ModuleSettings,
    pub clock_management: ModuleSettings,
    pub situational_efficiency: ModuleSettings,
    pub quarterback: ModuleSettings,
    pub injury: ModuleSettings,
    pub weather: ModuleSettings,
    pub travel: ModuleSettings,
}

impl Default for ModuleTable {
    fn default() -> Self {
        Self {
            red_zone: ModuleSettings::disabled(60.0, 15.0, 0.02),
            third_down: ModuleSettings::disabled(80.0, 15.0, 0.02),
            fourth_down: ModuleSettings::disabled(30.0, 8.0, 0.05),
            clock_management: ModuleSettings::disabled(40.0, 10.0, 0.03),
            situational_efficiency: ModuleSettings::disabled(25.0, 20.0, 0.10),
            quarterback: ModuleSettings::disabled(80.0, 60.0, 0.05),
            injury: ModuleSettings::disabled(60.0, 25.0, 0.03),
            weather: ModuleSettings::disabled(20.0, 10.0, 0.05),
            travel: ModuleSettings::disabled(20.0, 10.0, 0.05),
        }
    }
}

impl ModuleTable {
    pub fn get(&self, kind: ModuleKind) -> &ModuleSettings {
        match kind {
            ModuleKind::RedZone => &self.red_zone,
            ModuleKind::ThirdDown => &self.third_down,
            ModuleKind::FourthDown => &self.fourth_down,
            ModuleKind::ClockManagement => &self.clock_management,
            ModuleKind::SituationalEfficiency => &self.situational_efficiency,
            ModuleKind::Quarterback => &self.quarterback,
            ModuleKind::Injury => &self.injury,
            ModuleKind::Weather => &self.weather,
            ModuleKind::Travel => &self.travel,
        }
    }

    pub fn get_mut(&mut self, kind: ModuleKind) -> &mut ModuleSettings {
        match kind {
            ModuleKind::RedZone => &mut self.red_zone,
            ModuleKind::ThirdDown => &mut self.third_down,
            ModuleKind::FourthDown => &mut self.fourth_down,
            ModuleKind::ClockManagement => &mut self.clock_management,
            ModuleKind::SituationalEfficiency => &mut self.situational_efficiency,
            ModuleKind::Quarterback => &mut self.quarterback,
            ModuleKind::Injury => &mut self.injury,
            ModuleKind::Weather => &mut self.weather,
            ModuleKind::Travel => &mut self.travel,
        }
    }

    pub fn enabled_kinds(&self) -> Vec<ModuleKind> {
        ModuleKind::ALL
            .into_iter()
            .filter(|k| self.get(*k).enabled)
            .collect()
    }
}

/// Parameters for one backtest run. Borrowed immutably by the engine for the
/// whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentConfig {
    pub name: String,
    pub base_rating: f64,
    pub k_factor: f64,
    /// Home-field advantage in rating points.
    pub home_field_advantage: f64,
    pub logistic_scale: f64,
    pub margin_of_victory: bool,
    /// Share of the prior rating carried into a new season.
    pub preseason_regress: f64,
    pub rating_floor: f64,
    pub rating_ceiling: f64,
    pub modules: ModuleTable,
}

impl Default for AdjustmentConfig {
    fn default() -> Self {
        Self {
            name: "baseline".to_string(),
            base_rating: 1500.0,
            k_factor: 20.0,
            home_field_advantage: 55.0,
            logistic_scale: 400.0,
            margin_of_victory: false,
            preseason_regress: 0.30,
            rating_floor: 1000.0,
            rating_ceiling: 2000.0,
            modules: ModuleTable::default(),
        }
    }
}

impl AdjustmentConfig {
    /// Baseline parameters with every adjustment module switched on.
    pub fn full_adjustments() -> Self {
        let mut cfg = Self {
            name: "full".to_string(),
            margin_of_victory: true,
            ..Self::default()
        };
        for kind in ModuleKind::ALL {
            let m = cfg.modules.get_mut(kind);
            *m = m.enabled();
        }
        cfg
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn bounds(&self) -> RatingBounds {
        RatingBounds {
            floor: self.rating_floor,
            ceiling: self.rating_ceiling,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::config("config name must not be empty"));
        }
        require_finite("base_rating", self.base_rating)?;
        require_finite("home_field_advantage", self.home_field_advantage)?;
        if !self.k_factor.is_finite() || self.k_factor < 0.0 {
            return Err(EngineError::config(format!(
                "k_factor must be a non-negative number, got {}",
                self.k_factor
            )));
        }
        if !self.logistic_scale.is_finite() || self.logistic_scale <= 0.0 {
            return Err(EngineError::config(format!(
                "logistic_scale must be positive, got {}",
                self.logistic_scale
            )));
        }
        if !(0.0..=1.0).contains(&self.preseason_regress) {
            return Err(EngineError::config(format!(
                "preseason_regress must be within [0, 1], got {}",
                self.preseason_regress
            )));
        }
        require_finite("rating_floor", self.rating_floor)?;
        require_finite("rating_ceiling", self.rating_ceiling)?;
        if self.rating_floor >= self.rating_ceiling {
            return Err(EngineError::config(format!(
                "rating_floor {} must be below rating_ceiling {}",
                self.rating_floor, self.rating_ceiling
            )));
        }
        if !(self.rating_floor..=self.rating_ceiling).contains(&self.base_rating) {
            return Err(EngineError::config(format!(
                "base_rating {} outside rating bounds",
                self.base_rating
            )));
        }

        for kind in ModuleKind::ALL {
            let m = self.modules.get(kind);
            for (field, value) in [
                ("weight", m.weight),
                ("max_delta", m.max_delta),
                ("impact_threshold", m.impact_threshold),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(EngineError::config(format!(
                        "{kind}.{field} must be a non-negative number, got {value}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Loads a config from `.json` or `.toml` and validates it.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&raw)?,
            _ => serde_json::from_str(&raw)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Stable content hash, used to key calibration reports.
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        let digest = Sha256::digest(&bytes);
        Ok(format!("{digest:x}")[..16].to_string())
    }
}

fn require_finite(field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::config(format!("{field} must be finite")))
    }
}
