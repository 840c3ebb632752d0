//! Situational adjustments applied to the rating differential.
//!
//! Every module maps one team plus game context to a raw impact. The shared
//! [`to_delta`] transform turns raw impact into bounded rating points, so a new
//! signal only needs a metric function.

mod conditions;
mod efficiency;

use serde::{Deserialize, Serialize};

use crate::config::{ModuleKind, ModuleSettings, ModuleTable};
use crate::model::{GameRecord, Side};
use crate::situational::SituationalDatabase;

pub use conditions::{InjuryModule, QuarterbackModule, TravelModule, WeatherModule};
pub use efficiency::{
    ClockManagementModule, FourthDownModule, RedZoneModule, SituationalEfficiencyModule,
    ThirdDownModule,
};

/// Inputs shared by every module for one game.
#[derive(Debug, Clone, Copy)]
pub struct AdjustmentContext<'a> {
    pub game: &'a GameRecord,
    pub situational: &'a SituationalDatabase,
}

pub trait AdjustmentModule: Send + Sync {
    fn kind(&self) -> ModuleKind;

    /// Raw impact for one side of the game. 0 means league-average/neutral.
    fn compute_team_metric(&self, team: &str, side: Side, ctx: &AdjustmentContext<'_>) -> f64;

    /// Raw impacts for (home, away), each computed independently.
    fn compute_pair(&self, ctx: &AdjustmentContext<'_>) -> (f64, f64) {
        (
            self.compute_team_metric(&ctx.game.home_team, Side::Home, ctx),
            self.compute_team_metric(&ctx.game.away_team, Side::Away, ctx),
        )
    }
}

/// Weight, suppress below threshold, clamp to `[-max_delta, max_delta]`.
pub fn to_delta(raw_impact: f64, settings: &ModuleSettings) -> f64 {
    if !raw_impact.is_finite() || raw_impact.abs() < settings.impact_threshold {
        return 0.0;
    }
    (raw_impact * settings.weight).clamp(-settings.max_delta, settings.max_delta)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModuleDelta {
    pub kind: ModuleKind,
    pub home_raw: f64,
    pub away_raw: f64,
    pub home_delta: f64,
    pub away_delta: f64,
}

impl ModuleDelta {
    /// Contribution to the home-minus-away rating differential.
    pub fn differential(&self) -> f64 {
        self.home_delta - self.away_delta
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentBreakdown {
    pub modules: Vec<ModuleDelta>,
}

impl AdjustmentBreakdown {
    pub fn home_total(&self) -> f64 {
        self.modules.iter().map(|m| m.home_delta).sum()
    }

    pub fn away_total(&self) -> f64 {
        self.modules.iter().map(|m| m.away_delta).sum()
    }

    pub fn net(&self) -> f64 {
        self.home_total() - self.away_total()
    }

    /// Per-module differentials, ready for `rating::win_probability`.
    pub fn differentials(&self) -> Vec<f64> {
        self.modules.iter().map(ModuleDelta::differential).collect()
    }
}

pub struct AdjustmentPipeline {
    modules: Vec<Box<dyn AdjustmentModule>>,
}

impl Default for AdjustmentPipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl AdjustmentPipeline {
    /// Every built-in module; the config decides which ones contribute.
    pub fn standard() -> Self {
        Self::with_modules(vec![
            Box::new(RedZoneModule),
            Box::new(ThirdDownModule),
            Box::new(FourthDownModule),
            Box::new(ClockManagementModule),
            Box::new(SituationalEfficiencyModule),
            Box::new(QuarterbackModule),
            Box::new(InjuryModule),
            Box::new(WeatherModule),
            Box::new(TravelModule),
        ])
    }

    pub fn with_modules(modules: Vec<Box<dyn AdjustmentModule>>) -> Self {
        Self { modules }
    }

    pub fn kinds(&self) -> Vec<ModuleKind> {
        self.modules.iter().map(|m| m.kind()).collect()
    }

    pub fn evaluate(
        &self,
        table: &ModuleTable,
        ctx: &AdjustmentContext<'_>,
    ) -> AdjustmentBreakdown {
        let mut out = AdjustmentBreakdown::default();
        for module in &self.modules {
            let settings = table.get(module.kind());
            if !settings.enabled {
                continue;
            }
            let (home_raw, away_raw) = module.compute_pair(ctx);
            out.modules.push(ModuleDelta {
                kind: module.kind(),
                home_raw,
                away_raw,
                home_delta: to_delta(home_raw, settings),
                away_delta: to_delta(away_raw, settings),
            });
        }
        out
    }
}
