use crate::config::ModuleKind;
use crate::model::Side;
use crate::situational::{
    FOURTH_DOWN_EFFICIENCY, LATE_GAME_EFFICIENCY, RED_ZONE_EFFICIENCY, THIRD_DOWN_EFFICIENCY,
    TWO_MINUTE_EFFICIENCY,
};

use super::{AdjustmentContext, AdjustmentModule};

/// Touchdown rate inside the opponent's 20 versus the league.
pub struct RedZoneModule;

impl AdjustmentModule for RedZoneModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::RedZone
    }

    fn compute_team_metric(&self, team: &str, _side: Side, ctx: &AdjustmentContext<'_>) -> f64 {
        ctx.situational.relative_metric(team, RED_ZONE_EFFICIENCY)
    }
}

pub struct ThirdDownModule;

impl AdjustmentModule for ThirdDownModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::ThirdDown
    }

    fn compute_team_metric(&self, team: &str, _side: Side, ctx: &AdjustmentContext<'_>) -> f64 {
        ctx.situational.relative_metric(team, THIRD_DOWN_EFFICIENCY)
    }
}

pub struct FourthDownModule;

impl AdjustmentModule for FourthDownModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::FourthDown
    }

    fn compute_team_metric(&self, team: &str, _side: Side, ctx: &AdjustmentContext<'_>) -> f64 {
        ctx.situational.relative_metric(team, FOURTH_DOWN_EFFICIENCY)
    }
}

/// End-of-half and end-of-game execution: mean of two-minute drill and
/// late-game possession efficiency, each relative to the league.
pub struct ClockManagementModule;

impl AdjustmentModule for ClockManagementModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::ClockManagement
    }

    fn compute_team_metric(&self, team: &str, _side: Side, ctx: &AdjustmentContext<'_>) -> f64 {
        let two_minute = ctx.situational.relative_metric(team, TWO_MINUTE_EFFICIENCY);
        let late_game = ctx.situational.relative_metric(team, LATE_GAME_EFFICIENCY);
        0.5 * (two_minute + late_game)
    }
}

/// Normalized composite of every core situational metric.
pub struct SituationalEfficiencyModule;

impl AdjustmentModule for SituationalEfficiencyModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::SituationalEfficiency
    }

    fn compute_team_metric(&self, team: &str, _side: Side, ctx: &AdjustmentContext<'_>) -> f64 {
        ctx.situational.composite_or_neutral(team)
    }
}
