use crate::config::ModuleKind;
use crate::model::{Side, Weather};

use super::{AdjustmentContext, AdjustmentModule};

/// Assumed drop-off when a starter is ruled out without an estimate.
const DEFAULT_QB_DROP_OFF: f64 = 0.5;
/// Typical count of offensive plus defensive starters.
const STARTERS: f64 = 22.0;
const CROSS_COUNTRY_MILES: f64 = 2500.0;
const STANDARD_REST_DAYS: f64 = 7.0;

/// Penalty for a side whose starting quarterback is out.
pub struct QuarterbackModule;

impl AdjustmentModule for QuarterbackModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Quarterback
    }

    fn compute_team_metric(&self, _team: &str, side: Side, ctx: &AdjustmentContext<'_>) -> f64 {
        let Some(c) = ctx.game.team_conditions(side) else {
            return 0.0;
        };
        if !c.starting_qb_out {
            return 0.0;
        }
        let drop = if c.qb_drop_off > 0.0 {
            c.qb_drop_off
        } else {
            DEFAULT_QB_DROP_OFF
        };
        -drop.clamp(0.0, 1.0)
    }
}

/// Share of starters unavailable.
pub struct InjuryModule;

impl AdjustmentModule for InjuryModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Injury
    }

    fn compute_team_metric(&self, _team: &str, side: Side, ctx: &AdjustmentContext<'_>) -> f64 {
        ctx.game
            .team_conditions(side)
            .map(|c| -(f64::from(c.injured_starters) / STARTERS).min(1.0))
            .unwrap_or(0.0)
    }
}

/// Adverse weather counts against the visiting side only.
pub struct WeatherModule;

impl WeatherModule {
    /// 0 for benign or indoor conditions, up to 1 for severe.
    pub fn severity(weather: &Weather) -> f64 {
        if weather.indoor {
            return 0.0;
        }
        let wind = ((weather.wind_mph - 15.0) / 20.0).max(0.0);
        let cold = ((25.0 - weather.temperature_f) / 40.0).max(0.0);
        let heat = ((weather.temperature_f - 95.0) / 20.0).max(0.0);
        let wet = if weather.precipitation { 0.3 } else { 0.0 };
        (wind + cold + heat + wet).clamp(0.0, 1.0)
    }
}

impl AdjustmentModule for WeatherModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Weather
    }

    fn compute_team_metric(&self, _team: &str, side: Side, ctx: &AdjustmentContext<'_>) -> f64 {
        if side == Side::Home {
            return 0.0;
        }
        ctx.game.weather().map(|w| -Self::severity(w)).unwrap_or(0.0)
    }
}

/// Distance travelled plus rest relative to a standard week.
pub struct TravelModule;

impl AdjustmentModule for TravelModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Travel
    }

    fn compute_team_metric(&self, _team: &str, side: Side, ctx: &AdjustmentContext<'_>) -> f64 {
        let Some(c) = ctx.game.team_conditions(side) else {
            return 0.0;
        };
        let distance = -0.5 * (c.travel_miles.max(0.0) / CROSS_COUNTRY_MILES).min(1.0);
        let rest = c
            .rest_days
            .map(|d| {
                let rested = (f64::from(d) - STANDARD_REST_DAYS) / STANDARD_REST_DAYS;
                0.5 * rested.clamp(-0.5, 0.5)
            })
            .unwrap_or(0.0);
        distance + rest
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{GameConditions, GameRecord, TeamConditions};
    use crate::situational::SituationalDatabase;

    fn game(conditions: Option<GameConditions>) -> GameRecord {
        GameRecord {
            season: 2023,
            week: 14,
            home_team: "BUF".to_string(),
            away_team: "MIA".to_string(),
            home_score: None,
            away_score: None,
            game_date: NaiveDate::from_ymd_opt(2023, 12, 10).unwrap(),
            completed: false,
            conditions,
        }
    }

    #[test]
    fn no_conditions_means_no_impact() {
        let g = game(None);
        let db = SituationalDatabase::empty("2023");
        let ctx = AdjustmentContext {
            game: &g,
            situational: &db,
        };
        let modules: [&dyn AdjustmentModule; 4] =
            [&QuarterbackModule, &InjuryModule, &WeatherModule, &TravelModule];
        for m in modules {
            assert_eq!(m.compute_pair(&ctx), (0.0, 0.0), "{}", m.kind());
        }
    }

    #[test]
    fn backup_qb_and_injuries_penalize_that_side() {
        let g = game(Some(GameConditions {
            home: TeamConditions {
                starting_qb_out: true,
                qb_drop_off: 0.7,
                ..Default::default()
            },
            away: TeamConditions {
                injured_starters: 11,
                ..Default::default()
            },
            weather: None,
        }));
        let db = SituationalDatabase::empty("2023");
        let ctx = AdjustmentContext {
            game: &g,
            situational: &db,
        };
        assert_eq!(QuarterbackModule.compute_pair(&ctx), (-0.7, 0.0));
        assert_eq!(InjuryModule.compute_pair(&ctx), (0.0, -0.5));
    }

    #[test]
    fn snow_and_wind_hurt_visitors() {
        let g = game(Some(GameConditions {
            weather: Some(Weather {
                temperature_f: 20.0,
                wind_mph: 25.0,
                precipitation: true,
                indoor: false,
            }),
            ..Default::default()
        }));
        let db = SituationalDatabase::empty("2023");
        let ctx = AdjustmentContext {
            game: &g,
            situational: &db,
        };
        let (home, away) = WeatherModule.compute_pair(&ctx);
        assert_eq!(home, 0.0);
        assert!(away < -0.5);
    }

    #[test]
    fn long_trip_on_short_rest_is_worse_than_home() {
        let g = game(Some(GameConditions {
            away: TeamConditions {
                travel_miles: 1400.0,
                rest_days: Some(4),
                ..Default::default()
            },
            ..Default::default()
        }));
        let db = SituationalDatabase::empty("2023");
        let ctx = AdjustmentContext {
            game: &g,
            situational: &db,
        };
        let (home, away) = TravelModule.compute_pair(&ctx);
        assert_eq!(home, 0.0);
        assert!(away < -0.3);
    }
}
