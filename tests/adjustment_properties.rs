use std::collections::BTreeMap;

use chrono::NaiveDate;
use proptest::prelude::*;

use gridiron_elo::adjustments::{AdjustmentContext, AdjustmentPipeline, to_delta};
use gridiron_elo::backtest::BacktestEngine;
use gridiron_elo::config::{AdjustmentConfig, ModuleKind, ModuleSettings};
use gridiron_elo::model::{GameConditions, GameRecord, TeamConditions, Weather};
use gridiron_elo::rating::win_probability;
use gridiron_elo::situational::{CORE_METRICS, SituationalDatabase};

const TEAMS: [&str; 4] = ["NE", "NYJ", "MIA", "BUF"];

fn database(values: &[f64]) -> SituationalDatabase {
    let teams = TEAMS
        .iter()
        .enumerate()
        .map(|(t, team)| {
            let metrics = CORE_METRICS
                .iter()
                .enumerate()
                .map(|(m, name)| {
                    let value = values[(t * CORE_METRICS.len() + m) % values.len()];
                    (name.to_string(), value)
                })
                .collect::<BTreeMap<_, _>>();
            (team.to_string(), metrics)
        })
        .collect();
    SituationalDatabase::from_metrics("prop", teams)
}

fn game(
    home: &str,
    away: &str,
    score: Option<(u16, u16)>,
    conditions: Option<GameConditions>,
) -> GameRecord {
    GameRecord {
        season: 2023,
        week: 1,
        home_team: home.to_string(),
        away_team: away.to_string(),
        home_score: score.map(|s| s.0),
        away_score: score.map(|s| s.1),
        game_date: NaiveDate::from_ymd_opt(2023, 9, 10).unwrap(),
        completed: score.is_some(),
        conditions,
    }
}

fn conditions_strategy() -> impl Strategy<Value = GameConditions> {
    let team = (any::<bool>(), 0.0f64..1.0, 0u32..30, 0.0f64..3500.0, prop::option::of(3u32..14))
        .prop_map(|(qb_out, drop, injured, miles, rest)| TeamConditions {
            starting_qb_out: qb_out,
            qb_drop_off: drop,
            injured_starters: injured,
            travel_miles: miles,
            rest_days: rest,
        });
    let weather = (-10.0f64..110.0, 0.0f64..45.0, any::<bool>(), any::<bool>()).prop_map(
        |(temperature_f, wind_mph, precipitation, indoor)| Weather {
            temperature_f,
            wind_mph,
            precipitation,
            indoor,
        },
    );
    (team.clone(), team, prop::option::of(weather))
        .prop_map(|(home, away, weather)| GameConditions { home, away, weather })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn to_delta_never_exceeds_cap(
        raw in -50.0f64..50.0,
        weight in 0.0f64..500.0,
        max_delta in 0.0f64..80.0,
        threshold in 0.0f64..0.2,
    ) {
        let settings = ModuleSettings {
            enabled: true,
            weight,
            max_delta,
            impact_threshold: threshold,
        };
        let delta = to_delta(raw, &settings);
        prop_assert!(delta.abs() <= max_delta);
        if raw.abs() < threshold {
            prop_assert_eq!(delta, 0.0);
        }
    }

    #[test]
    fn every_module_delta_is_bounded(
        values in prop::collection::vec(0.0f64..1.0, 4..40),
        conditions in conditions_strategy(),
        home in 0usize..4,
        offset in 1usize..4,
    ) {
        let db = database(&values);
        let cfg = AdjustmentConfig::full_adjustments();
        let g = game(TEAMS[home], TEAMS[(home + offset) % 4], None, Some(conditions));
        let ctx = AdjustmentContext { game: &g, situational: &db };
        let breakdown = AdjustmentPipeline::standard().evaluate(&cfg.modules, &ctx);
        prop_assert_eq!(breakdown.modules.len(), ModuleKind::ALL.len());
        for m in &breakdown.modules {
            let cap = cfg.modules.get(m.kind).max_delta;
            prop_assert!(m.home_delta.abs() <= cap, "{} home {}", m.kind, m.home_delta);
            prop_assert!(m.away_delta.abs() <= cap, "{} away {}", m.kind, m.away_delta);
        }
    }

    #[test]
    fn unknown_team_never_raises(values in prop::collection::vec(0.0f64..1.0, 4..20)) {
        let db = database(&values);
        let cfg = AdjustmentConfig::full_adjustments();
        let g = game("NE", "LV", None, None);
        let ctx = AdjustmentContext { game: &g, situational: &db };
        let breakdown = AdjustmentPipeline::standard().evaluate(&cfg.modules, &ctx);
        for m in &breakdown.modules {
            prop_assert_eq!(m.away_delta, 0.0);
        }
    }

    #[test]
    fn win_probability_is_open_interval(
        home in 1000.0f64..2000.0,
        away in 1000.0f64..2000.0,
        hfa in 0.0f64..100.0,
        deltas in prop::collection::vec(-60.0f64..60.0, 0..9),
    ) {
        let p = win_probability(home, away, hfa, 400.0, &deltas);
        prop_assert!(p > 0.0 && p < 1.0);
    }

    #[test]
    fn updates_are_zero_sum_for_any_scores(
        scores in prop::collection::vec((0u16..60, 0u16..60), 1..12),
        mov in any::<bool>(),
    ) {
        let games = scores
            .iter()
            .enumerate()
            .map(|(i, (h, a))| {
                let mut g = game(TEAMS[i % 4], TEAMS[(i + 1) % 4], Some((*h, *a)), None);
                g.week = u8::try_from(i / 2 + 1).unwrap();
                g
            })
            .collect::<Vec<_>>();
        let cfg = AdjustmentConfig { margin_of_victory: mov, ..AdjustmentConfig::default() };
        let db = SituationalDatabase::empty("prop");
        let run = BacktestEngine::new(&cfg, &db).unwrap().run(&games).unwrap();
        for p in &run.predictions {
            prop_assert_eq!(p.home_delta, -p.away_delta);
        }
        let seeded = run.snapshot.len() as f64 * cfg.base_rating;
        prop_assert!((run.snapshot.total_rating() - seeded).abs() < 1e-6);
    }
}
