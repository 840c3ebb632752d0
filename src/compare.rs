use std::cmp::Ordering;
use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backtest::{BacktestEngine, BacktestRun};
use crate::calibration::CalibrationReport;
use crate::config::{AdjustmentConfig, ModuleKind};
use crate::error::{EngineError, Result};
use crate::model::GameRecord;
use crate::parallel::with_engine_pool;
use crate::situational::SituationalDatabase;

/// One configuration's result in a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigOutcome {
    pub report: CalibrationReport,
    pub skipped_games: usize,
    /// Log loss of the home-rate baseline minus this config's log loss.
    pub gain_vs_home_rate: f64,
}

impl ConfigOutcome {
    fn from_run(run: &BacktestRun) -> Option<Self> {
        let report = run.report.clone()?;
        Some(Self {
            gain_vs_home_rate: report.baselines.home_rate.log_loss - report.metrics.log_loss,
            skipped_games: run.skipped_games,
            report,
        })
    }

    pub fn config_name(&self) -> &str {
        &self.report.config_name
    }
}

/// Replays the same schedule under every config in parallel and ranks the
/// results, best first.
///
/// Every config is validated up front; names must be unique because reports
/// are keyed by name.
pub fn compare_configs(
    configs: &[AdjustmentConfig],
    games: &[GameRecord],
    situational: &SituationalDatabase,
) -> Result<Vec<ConfigOutcome>> {
    let mut names = BTreeSet::new();
    for cfg in configs {
        cfg.validate()?;
        if !names.insert(cfg.name.as_str()) {
            return Err(EngineError::config(format!(
                "duplicate config name {}",
                cfg.name
            )));
        }
    }

    info!(configs = configs.len(), games = games.len(), "comparing configs");

    let runs: Vec<Result<BacktestRun>> = with_engine_pool(|| {
        configs
            .par_iter()
            .map(|cfg| BacktestEngine::new(cfg, situational)?.run(games))
            .collect()
    });

    let mut outcomes = Vec::with_capacity(runs.len());
    for run in runs {
        if let Some(outcome) = ConfigOutcome::from_run(&run?) {
            outcomes.push(outcome);
        }
    }
    outcomes.sort_by(compare_outcomes);
    Ok(outcomes)
}

/// Lower log loss first, then lower Brier, higher accuracy, and name.
pub fn compare_outcomes(a: &ConfigOutcome, b: &ConfigOutcome) -> Ordering {
    let (ma, mb) = (&a.report.metrics, &b.report.metrics);
    ma.log_loss
        .partial_cmp(&mb.log_loss)
        .unwrap_or(Ordering::Equal)
        .then_with(|| ma.brier.partial_cmp(&mb.brier).unwrap_or(Ordering::Equal))
        .then_with(|| {
            mb.accuracy
                .partial_cmp(&ma.accuracy)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.config_name().cmp(b.config_name()))
}

/// `base` with no modules, `base` with all modules, and every all-but-one
/// variant, so each module's marginal value shows up in one comparison.
pub fn ablation_configs(base: &AdjustmentConfig) -> Vec<AdjustmentConfig> {
    let mut plain = base.clone().with_name(format!("{}_plain", base.name));
    for kind in ModuleKind::ALL {
        plain.modules.get_mut(kind).enabled = false;
    }

    let mut full = base.clone().with_name(format!("{}_full", base.name));
    for kind in ModuleKind::ALL {
        full.modules.get_mut(kind).enabled = true;
    }

    let mut out = vec![plain, full.clone()];
    for kind in ModuleKind::ALL {
        let mut without = full.clone().with_name(format!("{}_without_{kind}", base.name));
        without.modules.get_mut(kind).enabled = false;
        out.push(without);
    }
    out
}

/// One variant of `base` per k-factor.
pub fn k_factor_sweep(base: &AdjustmentConfig, k_values: &[f64]) -> Vec<AdjustmentConfig> {
    k_values
        .iter()
        .map(|k| AdjustmentConfig {
            name: format!("{}_k{k}", base.name),
            k_factor: *k,
            ..base.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ablation_covers_every_module_once() {
        let configs = ablation_configs(&AdjustmentConfig::default());
        assert_eq!(configs.len(), ModuleKind::ALL.len() + 2);
        assert!(configs[0].modules.enabled_kinds().is_empty());
        assert_eq!(configs[1].modules.enabled_kinds().len(), ModuleKind::ALL.len());
        for cfg in &configs[2..] {
            assert_eq!(cfg.modules.enabled_kinds().len(), ModuleKind::ALL.len() - 1);
        }
        let names: BTreeSet<_> = configs.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names.len(), configs.len());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let cfg = AdjustmentConfig::default();
        let err = compare_configs(
            &[cfg.clone(), cfg],
            &[],
            &SituationalDatabase::empty("2023"),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn sweep_renames_each_variant() {
        let configs = k_factor_sweep(&AdjustmentConfig::default(), &[10.0, 20.0, 32.0]);
        assert_eq!(configs.len(), 3);
        assert_eq!(configs[2].k_factor, 32.0);
        assert_eq!(configs[0].name, "baseline_k10");
    }
}
