use serde::{Deserialize, Serialize};

use crate::model::GamePrediction;

pub const DEFAULT_BINS: usize = 10;

const LOG_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub samples: usize,
    pub accuracy: f64,
    pub brier: f64,
    pub log_loss: f64,
    pub ece: f64,
    pub sharpness: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

/// Reference forecasters a model should beat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baselines {
    /// Always 0.5.
    pub coin_flip: Metrics,
    /// Always the observed home-win rate.
    pub home_rate: Metrics,
    pub home_rate_value: f64,
}

/// Everything reported for one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub config_name: String,
    pub config_fingerprint: String,
    pub metrics: Metrics,
    pub bins: Vec<CalibrationBin>,
    pub baselines: Baselines,
}

impl CalibrationReport {
    pub fn from_predictions(
        config_name: &str,
        config_fingerprint: &str,
        predictions: &[GamePrediction],
    ) -> Self {
        let (probs, outcomes) = split(predictions);
        Self {
            config_name: config_name.to_string(),
            config_fingerprint: config_fingerprint.to_string(),
            metrics: evaluate_probs(&probs, &outcomes),
            bins: calibration_bins(&probs, &outcomes, DEFAULT_BINS),
            baselines: baselines(&outcomes),
        }
    }
}

/// `predictions` are home-win probabilities; `outcomes` are 1, 0.5 (tie) or 0.
pub fn evaluate_probs(predictions: &[f64], outcomes: &[f64]) -> Metrics {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return Metrics::default();
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;

    for (p, y) in predictions.iter().zip(outcomes) {
        brier_sum += (p - y).powi(2);
        let p = p.clamp(LOG_EPS, 1.0 - LOG_EPS);
        log_loss_sum += -(y * p.ln() + (1.0 - y) * (1.0 - p).ln());

        // The favorite is home at p >= 0.5; a tie is never a correct pick.
        let home_favored = p >= 0.5;
        if (home_favored && *y > 0.5) || (!home_favored && *y < 0.5) {
            correct += 1;
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        accuracy: correct as f64 / n,
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        ece: expected_calibration_error(predictions, outcomes, DEFAULT_BINS),
        sharpness: sharpness(predictions),
    }
}

pub fn calibration_bins(predictions: &[f64], outcomes: &[f64], bins: usize) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for (p, y) in predictions.iter().zip(outcomes) {
        let p = p.clamp(0.0, 1.0);
        let idx = ((p * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += p;
        actual_sum[idx] += y;
    }

    let mut out = Vec::with_capacity(bins);
    for i in 0..bins {
        let count = counts[i];
        let (avg_pred, actual_rate) = if count > 0 {
            (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
        } else {
            (0.0, 0.0)
        };
        out.push(CalibrationBin {
            bucket_start: i as f64 / bins as f64,
            bucket_end: (i + 1) as f64 / bins as f64,
            count,
            avg_pred,
            actual_rate,
        });
    }
    out
}

/// Count-weighted mean gap between predicted and observed rate per bin.
pub fn expected_calibration_error(predictions: &[f64], outcomes: &[f64], bins: usize) -> f64 {
    let total = predictions.len().min(outcomes.len());
    if total == 0 {
        return 0.0;
    }
    calibration_bins(predictions, outcomes, bins)
        .iter()
        .filter(|b| b.count > 0)
        .map(|b| (b.count as f64 / total as f64) * (b.avg_pred - b.actual_rate).abs())
        .sum()
}

/// Variance of the predicted probabilities.
pub fn sharpness(predictions: &[f64]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let n = predictions.len() as f64;
    let mean = predictions.iter().sum::<f64>() / n;
    predictions.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n
}

pub fn empirical_home_rate(outcomes: &[f64]) -> f64 {
    if outcomes.is_empty() {
        return 0.5;
    }
    outcomes.iter().sum::<f64>() / outcomes.len() as f64
}

pub fn baselines(outcomes: &[f64]) -> Baselines {
    let rate = empirical_home_rate(outcomes);
    Baselines {
        coin_flip: evaluate_probs(&vec![0.5; outcomes.len()], outcomes),
        home_rate: evaluate_probs(&vec![rate; outcomes.len()], outcomes),
        home_rate_value: rate,
    }
}

fn split(predictions: &[GamePrediction]) -> (Vec<f64>, Vec<f64>) {
    predictions.iter().map(|p| (p.p_home, p.actual)).unzip()
}
