use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::backtest::BacktestRun;
use crate::calibration::{CalibrationReport, Metrics};
use crate::model::{GamePrediction, ProjectionRecord, TeamRating};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportReport {
    pub ratings: usize,
    pub predictions: usize,
    pub projections: usize,
    pub calibration_bins: usize,
}

enum Cell {
    Text(String),
    Number(f64),
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Cell::Number(f64::from(value))
    }
}

/// Writes a run (and optional projections) to an `.xlsx` workbook with one
/// sheet per table.
pub fn export_run(
    path: &Path,
    run: &BacktestRun,
    projections: &[ProjectionRecord],
) -> Result<ExportReport> {
    let rating_rows = std::iter::once(header(&[
        "season", "week", "team", "rating", "change", "wins", "losses", "ties", "win_pct",
    ]))
    .chain(run.history.iter().map(rating_row))
    .collect::<Vec<_>>();

    let prediction_rows = std::iter::once(header(&[
        "season",
        "week",
        "home",
        "away",
        "p_home",
        "actual",
        "home_delta",
        "away_delta",
        "adjustment_diff",
    ]))
    .chain(run.predictions.iter().map(prediction_row))
    .collect::<Vec<_>>();

    let projection_rows = std::iter::once(header(&[
        "team",
        "season",
        "week",
        "projected_rating",
        "confidence",
        "method",
        "trend",
        "volatility",
    ]))
    .chain(projections.iter().map(projection_row))
    .collect::<Vec<_>>();

    let calibration_rows = run
        .report
        .as_ref()
        .map(calibration_sheet)
        .unwrap_or_default();

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Ratings")?;
        write_rows(sheet, &rating_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Predictions")?;
        write_rows(sheet, &prediction_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Projections")?;
        write_rows(sheet, &projection_rows)?;
    }
    if !calibration_rows.is_empty() {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Calibration")?;
        write_rows(sheet, &calibration_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        ratings: run.history.len(),
        predictions: run.predictions.len(),
        projections: projections.len(),
        calibration_bins: run.report.as_ref().map(|r| r.bins.len()).unwrap_or(0),
    })
}

fn header(names: &[&str]) -> Vec<Cell> {
    names.iter().map(|n| Cell::from(*n)).collect()
}

fn rating_row(r: &TeamRating) -> Vec<Cell> {
    vec![
        u32::from(r.season).into(),
        u32::from(r.week).into(),
        r.team_id.clone().into(),
        r.rating.into(),
        r.rating_change.into(),
        r.wins.into(),
        r.losses.into(),
        r.ties.into(),
        r.win_pct.into(),
    ]
}

fn prediction_row(p: &GamePrediction) -> Vec<Cell> {
    vec![
        u32::from(p.season).into(),
        u32::from(p.week).into(),
        p.home_team.clone().into(),
        p.away_team.clone().into(),
        p.p_home.into(),
        p.actual.into(),
        p.home_delta.into(),
        p.away_delta.into(),
        p.adjustment_diff.into(),
    ]
}

fn projection_row(p: &ProjectionRecord) -> Vec<Cell> {
    vec![
        p.team.clone().into(),
        u32::from(p.season).into(),
        u32::from(p.week).into(),
        p.projected_rating.into(),
        p.confidence_score.into(),
        p.method.as_str().into(),
        p.trend.into(),
        p.volatility.into(),
    ]
}

/// Model and both baselines side by side for one metric.
fn metric_row(report: &CalibrationReport, name: &str, pick: fn(&Metrics) -> f64) -> Vec<Cell> {
    vec![
        name.into(),
        pick(&report.metrics).into(),
        pick(&report.baselines.coin_flip).into(),
        pick(&report.baselines.home_rate).into(),
    ]
}

fn calibration_sheet(report: &CalibrationReport) -> Vec<Vec<Cell>> {
    let mut rows = vec![
        header(&["metric", "model", "coin_flip", "home_rate"]),
        metric_row(report, "log_loss", |m| m.log_loss),
        metric_row(report, "brier", |m| m.brier),
        metric_row(report, "accuracy", |m| m.accuracy),
        metric_row(report, "ece", |m| m.ece),
        metric_row(report, "sharpness", |m| m.sharpness),
        Vec::new(),
        header(&["bucket_start", "bucket_end", "count", "avg_pred", "actual_rate"]),
    ];
    for bin in &report.bins {
        rows.push(vec![
            bin.bucket_start.into(),
            bin.bucket_end.into(),
            (bin.count as f64).into(),
            bin.avg_pred.into(),
            bin.actual_rate.into(),
        ]);
    }
    rows
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<Cell>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            let (r, c) = (row_idx as u32, col_idx as u16);
            let written = match value {
                Cell::Text(text) => worksheet.write_string(r, c, text),
                Cell::Number(n) => worksheet.write_number(r, c, *n),
            };
            written.with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
