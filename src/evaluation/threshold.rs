//! Binary classification threshold sweep.
//!
//! Every row is computed independently from the same borrowed records, so the
//! grid can be mapped sequentially or across the rayon pool with identical output.

use rayon::prelude::*;

use crate::common::error::{RetroError, RetroResult};
use crate::common::time;

use super::domain::{
    CostModel, EvalMeta, Metric, MetricKind, ScoredRecord, ThresholdCounts, ThresholdRow,
};

/// Number of evaluated thresholds, `0.00..=1.00` in steps of `0.01`.
pub const GRID_POINTS: usize = 101;

/// Tuning knobs for a sweep. They never change the result.
#[derive(Copy, Clone, Debug)]
pub struct SweepOptions {
    pub parallel_min_records: usize,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            parallel_min_records: 50_000,
        }
    }
}

impl SweepOptions {
    /// Whether a sweep over `records` rows runs on the rayon pool.
    pub fn runs_parallel(&self, records: usize) -> bool {
        records >= self.parallel_min_records
    }
}

/// The fixed threshold grid, ascending.
pub fn threshold_grid() -> [f64; GRID_POINTS] {
    std::array::from_fn(|i| i as f64 / (GRID_POINTS - 1) as f64)
}

/// Sweep the grid with default options.
pub fn evaluate(
    records: &[ScoredRecord],
    model_name: &str,
    grouping: Option<&str>,
    cost: &CostModel,
) -> Vec<ThresholdRow> {
    evaluate_with(records, model_name, grouping, cost, SweepOptions::default())
}

/// Sweep the grid. Never fails: undefined ratios are marked, not raised.
pub fn evaluate_with(
    records: &[ScoredRecord],
    model_name: &str,
    grouping: Option<&str>,
    cost: &CostModel,
    opts: SweepOptions,
) -> Vec<ThresholdRow> {
    let meta = EvalMeta::new(model_name, grouping, time::timestamp());
    let grid = threshold_grid();
    let row = |&t: &f64| build_row(meta.clone(), t, count_at(records, t), cost);

    let rows: Vec<ThresholdRow> = if opts.runs_parallel(records.len()) {
        grid[..].par_iter().map(row).collect()
    } else {
        grid.iter().map(row).collect()
    };

    tracing::debug!(
        model = model_name,
        records = records.len(),
        rows = rows.len(),
        "threshold sweep complete"
    );
    rows
}

/// Confusion counts at `t` using strict comparisons; `p1 == t` lands in no bucket.
pub fn count_at(records: &[ScoredRecord], t: f64) -> ThresholdCounts {
    let init = ThresholdCounts {
        n_total: records.len() as u64,
        ..ThresholdCounts::default()
    };
    records.iter().fold(init, |mut c, r| {
        let above = r.p1 > t;
        let below = r.p1 < t;
        if below {
            c.n += 1;
        }
        match r.label {
            1 => {
                c.p_total += 1;
                if above {
                    c.tp += 1;
                    c.p += 1;
                } else if below {
                    c.fn_ += 1;
                }
            }
            0 => {
                if above {
                    c.fp += 1;
                } else if below {
                    c.tn += 1;
                }
            }
            _ => {}
        }
        c
    })
}

fn build_row(meta: EvalMeta, threshold: f64, c: ThresholdCounts, cost: &CostModel) -> ThresholdRow {
    let tp = c.tp as f64;
    let tn = c.tn as f64;
    let fp = c.fp as f64;
    let fn_ = c.fn_ as f64;
    let n_total = c.n_total as f64;
    let p_total = c.p_total as f64;

    let mcc = if tp + fp == 0.0 || tp + fn_ == 0.0 || tn + fp == 0.0 || tn + fn_ == 0.0 {
        Metric::UNDEFINED
    } else {
        Metric::defined(
            (tp * tn - fp * fn_) / ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt(),
        )
    };

    let tpr = Metric::ratio(tp, p_total);
    let fpr = Metric::ratio(fp, n_total);
    let f_denominator = tp + fp + fn_;
    let f_score = |numerator: f64, denominator: f64| {
        if f_denominator == 0.0 {
            Metric::UNDEFINED
        } else {
            Metric::defined(numerator / denominator)
        }
    };

    ThresholdRow {
        meta,
        threshold,
        counts: c,
        utility: utility(n_total, p_total, tpr, fpr, cost),
        mcc,
        accuracy: Metric::ratio(tp + tn, n_total),
        f1: f_score(2.0 * tp, 2.0 * tp + fp + fn_),
        f2: f_score(3.0 * tp, 2.0 * tp + fp + fn_),
        f0_5: f_score(1.5 * tp, 0.5 * tp + fp + fn_),
        tpr,
        tnr: Metric::ratio(tn, n_total - p_total),
        fnr: Metric::ratio(fn_, p_total),
        fpr,
        fdr: Metric::ratio(fp, fp + tp),
        for_: Metric::ratio(fn_, fn_ + tn),
        npv: Metric::ratio(tn, tn + fn_),
        ppv: Metric::ratio(tp, tp + fp),
        threat_score: Metric::ratio(tp, tp + fn_ + fp),
    }
}

fn utility(n_total: f64, p_total: f64, tpr: Metric, fpr: Metric, cost: &CostModel) -> Metric {
    match (tpr.value(), fpr.value()) {
        (Some(tpr), Some(fpr)) if n_total != 0.0 => {
            let prevalence = p_total / n_total;
            Metric::defined(
                prevalence * (cost.tp_cost * tpr + cost.fp_cost * (1.0 - tpr))
                    + (1.0 - prevalence) * (cost.fn_cost * fpr + cost.tn_cost * (1.0 - fpr)),
            )
        }
        _ => Metric::UNDEFINED,
    }
}

/// Row with the best defined value of `kind`; ties keep the lowest threshold.
pub fn best_threshold(rows: &[ThresholdRow], kind: MetricKind) -> Option<&ThresholdRow> {
    rows.iter()
        .filter_map(|row| row.metric(kind).value().map(|v| (row, v)))
        .fold(None, |best: Option<(&ThresholdRow, f64)>, (row, v)| match best {
            Some((_, b)) if kind.lower_is_better() && v >= b => best,
            Some((_, b)) if !kind.lower_is_better() && v <= b => best,
            _ => Some((row, v)),
        })
        .map(|(row, _)| row)
}

/// Opt-in check that every label is 0 or 1. `evaluate` itself never rejects input.
pub fn validate_labels(records: &[ScoredRecord]) -> RetroResult<()> {
    let bad = records
        .iter()
        .filter(|r| r.label != 0 && r.label != 1)
        .count();
    if bad == 0 {
        Ok(())
    } else {
        Err(RetroError::invalid(format!(
            "{bad} of {} labels outside {{0, 1}}",
            records.len()
        )))
    }
}
