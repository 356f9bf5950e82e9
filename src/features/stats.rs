//! Descriptive statistics used by the aggregation step

use crate::data::Quartiles;

/// Calculate a percentile with linear interpolation between closest ranks.
/// `p` is a fraction in [0, 1]. Returns `None` for empty input.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(percentile_sorted(&sorted, p))
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }

    let idx = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let frac = idx - lower as f64;

    if lower == upper {
        sorted[lower]
    } else {
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    }
}

/// 25th, 50th and 75th percentiles in one sort
pub fn quartiles(values: &[f64]) -> Option<Quartiles> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    Some(Quartiles {
        q25: percentile_sorted(&sorted, 0.25),
        q50: percentile_sorted(&sorted, 0.50),
        q75: percentile_sorted(&sorted, 0.75),
    })
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
