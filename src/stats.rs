/// Arithmetic mean. NaN for an empty sample, so callers must guard.
pub fn average(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Nearest-rank percentile for `p` in (0, 1].
///
/// Sorts a copy ascending and returns the element at `ceil(p * len) - 1`.
/// Values are never interpolated: p50 of ten samples is the fifth one.
pub fn percentile(samples: &[f64], p: f64) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p * sorted.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    Some(sorted[index])
}
