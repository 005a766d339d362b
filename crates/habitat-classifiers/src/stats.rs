use statrs::statistics::Statistics;

/// Fraction of positions where `predicted` equals `truth`.
pub fn accuracy(predicted: &[i64], truth: &[i64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(truth.iter())
        .filter(|(p, t)| p == t)
        .count();
    correct as f64 / truth.len() as f64
}

/// Mean and population standard deviation; `(0, 0)` for no values.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().mean();
    let std = values.iter().population_std_dev();
    (mean, if std.is_finite() { std.max(0.0) } else { 0.0 })
}
