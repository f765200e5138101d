use crate::aggregate::round_to;

/// Trailing moving average; `None` until `window` values have been seen.
pub fn moving_average(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    let mut sum = 0.0;
    values
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            sum += value;
            if idx >= window {
                sum -= values[idx - window];
            }
            (idx + 1 >= window).then(|| round_to(sum / window as f64, 2))
        })
        .collect()
}
