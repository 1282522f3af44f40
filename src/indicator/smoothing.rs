//! Moving-average kernels over plain value slices.
//!
//! Each kernel returns one value per complete window, so the output is
//! `values.len() - period + 1` long, or empty when `values` is shorter than
//! `period`. `period` must be non-zero.

/// Arithmetic mean of each window.
pub fn simple(values: &[f64], period: usize) -> Vec<f64> {
    let n = period as f64;
    values
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / n)
        .collect()
}

/// Linearly weighted mean; the newest value weighs `period`, the oldest 1.
pub fn weighted(values: &[f64], period: usize) -> Vec<f64> {
    let denominator = (period * (period + 1)) as f64 / 2.0;
    values
        .windows(period)
        .map(|w| {
            w.iter()
                .zip(1u32..)
                .map(|(v, weight)| v * f64::from(weight))
                .sum::<f64>()
                / denominator
        })
        .collect()
}

/// Exponential average with `alpha = 2 / (period + 1)`, seeded with the mean
/// of the first window.
pub fn exponential(values: &[f64], period: usize) -> Vec<f64> {
    recursive(values, period, 2.0 / (period as f64 + 1.0))
}

/// Wilder's average (`alpha = 1 / period`), seeded with the mean of the first
/// window.
pub fn wilder(values: &[f64], period: usize) -> Vec<f64> {
    recursive(values, period, 1.0 / period as f64)
}

fn recursive(values: &[f64], period: usize, alpha: f64) -> Vec<f64> {
    if values.len() < period {
        return Vec::new();
    }
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut current = seed;
    for &v in &values[period..] {
        current += alpha * (v - current);
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn short_input_is_empty() {
        assert!(simple(&[1.0, 2.0], 3).is_empty());
        assert!(weighted(&[1.0, 2.0], 3).is_empty());
        assert!(exponential(&[1.0, 2.0], 3).is_empty());
        assert!(wilder(&[1.0, 2.0], 3).is_empty());
    }

    #[test]
    fn simple_means() {
        assert_eq!(simple(&[1.0, 2.0, 3.0, 4.0], 3), vec![2.0, 3.0]);
    }

    #[test]
    fn weighted_favours_recent() {
        let out = weighted(&[1.0, 2.0, 3.0, 4.0], 3);
        // (1 + 4 + 9) / 6, (2 + 6 + 12) / 6
        assert!(close(out[0], 14.0 / 6.0));
        assert!(close(out[1], 20.0 / 6.0));
    }

    #[test]
    fn exponential_seeds_with_mean() {
        let out = exponential(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out.len(), 2);
        assert!(close(out[0], 2.0));
        // alpha 0.5: 2 + 0.5 * (4 - 2)
        assert!(close(out[1], 3.0));
    }

    #[test]
    fn wilder_uses_one_over_period() {
        let out = wilder(&[2.0, 0.0, 1.0], 2);
        // seed 1, then 1 + 0.5 * (1 - 1)
        assert_eq!(out, vec![1.0, 1.0]);
        let out = wilder(&[0.0, 0.0, 4.0], 2);
        assert!(close(out[1], 2.0));
    }

    #[test]
    fn flat_input_stays_flat() {
        let flat = [7.0; 12];
        for out in [
            simple(&flat, 5),
            weighted(&flat, 5),
            exponential(&flat, 5),
            wilder(&flat, 5),
        ] {
            assert_eq!(out.len(), 8);
            assert!(out.iter().all(|v| close(*v, 7.0)));
        }
    }
}
