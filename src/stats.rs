//! Descriptive statistics for comparing experiment variants.

use serde::Serialize;
use std::collections::BTreeMap;

/// Five-number summary plus mean and standard deviation, as drawn by a boxplot.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl Summary {
    /// Summarize a set of values, ignoring NaN.
    /// Returns None if there are no values.
    pub fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut sorted: Vec<f64> = values.into_iter().filter(|x| !x.is_nan()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);
        let (mean, std) = mean_std(&sorted);
        Some(Self {
            count: sorted.len(),
            mean,
            std,
            min: sorted[0],
            q1: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q3: quantile(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Mean and population standard deviation. Both are NaN for an empty slice.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Mean and sample standard deviation (n - 1 degrees of freedom).
///
/// The deviation of a single value is 0, so its band collapses onto the mean.
pub fn mean_sample_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}

/// Quantile of sorted data, interpolating linearly between the closest ranks.
///
/// Argument q is in the range [0, 1].
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!((0.0..=1.0).contains(&q));
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Summarize the values of each group. Groups are sorted by name.
pub fn group_by<T>(
    rows: &[T],
    key_fn: impl Fn(&T) -> &str,
    value_fn: impl Fn(&T) -> f64,
) -> BTreeMap<String, Summary> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for row in rows {
        groups.entry(key_fn(row)).or_default().push(value_fn(row));
    }
    groups
        .into_iter()
        .filter_map(|(key, values)| Some((key.to_string(), Summary::of(values)?)))
        .collect()
}

/// Mean and standard deviation of a value across all runs at one generation.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GenerationStats {
    pub generation: u64,
    pub mean: f64,
    /// Sample standard deviation across the runs, 0 for a single run.
    pub std: f64,
    pub runs: usize,
}

impl GenerationStats {
    /// Band of `scale` standard deviations around the mean.
    pub fn band(&self, scale: f64) -> (f64, f64) {
        (self.mean - scale * self.std, self.mean + scale * self.std)
    }
}

/// Average a value over the runs of each group, generation by generation.
pub fn per_generation<T>(
    rows: &[T],
    key_fn: impl Fn(&T) -> &str,
    generation_fn: impl Fn(&T) -> u64,
    value_fn: impl Fn(&T) -> Option<f64>,
) -> BTreeMap<String, Vec<GenerationStats>> {
    let mut groups: BTreeMap<&str, BTreeMap<u64, Vec<f64>>> = BTreeMap::new();
    for row in rows {
        let Some(value) = value_fn(row).filter(|x| !x.is_nan()) else {
            continue;
        };
        groups
            .entry(key_fn(row))
            .or_default()
            .entry(generation_fn(row))
            .or_default()
            .push(value);
    }
    groups
        .into_iter()
        .map(|(key, generations)| {
            let series = generations
                .into_iter()
                .map(|(generation, values)| {
                    let (mean, std) = mean_sample_std(&values);
                    GenerationStats {
                        generation,
                        mean,
                        std,
                        runs: values.len(),
                    }
                })
                .collect();
            (key.to_string(), series)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn summary() {
        // numpy: mean 2.5, std 1.118033988749895, quantiles 1.75 2.5 3.25
        let summary = Summary::of([4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(summary.count, 4);
        assert!(close(summary.mean, 2.5));
        assert!(close(summary.std, 1.118033988749895));
        assert_eq!(summary.min, 1.0);
        assert!(close(summary.q1, 1.75));
        assert!(close(summary.median, 2.5));
        assert!(close(summary.q3, 3.25));
        assert_eq!(summary.max, 4.0);
    }

    #[test]
    fn summary_single_value() {
        let summary = Summary::of([7.0]).unwrap();
        assert_eq!(summary.std, 0.0);
        assert_eq!(summary.q1, 7.0);
        assert_eq!(summary.q3, 7.0);
    }

    #[test]
    fn summary_empty() {
        assert_eq!(Summary::of([]), None);
        assert_eq!(Summary::of([f64::NAN]), None);
    }

    #[test]
    fn quantiles() {
        let sorted = [0.0, 10.0, 20.0];
        assert_eq!(quantile(&sorted, 0.0), 0.0);
        assert_eq!(quantile(&sorted, 0.25), 5.0);
        assert_eq!(quantile(&sorted, 1.0), 20.0);
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn grouping() {
        let rows = [("f1", 1.0), ("f9", 10.0), ("f1", 3.0), ("f0", 5.0)];
        let groups = group_by(&rows, |row| row.0, |row| row.1);
        let names: Vec<_> = groups.keys().map(String::as_str).collect();
        assert_eq!(names, ["f0", "f1", "f9"]);
        assert_eq!(groups["f1"].mean, 2.0);
        assert_eq!(groups["f1"].count, 2);
    }

    #[test]
    fn generations() {
        let rows = [
            ("a", 0, Some(1.0)),
            ("a", 1, Some(2.0)),
            ("a", 0, Some(3.0)),
            ("a", 1, None),
            ("b", 0, Some(5.0)),
        ];
        let series = per_generation(&rows, |row| row.0, |row| row.1, |row| row.2);
        assert_eq!(
            series["a"],
            vec![
                GenerationStats {
                    generation: 0,
                    mean: 2.0,
                    std: std::f64::consts::SQRT_2,
                    runs: 2
                },
                GenerationStats {
                    generation: 1,
                    mean: 2.0,
                    std: 0.0,
                    runs: 1
                },
            ]
        );
        assert_eq!(series["b"].len(), 1);
        let (low, high) = series["a"][0].band(1.0);
        assert!(close(low, 0.585786437626905));
        assert!(close(high, 3.414213562373095));
        assert_eq!(series["a"][1].band(1.0), (2.0, 2.0));
    }

    #[test]
    fn sample_std() {
        // pandas: Series([2, 4, 4, 4, 5, 5, 7, 9]).std() == 2.138089935299395
        let (mean, std) = mean_sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(mean, 5.0);
        assert!(close(std, 2.138089935299395));
        assert_eq!(mean_sample_std(&[3.0]), (3.0, 0.0));
    }
}
