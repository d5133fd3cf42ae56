//! Comparison of travelling salesman heuristics.
//!
//! The results directory has one sub-directory per problem instance, and one
//! JSON file per algorithm within it: `<instance>/<algorithm>.json`. Only the
//! instances with a known optimum are read.
//!
//! An optional `similarity/<instance>/<algorithm>/*.json` tree holds the
//! solutions of repeated runs, which are compared against the best of them.

use crate::experiment::{Batch, Failure, ReadError};
use crate::serde_utils::{JsonIoError, deserialize_positive};
use crate::stats;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Known optimal tour lengths.
const OPTIMA: [(&str, f64); 8] = [
    ("berlin52", 7_542.0),
    ("kroA100", 21_282.0),
    ("vm1084", 239_297.0),
    ("rat99", 1_211.0),
    ("rat195", 2_323.0),
    ("rat575", 6_773.0),
    ("a280", 2_579.0),
    ("p654", 34_643.0),
];

fn default_optima() -> BTreeMap<String, f64> {
    OPTIMA.iter().map(|&(name, length)| (name.to_string(), length)).collect()
}

fn default_weight() -> f64 {
    0.5
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TspConfig {
    /// Optimal tour length of each instance.
    #[serde(default = "default_optima")]
    pub optima: BTreeMap<String, f64>,

    /// Weight of the runtime in the efficiency score.
    #[serde(default = "default_weight", deserialize_with = "deserialize_positive")]
    pub runtime_weight: f64,

    /// Weight of the tour length in the efficiency score.
    #[serde(default = "default_weight", deserialize_with = "deserialize_positive")]
    pub distance_weight: f64,
}

impl Default for TspConfig {
    fn default() -> Self {
        Self {
            optima: default_optima(),
            runtime_weight: default_weight(),
            distance_weight: default_weight(),
        }
    }
}

impl TspConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, JsonIoError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// The contents of one result file.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct AlgorithmResult {
    pub best_distance: f64,
    #[serde(default)]
    pub best_solution: Vec<usize>,
    #[serde(default)]
    pub distances: Vec<f64>,
    #[serde(default)]
    pub runtimes: Vec<f64>,
    #[serde(default)]
    pub steps: Vec<f64>,
    #[serde(default)]
    pub evaluated: Vec<f64>,
}

/// One result file.
#[derive(Debug, Clone, PartialEq)]
pub struct TspRun {
    pub instance: String,
    pub algorithm: String,
    pub result: AlgorithmResult,
}

/// The name of a file or directory, up to the first '.'.
fn stem(path: &Path) -> String {
    let name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
    name.split('.').next().unwrap_or_default().to_string()
}

/// Sorted sub-directories of a directory.
fn list_dirs(dir: &Path) -> Result<Vec<PathBuf>, io::Error> {
    let mut paths = vec![];
    for entry in dir.read_dir()? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Sorted JSON files in a directory.
fn list_json(dir: &Path) -> Result<Vec<PathBuf>, io::Error> {
    let mut paths = vec![];
    for entry in dir.read_dir()? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn read_result(path: &Path) -> Result<AlgorithmResult, ReadError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Push the result of reading one file into a batch, or record its failure.
fn collect<T>(batch: &mut Batch<T>, path: PathBuf, result: Result<T, ReadError>) {
    match result {
        Ok(row) => batch.rows.push(row),
        Err(error) => {
            tracing::warn!("skipping {}: {error}", path.display());
            batch.failures.push(Failure { path, error });
        }
    }
}

/// Read the results of every instance which has a known optimum.
pub fn read_results(dir: impl AsRef<Path>, optima: &BTreeMap<String, f64>) -> Result<Batch<TspRun>, io::Error> {
    let mut batch = Batch::default();
    for instance_dir in list_dirs(dir.as_ref())? {
        let instance = stem(&instance_dir);
        if !optima.contains_key(&instance) {
            tracing::debug!("no optimum for {}, skipped", instance_dir.display());
            continue;
        }
        for path in list_json(&instance_dir)? {
            let result = read_result(&path).map(|result| TspRun {
                instance: instance.clone(),
                algorithm: stem(&path),
                result,
            });
            collect(&mut batch, path, result);
        }
    }
    Ok(batch)
}

/// Mean and standard deviation of a list of measurements, if there are any.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct MeanStd {
    pub mean: f64,
    pub std: f64,
}

impl MeanStd {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let (mean, std) = stats::mean_std(values);
        Some(Self { mean, std })
    }
}

/// One algorithm on one instance.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AlgorithmComparison {
    /// Best tour length minus the optimum.
    pub best_gap: f64,
    /// Mean tour length minus the optimum, and the deviation of the tour lengths.
    pub gap: Option<MeanStd>,
    pub runtime: Option<MeanStd>,
    pub steps: Option<MeanStd>,
    pub evaluated: Option<MeanStd>,
    /// Weighted score in [0, 1] relative to the other algorithms on the same
    /// instance, higher is better.
    pub efficiency: Option<f64>,
}

/// Rescale to [0, 1]. All values are 0 if they are equal.
fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    values
        .iter()
        .map(|x| if max > min { (x - min) / (max - min) } else { 0.0 })
        .collect()
}

/// Compare the algorithms on each instance.
pub fn compare(
    runs: &[TspRun],
    config: &TspConfig,
) -> BTreeMap<String, BTreeMap<String, AlgorithmComparison>> {
    let mut table: BTreeMap<String, BTreeMap<String, AlgorithmComparison>> = BTreeMap::new();
    for run in runs {
        let Some(&optimum) = config.optima.get(&run.instance) else {
            continue;
        };
        let result = &run.result;
        let gap = MeanStd::of(&result.distances).map(|distances| MeanStd {
            mean: distances.mean - optimum,
            std: distances.std,
        });
        table.entry(run.instance.clone()).or_default().insert(
            run.algorithm.clone(),
            AlgorithmComparison {
                best_gap: result.best_distance - optimum,
                gap,
                runtime: MeanStd::of(&result.runtimes),
                steps: MeanStd::of(&result.steps),
                evaluated: MeanStd::of(&result.evaluated),
                efficiency: None,
            },
        );
    }
    for algorithms in table.values_mut() {
        let scored: Vec<(&String, f64, f64)> = algorithms
            .iter()
            .filter_map(|(name, x)| Some((name, x.gap?.mean, x.runtime?.mean)))
            .collect();
        let distances = normalize(&scored.iter().map(|x| x.1).collect::<Vec<_>>());
        let runtimes = normalize(&scored.iter().map(|x| x.2).collect::<Vec<_>>());
        let scores: Vec<(String, f64)> = scored
            .iter()
            .zip(distances.iter().zip(&runtimes))
            .map(|((name, _, _), (distance, runtime))| {
                let score = 1.0 - (config.runtime_weight * runtime + config.distance_weight * distance);
                (name.to_string(), score)
            })
            .collect();
        for (name, score) in scores {
            if let Some(comparison) = algorithms.get_mut(&name) {
                comparison.efficiency = Some(score);
            }
        }
    }
    table
}

/// Undirected edges of a closed tour.
fn edges(tour: &[usize]) -> Vec<(usize, usize)> {
    let next = tour.iter().cycle().skip(1);
    tour.iter().zip(next).map(|(&a, &b)| (a.min(b), a.max(b))).collect()
}

/// Number of edges of `tour` which are also in `reference`, in either direction.
pub fn common_edges(reference: &[usize], tour: &[usize]) -> usize {
    let reference: HashSet<(usize, usize)> = edges(reference).into_iter().collect();
    edges(tour).iter().filter(|edge| reference.contains(edge)).count()
}

/// A run compared against the best run of the same algorithm.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SimilarityPoint {
    pub distance: f64,
    pub common_edges: usize,
}

/// Compare the runs of one algorithm against the run with the shortest tour.
/// The best run itself is not included.
pub fn similarity(results: &[AlgorithmResult]) -> Vec<SimilarityPoint> {
    let Some(best) = results
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.best_distance.total_cmp(&b.best_distance))
        .map(|(index, _)| index)
    else {
        return vec![];
    };
    let reference = &results[best].best_solution;
    results
        .iter()
        .enumerate()
        .filter(|&(index, _)| index != best)
        .map(|(_, result)| SimilarityPoint {
            distance: result.best_distance,
            common_edges: common_edges(reference, &result.best_solution),
        })
        .collect()
}

/// Read the repeated runs under `similarity/` and compare each algorithm's runs.
pub fn read_similarity(
    dir: impl AsRef<Path>,
    skipped: &mut Vec<Failure>,
) -> Result<BTreeMap<String, BTreeMap<String, Vec<SimilarityPoint>>>, io::Error> {
    let mut table: BTreeMap<String, BTreeMap<String, Vec<SimilarityPoint>>> = BTreeMap::new();
    for instance_dir in list_dirs(dir.as_ref())? {
        for algorithm_dir in list_dirs(&instance_dir)? {
            let mut runs = Batch::default();
            for path in list_json(&algorithm_dir)? {
                let result = read_result(&path);
                collect(&mut runs, path, result);
            }
            skipped.append(&mut runs.failures);
            table
                .entry(stem(&instance_dir))
                .or_default()
                .insert(stem(&algorithm_dir), similarity(&runs.rows));
        }
    }
    Ok(table)
}

/// Comparison of all algorithms on all instances.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct TspReport {
    pub instances: BTreeMap<String, BTreeMap<String, AlgorithmComparison>>,
    pub similarity: BTreeMap<String, BTreeMap<String, Vec<SimilarityPoint>>>,
    pub skipped_files: Vec<String>,
}

impl TspReport {
    /// Read and compare a results directory.
    pub fn load(dir: impl AsRef<Path>, config: &TspConfig) -> Result<Self, io::Error> {
        let dir = dir.as_ref();
        let mut runs = read_results(dir, &config.optima)?;
        let similarity_path = dir.join("similarity");
        let similarity = if similarity_path.is_dir() {
            read_similarity(&similarity_path, &mut runs.failures)?
        } else {
            tracing::info!("no similarity directory at {}", similarity_path.display());
            BTreeMap::new()
        };
        Ok(Self {
            instances: compare(&runs.rows, config),
            similarity,
            skipped_files: runs
                .failures
                .iter()
                .map(|failure| format!("{}: {}", failure.path.display(), failure.error))
                .collect(),
        })
    }
}

fn write_mean_std(f: &mut fmt::Formatter, value: Option<MeanStd>) -> fmt::Result {
    match value {
        Some(x) => write!(f, " {:>12.3} {:>10.3}", x.mean, x.std),
        None => write!(f, " {:>12} {:>10}", "-", "-"),
    }
}

impl fmt::Display for TspReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (instance, algorithms) in &self.instances {
            writeln!(f, "{instance}")?;
            writeln!(
                f,
                "  {:<20} {:>12} {:>12} {:>10} {:>12} {:>10} {:>10}",
                "algorithm", "best gap", "mean gap", "std", "runtime", "std", "efficiency"
            )?;
            for (name, x) in algorithms {
                write!(f, "  {name:<20} {:>12.3}", x.best_gap)?;
                write_mean_std(f, x.gap)?;
                write_mean_std(f, x.runtime)?;
                match x.efficiency {
                    Some(score) => writeln!(f, " {score:>10.3}")?,
                    None => writeln!(f, " {:>10}", "-")?,
                }
            }
            writeln!(f)?;
        }
        if !self.similarity.is_empty() {
            writeln!(f, "Common edges with the best solution")?;
            for (instance, algorithms) in &self.similarity {
                for (name, points) in algorithms {
                    let edges: Vec<String> = points
                        .iter()
                        .map(|point| format!("{}@{}", point.common_edges, point.distance))
                        .collect();
                    writeln!(f, "  {instance:<12} {name:<20} {}", edges.join(" "))?;
                }
            }
            writeln!(f)?;
        }
        for skipped in &self.skipped_files {
            writeln!(f, "skipped: {skipped}")?;
        }
        Ok(())
    }
}
