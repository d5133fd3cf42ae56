//! Reading the result files of an experiment.
//!
//! An experiment directory contains one sub-directory per kind of result:
//!
//! - `HoF/` Hall of Fame files, "*.gen"
//! - `runtimes/` elapsed time of each run in seconds, "*.txt"
//! - `logs/` per-generation fitness statistics, "*.csv"
//! - `mutants/` fitness of a parent followed by its mutants, "*.csv"
//! - `mutants_sequence/` fitness along a random walk of mutations, "*.csv"
//! - `offspring/` fitness of crossover parents and their offspring, "*.csv"
//!
//! Every file belongs to one run, and the run is labeled by its file name.
//! A file which can not be read is skipped and reported, the rest of the
//! directory is still read.

use crate::config::AnalysisConfig;
use crate::convert::{self, ConversionError};
use crate::hof::{self, HofError, Record};
use crate::naming::{self, Labeling, NameError, RunLabel};
use std::collections::BTreeMap;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

/// Error type for reading a single result file.
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    Hof(#[from] HofError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("missing column \"{0}\"")]
    MissingColumn(&'static str),

    #[error("file is empty")]
    Empty,
}

/// A file which was skipped.
#[derive(Debug)]
pub struct Failure {
    pub path: PathBuf,
    pub error: ReadError,
}

/// Rows read from all of the files in a directory, and the files which failed.
#[derive(Debug)]
pub struct Batch<T> {
    pub rows: Vec<T>,
    pub failures: Vec<Failure>,
}

impl<T> Default for Batch<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// One genotype from a Hall of Fame file.
#[derive(Debug, Clone, PartialEq)]
pub struct HofRow {
    pub label: RunLabel,
    pub record: Record,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeRow {
    pub label: RunLabel,
    pub seconds: f64,
}

/// One generation from an evolution log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub label: RunLabel,
    pub generation: u64,
    /// All other columns: "avg", "stddev", "min", "max", ...
    pub values: BTreeMap<String, f64>,
}

/// One genotype from a mutation experiment. Step 0 is the parent.
#[derive(Debug, Clone, PartialEq)]
pub struct MutantRow {
    pub label: RunLabel,
    pub step: u64,
    pub fitness: f64,
    pub parent_fitness: f64,
}

/// One offspring from a crossover experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossoverRow {
    pub label: RunLabel,
    pub average_parent_fitness: f64,
    pub offspring_fitness: f64,
}

/// Offspring fitness of a crossover which did not produce a valid genotype.
const INVALID_OFFSPRING: f64 = -1.0;

/// List the files in a directory with the given extension, sorted by path.
fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, io::Error> {
    let mut paths = vec![];
    for entry in dir.read_dir()? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == extension) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Apply `read` to every matching file, collecting the rows and isolating failures.
fn read_dir_with<T>(
    dir: &Path,
    extension: &str,
    label_fn: impl Fn(&Path) -> Result<RunLabel, NameError>,
    mut read: impl FnMut(&Path, &RunLabel) -> Result<Vec<T>, ReadError>,
) -> Result<Batch<T>, io::Error> {
    let mut batch = Batch::default();
    for path in list_files(dir, extension)? {
        let result = label_fn(&path)
            .map_err(ReadError::from)
            .and_then(|label| read(&path, &label));
        match result {
            Ok(rows) => {
                tracing::debug!("read {} rows from {}", rows.len(), path.display());
                batch.rows.extend(rows);
            }
            Err(error) => {
                tracing::warn!("skipping {}: {error}", path.display());
                batch.failures.push(Failure { path, error });
            }
        }
    }
    Ok(batch)
}

/// Read every Hall of Fame file in a directory.
pub fn read_hofs(dir: impl AsRef<Path>, labeling: Labeling, wanted: &[&str]) -> Result<Batch<HofRow>, io::Error> {
    read_dir_with(dir.as_ref(), "gen", |path| labeling.label_path(path), |path, label| {
        let records = hof::read_file(path, wanted)?;
        Ok(records
            .into_iter()
            .map(|record| HofRow {
                label: label.clone(),
                record,
            })
            .collect())
    })
}

/// Read the first line of a runtime file as seconds.
fn read_runtime(path: &Path) -> Result<f64, ReadError> {
    let file = std::fs::File::open(path)?;
    let mut line = String::new();
    io::BufReader::new(file).read_line(&mut line)?;
    if line.trim().is_empty() {
        return Err(ReadError::Empty);
    }
    Ok(convert::parse_f64("runtime", &line)?)
}

/// Read every runtime file in a directory.
pub fn read_runtimes(dir: impl AsRef<Path>, labeling: Labeling) -> Result<Batch<RuntimeRow>, io::Error> {
    read_dir_with(dir.as_ref(), "txt", |path| labeling.label_path(path), |path, label| {
        let seconds = read_runtime(path)?;
        Ok(vec![RuntimeRow {
            label: label.clone(),
            seconds,
        }])
    })
}

/// Read an evolution log. The generation is in the "generation" or "gen" column.
fn read_log(path: &Path, label: &RunLabel) -> Result<Vec<LogRow>, ReadError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let generation_column = headers
        .iter()
        .position(|name| name == "generation" || name == "gen")
        .ok_or(ReadError::MissingColumn("generation"))?;
    let mut rows = vec![];
    for record in reader.records() {
        let record = record?;
        let mut generation = None;
        let mut values = BTreeMap::new();
        for (index, (name, value)) in headers.iter().zip(record.iter()).enumerate() {
            if index == generation_column {
                generation = Some(convert::parse_u64(name, value)?);
            } else {
                values.insert(name.to_string(), convert::parse_f64(name, value)?);
            }
        }
        let generation = generation.ok_or(ReadError::MissingColumn("generation"))?;
        rows.push(LogRow {
            label: label.clone(),
            generation,
            values,
        });
    }
    Ok(rows)
}

/// Read every evolution log in a directory.
pub fn read_logs(dir: impl AsRef<Path>, labeling: Labeling) -> Result<Batch<LogRow>, io::Error> {
    read_dir_with(dir.as_ref(), "csv", |path| labeling.label_path(path), read_log)
}

fn column_index(headers: &csv::StringRecord, name: &'static str) -> Result<usize, ReadError> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or(ReadError::MissingColumn(name))
}

/// Read the "Fitness" column of a mutants file. The first row is the parent.
fn read_mutant_file(path: &Path, label: &RunLabel, keep_parent: bool) -> Result<Vec<MutantRow>, ReadError> {
    let mut reader = csv::Reader::from_path(path)?;
    let fitness_column = column_index(reader.headers()?, "Fitness")?;
    let mut fitness = vec![];
    for record in reader.records() {
        let record = record?;
        fitness.push(convert::parse_f64("Fitness", record.get(fitness_column).unwrap_or_default())?);
    }
    let Some(&parent_fitness) = fitness.first() else {
        return Err(ReadError::Empty);
    };
    let skip = if keep_parent { 0 } else { 1 };
    Ok(fitness
        .into_iter()
        .enumerate()
        .skip(skip)
        .map(|(step, fitness)| MutantRow {
            label: label.clone(),
            step: step as u64,
            fitness,
            parent_fitness,
        })
        .collect())
}

/// Read every mutants file in a directory.
///
/// Files are named "<prefix>-<variant>-<run>.csv". The parent row is returned
/// as step 0 only if `keep_parent` is set.
pub fn read_mutants(dir: impl AsRef<Path>, keep_parent: bool) -> Result<Batch<MutantRow>, io::Error> {
    read_dir_with(
        dir.as_ref(),
        "csv",
        |path| Labeling::Genformat.label_path(path),
        |path, label| read_mutant_file(path, label, keep_parent),
    )
}

fn read_crossover_file(path: &Path, label: &RunLabel) -> Result<Vec<CrossoverRow>, ReadError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?;
    let parent1 = column_index(headers, "Parent 1 Fitness")?;
    let parent2 = column_index(headers, "Parent 2 Fitness")?;
    let offspring = column_index(headers, "Offspring Fitness")?;
    let mut rows = vec![];
    let mut invalid = 0;
    for record in reader.records() {
        let record = record?;
        let value = |index: usize, name: &str| convert::parse_f64(name, record.get(index).unwrap_or_default());
        let offspring_fitness = value(offspring, "Offspring Fitness")?;
        if offspring_fitness == INVALID_OFFSPRING {
            invalid += 1;
            continue;
        }
        let average_parent_fitness =
            (value(parent1, "Parent 1 Fitness")? + value(parent2, "Parent 2 Fitness")?) / 2.0;
        rows.push(CrossoverRow {
            label: label.clone(),
            average_parent_fitness,
            offspring_fitness,
        });
    }
    if invalid > 0 {
        tracing::debug!("dropped {invalid} invalid offspring from {}", path.display());
    }
    Ok(rows)
}

/// Read every crossover file in a directory, one file per variant: "<variant>.csv".
///
/// Offspring with a fitness of -1 are invalid and are dropped.
pub fn read_crossover(dir: impl AsRef<Path>) -> Result<Batch<CrossoverRow>, io::Error> {
    read_dir_with(dir.as_ref(), "csv", naming::label_variant_file, read_crossover_file)
}

/// Read a sub-directory if it exists, otherwise return an empty batch.
fn read_optional<T>(
    path: &Path,
    what: &str,
    read: impl FnOnce(&Path) -> Result<Batch<T>, io::Error>,
) -> Result<Batch<T>, io::Error> {
    if path.is_dir() {
        read(path)
    } else {
        tracing::info!("no {what} directory at {}", path.display());
        Ok(Batch::default())
    }
}

/// The directory layout of one experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    root: PathBuf,
}

/// All of the results of an experiment.
#[derive(Debug, Default)]
pub struct ExperimentData {
    pub hofs: Batch<HofRow>,
    pub runtimes: Batch<RuntimeRow>,
    pub logs: Batch<LogRow>,
    pub mutants: Batch<MutantRow>,
    /// Random walks, with the parent kept as step 0.
    pub random_walks: Batch<MutantRow>,
    pub crossover: Batch<CrossoverRow>,
}

impl ExperimentData {
    pub fn failures(&self) -> impl Iterator<Item = &Failure> {
        self.hofs
            .failures
            .iter()
            .chain(&self.runtimes.failures)
            .chain(&self.logs.failures)
            .chain(&self.mutants.failures)
            .chain(&self.random_walks.failures)
            .chain(&self.crossover.failures)
    }
}

impl Experiment {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hof_path(&self) -> PathBuf {
        self.root.join("HoF")
    }

    pub fn runtimes_path(&self) -> PathBuf {
        self.root.join("runtimes")
    }

    pub fn logs_path(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn mutants_path(&self) -> PathBuf {
        self.root.join("mutants")
    }

    pub fn random_walks_path(&self) -> PathBuf {
        self.root.join("mutants_sequence")
    }

    pub fn crossover_path(&self) -> PathBuf {
        self.root.join("offspring")
    }

    /// Read all of the results. Missing sub-directories are read as empty.
    pub fn load(&self, config: &AnalysisConfig) -> Result<ExperimentData, io::Error> {
        let wanted = config.wanted_attributes();
        Ok(ExperimentData {
            hofs: read_optional(&self.hof_path(), "Hall of Fame", |dir| {
                read_hofs(dir, config.labeling, &wanted)
            })?,
            runtimes: read_optional(&self.runtimes_path(), "runtimes", |dir| {
                read_runtimes(dir, config.labeling)
            })?,
            logs: read_optional(&self.logs_path(), "logs", |dir| read_logs(dir, config.labeling))?,
            mutants: read_optional(&self.mutants_path(), "mutants", |dir| read_mutants(dir, false))?,
            random_walks: read_optional(&self.random_walks_path(), "random walk", |dir| read_mutants(dir, true))?,
            crossover: read_optional(&self.crossover_path(), "crossover", |dir| read_crossover(dir))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("{name}_{}", std::process::id()));
        if path.exists() {
            std::fs::remove_dir_all(&path).unwrap();
        }
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn hofs_skip_bad_files() {
        let dir = temp_dir("experiment_hofs_skip_bad_files");
        std::fs::write(dir.join("HoF-f1-2.gen"), "org:\nvertpos:0.5\n\norg:\nvertpos:0.25\n\n").unwrap();
        std::fs::write(dir.join("HoF-f9-1.gen"), "org:\ngenotype:~\nX\n~\nvertpos:1.5\n\n").unwrap();
        std::fs::write(dir.join("HoF-f0-1.gen"), "org:\nbroken\n\n").unwrap();
        std::fs::write(dir.join("HoF.gen"), "org:\nvertpos:1\n\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "not a hall of fame").unwrap();

        let batch = read_hofs(&dir, Labeling::Genformat, &["genotype", "vertpos"]).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let rows: Vec<_> = batch
            .rows
            .iter()
            .map(|row| (row.label.variant.as_str(), row.record.get("vertpos").unwrap()))
            .collect();
        assert_eq!(rows, [("f1", "0.5"), ("f1", "0.25"), ("f9", "1.5")]);
        assert_eq!(batch.rows[2].record.get("genotype"), Some("X"));

        let failed: Vec<_> = batch
            .failures
            .iter()
            .map(|failure| failure.path.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(failed, ["HoF-f0-1.gen", "HoF.gen"]);
        assert!(matches!(batch.failures[0].error, ReadError::Hof(_)));
        assert!(matches!(batch.failures[1].error, ReadError::Name(_)));
    }

    #[test]
    fn runtimes() {
        let dir = temp_dir("experiment_runtimes");
        std::fs::write(dir.join("runtime-005-1.txt"), "12.5").unwrap();
        std::fs::write(dir.join("runtime-010-1.txt"), "3.25\nignored\n").unwrap();
        std::fs::write(dir.join("runtime-010-2.txt"), "").unwrap();
        std::fs::write(dir.join("runtime-010-3.txt"), "fast").unwrap();

        let batch = read_runtimes(&dir, Labeling::Mutation).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let rows: Vec<_> = batch
            .rows
            .iter()
            .map(|row| (row.label.variant.as_str(), row.label.run.as_str(), row.seconds))
            .collect();
        assert_eq!(rows, [("0.05", "1", 12.5), ("0.10", "1", 3.25)]);
        assert_eq!(batch.failures.len(), 2);
        assert!(matches!(batch.failures[0].error, ReadError::Empty));
        assert!(matches!(batch.failures[1].error, ReadError::Conversion(_)));
    }

    #[test]
    fn logs() {
        let dir = temp_dir("experiment_logs");
        std::fs::write(
            dir.join("log-f1-0.csv"),
            "generation,avg,stddev,min,max\n0,0.5,0.1,0.0,1.0\n1,0.75,0.1,0.5,1.5\n",
        )
        .unwrap();
        std::fs::write(dir.join("log-f4-0.csv"), "gen,max\n0,2.0\n").unwrap();
        std::fs::write(dir.join("log-f9-0.csv"), "avg,max\n0.5,1.0\n").unwrap();

        let batch = read_logs(&dir, Labeling::Genformat).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(batch.rows.len(), 3);
        assert_eq!(batch.rows[1].generation, 1);
        assert_eq!(batch.rows[1].values["max"], 1.5);
        assert!(!batch.rows[1].values.contains_key("generation"));
        assert_eq!(batch.rows[2].label.variant, "f4");
        assert_eq!(batch.rows[2].values["max"], 2.0);
        assert_eq!(batch.failures.len(), 1);
        assert!(matches!(batch.failures[0].error, ReadError::MissingColumn("generation")));
    }

    #[test]
    fn mutants() {
        let dir = temp_dir("experiment_mutants");
        std::fs::write(dir.join("mutants-f1-0.csv"), "Genotype,Fitness\nX,1.0\nXX,1.5\nXXX,0.5\n").unwrap();
        std::fs::write(dir.join("mutants-f9-0.csv"), "Genotype,Fitness\n").unwrap();
        std::fs::write(dir.join("mutants-f4-0.csv"), "Genotype,Score\nX,1.0\n").unwrap();

        let without_parent = read_mutants(&dir, false).unwrap();
        let with_parent = read_mutants(&dir, true).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let rows: Vec<_> = without_parent
            .rows
            .iter()
            .map(|row| (row.label.variant.as_str(), row.step, row.fitness, row.parent_fitness))
            .collect();
        assert_eq!(rows, [("f1", 1, 1.5, 1.0), ("f1", 2, 0.5, 1.0)]);
        assert_eq!(with_parent.rows.len(), 3);
        assert_eq!(with_parent.rows[0].step, 0);
        assert_eq!(with_parent.rows[0].fitness, 1.0);

        assert_eq!(without_parent.failures.len(), 2);
        assert!(matches!(without_parent.failures[0].error, ReadError::MissingColumn("Fitness")));
        assert!(matches!(without_parent.failures[1].error, ReadError::Empty));
    }

    #[test]
    fn crossover() {
        let dir = temp_dir("experiment_crossover");
        std::fs::write(
            dir.join("f1.csv"),
            "Parent 1 Fitness,Parent 2 Fitness,Offspring Fitness\n1.0,2.0,1.75\n1.0,3.0,-1\n0.0,1.0,0.25\n",
        )
        .unwrap();
        std::fs::write(dir.join("f9.csv"), "Parent 1 Fitness,Offspring Fitness\n1.0,1.0\n").unwrap();

        let batch = read_crossover(&dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let rows: Vec<_> = batch
            .rows
            .iter()
            .map(|row| (row.label.variant.as_str(), row.average_parent_fitness, row.offspring_fitness))
            .collect();
        assert_eq!(rows, [("f1", 1.5, 1.75), ("f1", 0.5, 0.25)]);
        assert_eq!(batch.failures.len(), 1);
        assert!(matches!(batch.failures[0].error, ReadError::MissingColumn("Parent 2 Fitness")));
    }

    #[test]
    fn missing_directory() {
        let mut path = std::env::temp_dir();
        path.push("experiment_missing_directory_does_not_exist");
        assert!(read_runtimes(&path, Labeling::Parameters).is_err());
    }

    #[test]
    fn load_partial_experiment() {
        let root = temp_dir("experiment_load_partial");
        std::fs::create_dir(root.join("runtimes")).unwrap();
        std::fs::write(root.join("runtimes").join("rt-50-1.txt"), "1.0").unwrap();

        let data = Experiment::new(&root).load(&AnalysisConfig::default()).unwrap();
        std::fs::remove_dir_all(&root).unwrap();

        assert!(data.hofs.rows.is_empty());
        assert!(data.logs.rows.is_empty());
        assert_eq!(data.runtimes.rows.len(), 1);
        assert_eq!(data.failures().count(), 0);
    }
}
