//! Comparison of experiment variants.

use crate::config::{AnalysisConfig, Violation};
use crate::convert::ConversionError;
use crate::experiment::{ExperimentData, LogRow};
use crate::stats::{self, GenerationStats, Summary};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A Hall of Fame genotype which exceeds the configured constraints.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ConstraintReport {
    pub variant: String,
    pub run: String,
    pub genotype: String,
    pub violations: Vec<Violation>,
}

/// How many mutants are fitter than their parent.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Improvement {
    pub better: usize,
    pub total: usize,
}

impl Improvement {
    pub fn fraction(&self) -> f64 {
        self.better as f64 / self.total as f64
    }
}

/// Summaries of every variant of an experiment.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct Report {
    /// Name of the variant column.
    pub variant: String,

    /// Width of the band around the mean over generations, in standard deviations.
    pub std_scale: f64,

    /// Fitness of the Hall of Fame genotypes.
    pub fitness: BTreeMap<String, Summary>,

    /// Runtime of each run, in seconds.
    pub runtime: BTreeMap<String, Summary>,

    /// Best fitness in the last logged generation of each run.
    pub final_max: BTreeMap<String, Summary>,

    /// Average fitness in the last logged generation of each run.
    pub final_avg: BTreeMap<String, Summary>,

    /// Mean over runs of the best fitness, by generation.
    pub max_over_generations: BTreeMap<String, Vec<GenerationStats>>,

    /// Mean over runs of the average fitness, by generation.
    pub avg_over_generations: BTreeMap<String, Vec<GenerationStats>>,

    /// Mutants which are fitter than their parent.
    pub mutant_improvement: BTreeMap<String, Improvement>,

    /// Offspring fitness minus the average fitness of its parents.
    pub crossover_gain: BTreeMap<String, Summary>,

    /// Mean fitness over the runs of a random walk, by step.
    pub random_walk: BTreeMap<String, Vec<GenerationStats>>,

    pub constraint_violations: Vec<ConstraintReport>,

    /// Hall of Fame entries whose values could not be converted.
    pub conversion_errors: Vec<String>,

    /// Files which could not be read.
    pub skipped_files: Vec<String>,
}

impl Report {
    pub fn new(data: &ExperimentData, config: &AnalysisConfig) -> Self {
        let mut report = Report {
            variant: config.labeling.column().to_string(),
            std_scale: config.std_scale,
            ..Default::default()
        };
        report.skipped_files = data
            .failures()
            .map(|failure| format!("{}: {}", failure.path.display(), failure.error))
            .collect();

        // Hall of Fame
        let mut fitness = vec![];
        for row in &data.hofs.rows {
            match row.record.get_f64(&config.fitness) {
                Ok(Some(value)) => fitness.push((row.label.variant.as_str(), value)),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!("{} run {}: {error}", row.label.variant, row.label.run);
                    report.conversion_errors.push(error.to_string());
                }
            }
            let genotype = row.record.get("genotype").unwrap_or_else(|| {
                if config.constraints.max_numgenochars.is_some() {
                    tracing::warn!("{} run {}: no genotype, length not checked", row.label.variant, row.label.run);
                }
                ""
            });
            let mut conversion_error: Option<ConversionError> = None;
            let violations = config.constraints.check(genotype, |name| match row.record.get_f64(name) {
                Ok(value) => value,
                Err(error) => {
                    conversion_error.get_or_insert(error);
                    None
                }
            });
            if let Some(error) = conversion_error {
                report.conversion_errors.push(error.to_string());
            }
            if !violations.is_empty() {
                tracing::debug!(
                    "genotype {genotype:?} violates {} constraints",
                    violations.len()
                );
                report.constraint_violations.push(ConstraintReport {
                    variant: row.label.variant.clone(),
                    run: row.label.run.clone(),
                    genotype: genotype.to_string(),
                    violations,
                });
            }
        }
        report.fitness = stats::group_by(&fitness, |row| row.0, |row| row.1);

        // Runtimes
        report.runtime = stats::group_by(
            &data.runtimes.rows,
            |row| row.label.variant.as_str(),
            |row| row.seconds,
        );

        // Logs
        let rows = &data.logs.rows;
        report.max_over_generations = stats::per_generation(
            rows,
            |row| row.label.variant.as_str(),
            |row| row.generation,
            |row| row.values.get("max").copied(),
        );
        report.avg_over_generations = stats::per_generation(
            rows,
            |row| row.label.variant.as_str(),
            |row| row.generation,
            |row| row.values.get("avg").copied(),
        );
        let last = last_generations(rows);
        report.final_max = stats::group_by(&column_values(&last, "max"), |row| row.0, |row| row.1);
        report.final_avg = stats::group_by(&column_values(&last, "avg"), |row| row.0, |row| row.1);

        // Variation operators
        for row in &data.mutants.rows {
            let entry = report
                .mutant_improvement
                .entry(row.label.variant.clone())
                .or_insert(Improvement { better: 0, total: 0 });
            entry.total += 1;
            if row.fitness > row.parent_fitness {
                entry.better += 1;
            }
        }
        report.crossover_gain = stats::group_by(
            &data.crossover.rows,
            |row| row.label.variant.as_str(),
            |row| row.offspring_fitness - row.average_parent_fitness,
        );
        report.random_walk = stats::per_generation(
            &data.random_walks.rows,
            |row| row.label.variant.as_str(),
            |row| row.step,
            |row| Some(row.fitness),
        );
        report
    }

    /// Fraction of all mutants which are fitter than their parent.
    pub fn overall_improvement(&self) -> Option<f64> {
        let (better, total) = self
            .mutant_improvement
            .values()
            .fold((0, 0), |(better, total), x| (better + x.better, total + x.total));
        (total > 0).then(|| better as f64 / total as f64)
    }
}

/// The last logged generation of each run.
fn last_generations(rows: &[LogRow]) -> Vec<&LogRow> {
    let mut last: BTreeMap<(&str, &str), &LogRow> = BTreeMap::new();
    for row in rows {
        let run = (row.label.variant.as_str(), row.label.run.as_str());
        if last.get(&run).is_none_or(|prev| prev.generation <= row.generation) {
            last.insert(run, row);
        }
    }
    last.into_values().collect()
}

fn column_values<'a>(rows: &[&'a LogRow], column: &str) -> Vec<(&'a str, f64)> {
    rows.iter()
        .filter_map(|row| Some((row.label.variant.as_str(), *row.values.get(column)?)))
        .collect()
}

fn write_table(f: &mut fmt::Formatter, title: &str, variant: &str, table: &BTreeMap<String, Summary>) -> fmt::Result {
    if table.is_empty() {
        return Ok(());
    }
    writeln!(f, "{title}")?;
    writeln!(
        f,
        "  {variant:<16} {:>5} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "n", "mean", "std", "min", "median", "q3", "max"
    )?;
    for (name, s) in table {
        writeln!(
            f,
            "  {name:<16} {:>5} {:>12.6} {:>12.6} {:>12.6} {:>12.6} {:>12.6} {:>12.6}",
            s.count, s.mean, s.std, s.min, s.median, s.q3, s.max
        )?;
    }
    writeln!(f)
}

fn write_series(
    f: &mut fmt::Formatter,
    title: &str,
    std_scale: f64,
    series: &BTreeMap<String, Vec<GenerationStats>>,
) -> fmt::Result {
    if series.is_empty() {
        return Ok(());
    }
    writeln!(f, "{title} (band: {std_scale} std)")?;
    for (name, generations) in series {
        writeln!(f, "  {name}")?;
        for stats in generations {
            let (lower, upper) = stats.band(std_scale);
            writeln!(
                f,
                "    {:>6} {:>12.6} [{:.6}, {:.6}] runs={}",
                stats.generation, stats.mean, lower, upper, stats.runs
            )?;
        }
    }
    writeln!(f)
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_table(f, "Hall of Fame fitness", &self.variant, &self.fitness)?;
        write_table(f, "Runtime [s]", &self.variant, &self.runtime)?;
        write_table(f, "Best fitness in final generation", &self.variant, &self.final_max)?;
        write_table(f, "Average fitness in final generation", &self.variant, &self.final_avg)?;
        write_series(f, "Mean best fitness over generations", self.std_scale, &self.max_over_generations)?;
        write_series(f, "Mean average fitness over generations", self.std_scale, &self.avg_over_generations)?;
        if let Some(overall) = self.overall_improvement() {
            writeln!(f, "Mutants fitter than their parent (overall {overall:.6})")?;
            for (name, improvement) in &self.mutant_improvement {
                writeln!(
                    f,
                    "  {name:<16} {:>6} / {:<6} {:.6}",
                    improvement.better,
                    improvement.total,
                    improvement.fraction()
                )?;
            }
            writeln!(f)?;
        }
        write_table(f, "Crossover fitness gain", &self.variant, &self.crossover_gain)?;
        write_series(f, "Mean fitness along random walks", self.std_scale, &self.random_walk)?;
        for violation in &self.constraint_violations {
            writeln!(
                f,
                "constraint violated: {} run {}: {:?}",
                violation.variant, violation.run, violation.violations
            )?;
        }
        for error in &self.conversion_errors {
            writeln!(f, "conversion error: {error}")?;
        }
        for skipped in &self.skipped_files {
            writeln!(f, "skipped: {skipped}")?;
        }
        Ok(())
    }
}
