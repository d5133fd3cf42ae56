//! Settings for analysing an experiment.

use crate::naming::Labeling;
use crate::serde_utils::{JsonIoError, deserialize_positive, required_names, required_string};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_attributes() -> Vec<String> {
    vec!["genotype".to_string(), "vertpos".to_string()]
}

fn default_fitness() -> String {
    "vertpos".to_string()
}

fn default_std_scale() -> f64 {
    0.1
}

/// How to read and summarize the results of one experiment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Naming scheme of the result files.
    #[serde(default)]
    pub labeling: Labeling,

    /// Attributes to read from the Hall of Fame files.
    #[serde(default = "default_attributes", deserialize_with = "required_names")]
    pub attributes: Vec<String>,

    /// Hall of Fame attribute which holds the fitness.
    #[serde(default = "default_fitness", deserialize_with = "required_string")]
    pub fitness: String,

    /// Width of the band around the mean fitness, in standard deviations.
    #[serde(default = "default_std_scale", deserialize_with = "deserialize_positive")]
    pub std_scale: f64,

    /// Limits on the genotypes, Hall of Fame entries exceeding them are reported.
    #[serde(default)]
    pub constraints: Constraints,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            labeling: Labeling::default(),
            attributes: default_attributes(),
            fitness: default_fitness(),
            std_scale: default_std_scale(),
            constraints: Constraints::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load the configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, JsonIoError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Attributes to read from the Hall of Fame, including the fitness and
    /// every constrained attribute. The genotype is read when its length is
    /// limited.
    pub fn wanted_attributes(&self) -> Vec<&str> {
        let mut wanted: Vec<&str> = self.attributes.iter().map(String::as_str).collect();
        if !wanted.contains(&self.fitness.as_str()) {
            wanted.push(&self.fitness);
        }
        for (name, _) in self.constraints.limits() {
            if !wanted.contains(&name) {
                wanted.push(name);
            }
        }
        if self.constraints.max_numgenochars.is_some() && !wanted.contains(&"genotype") {
            wanted.push("genotype");
        }
        wanted
    }
}

/// Upper limits on the structure of a genotype. Unset limits are not checked.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Constraints {
    #[serde(default)]
    pub max_numparts: Option<u64>,
    #[serde(default)]
    pub max_numjoints: Option<u64>,
    #[serde(default)]
    pub max_numneurons: Option<u64>,
    #[serde(default)]
    pub max_numconnections: Option<u64>,
    /// Number of characters in the genotype, including the format prefix.
    #[serde(default)]
    pub max_numgenochars: Option<u64>,
}

/// One limit which a genotype exceeds.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Violation {
    pub criterion: &'static str,
    pub value: f64,
    pub limit: u64,
}

impl Constraints {
    /// Names of the constrained attributes and their limits.
    /// The genotype length is not an attribute and is not included.
    pub fn limits(&self) -> impl Iterator<Item = (&'static str, u64)> {
        [
            ("numparts", self.max_numparts),
            ("numjoints", self.max_numjoints),
            ("numneurons", self.max_numneurons),
            ("numconnections", self.max_numconnections),
        ]
        .into_iter()
        .filter_map(|(name, limit)| Some((name, limit?)))
    }

    /// Check a genotype's criteria against the limits.
    ///
    /// Argument `value_of` looks up a criterion, returning None if it is unknown.
    /// Unknown criteria are not violations.
    pub fn check(&self, genotype: &str, mut value_of: impl FnMut(&str) -> Option<f64>) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (criterion, limit) in self.limits() {
            if let Some(value) = value_of(criterion) {
                if value > limit as f64 {
                    violations.push(Violation { criterion, value, limit });
                }
            }
        }
        if let Some(limit) = self.max_numgenochars {
            let value = genotype.chars().count() as f64;
            if value > limit as f64 {
                violations.push(Violation {
                    criterion: "numgenochars",
                    value,
                    limit,
                });
            }
        }
        violations
    }
}
