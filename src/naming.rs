//! Run labels derived from result file names.
//!
//! Result files are named after the experiment variant and the run number,
//! for example "HoF-f9-7.gen" or "log-005-12.csv". Each experiment series used
//! a slightly different naming scheme, see [Labeling].

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot label file name {name:?}: {reason}")]
pub struct NameError {
    pub name: String,
    pub reason: &'static str,
}

/// Naming scheme of the result files in an experiment.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Labeling {
    /// `<prefix>-<prob>-<run>` where the probability is written without its
    /// decimal point, so "005" means 0.05.
    Mutation,

    /// `<prefix>-<representation>-<run>[-<suffix>]`. Runs evaluated with the
    /// modified evaluation have a suffix containing "eval", and their
    /// representation is labeled with "_mod".
    Representation,

    /// `<prefix>-<representation>-<run>`, taking the last two parts.
    Genformat,

    /// `<prefix>-<parameters>-<run>`, taking the last two parts.
    #[default]
    Parameters,
}

impl Labeling {
    /// Name of the context column which holds the variant.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Mutation => "mutation",
            Self::Representation | Self::Genformat => "representation",
            Self::Parameters => "parameters",
        }
    }

    /// Label a result file by its path.
    pub fn label_path(&self, path: &Path) -> Result<RunLabel, NameError> {
        let name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
        self.label(name)
    }

    /// Label a result file by its name. Everything after the first '.' is ignored.
    pub fn label(&self, file_name: &str) -> Result<RunLabel, NameError> {
        let error = |reason: &'static str| NameError {
            name: file_name.to_string(),
            reason,
        };
        let stem = file_name.split('.').next().unwrap_or_default();
        let parts: Vec<&str> = stem.split('-').collect();
        let (variant, run) = match self {
            Self::Representation => {
                let [_, representation, run, ..] = parts.as_slice() else {
                    return Err(error("expected at least three '-' separated parts"));
                };
                let mut representation = representation.to_string();
                if parts.last().is_some_and(|last| last.contains("eval")) {
                    representation.push_str("_mod");
                }
                (representation, *run)
            }
            Self::Mutation | Self::Genformat | Self::Parameters => {
                let [.., variant, run] = parts.as_slice() else {
                    return Err(error("expected at least two '-' separated parts"));
                };
                let variant = if *self == Self::Mutation {
                    insert_decimal_point(variant)
                        .ok_or_else(|| error("mutation probability must be two or more digits"))?
                } else {
                    variant.to_string()
                };
                (variant, *run)
            }
        };
        if variant.is_empty() || run.is_empty() {
            return Err(error("empty variant or run"));
        }
        Ok(RunLabel {
            column: self.column(),
            variant,
            run: run.to_string(),
        })
    }
}

impl std::str::FromStr for Labeling {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mutation" => Ok(Self::Mutation),
            "representation" => Ok(Self::Representation),
            "genformat" => Ok(Self::Genformat),
            "parameters" => Ok(Self::Parameters),
            _ => Err(format!("unrecognized labeling \"{s}\"")),
        }
    }
}

/// Label a file which holds a whole variant, such as "f1.csv". The run is empty.
pub fn label_variant_file(path: &Path) -> Result<RunLabel, NameError> {
    let name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    if stem.is_empty() {
        return Err(NameError {
            name: name.to_string(),
            reason: "empty variant",
        });
    }
    Ok(RunLabel {
        column: "representation",
        variant: stem.to_string(),
        run: String::new(),
    })
}

/// "005" -> "0.05"
fn insert_decimal_point(digits: &str) -> Option<String> {
    if digits.len() < 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (first, rest) = digits.split_at(1);
    Some(format!("{first}.{rest}"))
}

/// Context columns for all rows read from one result file.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunLabel {
    /// Name of the variant column: "mutation", "representation", or "parameters".
    pub column: &'static str,

    /// Which variant of the experiment this run belongs to.
    pub variant: String,

    /// Run number, kept as text.
    pub run: String,
}
