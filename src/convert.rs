//! Conversion of text values into numbers.
//!
//! Parsed files keep every value as text. Numbers are only produced here, and
//! text which is not a number is an error rather than a silent default.

use std::num::{ParseFloatError, ParseIntError};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionErrorKind {
    #[error("{0}")]
    Float(#[from] ParseFloatError),

    #[error("{0}")]
    Integer(#[from] ParseIntError),

    #[error("not a number")]
    NaN,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("column \"{column}\": cannot convert {value:?}: {kind}")]
pub struct ConversionError {
    pub column: String,
    pub value: String,
    #[source]
    pub kind: ConversionErrorKind,
}

impl ConversionError {
    fn new(column: &str, value: &str, kind: impl Into<ConversionErrorKind>) -> Self {
        Self {
            column: column.to_string(),
            value: value.to_string(),
            kind: kind.into(),
        }
    }
}

/// Surrounding whitespace is ignored. "inf" and "-inf" are accepted, "nan" is not.
pub fn parse_f64(column: &str, value: &str) -> Result<f64, ConversionError> {
    let number: f64 = value
        .trim()
        .parse()
        .map_err(|err| ConversionError::new(column, value, err))?;
    if number.is_nan() {
        return Err(ConversionError::new(column, value, ConversionErrorKind::NaN));
    }
    Ok(number)
}

pub fn parse_u64(column: &str, value: &str) -> Result<u64, ConversionError> {
    value
        .trim()
        .parse()
        .map_err(|err| ConversionError::new(column, value, err))
}
