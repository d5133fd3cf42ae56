use serde::{Deserialize, Deserializer};

/// Error type for manipulating JSON files.
#[derive(thiserror::Error, Debug)]
pub enum JsonIoError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Enforces the constraint that the given value is not negative.
///
/// Usage: `#[serde(deserialize_with = "deserialize_positive")]`
pub fn deserialize_positive<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value < 0.0 || value.is_nan() {
        Err(serde::de::Error::custom("value less than zero"))
    } else {
        Ok(value)
    }
}

/// Enforces the constraint that the given string is not empty.
///
/// Usage: `#[serde(deserialize_with = "required_string")]`
pub fn required_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    if value.trim().is_empty() {
        Err(serde::de::Error::custom("missing required string"))
    } else {
        Ok(value)
    }
}

/// Enforces the constraint that a list of names is not empty, and that none of
/// the names are empty.
///
/// Usage: `#[serde(deserialize_with = "required_names")]`
pub fn required_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Vec::<String>::deserialize(deserializer)?;
    if value.is_empty() {
        Err(serde::de::Error::custom("missing required list"))
    } else if value.iter().any(|name| name.trim().is_empty()) {
        Err(serde::de::Error::custom("missing required string"))
    } else {
        Ok(value)
    }
}
