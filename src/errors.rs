use std::io;

use thiserror::Error;

use crate::types::{ColumnName, CountyKey, MsaKey, SampleKey, TableName, Year};

/// Error type for join integrity, loader-row, and configuration failures.
///
/// Coverage gaps, undefined shares, missing cohorts and geometry mismatches are
/// not errors; they are reported as counts next to the primary result.
#[derive(Debug, Error)]
pub enum PanelError {
    /// A required join produced no pairs, which points at a key mismatch.
    #[error(
        "join '{join}' matched no rows on {left_key} = {right_key} (left-only sample: {left_sample:?}, right-only sample: {right_sample:?})"
    )]
    JoinIntegrity {
        /// Join name.
        join: String,
        /// Left key column.
        left_key: String,
        /// Right key column.
        right_key: String,
        /// A few unmatched left keys.
        left_sample: Vec<SampleKey>,
        /// A few unmatched right keys.
        right_sample: Vec<SampleKey>,
    },
    /// No base-year row had a defined share, so no cutoffs exist.
    #[error("no labelable '{sector}' shares in base year {year}")]
    EmptyDistribution {
        /// Metric sector.
        sector: String,
        /// Base year.
        year: Year,
    },
    /// One county is mapped to two different MSAs.
    #[error("county '{county_key}' maps to more than one MSA: {msa_keys:?}")]
    AmbiguousCrosswalk {
        /// The county.
        county_key: CountyKey,
        /// Every MSA it maps to, sorted.
        msa_keys: Vec<MsaKey>,
    },
    /// A required column is absent from a loader row.
    #[error("table '{table}' row {row}: missing column '{column}'")]
    MissingColumn {
        /// Table name.
        table: TableName,
        /// Column looked up.
        column: ColumnName,
        /// Zero-based row index.
        row: usize,
    },
    /// A loader cell failed validation.
    #[error("table '{table}' row {row}: column '{column}' has invalid value '{value}'")]
    InvalidValue {
        /// Table name.
        table: TableName,
        /// Offending column.
        column: ColumnName,
        /// Zero-based row index.
        row: usize,
        /// The rejected value as text.
        value: String,
    },
    /// A key that must be unique appears twice.
    #[error("table '{table}' has duplicate key {key}")]
    DuplicateKey {
        /// Table name.
        table: TableName,
        /// The repeated key.
        key: String,
    },
    /// A code or GEOID did not parse.
    #[error("invalid {kind} identifier '{value}'")]
    InvalidIdentifier {
        /// What kind of identifier was expected.
        kind: &'static str,
        /// The raw value.
        value: String,
    },
    /// Invalid pipeline configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Reading an input or config file failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// An input or config file is not valid JSON for its shape.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
