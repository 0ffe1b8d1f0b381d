//! Wide <-> long reshaping of county-sector tables.
//!
//! The source table is wide: one row per county and sector, one column per
//! year. [`unpivot`] produces one record per county, sector and year;
//! [`pivot`] is its exact inverse (row order, year columns and missing cells
//! are all preserved).

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::data::{CountyKey, CountySectorRecord, Sector, Year};
use crate::errors::PanelError;

/// One county and sector with a value column per year.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WideSectorRow {
    /// Normalized county name.
    pub county_key: CountyKey,
    /// Employment sector.
    pub sector: Sector,
    /// Year columns; `None` marks a suppressed or unavailable cell.
    pub values: BTreeMap<Year, Option<f64>>,
}

/// One county and year with a value column per sector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CountyYearRow {
    /// Normalized county name.
    pub county_key: CountyKey,
    /// Calendar year.
    pub year: Year,
    /// Sector columns; `None` marks a missing cell.
    pub values: BTreeMap<Sector, Option<f64>>,
}

/// Wide -> long: one record per county, sector and year column.
pub fn unpivot(rows: &[WideSectorRow]) -> Vec<CountySectorRecord> {
    let mut records = Vec::with_capacity(rows.iter().map(|row| row.values.len()).sum());
    for row in rows {
        for (&year, &value) in &row.values {
            records.push(CountySectorRecord {
                county_key: row.county_key.clone(),
                sector: row.sector.clone(),
                year,
                value,
            });
        }
    }
    records
}

/// Long -> wide: the inverse of [`unpivot`].
///
/// Rows come out in first-seen (county, sector) order. Two records for the
/// same county, sector and year are rejected.
pub fn pivot(records: &[CountySectorRecord]) -> Result<Vec<WideSectorRow>, PanelError> {
    let mut grouped: IndexMap<(&str, &Sector), BTreeMap<Year, Option<f64>>> = IndexMap::new();
    for record in records {
        let values = grouped
            .entry((record.county_key.as_str(), &record.sector))
            .or_default();
        if values.insert(record.year, record.value).is_some() {
            return Err(PanelError::DuplicateKey {
                table: "county_sectors".to_string(),
                key: format!("({}, {}, {})", record.county_key, record.sector, record.year),
            });
        }
    }
    Ok(grouped
        .into_iter()
        .map(|((county_key, sector), values)| WideSectorRow {
            county_key: county_key.to_string(),
            sector: sector.clone(),
            values,
        })
        .collect())
}

/// Long -> county-year rows with one column per sector, sorted by county and year.
pub fn county_year_rows(records: &[CountySectorRecord]) -> Result<Vec<CountyYearRow>, PanelError> {
    let mut grouped: BTreeMap<(&str, Year), BTreeMap<Sector, Option<f64>>> = BTreeMap::new();
    for record in records {
        let values = grouped
            .entry((record.county_key.as_str(), record.year))
            .or_default();
        if values.insert(record.sector.clone(), record.value).is_some() {
            return Err(PanelError::DuplicateKey {
                table: "county_sectors".to_string(),
                key: format!("({}, {}, {})", record.county_key, record.sector, record.year),
            });
        }
    }
    Ok(grouped
        .into_iter()
        .map(|((county_key, year), values)| CountyYearRow {
            county_key: county_key.to_string(),
            year,
            values,
        })
        .collect())
}

/// Sum of present values (missing cells are skipped, not zeroed).
pub fn value_sum(records: &[CountySectorRecord]) -> f64 {
    records.iter().filter_map(|record| record.value).sum()
}

/// Sum of present values across a wide table.
pub fn wide_value_sum(rows: &[WideSectorRow]) -> f64 {
    rows.iter()
        .flat_map(|row| row.values.values())
        .filter_map(|value| *value)
        .sum()
}
