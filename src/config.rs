//! One serde-defaulted configuration for a whole pipeline run.
//!
//! A JSON file only needs the fields it changes. Loading always validates, so
//! a config whose years fall outside the panel, or whose metric sector the
//! panel does not carry, fails before any table is read.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cohort::CohortPolicy;
use crate::constants::analysis::{DEFAULT_BASE_YEAR, DEFAULT_COMPARISON_YEAR};
use crate::data::{Sector, Year};
use crate::errors::PanelError;
use crate::fips::FipsRemapTable;
use crate::geography::TerritoryRule;
use crate::panel::PanelOptions;
use crate::table::ColumnMapping;

/// Top-level pipeline configuration.
///
/// Every field falls back to its default when absent from a JSON config file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Panel construction: sectors, years, key schemes, join mode.
    pub panel: PanelOptions,
    /// Sector whose share of the panel total drives cohort assignment.
    pub metric_sector: Sector,
    /// Year whose share distribution defines the cohorts.
    pub base_year: Year,
    /// Year compared against `base_year` in the delta table.
    pub comparison_year: Year,
    /// How base-year shares are bucketed.
    pub cohort_policy: CohortPolicy,
    /// Historical MSA code corrections applied before the geometry join.
    pub fips_remap: FipsRemapTable,
    /// Which states count as territories.
    pub territory: TerritoryRule,
    /// Loader column names.
    pub columns: ColumnMapping,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            panel: PanelOptions::default(),
            metric_sector: Sector::Military,
            base_year: DEFAULT_BASE_YEAR,
            comparison_year: DEFAULT_COMPARISON_YEAR,
            cohort_policy: CohortPolicy::Quartile,
            fips_remap: FipsRemapTable::default(),
            territory: TerritoryRule::default(),
            columns: ColumnMapping::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_json_path(path: &Path) -> Result<Self, PanelError> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no pipeline run can satisfy.
    pub fn validate(&self) -> Result<(), PanelError> {
        if self.panel.sectors.is_empty() {
            return Err(PanelError::Configuration(
                "panel.sectors must name at least one sector".to_string(),
            ));
        }
        if !self.panel.sectors.contains(&self.metric_sector) {
            return Err(PanelError::Configuration(format!(
                "metric sector '{}' is not one of the panel sectors",
                self.metric_sector
            )));
        }
        if self.base_year == self.comparison_year {
            return Err(PanelError::Configuration(format!(
                "comparison year must differ from base year {}",
                self.base_year
            )));
        }
        let years = &self.panel.years;
        if !years.is_empty() {
            for year in [self.base_year, self.comparison_year] {
                if !years.contains(&year) {
                    return Err(PanelError::Configuration(format!(
                        "year {year} is outside panel.years {years:?}"
                    )));
                }
            }
        }
        self.fips_remap.validate()
    }
}
