#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Cohort assignment from base-year sector shares.
pub mod cohort;
/// Pipeline configuration types.
pub mod config;
/// Centralized constants: suffix lists, column names, remap table, territory rule.
pub mod constants;
/// Typed row model shared by every stage.
pub mod data;
/// Per-cohort unemployment deltas and monthly cohort means.
pub mod delta;
/// Direct policy effects per MSA and their monthly profile.
pub mod effects;
/// Reusable CLI runners.
pub mod example_apps;
/// Historical MSA code corrections.
pub mod fips;
/// Continental/territory partition and geometry joins.
pub mod geography;
/// Keyed joins with coverage diagnostics.
pub mod join;
/// Join-key normalization.
pub mod normalize;
/// MSA-year panel construction.
pub mod panel;
/// Stage composition.
pub mod pipeline;
/// Wide/long reshaping of county-sector tables.
pub mod reshape;
/// Loader tables, GeoJSON boundary features and typed row conversion.
pub mod table;
/// Shared type aliases.
pub mod types;
/// Annual and monthly unemployment series.
pub mod unemployment;

mod errors;

pub use cohort::{
    CohortAssignment, CohortCutoffs, CohortExclusions, CohortLabel, CohortPolicy, LabeledPanel,
    LabeledRow, assign_cohorts,
};
pub use config::PipelineConfig;
pub use data::{
    CountyKeyScheme, CountySectorRecord, CrosswalkEntry, MsaId, MsaKeyScheme, MsaPanelRow,
    MsaUnemploymentObservation, Sector, SectorCoverage,
};
pub use delta::{CohortDelta, CohortDeltaSummary, cohort_delta};
pub use errors::PanelError;
pub use fips::{FipsRemapTable, MsaCode};
pub use geography::{GeoJoin, GeoPartition, RegionClass, TerritoryRule, join_geometry};
pub use join::{JoinDiagnostics, JoinKind};
pub use panel::{PanelBuild, PanelOptions, PanelSources, UnemploymentJoin, build_panel};
pub use pipeline::{PipelineInputs, PipelineOutput};
pub use reshape::{WideSectorRow, pivot, unpivot};
pub use table::{ColumnMapping, FeatureTable, RawTable};
pub use types::{ColumnName, CountyKey, Month, MsaKey, PostalCode, Year};
