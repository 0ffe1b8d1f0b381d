use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::fips::MsaCode;
use crate::normalize::canonical_key;

pub use crate::types::{CountyKey, Month, MsaKey, Year};

/// Employment sector of a county-sector record.
///
/// Parsed from the source's free-text description, so unknown sectors are kept
/// as [`Sector::Other`] with their canonical name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sector {
    /// Manufacturing employment.
    Manufacturing,
    /// Military employment.
    Military,
    /// Any other description, canonicalized.
    Other(String),
}

impl Sector {
    /// Parse a sector description (case-insensitive, trimmed).
    pub fn parse(raw: &str) -> Self {
        match canonical_key(raw).as_str() {
            "manufacturing" => Sector::Manufacturing,
            "military" => Sector::Military,
            other => Sector::Other(other.to_string()),
        }
    }

    /// Canonical lower-case name.
    pub fn as_str(&self) -> &str {
        match self {
            Sector::Manufacturing => "manufacturing",
            Sector::Military => "military",
            Sector::Other(name) => name,
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Sector {
    fn from(value: String) -> Self {
        Sector::parse(&value)
    }
}

impl From<Sector> for String {
    fn from(value: Sector) -> Self {
        value.as_str().to_string()
    }
}

/// Which county identifier the county-sector rows carry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountyKeyScheme {
    /// County rows are keyed by `County, ST` names.
    #[default]
    Name,
    /// County rows are keyed by county FIPS codes.
    Fips,
}

/// Which MSA identifier joins aggregated sectors to the unemployment series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsaKeyScheme {
    /// Join on normalized MSA names.
    #[default]
    Name,
    /// Join on CBSA codes.
    Fips,
}

/// MSA join key under a chosen [`MsaKeyScheme`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsaId {
    /// Normalized MSA name.
    Name(MsaKey),
    /// CBSA code.
    Code(MsaCode),
}

impl MsaId {
    /// Build the key for `scheme`, or `None` when that identifier is absent.
    pub fn for_scheme(scheme: MsaKeyScheme, name: &str, code: Option<MsaCode>) -> Option<Self> {
        match scheme {
            MsaKeyScheme::Name if !name.is_empty() => Some(MsaId::Name(name.to_string())),
            MsaKeyScheme::Name => None,
            MsaKeyScheme::Fips => code.map(MsaId::Code),
        }
    }
}

impl fmt::Display for MsaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsaId::Name(name) => write!(f, "name:{name}"),
            MsaId::Code(code) => write!(f, "code:{code}"),
        }
    }
}

/// One county, one sector, one year (long form).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CountySectorRecord {
    /// Normalized county name.
    pub county_key: CountyKey,
    /// Employment sector.
    pub sector: Sector,
    /// Calendar year.
    pub year: Year,
    /// Non-negative when present; `None` for suppressed/unavailable cells.
    pub value: Option<f64>,
}

/// Maps one county to one MSA.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrosswalkEntry {
    /// Normalized county name.
    pub county_key: CountyKey,
    /// Normalized MSA name; empty for counties outside any MSA.
    pub msa_key: MsaKey,
    /// Five-digit county FIPS as text.
    pub county_fips: Option<String>,
    /// CBSA code of the MSA.
    pub msa_fips: Option<MsaCode>,
}

impl CrosswalkEntry {
    /// County join key under `scheme`.
    pub fn county_join_key(&self, scheme: CountyKeyScheme) -> Option<&str> {
        match scheme {
            CountyKeyScheme::Name => Some(self.county_key.as_str()),
            CountyKeyScheme::Fips => self.county_fips.as_deref(),
        }
    }
}

/// One MSA unemployment observation (monthly when `month` is present).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MsaUnemploymentObservation {
    /// Normalized MSA name.
    pub msa_key: MsaKey,
    /// CBSA code, when the series carries one.
    pub msa_fips: Option<MsaCode>,
    /// Calendar year.
    pub year: Year,
    /// 1-12; `None` for annual rows.
    pub month: Option<Month>,
    /// Percent, 0-100. `None` when the source marks the rate unavailable.
    pub unemployment_rate: Option<f64>,
}

impl MsaUnemploymentObservation {
    /// First day of the observation month, for time-series alignment.
    pub fn observation_date(&self) -> Option<NaiveDate> {
        self.month
            .and_then(|month| NaiveDate::from_ymd_opt(self.year, month, 1))
    }
}

/// Mean unemployment across the observed months of one MSA-year.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnualUnemployment {
    /// Key under the active MSA scheme.
    pub msa: MsaId,
    /// Normalized MSA name.
    pub msa_key: MsaKey,
    /// CBSA code.
    pub msa_fips: Option<MsaCode>,
    /// Calendar year.
    pub year: Year,
    /// `None` when no month of the year carried a rate.
    pub unemployment_rate: Option<f64>,
    /// Number of observations that contributed a rate.
    pub observations: usize,
}

/// Where a panel row's sector fields came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorCoverage {
    /// Sector fields were aggregated from county records.
    Observed,
    /// No sector data matched; fields were filled with zero by the right join.
    Filled,
}

/// The fused unit of analysis: one MSA, one year.
///
/// `total` is always recomputed from the sector fields; it cannot be set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MsaPanelRow {
    /// Key the row was joined on.
    pub msa: MsaId,
    /// Normalized MSA name.
    pub msa_key: MsaKey,
    /// CBSA code, from the crosswalk or the unemployment series.
    pub msa_fips: Option<MsaCode>,
    /// Calendar year.
    pub year: Year,
    sectors: BTreeMap<Sector, f64>,
    total: f64,
    /// Annual mean rate; `None` when the year had no rate.
    pub unemployment_rate: Option<f64>,
    /// Whether the sector fields were observed or zero-filled.
    pub coverage: SectorCoverage,
}

impl MsaPanelRow {
    /// Build a row, computing `total` as the sum of `sectors`.
    pub fn new(
        msa: MsaId,
        msa_key: MsaKey,
        msa_fips: Option<MsaCode>,
        year: Year,
        sectors: BTreeMap<Sector, f64>,
        unemployment_rate: Option<f64>,
        coverage: SectorCoverage,
    ) -> Self {
        let total = sectors.values().sum();
        Self {
            msa,
            msa_key,
            msa_fips,
            year,
            sectors,
            total,
            unemployment_rate,
            coverage,
        }
    }

    /// Sector fields present on this row.
    pub fn sectors(&self) -> &BTreeMap<Sector, f64> {
        &self.sectors
    }

    /// Value of one sector, `None` when the sector had no observed values.
    pub fn sector_value(&self, sector: &Sector) -> Option<f64> {
        self.sectors.get(sector).copied()
    }

    /// Sum of the sector fields.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// `sector / total`, defined only for observed rows with `total > 0`.
    pub fn share(&self, sector: &Sector) -> Option<f64> {
        if self.coverage != SectorCoverage::Observed || self.total <= 0.0 {
            return None;
        }
        self.sector_value(sector).map(|value| value / self.total)
    }
}
