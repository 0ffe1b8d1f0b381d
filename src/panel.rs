//! Panel builder: county-sector records -> one row per (MSA, year).
//!
//! Stages, each an explicit function of the previous stage's output:
//! 1. normalize keys on both sides of every join,
//! 2. prepare the crosswalk (drop "no MSA" entries, reject ambiguous counties),
//! 3. unpivot the wide sector table,
//! 4. inner join county records to the crosswalk,
//! 5. sum sector values per (MSA, year),
//! 6. join the sums to the annualized unemployment series.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::crosswalk::NO_MSA_SENTINEL;
use crate::data::{
    AnnualUnemployment, CountyKeyScheme, CountySectorRecord, CrosswalkEntry, MsaId, MsaKeyScheme,
    MsaPanelRow, MsaUnemploymentObservation, Sector, SectorCoverage, Year,
};
use crate::errors::PanelError;
use crate::fips::MsaCode;
use crate::join::{JoinDiagnostics, JoinKind, JoinSpec, keyed_join};
use crate::normalize::{KeyNormalization, canonical_key, format_county_state};
use crate::reshape::{WideSectorRow, county_year_rows, unpivot};
use crate::types::MsaKey;
use crate::unemployment::{annualize, restrict_years};

/// How aggregated sectors join the unemployment series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnemploymentJoin {
    /// Keep only MSA-years present on both sides (completeness checks).
    #[default]
    Inner,
    /// Keep every unemployment row; rows without sector data are zero-filled.
    Right,
}

/// What to do with missing county sector cells before aggregation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Leave the cell out of the sums.
    #[default]
    Skip,
    /// Drop the whole county-year when any configured sector is missing.
    DropCounty,
}

/// Panel builder settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelOptions {
    /// Sectors carried into the panel; `total` is their sum.
    pub sectors: Vec<Sector>,
    /// Years kept from both sources (empty keeps every year).
    pub years: Vec<Year>,
    /// County join key: name or FIPS.
    pub county_scheme: CountyKeyScheme,
    /// MSA join key: name or CBSA code.
    pub msa_scheme: MsaKeyScheme,
    /// Inner or right join of the unemployment series.
    pub unemployment_join: UnemploymentJoin,
    /// How missing county cells are handled.
    pub missing_values: MissingValuePolicy,
    /// Per-source key normalization.
    pub keys: KeyNormalization,
    /// Crosswalk value marking counties outside any MSA.
    pub crosswalk_sentinel: String,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self {
            sectors: vec![Sector::Manufacturing, Sector::Military],
            years: Vec::new(),
            county_scheme: CountyKeyScheme::Name,
            msa_scheme: MsaKeyScheme::Name,
            unemployment_join: UnemploymentJoin::Inner,
            missing_values: MissingValuePolicy::Skip,
            keys: KeyNormalization::default(),
            crosswalk_sentinel: NO_MSA_SENTINEL.to_string(),
        }
    }
}

/// The three typed inputs of the panel builder.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PanelSources {
    /// Wide county-sector table.
    pub county_sectors: Vec<WideSectorRow>,
    /// County to MSA mapping.
    pub crosswalk: Vec<CrosswalkEntry>,
    /// Monthly or annual MSA unemployment.
    pub unemployment: Vec<MsaUnemploymentObservation>,
}

impl PanelSources {
    /// Apply the configured key normalization to every join column in place.
    pub fn normalize_keys(&mut self, keys: &KeyNormalization) {
        let county = keys.county();
        let crosswalk_msa = keys.crosswalk_msa();
        let unemployment_msa = keys.unemployment_msa();

        county.normalize_in_place(self.county_sectors.iter_mut().map(|row| &mut row.county_key));
        for entry in &mut self.crosswalk {
            if keys.format_crosswalk_counties {
                entry.county_key = format_county_state(&entry.county_key);
            }
            entry.county_key = county.normalize(&entry.county_key);
            entry.msa_key = crosswalk_msa.normalize(&entry.msa_key);
            if let Some(fips) = entry.county_fips.as_mut() {
                *fips = canonical_key(&*fips);
            }
        }
        unemployment_msa
            .normalize_in_place(self.unemployment.iter_mut().map(|obs| &mut obs.msa_key));
    }
}

/// Outcome of crosswalk preparation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrosswalkReport {
    /// Entries before preparation.
    pub input_entries: usize,
    /// Entries marked as "no MSA".
    pub sentinel_entries: usize,
    /// Entries lacking the county or MSA identifier of the active schemes.
    pub unkeyed_entries: usize,
    /// Exact repeats of an earlier county -> MSA mapping.
    pub duplicate_entries: usize,
    /// Entries left for the county join.
    pub kept_entries: usize,
}

/// Crosswalk entries usable for the county join, one per county.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PreparedCrosswalk {
    /// Kept entries.
    pub entries: Vec<CrosswalkEntry>,
    /// Counts of what was dropped.
    pub report: CrosswalkReport,
}

/// Drop sentinel and unkeyed entries, collapse repeats, reject ambiguous counties.
pub fn prepare_crosswalk(
    entries: Vec<CrosswalkEntry>,
    options: &PanelOptions,
) -> Result<PreparedCrosswalk, PanelError> {
    let sentinel_name = canonical_key(&options.crosswalk_sentinel);
    let sentinel_code = options.crosswalk_sentinel.parse::<MsaCode>().ok();
    let mut report = CrosswalkReport {
        input_entries: entries.len(),
        ..CrosswalkReport::default()
    };

    let mut by_county: BTreeMap<String, (MsaId, CrosswalkEntry)> = BTreeMap::new();
    for entry in entries {
        let is_sentinel = entry.msa_key == sentinel_name
            || (sentinel_code.is_some() && entry.msa_fips == sentinel_code);
        if is_sentinel {
            report.sentinel_entries += 1;
            continue;
        }
        let county = entry.county_join_key(options.county_scheme).map(str::to_string);
        let msa = MsaId::for_scheme(options.msa_scheme, &entry.msa_key, entry.msa_fips);
        let (Some(county), Some(msa)) = (county.filter(|c| !c.is_empty()), msa) else {
            report.unkeyed_entries += 1;
            continue;
        };
        match by_county.get(&county) {
            Some((existing, _)) if *existing == msa => report.duplicate_entries += 1,
            Some((existing, _)) => {
                let mut msa_keys = vec![existing.to_string(), msa.to_string()];
                msa_keys.sort();
                return Err(PanelError::AmbiguousCrosswalk {
                    county_key: county,
                    msa_keys,
                });
            }
            None => {
                by_county.insert(county, (msa, entry));
            }
        }
    }

    if report.sentinel_entries > 0 || report.unkeyed_entries > 0 {
        warn!(
            "[msa_panel:panel] crosswalk excluded {} sentinel and {} unkeyed entries",
            report.sentinel_entries, report.unkeyed_entries
        );
    }

    let entries: Vec<CrosswalkEntry> = by_county.into_values().map(|(_, entry)| entry).collect();
    report.kept_entries = entries.len();
    Ok(PreparedCrosswalk { entries, report })
}

/// One county-sector value attributed to an MSA.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MsaSectorRecord {
    /// Key under the active MSA scheme.
    pub msa: MsaId,
    /// Normalized MSA name.
    pub msa_key: MsaKey,
    /// CBSA code.
    pub msa_fips: Option<MsaCode>,
    /// Calendar year.
    pub year: Year,
    /// Employment sector.
    pub sector: Sector,
    /// `None` for a missing county cell.
    pub value: Option<f64>,
}

/// Inner join county-sector records to the crosswalk on the county key.
pub fn join_crosswalk(
    records: &[CountySectorRecord],
    crosswalk: &[CrosswalkEntry],
    options: &PanelOptions,
) -> Result<(Vec<MsaSectorRecord>, JoinDiagnostics), PanelError> {
    let right_key = match options.county_scheme {
        CountyKeyScheme::Name => "crosswalk.county_key",
        CountyKeyScheme::Fips => "crosswalk.county_fips",
    };
    let output = keyed_join(
        records,
        crosswalk,
        JoinSpec {
            name: "county_sectors x crosswalk",
            left_key: "county_sectors.county_key",
            right_key,
            kind: JoinKind::Inner,
        },
        |record| Some(record.county_key.clone()),
        |entry| entry.county_join_key(options.county_scheme).map(str::to_string),
    )?;

    let mut joined = Vec::with_capacity(output.pairs.len());
    for (left, right) in output.pairs {
        let Some(left) = left else { continue };
        let record = &records[left];
        let entry = &crosswalk[right];
        let Some(msa) = MsaId::for_scheme(options.msa_scheme, &entry.msa_key, entry.msa_fips) else {
            continue;
        };
        joined.push(MsaSectorRecord {
            msa,
            msa_key: entry.msa_key.clone(),
            msa_fips: entry.msa_fips,
            year: record.year,
            sector: record.sector.clone(),
            value: record.value,
        });
    }
    Ok((joined, output.diagnostics))
}

/// Per-(MSA, year) sector sums.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MsaSectorTotals {
    /// Key under the active MSA scheme.
    pub msa: MsaId,
    /// Smallest name seen for the key.
    pub msa_key: MsaKey,
    /// Smallest code seen for the key.
    pub msa_fips: Option<MsaCode>,
    /// Calendar year.
    pub year: Year,
    /// Sum of present values per sector; a sector with no present value is absent.
    pub sectors: BTreeMap<Sector, f64>,
}

/// Sum present sector values by (MSA, year), sorted by key then year.
///
/// Returns the totals and the number of missing cells left out of the sums.
pub fn aggregate_msa_years(records: &[MsaSectorRecord]) -> (Vec<MsaSectorTotals>, usize) {
    let mut grouped: BTreeMap<(&MsaId, Year), MsaSectorTotals> = BTreeMap::new();
    let mut skipped = 0usize;
    for record in records {
        let totals = grouped
            .entry((&record.msa, record.year))
            .or_insert_with(|| MsaSectorTotals {
                msa: record.msa.clone(),
                msa_key: record.msa_key.clone(),
                msa_fips: record.msa_fips,
                year: record.year,
                sectors: BTreeMap::new(),
            });
        if record.msa_key < totals.msa_key {
            totals.msa_key = record.msa_key.clone();
        }
        totals.msa_fips = match (totals.msa_fips, record.msa_fips) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        match record.value {
            Some(value) => *totals.sectors.entry(record.sector.clone()).or_insert(0.0) += value,
            None => skipped += 1,
        }
    }
    (grouped.into_values().collect(), skipped)
}

/// Coverage and fill counts for one panel build.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelDiagnostics {
    /// County to MSA mapping.
    pub crosswalk: CrosswalkReport,
    /// County records against the crosswalk.
    pub county_join: JoinDiagnostics,
    /// MSA sector totals against unemployment.
    pub unemployment_join: JoinDiagnostics,
    /// Missing county cells left out of the sector sums.
    pub missing_values_skipped: usize,
    /// County-years dropped by [`MissingValuePolicy::DropCounty`].
    pub incomplete_county_years: usize,
    /// Unemployment observations without an identifier under the MSA scheme.
    pub unkeyed_observations: usize,
    /// Right-join rows whose sector fields were zero-filled.
    pub filled_rows: usize,
    /// Inner-join rows dropped because the MSA-year had no unemployment rate.
    pub incomplete_rows: usize,
}

/// Panel rows plus their diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PanelBuild {
    /// One row per (MSA, year), sorted by MSA then year.
    pub rows: Vec<MsaPanelRow>,
    /// Join coverage.
    pub diagnostics: PanelDiagnostics,
}

/// Join sector totals to the annualized unemployment series on (MSA, year).
pub fn join_unemployment(
    totals: &[MsaSectorTotals],
    annual: &[AnnualUnemployment],
    options: &PanelOptions,
) -> Result<(Vec<MsaPanelRow>, JoinDiagnostics, usize, usize), PanelError> {
    let output = keyed_join(
        totals,
        annual,
        JoinSpec {
            name: "msa_sectors x unemployment",
            left_key: "msa_sectors.(msa, year)",
            right_key: "unemployment.(msa, year)",
            kind: match options.unemployment_join {
                UnemploymentJoin::Inner => JoinKind::Inner,
                UnemploymentJoin::Right => JoinKind::Right,
            },
        },
        |row| Some(YearKey(row.msa.clone(), row.year)),
        |row| Some(YearKey(row.msa.clone(), row.year)),
    )?;

    let mut rows = Vec::with_capacity(output.pairs.len());
    let mut filled = 0usize;
    let mut incomplete = 0usize;
    for (left, right) in output.pairs {
        let series = &annual[right];
        match left {
            Some(left) => {
                let sums = &totals[left];
                if options.unemployment_join == UnemploymentJoin::Inner
                    && series.unemployment_rate.is_none()
                {
                    incomplete += 1;
                    continue;
                }
                rows.push(MsaPanelRow::new(
                    sums.msa.clone(),
                    sums.msa_key.clone(),
                    sums.msa_fips.or(series.msa_fips),
                    sums.year,
                    sums.sectors.clone(),
                    series.unemployment_rate,
                    SectorCoverage::Observed,
                ));
            }
            None => {
                filled += 1;
                let sectors = options
                    .sectors
                    .iter()
                    .map(|sector| (sector.clone(), 0.0))
                    .collect();
                rows.push(MsaPanelRow::new(
                    series.msa.clone(),
                    series.msa_key.clone(),
                    series.msa_fips,
                    series.year,
                    sectors,
                    series.unemployment_rate,
                    SectorCoverage::Filled,
                ));
            }
        }
    }

    if filled > 0 {
        warn!(
            "[msa_panel:panel] {} unemployment rows had no sector data and were zero-filled",
            filled
        );
    }
    if incomplete > 0 {
        warn!(
            "[msa_panel:panel] {} MSA-years dropped for missing unemployment rate",
            incomplete
        );
    }

    rows.sort_by(|a, b| a.msa.cmp(&b.msa).then(a.year.cmp(&b.year)));
    Ok((rows, output.diagnostics, filled, incomplete))
}

/// Build the (MSA, year) panel from the three sources.
pub fn build_panel(
    mut sources: PanelSources,
    options: &PanelOptions,
) -> Result<PanelBuild, PanelError> {
    if options.sectors.is_empty() {
        return Err(PanelError::Configuration(
            "panel needs at least one sector".to_string(),
        ));
    }
    sources.normalize_keys(&options.keys);

    let crosswalk = prepare_crosswalk(sources.crosswalk, options)?;

    let wanted: BTreeSet<&Sector> = options.sectors.iter().collect();
    let mut records: Vec<_> = unpivot(&sources.county_sectors)
        .into_iter()
        .filter(|record| wanted.contains(&record.sector))
        .filter(|record| options.years.is_empty() || options.years.contains(&record.year))
        .collect();

    let mut incomplete_county_years = 0usize;
    if options.missing_values == MissingValuePolicy::DropCounty {
        let incomplete: HashSet<(String, Year)> = county_year_rows(&records)?
            .into_iter()
            .filter(|row| {
                options
                    .sectors
                    .iter()
                    .any(|sector| !matches!(row.values.get(sector), Some(Some(_))))
            })
            .map(|row| (row.county_key, row.year))
            .collect();
        incomplete_county_years = incomplete.len();
        records.retain(|record| !incomplete.contains(&(record.county_key.clone(), record.year)));
        if incomplete_county_years > 0 {
            warn!(
                "[msa_panel:panel] dropped {} county-years with missing sector values",
                incomplete_county_years
            );
        }
    }

    let (msa_records, county_join) = join_crosswalk(&records, &crosswalk.entries, options)?;
    let (totals, missing_values_skipped) = aggregate_msa_years(&msa_records);

    let unemployment = restrict_years(sources.unemployment, &options.years);
    let annual = annualize(&unemployment, options.msa_scheme);
    let (rows, unemployment_join, filled_rows, incomplete_rows) =
        join_unemployment(&totals, &annual.rows, options)?;

    info!(
        "[msa_panel:panel] built {} MSA-year rows ({} filled, {} county records matched of {})",
        rows.len(),
        filled_rows,
        county_join.matched_left,
        county_join.left_rows
    );

    Ok(PanelBuild {
        rows,
        diagnostics: PanelDiagnostics {
            crosswalk: crosswalk.report,
            county_join,
            unemployment_join,
            missing_values_skipped,
            incomplete_county_years,
            unkeyed_observations: annual.unkeyed_observations,
            filled_rows,
            incomplete_rows,
        },
    })
}

/// (MSA, year) join key rendered as `msa@year` in diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct YearKey(MsaId, Year);

impl std::fmt::Display for YearKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.0, self.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(county: &str, msa: &str, code: Option<u32>) -> CrosswalkEntry {
        CrosswalkEntry {
            county_key: county.to_string(),
            msa_key: msa.to_string(),
            county_fips: None,
            msa_fips: code.map(MsaCode::new),
        }
    }

    #[test]
    fn prepare_crosswalk_drops_sentinels_and_collapses_repeats() {
        let prepared = prepare_crosswalk(
            vec![
                entry("a", "x", Some(1)),
                entry("a", "x", Some(1)),
                entry("b", "99999", None),
                entry("c", "", Some(99999)),
                entry("d", "", None),
            ],
            &PanelOptions::default(),
        )
        .unwrap();
        assert_eq!(prepared.entries.len(), 1);
        assert_eq!(prepared.report.duplicate_entries, 1);
        assert_eq!(prepared.report.sentinel_entries, 2);
        assert_eq!(prepared.report.unkeyed_entries, 1);
        assert_eq!(prepared.report.input_entries, 5);
    }

    #[test]
    fn prepare_crosswalk_rejects_county_in_two_msas() {
        let err = prepare_crosswalk(
            vec![entry("a", "x", Some(1)), entry("a", "y", Some(2))],
            &PanelOptions::default(),
        )
        .unwrap_err();
        match err {
            PanelError::AmbiguousCrosswalk {
                county_key,
                msa_keys,
            } => {
                assert_eq!(county_key, "a");
                assert_eq!(msa_keys, vec!["name:x", "name:y"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn aggregate_skips_missing_values() {
        let msa = MsaId::Name("x".into());
        let record = |sector: Sector, value: Option<f64>| MsaSectorRecord {
            msa: msa.clone(),
            msa_key: "x".into(),
            msa_fips: None,
            year: 2005,
            sector,
            value,
        };
        let (totals, skipped) = aggregate_msa_years(&[
            record(Sector::Manufacturing, Some(100.0)),
            record(Sector::Manufacturing, Some(200.0)),
            record(Sector::Military, None),
            record(Sector::Military, Some(50.0)),
        ]);
        assert_eq!(skipped, 1);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].sectors.get(&Sector::Manufacturing), Some(&300.0));
        assert_eq!(totals[0].sectors.get(&Sector::Military), Some(&50.0));
    }

    #[test]
    fn join_crosswalk_counts_unmatched_counties() {
        let records = vec![
            CountySectorRecord {
                county_key: "a".into(),
                sector: Sector::Military,
                year: 2005,
                value: Some(1.0),
            },
            CountySectorRecord {
                county_key: "z".into(),
                sector: Sector::Military,
                year: 2005,
                value: Some(1.0),
            },
        ];
        let (joined, diagnostics) = join_crosswalk(
            &records,
            &[entry("a", "x", Some(1)), entry("b", "y", Some(2))],
            &PanelOptions::default(),
        )
        .unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].msa, MsaId::Name("x".into()));
        assert_eq!(diagnostics.left_only, 1);
        assert_eq!(diagnostics.right_only, 1);
        assert_eq!(diagnostics.left_only_sample, vec!["z"]);
    }
}
