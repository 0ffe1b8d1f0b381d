//! Continental/territory partition of state and MSA geometry, and the join of
//! MSA-level analysis values onto MSA geometry.
//!
//! States are classified by GEOID and postal code. An MSA is a territory MSA
//! when its geometry intersects any territory state (touching boundaries
//! count); every other MSA is continental. Analysis codes are passed through
//! the historical [`FipsRemapTable`] before joining, geometry codes are not.

use std::collections::BTreeMap;

use geo::{Intersects, MultiPolygon};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cohort::LabeledPanel;
use crate::constants::geography::{TERRITORY_GEOID_THRESHOLD, TERRITORY_POSTAL_EXCEPTIONS};
use crate::effects::DirectEffectTotals;
use crate::errors::PanelError;
use crate::fips::{FipsRemapTable, MsaCode};
use crate::join::{JoinDiagnostics, JoinKind, JoinSpec, counted_join};
use crate::types::{PostalCode, SampleKey};

/// Region class of a state or MSA.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionClass {
    /// Contiguous states and their MSAs.
    Continental,
    /// Territories, Alaska and Hawaii, and MSAs touching them.
    Territory,
}

/// Rule that makes a state a territory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerritoryRule {
    /// GEOIDs strictly above this are territories.
    pub geoid_threshold: u32,
    /// Postal codes that are territories whatever their GEOID.
    pub postal_exceptions: Vec<PostalCode>,
}

impl Default for TerritoryRule {
    fn default() -> Self {
        Self {
            geoid_threshold: TERRITORY_GEOID_THRESHOLD,
            postal_exceptions: TERRITORY_POSTAL_EXCEPTIONS
                .iter()
                .map(|postal| postal.to_string())
                .collect(),
        }
    }
}

impl TerritoryRule {
    /// Classify one state.
    pub fn classify(&self, geoid: u32, postal: &str) -> RegionClass {
        let excepted = self
            .postal_exceptions
            .iter()
            .any(|exception| exception.eq_ignore_ascii_case(postal.trim()));
        if geoid > self.geoid_threshold || excepted {
            RegionClass::Territory
        } else {
            RegionClass::Continental
        }
    }
}

/// State boundary record.
#[derive(Clone, Debug, PartialEq)]
pub struct StateRecord {
    /// Numeric state FIPS as text, e.g. `"02"`.
    pub geoid: String,
    /// Two-letter postal code.
    pub postal: PostalCode,
    /// Display name.
    pub name: String,
    /// Boundary shape.
    pub geometry: MultiPolygon<f64>,
}

/// MSA boundary record.
#[derive(Clone, Debug, PartialEq)]
pub struct MsaRecord {
    /// Current CBSA code; never remapped.
    pub cbsa_fips: MsaCode,
    /// Display name.
    pub name: String,
    /// Boundary shape.
    pub geometry: MultiPolygon<f64>,
}

/// A state with its region class.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedState {
    /// The input record.
    pub record: StateRecord,
    /// Parsed GEOID.
    pub geoid: u32,
    /// Continental or territory.
    pub region_class: RegionClass,
}

/// An MSA with its region class and the territory states it touches.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedMsa {
    /// The input record.
    pub record: MsaRecord,
    /// Continental or territory.
    pub region_class: RegionClass,
    /// Postal codes of intersected territory states, sorted.
    pub territory_states: Vec<PostalCode>,
}

/// Classify every state; an unparseable GEOID is an error.
pub fn classify_states(
    states: Vec<StateRecord>,
    rule: &TerritoryRule,
) -> Result<Vec<ClassifiedState>, PanelError> {
    states
        .into_iter()
        .map(|record| {
            let geoid = record
                .geoid
                .trim()
                .parse::<u32>()
                .map_err(|_| PanelError::InvalidIdentifier {
                    kind: "state GEOID",
                    value: record.geoid.clone(),
                })?;
            let region_class = rule.classify(geoid, &record.postal);
            Ok(ClassifiedState {
                record,
                geoid,
                region_class,
            })
        })
        .collect()
}

/// Classify every MSA in one pass against the territory states.
pub fn classify_msas(msas: Vec<MsaRecord>, states: &[ClassifiedState]) -> Vec<ClassifiedMsa> {
    let territories: Vec<&ClassifiedState> = states
        .iter()
        .filter(|state| state.region_class == RegionClass::Territory)
        .collect();
    msas.into_iter()
        .map(|record| {
            let mut territory_states: Vec<PostalCode> = territories
                .iter()
                .filter(|state| record.geometry.intersects(&state.record.geometry))
                .map(|state| state.record.postal.clone())
                .collect();
            territory_states.sort();
            territory_states.dedup();
            let region_class = if territory_states.is_empty() {
                RegionClass::Continental
            } else {
                RegionClass::Territory
            };
            ClassifiedMsa {
                record,
                region_class,
                territory_states,
            }
        })
        .collect()
}

/// Classified states and MSAs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeoPartition {
    /// Every state, in input order.
    pub states: Vec<ClassifiedState>,
    /// Every MSA, in input order.
    pub msas: Vec<ClassifiedMsa>,
}

impl GeoPartition {
    /// Classify states, then MSAs against the territory states.
    pub fn build(
        states: Vec<StateRecord>,
        msas: Vec<MsaRecord>,
        rule: &TerritoryRule,
    ) -> Result<Self, PanelError> {
        let states = classify_states(states, rule)?;
        let msas = classify_msas(msas, &states);
        let partition = Self { states, msas };
        info!(
            "[msa_panel:geo] partitioned {} states ({} territory) and {} MSAs ({} territory)",
            partition.states.len(),
            partition.states_in(RegionClass::Territory).count(),
            partition.msas.len(),
            partition.msas_in(RegionClass::Territory).count()
        );
        Ok(partition)
    }

    /// States of one class, in input order.
    pub fn states_in(&self, class: RegionClass) -> impl Iterator<Item = &ClassifiedState> {
        self.states.iter().filter(move |state| state.region_class == class)
    }

    /// MSAs of one class, in input order.
    pub fn msas_in(&self, class: RegionClass) -> impl Iterator<Item = &ClassifiedMsa> {
        self.msas.iter().filter(move |msa| msa.region_class == class)
    }
}

/// Analysis value of one MSA, keyed by its (possibly historical) code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MsaValue {
    /// Code as the analysis produced it, before remapping.
    pub msa_fips: MsaCode,
    /// Analysis value.
    pub value: f64,
}

impl MsaValue {
    /// Summed direct effect per MSA.
    pub fn from_effects(totals: &DirectEffectTotals) -> Vec<Self> {
        totals
            .totals
            .iter()
            .map(|effect| Self {
                msa_fips: effect.msa_fips,
                value: effect.direct,
            })
            .collect()
    }

    /// Base-year share per labeled MSA that carries a code.
    pub fn from_base_shares(labeled: &LabeledPanel) -> Vec<Self> {
        labeled
            .assignments
            .iter()
            .filter_map(|assignment| {
                assignment.msa_fips.map(|msa_fips| Self {
                    msa_fips,
                    value: assignment.base_share,
                })
            })
            .collect()
    }
}

/// One MSA geometry with its joined analysis value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeoJoinedRecord {
    /// Index into [`GeoPartition::msas`].
    pub msa: usize,
    /// CBSA code of the shape.
    pub cbsa_fips: MsaCode,
    /// Display name.
    pub name: String,
    /// Continental or territory.
    pub region_class: RegionClass,
    /// Territory states the shape touches, sorted.
    pub territory_states: Vec<PostalCode>,
    /// MSA shape, cloned from the partition.
    #[serde(skip)]
    pub geometry: MultiPolygon<f64>,
    /// `None` for outline-only geometry without an analysis row.
    pub value: Option<f64>,
    /// Analysis codes that remapped onto `cbsa_fips`, sorted.
    pub source_codes: Vec<MsaCode>,
}

/// Output of [`join_geometry`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeoJoin {
    /// One record per MSA geometry, in partition order.
    pub records: Vec<GeoJoinedRecord>,
    /// Analysis input rows whose remapped code has no geometry; dropped.
    pub dropped_analysis_rows: usize,
    /// Remapped codes of the dropped rows, sorted.
    pub dropped_sample: Vec<SampleKey>,
    /// Analysis rows folded into another row's code by the remap.
    pub merged_codes: usize,
    /// Remap table version used.
    pub remap_version: String,
    /// Coverage of the join over remapped codes.
    pub diagnostics: JoinDiagnostics,
}

impl GeoJoin {
    /// Records of one region class.
    pub fn in_region(&self, class: RegionClass) -> impl Iterator<Item = &GeoJoinedRecord> {
        self.records.iter().filter(move |record| record.region_class == class)
    }

    /// Continental records.
    pub fn continental(&self) -> impl Iterator<Item = &GeoJoinedRecord> {
        self.in_region(RegionClass::Continental)
    }

    /// Territory records.
    pub fn territory(&self) -> impl Iterator<Item = &GeoJoinedRecord> {
        self.in_region(RegionClass::Territory)
    }

    /// Territory records intersecting the state with `postal`.
    pub fn for_state<'a>(&'a self, postal: &'a str) -> impl Iterator<Item = &'a GeoJoinedRecord> {
        self.territory().filter(move |record| {
            record
                .territory_states
                .iter()
                .any(|state| state.eq_ignore_ascii_case(postal))
        })
    }

    /// Min and max value over all colorable records, so every subset can share
    /// one scale.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.records
            .iter()
            .filter_map(|record| record.value)
            .fold(None, |range, value| match range {
                None => Some((value, value)),
                Some((lo, hi)) => Some((lo.min(value), hi.max(value))),
            })
    }
}

/// Remap analysis codes, then right-join them onto the partition's MSA
/// geometry by CBSA code.
///
/// Values that land on the same code after remapping are summed. Analysis rows
/// without geometry are dropped and counted; geometry without analysis rows is
/// kept with `value: None`. A key mismatch is never fatal: with no match at
/// all every MSA comes back outline-only.
pub fn join_geometry(
    values: &[MsaValue],
    partition: &GeoPartition,
    remap: &FipsRemapTable,
) -> Result<GeoJoin, PanelError> {
    remap.validate()?;

    let mut remapped: BTreeMap<MsaCode, (f64, Vec<MsaCode>)> = BTreeMap::new();
    for value in values {
        let (sum, sources) = remapped
            .entry(remap.apply(value.msa_fips))
            .or_insert((0.0, Vec::new()));
        *sum += value.value;
        sources.push(value.msa_fips);
    }
    let merged_codes = values.len() - remapped.len();
    let remapped: Vec<(MsaCode, f64, Vec<MsaCode>)> = remapped
        .into_iter()
        .map(|(code, (sum, mut sources))| {
            sources.sort();
            (code, sum, sources)
        })
        .collect();

    let joined = counted_join(
        &remapped,
        &partition.msas,
        JoinSpec {
            name: "analysis_to_msa_geometry",
            left_key: "msa_fips (remapped)",
            right_key: "CBSAFP",
            kind: JoinKind::Right,
        },
        |(code, _, _)| Some(*code),
        |msa| Some(msa.record.cbsa_fips),
    );

    let mut matched = vec![false; remapped.len()];
    let records: Vec<GeoJoinedRecord> = joined
        .pairs
        .iter()
        .map(|&(value_idx, msa_idx)| {
            let msa = &partition.msas[msa_idx];
            if let Some(idx) = value_idx {
                matched[idx] = true;
            }
            let analysis = value_idx.map(|idx| &remapped[idx]);
            GeoJoinedRecord {
                msa: msa_idx,
                cbsa_fips: msa.record.cbsa_fips,
                name: msa.record.name.clone(),
                region_class: msa.region_class,
                territory_states: msa.territory_states.clone(),
                geometry: msa.record.geometry.clone(),
                value: analysis.map(|(_, sum, _)| *sum),
                source_codes: analysis
                    .map(|(_, _, sources)| sources.clone())
                    .unwrap_or_default(),
            }
        })
        .collect();

    // Count input rows, not remapped codes: a dropped code may carry several.
    let dropped_analysis_rows: usize = remapped
        .iter()
        .zip(&matched)
        .filter(|(_, matched)| !**matched)
        .map(|((_, _, sources), _)| sources.len())
        .sum();

    let diagnostics = joined.diagnostics;
    if !values.is_empty() && diagnostics.matched_nothing() {
        warn!(
            "[msa_panel:geo] no analysis code matched any MSA geometry (sample: {:?}); every MSA is outline-only",
            diagnostics.left_only_sample
        );
    } else if dropped_analysis_rows > 0 {
        warn!(
            "[msa_panel:geo] dropped {} analysis rows without geometry (sample: {:?})",
            dropped_analysis_rows, diagnostics.left_only_sample
        );
    }
    if merged_codes > 0 {
        warn!(
            "[msa_panel:geo] {} analysis rows merged onto a shared remapped code",
            merged_codes
        );
    }
    info!(
        "[msa_panel:geo] joined {} analysis codes onto {} MSA geometries (remap {})",
        diagnostics.matched_left,
        records.len(),
        remap.version
    );

    Ok(GeoJoin {
        records,
        dropped_analysis_rows,
        dropped_sample: diagnostics.left_only_sample.clone(),
        merged_codes,
        remap_version: remap.version.clone(),
        diagnostics,
    })
}
