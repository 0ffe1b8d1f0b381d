//! End-to-end composition: panel -> cohorts -> (delta | effects + geometry).
//!
//! Each stage takes the previous stage's output as an argument. After cohort
//! assignment the delta branch and the effects/geometry branch only read the
//! labeled panel, so they run side by side on the rayon pool.

use serde::Serialize;
use tracing::info;

use crate::cohort::{LabeledPanel, assign_cohorts};
use crate::config::PipelineConfig;
use crate::data::{CrosswalkEntry, MsaUnemploymentObservation};
use crate::delta::{
    CohortDeltaSummary, CohortMonthlySeries, cohort_delta, cohort_monthly_means,
};
use crate::effects::{
    ClassMonthlyMean, DirectEffectRecord, DirectEffectTotals, EffectJoin, aggregate_direct_effects,
    class_monthly_means, join_monthly,
};
use crate::errors::PanelError;
use crate::geography::{
    GeoJoin, GeoPartition, MsaRecord, MsaValue, StateRecord, join_geometry,
};
use crate::panel::{PanelBuild, PanelDiagnostics, PanelSources, build_panel};
use crate::reshape::WideSectorRow;
use crate::table::{
    ColumnMapping, FeatureTable, RawTable, crosswalk_entries, direct_effect_records, msa_records,
    state_records, unemployment_observations, wide_sector_rows,
};
use crate::unemployment::{MonthlyObservation, monthly_series};

/// Typed pipeline inputs.
///
/// `direct_effects`, `states` and `msas` may be empty; the matching branch is
/// then skipped.
#[derive(Clone, Debug, Default)]
pub struct PipelineInputs {
    /// Wide county-sector rows.
    pub county_sectors: Vec<WideSectorRow>,
    /// County to MSA mapping.
    pub crosswalk: Vec<CrosswalkEntry>,
    /// MSA unemployment observations.
    pub unemployment: Vec<MsaUnemploymentObservation>,
    /// Direct-effect rows; may be empty.
    pub direct_effects: Vec<DirectEffectRecord>,
    /// State boundaries.
    pub states: Vec<StateRecord>,
    /// MSA boundaries.
    pub msas: Vec<MsaRecord>,
}

impl PipelineInputs {
    /// Convert loader tables into typed inputs (no geometry; see
    /// [`PipelineInputs::with_geometry`]).
    pub fn from_tables(
        county_sectors: &RawTable,
        crosswalk: &RawTable,
        unemployment: &RawTable,
        direct_effects: Option<&RawTable>,
        columns: &ColumnMapping,
    ) -> Result<Self, PanelError> {
        Ok(Self {
            county_sectors: wide_sector_rows(county_sectors, &columns.sectors)?,
            crosswalk: crosswalk_entries(crosswalk, &columns.crosswalk)?,
            unemployment: unemployment_observations(unemployment, &columns.unemployment)?,
            direct_effects: match direct_effects {
                Some(table) => direct_effect_records(table, &columns.effects)?,
                None => Vec::new(),
            },
            states: Vec::new(),
            msas: Vec::new(),
        })
    }

    /// Attach state and MSA boundary features, which enables the geometry
    /// branch.
    pub fn with_geometry(
        mut self,
        states: &FeatureTable,
        msas: &FeatureTable,
        columns: &ColumnMapping,
    ) -> Result<Self, PanelError> {
        self.states = state_records(states, &columns.states)?;
        self.msas = msa_records(msas, &columns.msas)?;
        Ok(self)
    }
}

/// Direct-effect branch output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EffectAnalysis {
    /// One entry per MSA code.
    pub totals: DirectEffectTotals,
    /// Base-year monthly series with effects attached.
    pub monthly: EffectJoin,
    /// Mean rate per class and month.
    pub class_means: Vec<ClassMonthlyMean>,
}

/// Everything one pipeline run produces.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    /// Panel build coverage.
    pub panel_diagnostics: PanelDiagnostics,
    /// Cohort-labeled panel.
    pub labeled: LabeledPanel,
    /// Base year against comparison year.
    pub delta: CohortDeltaSummary,
    /// Cohort means of the base year's monthly series.
    pub cohort_monthly: CohortMonthlySeries,
    /// Present when direct effects were supplied.
    pub effects: Option<EffectAnalysis>,
    /// Present when MSA geometry was supplied.
    pub partition: Option<GeoPartition>,
    /// Values joined onto MSA geometry.
    pub geography: Option<GeoJoin>,
}

/// Run every stage for `config`.
pub fn run(inputs: PipelineInputs, config: &PipelineConfig) -> Result<PipelineOutput, PanelError> {
    config.validate()?;
    let PipelineInputs {
        county_sectors,
        crosswalk,
        unemployment,
        direct_effects,
        states,
        msas,
    } = inputs;

    let mut monthly = monthly_series(&unemployment, config.base_year);
    config
        .panel
        .keys
        .unemployment_msa()
        .normalize_in_place(monthly.iter_mut().map(|obs| &mut obs.msa_key));

    let PanelBuild { rows, diagnostics } = build_panel(
        PanelSources {
            county_sectors,
            crosswalk,
            unemployment,
        },
        &config.panel,
    )?;
    let labeled = assign_cohorts(
        rows,
        &config.metric_sector,
        config.base_year,
        config.cohort_policy,
    )?;

    let (delta, spatial) = rayon::join(
        || {
            (
                cohort_delta(&labeled, config.base_year, config.comparison_year),
                cohort_monthly_means(&labeled, &monthly, config.panel.msa_scheme),
            )
        },
        || effects_and_geography(&labeled, &monthly, direct_effects, states, msas, config),
    );
    let (delta, cohort_monthly) = delta;
    let (effects, partition, geography) = spatial?;

    info!(
        "[msa_panel:pipeline] finished: {} labeled rows, {} cohorts, effects={} geometry={}",
        labeled.rows.len(),
        delta.deltas.len(),
        effects.is_some(),
        geography.is_some()
    );

    Ok(PipelineOutput {
        panel_diagnostics: diagnostics,
        labeled,
        delta,
        cohort_monthly,
        effects,
        partition,
        geography,
    })
}

type SpatialOutput = (Option<EffectAnalysis>, Option<GeoPartition>, Option<GeoJoin>);

fn effects_and_geography(
    labeled: &LabeledPanel,
    monthly: &[MonthlyObservation],
    direct_effects: Vec<DirectEffectRecord>,
    states: Vec<StateRecord>,
    msas: Vec<MsaRecord>,
    config: &PipelineConfig,
) -> Result<SpatialOutput, PanelError> {
    let effects = if direct_effects.is_empty() {
        None
    } else {
        let totals = aggregate_direct_effects(&direct_effects);
        let joined = join_monthly(&totals, monthly)?;
        let class_means = class_monthly_means(&joined.rows);
        Some(EffectAnalysis {
            totals,
            monthly: joined,
            class_means,
        })
    };

    if msas.is_empty() {
        return Ok((effects, None, None));
    }
    let partition = GeoPartition::build(states, msas, &config.territory)?;
    let values = match &effects {
        Some(effects) => MsaValue::from_effects(&effects.totals),
        None => MsaValue::from_base_shares(labeled),
    };
    let geography = join_geometry(&values, &partition, &config.fips_remap)?;
    Ok((effects, Some(partition), Some(geography)))
}
