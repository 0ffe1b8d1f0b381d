//! Per-cohort change in mean unemployment between two years.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cohort::{CohortLabel, CohortPolicy, LabeledPanel};
use crate::data::{MsaId, MsaKeyScheme, Sector, Year};
use crate::unemployment::MonthlyObservation;

/// Running mean over optional observations.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct MeanAcc {
    sum: f64,
    count: usize,
}

impl MeanAcc {
    pub(crate) fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Mean outcome of one cohort in both periods.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CohortDelta {
    /// Cohort label.
    pub cohort: CohortLabel,
    /// Mean unemployment rate in `year_a`; `None` when the cohort has no rows.
    pub mean_a: Option<f64>,
    /// Mean unemployment rate in `year_b`; `None` when the cohort has no rows.
    pub mean_b: Option<f64>,
    /// `mean_b - mean_a`, undefined unless both means are.
    pub delta: Option<f64>,
    /// Rows averaged in `year_a`.
    pub rows_a: usize,
    /// Rows averaged in `year_b`.
    pub rows_b: usize,
}

/// Delta table keyed by cohort label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CohortDeltaSummary {
    /// Sector the cohorts were built from.
    pub sector: Sector,
    /// Cohort policy.
    pub policy: CohortPolicy,
    /// Year the labels come from.
    pub base_year: Year,
    /// Earlier period.
    pub year_a: Year,
    /// Later period.
    pub year_b: Year,
    /// Every label of the policy, in label order, including undefined ones.
    pub deltas: Vec<CohortDelta>,
    /// Rows in either period skipped for a missing unemployment rate.
    pub missing_outcome_rows: usize,
}

impl CohortDeltaSummary {
    /// Entry for `cohort`.
    pub fn get(&self, cohort: CohortLabel) -> Option<&CohortDelta> {
        self.deltas.iter().find(|delta| delta.cohort == cohort)
    }

    /// Labels whose delta is undefined.
    pub fn undefined(&self) -> Vec<CohortLabel> {
        self.deltas
            .iter()
            .filter(|delta| delta.delta.is_none())
            .map(|delta| delta.cohort)
            .collect()
    }
}

/// Group the labeled rows of `year_a` and `year_b` by cohort, average the
/// unemployment rate in each group and subtract the periods label by label.
///
/// The labeled panel fixes the share category (`labeled.sector`) and the
/// cohort field (its policy's labels), so neither is passed here.
pub fn cohort_delta(labeled: &LabeledPanel, year_a: Year, year_b: Year) -> CohortDeltaSummary {
    let mut period_a: BTreeMap<CohortLabel, MeanAcc> = BTreeMap::new();
    let mut period_b: BTreeMap<CohortLabel, MeanAcc> = BTreeMap::new();
    let mut missing_outcome_rows = 0usize;

    for labeled_row in &labeled.rows {
        let year = labeled_row.row.year;
        let period = if year == year_a {
            &mut period_a
        } else if year == year_b {
            &mut period_b
        } else {
            continue;
        };
        match labeled_row.row.unemployment_rate {
            Some(rate) => period.entry(labeled_row.cohort).or_default().push(rate),
            None => missing_outcome_rows += 1,
        }
    }

    let deltas: Vec<CohortDelta> = labeled
        .policy
        .labels()
        .iter()
        .map(|&cohort| {
            let a = period_a.get(&cohort).copied().unwrap_or_default();
            let b = period_b.get(&cohort).copied().unwrap_or_default();
            let (mean_a, mean_b) = (a.mean(), b.mean());
            CohortDelta {
                cohort,
                mean_a,
                mean_b,
                delta: mean_a.zip(mean_b).map(|(a, b)| b - a),
                rows_a: a.count(),
                rows_b: b.count(),
            }
        })
        .collect();

    let undefined: Vec<String> = deltas
        .iter()
        .filter(|delta| delta.delta.is_none())
        .map(|delta| delta.cohort.to_string())
        .collect();
    if !undefined.is_empty() {
        warn!(
            "[msa_panel:delta] cohorts without rows in {} or {}: {}",
            year_a,
            year_b,
            undefined.join(", ")
        );
    }
    info!(
        "[msa_panel:delta] {} -> {} deltas over {} cohorts",
        year_a,
        year_b,
        deltas.len()
    );

    CohortDeltaSummary {
        sector: labeled.sector.clone(),
        policy: labeled.policy,
        base_year: labeled.base_year,
        year_a,
        year_b,
        deltas,
        missing_outcome_rows,
    }
}

/// Mean monthly unemployment of one cohort.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CohortMonthlyMean {
    /// Cohort label.
    pub cohort: CohortLabel,
    /// First day of the month.
    pub date: NaiveDate,
    /// `None` when no observation of the group had a rate.
    pub mean_rate: Option<f64>,
    /// Observations in the group, with or without a rate.
    pub observations: usize,
}

/// Cohort monthly series plus the observations that had no cohort.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortMonthlySeries {
    /// Sorted by cohort then date.
    pub points: Vec<CohortMonthlyMean>,
    /// Observations whose MSA has no cohort.
    pub unlabeled_observations: usize,
}

/// Average a monthly series within each cohort.
///
/// `scheme` must be the one the panel was keyed with so the monthly rows find
/// their MSA's label.
pub fn cohort_monthly_means(
    labeled: &LabeledPanel,
    monthly: &[MonthlyObservation],
    scheme: MsaKeyScheme,
) -> CohortMonthlySeries {
    let labels = labeled.label_map();
    let mut grouped: BTreeMap<(CohortLabel, NaiveDate), MeanAcc> = BTreeMap::new();
    let mut present: BTreeMap<(CohortLabel, NaiveDate), usize> = BTreeMap::new();
    let mut unlabeled = 0usize;

    for obs in monthly {
        let cohort = MsaId::for_scheme(scheme, &obs.msa_key, obs.msa_fips)
            .and_then(|msa| labels.get(&msa).copied());
        let Some(cohort) = cohort else {
            unlabeled += 1;
            continue;
        };
        *present.entry((cohort, obs.date)).or_default() += 1;
        let acc = grouped.entry((cohort, obs.date)).or_default();
        if let Some(rate) = obs.unemployment_rate {
            acc.push(rate);
        }
    }

    let points = present
        .into_iter()
        .map(|((cohort, date), observations)| CohortMonthlyMean {
            cohort,
            date,
            mean_rate: grouped.get(&(cohort, date)).and_then(MeanAcc::mean),
            observations,
        })
        .collect();

    CohortMonthlySeries {
        points,
        unlabeled_observations: unlabeled,
    }
}
