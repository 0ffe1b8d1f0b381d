//! MSA unemployment series: annual means and monthly slices.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::{AnnualUnemployment, MsaId, MsaKeyScheme, MsaUnemploymentObservation, Year};
use crate::fips::MsaCode;
use crate::types::MsaKey;

/// Annualized series plus the observations that could not be keyed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnualSeries {
    /// One entry per (MSA, year), sorted by key then year.
    pub rows: Vec<AnnualUnemployment>,
    /// Observations without an identifier under the chosen scheme.
    pub unkeyed_observations: usize,
}

/// Average monthly observations into one rate per (MSA, year).
///
/// Months without a rate are skipped. An MSA-year with no rate at all keeps a
/// row with `unemployment_rate: None` so downstream joins can still count it.
pub fn annualize(
    observations: &[MsaUnemploymentObservation],
    scheme: MsaKeyScheme,
) -> AnnualSeries {
    struct Acc<'a> {
        msa_key: &'a MsaKey,
        msa_fips: Option<MsaCode>,
        sum: f64,
        count: usize,
    }

    let mut grouped: BTreeMap<(MsaId, Year), Acc<'_>> = BTreeMap::new();
    let mut unkeyed = 0usize;
    for obs in observations {
        let Some(msa) = MsaId::for_scheme(scheme, &obs.msa_key, obs.msa_fips) else {
            unkeyed += 1;
            continue;
        };
        let acc = grouped.entry((msa, obs.year)).or_insert(Acc {
            msa_key: &obs.msa_key,
            msa_fips: obs.msa_fips,
            sum: 0.0,
            count: 0,
        });
        // Smallest name/code wins so the output does not depend on row order.
        if obs.msa_key < *acc.msa_key {
            acc.msa_key = &obs.msa_key;
        }
        acc.msa_fips = match (acc.msa_fips, obs.msa_fips) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if let Some(rate) = obs.unemployment_rate {
            acc.sum += rate;
            acc.count += 1;
        }
    }

    if unkeyed > 0 {
        warn!(
            "[msa_panel:unemployment] {} observations have no {:?} identifier and were skipped",
            unkeyed, scheme
        );
    }

    let rows = grouped
        .into_iter()
        .map(|((msa, year), acc)| AnnualUnemployment {
            msa,
            msa_key: acc.msa_key.clone(),
            msa_fips: acc.msa_fips,
            year,
            unemployment_rate: (acc.count > 0).then(|| acc.sum / acc.count as f64),
            observations: acc.count,
        })
        .collect();

    AnnualSeries {
        rows,
        unkeyed_observations: unkeyed,
    }
}

/// Keep observations whose year is in `years` (all of them when `years` is empty).
pub fn restrict_years(
    observations: Vec<MsaUnemploymentObservation>,
    years: &[Year],
) -> Vec<MsaUnemploymentObservation> {
    if years.is_empty() {
        return observations;
    }
    observations
        .into_iter()
        .filter(|obs| years.contains(&obs.year))
        .collect()
}

/// One monthly observation with its first-of-month date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyObservation {
    /// Normalized MSA name.
    pub msa_key: MsaKey,
    /// CBSA code.
    pub msa_fips: Option<MsaCode>,
    /// First day of the observation month.
    pub date: NaiveDate,
    /// Percent, 0-100.
    pub unemployment_rate: Option<f64>,
}

/// Monthly observations of one year, sorted by date then MSA.
///
/// Observations without a month (annual rows) are not part of a monthly series.
pub fn monthly_series(
    observations: &[MsaUnemploymentObservation],
    year: Year,
) -> Vec<MonthlyObservation> {
    let mut series: Vec<MonthlyObservation> = observations
        .iter()
        .filter(|obs| obs.year == year)
        .filter_map(|obs| {
            obs.observation_date().map(|date| MonthlyObservation {
                msa_key: obs.msa_key.clone(),
                msa_fips: obs.msa_fips,
                date,
                unemployment_rate: obs.unemployment_rate,
            })
        })
        .collect();
    series.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.msa_key.cmp(&b.msa_key))
            .then_with(|| a.msa_fips.cmp(&b.msa_fips))
    });
    series
}
