//! Direct policy effects per MSA and their monthly unemployment profile.
//!
//! Direct-effect records carry a signed job change attributed to an MSA code.
//! They are summed per MSA, right-joined onto a monthly unemployment series
//! (MSAs without an effect get `0`) and classed as net gain, net loss or no
//! change.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::MsaKey;
use crate::delta::MeanAcc;
use crate::errors::PanelError;
use crate::fips::MsaCode;
use crate::join::{JoinDiagnostics, JoinKind, JoinSpec, keyed_join};
use crate::unemployment::MonthlyObservation;

/// One loader row of the direct-effect table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirectEffectRecord {
    /// MSA code; rows without one are dropped.
    pub msa_fips: Option<MsaCode>,
    /// Net direct employment effect.
    pub direct: Option<f64>,
}

/// Summed direct effect of one MSA.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MsaDirectEffect {
    /// MSA code; rows without one are dropped.
    pub msa_fips: MsaCode,
    /// Net direct effect.
    pub direct: f64,
}

/// Per-MSA sums, sorted by code.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectEffectTotals {
    /// One entry per MSA code.
    pub totals: Vec<MsaDirectEffect>,
    /// Records dropped for lacking an MSA code.
    pub missing_code_rows: usize,
    /// Records with a code but no value; they add nothing to the sum.
    pub missing_value_rows: usize,
}

/// Sum `direct` per MSA code.
///
/// An MSA whose records all lack a value still appears, with a sum of `0`.
pub fn aggregate_direct_effects(records: &[DirectEffectRecord]) -> DirectEffectTotals {
    let mut sums: BTreeMap<MsaCode, f64> = BTreeMap::new();
    let mut missing_code_rows = 0usize;
    let mut missing_value_rows = 0usize;
    for record in records {
        let Some(code) = record.msa_fips else {
            missing_code_rows += 1;
            continue;
        };
        let sum = sums.entry(code).or_insert(0.0);
        match record.direct {
            Some(direct) => *sum += direct,
            None => missing_value_rows += 1,
        }
    }
    if missing_code_rows > 0 {
        warn!(
            "[msa_panel:effects] dropped {} direct-effect records without an MSA code",
            missing_code_rows
        );
    }
    DirectEffectTotals {
        totals: sums
            .into_iter()
            .map(|(msa_fips, direct)| MsaDirectEffect { msa_fips, direct })
            .collect(),
        missing_code_rows,
        missing_value_rows,
    }
}

/// Sign class of an MSA's summed direct effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectClass {
    /// Positive sum.
    NetGain,
    /// Negative sum.
    NetLoss,
    /// Zero sum, including MSAs without any record.
    NoChange,
}

impl EffectClass {
    /// Class of a summed effect.
    pub fn of(direct: f64) -> Self {
        if direct > 0.0 {
            EffectClass::NetGain
        } else if direct < 0.0 {
            EffectClass::NetLoss
        } else {
            EffectClass::NoChange
        }
    }
}

impl fmt::Display for EffectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EffectClass::NetGain => "net gains",
            EffectClass::NetLoss => "net losses",
            EffectClass::NoChange => "no gains or losses",
        })
    }
}

/// Monthly observation with its MSA's direct effect attached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyEffectRow {
    /// Normalized MSA name.
    pub msa_key: MsaKey,
    /// MSA code; rows without one are dropped.
    pub msa_fips: Option<MsaCode>,
    /// First day of the month.
    pub date: NaiveDate,
    /// Percent, 0-100.
    pub unemployment_rate: Option<f64>,
    /// Summed direct effect of the MSA, or `0` when filled.
    pub direct: f64,
    /// True when no direct-effect total matched and `direct` was set to `0`.
    pub filled: bool,
}

impl MonthlyEffectRow {
    /// Sign class of `direct`.
    pub fn class(&self) -> EffectClass {
        EffectClass::of(self.direct)
    }
}

/// Output of [`join_monthly`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectJoin {
    /// One row per monthly observation, in input order.
    pub rows: Vec<MonthlyEffectRow>,
    /// Join coverage.
    pub diagnostics: JoinDiagnostics,
    /// Rows whose `direct` was zero-filled.
    pub filled_rows: usize,
}

/// Right-join effect totals onto a monthly series by MSA code.
///
/// Every monthly observation is kept; those without a matching total get
/// `direct = 0` and are counted.
pub fn join_monthly(
    totals: &DirectEffectTotals,
    monthly: &[MonthlyObservation],
) -> Result<EffectJoin, PanelError> {
    let joined = keyed_join(
        &totals.totals,
        monthly,
        JoinSpec {
            name: "direct_effects_to_unemployment",
            left_key: "msa_fips",
            right_key: "area fips code",
            kind: JoinKind::Right,
        },
        |effect| Some(effect.msa_fips),
        |obs| obs.msa_fips,
    )?;

    let mut filled_rows = 0usize;
    let rows: Vec<MonthlyEffectRow> = joined
        .pairs
        .iter()
        .map(|&(effect_idx, obs_idx)| {
            let obs = &monthly[obs_idx];
            let direct = effect_idx.map(|idx| totals.totals[idx].direct);
            if direct.is_none() {
                filled_rows += 1;
            }
            MonthlyEffectRow {
                msa_key: obs.msa_key.clone(),
                msa_fips: obs.msa_fips,
                date: obs.date,
                unemployment_rate: obs.unemployment_rate,
                direct: direct.unwrap_or(0.0),
                filled: direct.is_none(),
            }
        })
        .collect();

    info!(
        "[msa_panel:effects] attached direct effects to {} monthly rows ({} zero-filled)",
        rows.len(),
        filled_rows
    );

    Ok(EffectJoin {
        rows,
        diagnostics: joined.diagnostics,
        filled_rows,
    })
}

/// Mean unemployment of one effect class in one month.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassMonthlyMean {
    /// Sign class of the direct effect.
    pub class: EffectClass,
    /// First day of the month.
    pub date: NaiveDate,
    /// `None` when no row of the group had a rate.
    pub mean_rate: Option<f64>,
    /// Rows in the group.
    pub observations: usize,
}

/// Mean unemployment per effect class per month, sorted by class then date.
pub fn class_monthly_means(rows: &[MonthlyEffectRow]) -> Vec<ClassMonthlyMean> {
    let mut grouped: BTreeMap<(EffectClass, NaiveDate), (MeanAcc, usize)> = BTreeMap::new();
    for row in rows {
        let (acc, observations) = grouped.entry((row.class(), row.date)).or_default();
        *observations += 1;
        if let Some(rate) = row.unemployment_rate {
            acc.push(rate);
        }
    }
    grouped
        .into_iter()
        .map(|((class, date), (acc, observations))| ClassMonthlyMean {
            class,
            date,
            mean_rate: acc.mean(),
            observations,
        })
        .collect()
}
