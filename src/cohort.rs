//! Base-year cohort assignment.
//!
//! Cutoffs come from the base year's share distribution only; each MSA's
//! base-year label is then joined back onto every year of that MSA, so a
//! label is an MSA-level attribute.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::cohort::{QUARTILE_PERCENTILES, TERTILE_PERCENTILES};
use crate::data::{MsaId, MsaPanelRow, Sector, SectorCoverage, Year};
use crate::errors::PanelError;
use crate::fips::MsaCode;
use crate::types::MsaKey;

/// How base-year shares are bucketed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CohortPolicy {
    /// `Q1..Q4` at the 25th/50th/75th percentiles of all defined shares.
    ///
    /// Rows with an undefined share (`total = 0`, or zero-filled by a right
    /// join) are excluded from the percentiles and from the output.
    #[default]
    Quartile,
    /// `Zero` for shares of exactly zero, `Lowest/Middle/Top` tertiles over the
    /// non-zero shares.
    ///
    /// Zero-filled right-join rows count as an explicit zero share. Observed
    /// rows with `total = 0` stay undefined and are excluded, separately from
    /// the `Zero` bucket.
    QuantileWithZero,
}

impl CohortPolicy {
    /// Labels of this policy in ascending order.
    pub fn labels(self) -> &'static [CohortLabel] {
        match self {
            CohortPolicy::Quartile => &[
                CohortLabel::Q1,
                CohortLabel::Q2,
                CohortLabel::Q3,
                CohortLabel::Q4,
            ],
            CohortPolicy::QuantileWithZero => &[
                CohortLabel::Zero,
                CohortLabel::Lowest,
                CohortLabel::Middle,
                CohortLabel::Top,
            ],
        }
    }

    /// Percentiles (0-100) that split the distribution.
    pub fn percentiles(self) -> &'static [f64] {
        match self {
            CohortPolicy::Quartile => &QUARTILE_PERCENTILES,
            CohortPolicy::QuantileWithZero => &TERTILE_PERCENTILES,
        }
    }
}

/// Cohort label of an MSA.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CohortLabel {
    /// Share at or below the 25th percentile.
    Q1,
    /// Above the 25th, at or below the 50th percentile.
    Q2,
    /// Above the 50th, at or below the 75th percentile.
    Q3,
    /// Above the 75th percentile.
    Q4,
    /// Share of exactly zero.
    Zero,
    /// Lowest tertile of non-zero shares.
    Lowest,
    /// Middle tertile of non-zero shares.
    Middle,
    /// Top tertile of non-zero shares.
    Top,
}

impl fmt::Display for CohortLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CohortLabel::Q1 => "Q1",
            CohortLabel::Q2 => "Q2",
            CohortLabel::Q3 => "Q3",
            CohortLabel::Q4 => "Q4",
            CohortLabel::Zero => "Zero",
            CohortLabel::Lowest => "Lowest",
            CohortLabel::Middle => "Middle",
            CohortLabel::Top => "Top",
        };
        f.write_str(name)
    }
}

/// Linear-interpolation percentile of an ascending slice (`pct` in 0-100).
///
/// Interpolates between the two order statistics around rank
/// `pct / 100 * (n - 1)`. Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Cutoff values computed from the base year.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CohortCutoffs {
    /// Policy the cutoffs belong to.
    pub policy: CohortPolicy,
    /// Percentiles the cutoffs were taken at.
    pub percentiles: Vec<f64>,
    /// Cutoff values, ascending. Empty when the quantile-with-zero policy saw
    /// no non-zero share.
    pub values: Vec<f64>,
    /// Number of shares the cutoffs were computed over.
    pub sample_size: usize,
}

impl CohortCutoffs {
    /// Compute cutoffs over `shares` (the base-year distribution).
    pub fn compute(policy: CohortPolicy, shares: &[f64]) -> Self {
        let mut sorted: Vec<f64> = match policy {
            CohortPolicy::Quartile => shares.to_vec(),
            CohortPolicy::QuantileWithZero => {
                shares.iter().copied().filter(|share| *share != 0.0).collect()
            }
        };
        sorted.sort_by(f64::total_cmp);
        let values = policy
            .percentiles()
            .iter()
            .filter_map(|pct| percentile(&sorted, *pct))
            .collect();
        Self {
            policy,
            percentiles: policy.percentiles().to_vec(),
            values,
            sample_size: sorted.len(),
        }
    }

    /// Bucket one share; upper edges are inclusive.
    pub fn bucket(&self, share: f64) -> CohortLabel {
        let labels = self.policy.labels();
        match self.policy {
            CohortPolicy::Quartile => {
                let idx = self
                    .values
                    .iter()
                    .position(|cutoff| share <= *cutoff)
                    .unwrap_or(self.values.len());
                labels[idx.min(labels.len() - 1)]
            }
            CohortPolicy::QuantileWithZero => {
                if share == 0.0 {
                    return CohortLabel::Zero;
                }
                let idx = self
                    .values
                    .iter()
                    .position(|cutoff| share <= *cutoff)
                    .unwrap_or(self.values.len());
                labels[(idx + 1).min(labels.len() - 1)]
            }
        }
    }
}

/// Base-year label of one MSA.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CohortAssignment {
    /// Key of the labeled MSA.
    pub msa: MsaId,
    /// Normalized MSA name.
    pub msa_key: MsaKey,
    /// CBSA code, when the source carried one.
    pub msa_fips: Option<MsaCode>,
    /// Base-year share the label was derived from.
    pub base_share: f64,
    /// Label derived from `base_share`.
    pub cohort: CohortLabel,
}

/// A panel row with its share and its MSA's cohort.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LabeledRow {
    /// The underlying panel row.
    pub row: MsaPanelRow,
    /// This year's share of the labeled sector.
    pub share: f64,
    /// Base-year label of the row's MSA.
    pub cohort: CohortLabel,
}

/// Rows and MSAs left out of labeling, by reason.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortExclusions {
    /// Rows of any year whose share was undefined (`total = 0`, or zero-filled
    /// under the quartile policy). Never defaulted to zero.
    pub undefined_share_rows: usize,
    /// MSAs excluded for an undefined base-year share, sorted.
    pub undefined_share_msas: Vec<String>,
    /// Base-year rows labeled `Zero` because the right join zero-filled them.
    pub filled_zero_rows: usize,
    /// Rows dropped because their MSA has no base-year label (absent from the
    /// base year or excluded above).
    pub unlabeled_rows: usize,
}

/// Output of [`assign_cohorts`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LabeledPanel {
    /// Sector the share metric is computed for.
    pub sector: Sector,
    /// Year the cutoffs were computed in.
    pub base_year: Year,
    /// Bucketing policy.
    pub policy: CohortPolicy,
    /// Cutoffs from the base year.
    pub cutoffs: CohortCutoffs,
    /// One entry per labeled MSA, sorted by MSA.
    pub assignments: Vec<CohortAssignment>,
    /// Panel rows of labeled MSAs, in panel order.
    pub rows: Vec<LabeledRow>,
    /// What labeling left out, and why.
    pub exclusions: CohortExclusions,
}

impl LabeledPanel {
    /// Label assigned to `msa`, if any.
    pub fn cohort_of(&self, msa: &MsaId) -> Option<CohortLabel> {
        self.assignments
            .binary_search_by(|assignment| assignment.msa.cmp(msa))
            .ok()
            .map(|idx| self.assignments[idx].cohort)
    }

    /// MSA -> label lookup.
    pub fn label_map(&self) -> BTreeMap<&MsaId, CohortLabel> {
        self.assignments
            .iter()
            .map(|assignment| (&assignment.msa, assignment.cohort))
            .collect()
    }
}

/// Share of `row` under `policy`, and whether it comes from a zero fill.
fn policy_share(row: &MsaPanelRow, sector: &Sector, policy: CohortPolicy) -> (Option<f64>, bool) {
    match (policy, row.coverage) {
        (CohortPolicy::QuantileWithZero, SectorCoverage::Filled) => (Some(0.0), true),
        _ => (row.share(sector), false),
    }
}

/// Label every MSA from its `base_year` share of `metric_sector` and carry the
/// label onto all of its rows.
///
/// Takes the panel by value and extends its rows in place. Identical input
/// always yields identical cutoffs and labels.
pub fn assign_cohorts(
    panel: Vec<MsaPanelRow>,
    metric_sector: &Sector,
    base_year: Year,
    policy: CohortPolicy,
) -> Result<LabeledPanel, PanelError> {
    let mut exclusions = CohortExclusions::default();
    let mut base: Vec<(&MsaPanelRow, f64)> = Vec::new();
    for row in panel.iter().filter(|row| row.year == base_year) {
        match policy_share(row, metric_sector, policy) {
            (Some(share), filled) => {
                if filled {
                    exclusions.filled_zero_rows += 1;
                }
                base.push((row, share));
            }
            (None, _) => {
                exclusions.undefined_share_rows += 1;
                exclusions.undefined_share_msas.push(row.msa.to_string());
            }
        }
    }
    exclusions.undefined_share_msas.sort();
    exclusions.undefined_share_msas.dedup();

    if base.is_empty() {
        return Err(PanelError::EmptyDistribution {
            sector: metric_sector.to_string(),
            year: base_year,
        });
    }
    if exclusions.undefined_share_rows > 0 {
        warn!(
            "[msa_panel:cohort] {} base-year rows have an undefined {} share and were excluded",
            exclusions.undefined_share_rows, metric_sector
        );
    }

    let shares: Vec<f64> = base.iter().map(|(_, share)| *share).collect();
    let cutoffs = CohortCutoffs::compute(policy, &shares);

    let mut assignments: Vec<CohortAssignment> = base
        .iter()
        .map(|(row, share)| CohortAssignment {
            msa: row.msa.clone(),
            msa_key: row.msa_key.clone(),
            msa_fips: row.msa_fips,
            base_share: *share,
            cohort: cutoffs.bucket(*share),
        })
        .collect();
    assignments.sort_by(|a, b| a.msa.cmp(&b.msa));

    let labels: BTreeMap<MsaId, CohortLabel> = assignments
        .iter()
        .map(|assignment| (assignment.msa.clone(), assignment.cohort))
        .collect();

    let mut rows = Vec::with_capacity(panel.len());
    let mut undefined_later = 0usize;
    for row in panel {
        let Some(&cohort) = labels.get(&row.msa) else {
            exclusions.unlabeled_rows += 1;
            continue;
        };
        // A labeled MSA can still have an undefined share in another year.
        let (Some(share), _) = policy_share(&row, metric_sector, policy) else {
            undefined_later += 1;
            continue;
        };
        rows.push(LabeledRow { row, share, cohort });
    }
    if undefined_later > 0 {
        warn!(
            "[msa_panel:cohort] {} non-base-year rows of labeled MSAs have an undefined {} share and were excluded",
            undefined_later, metric_sector
        );
        exclusions.undefined_share_rows += undefined_later;
    }

    info!(
        "[msa_panel:cohort] labeled {} MSAs ({} rows) by {} {} share, cutoffs {:?}",
        assignments.len(),
        rows.len(),
        base_year,
        metric_sector,
        cutoffs.values
    );

    Ok(LabeledPanel {
        sector: metric_sector.clone(),
        base_year,
        policy,
        cutoffs,
        assignments,
        rows,
        exclusions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(msa: &str, year: Year, military: f64, manufacturing: f64) -> MsaPanelRow {
        MsaPanelRow::new(
            MsaId::Name(msa.to_string()),
            msa.to_string(),
            None,
            year,
            [
                (Sector::Manufacturing, manufacturing),
                (Sector::Military, military),
            ]
            .into_iter()
            .collect(),
            Some(5.0),
            SectorCoverage::Observed,
        )
    }

    fn filled(msa: &str, year: Year) -> MsaPanelRow {
        MsaPanelRow::new(
            MsaId::Name(msa.to_string()),
            msa.to_string(),
            None,
            year,
            [(Sector::Manufacturing, 0.0), (Sector::Military, 0.0)]
                .into_iter()
                .collect(),
            Some(5.0),
            SectorCoverage::Filled,
        )
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 25.0), Some(1.75));
        assert_eq!(percentile(&sorted, 50.0), Some(2.5));
        assert_eq!(percentile(&sorted, 75.0), Some(3.25));
        assert_eq!(percentile(&sorted, 0.0), Some(1.0));
        assert_eq!(percentile(&sorted, 100.0), Some(4.0));
        assert_eq!(percentile(&[7.0], 33.33), Some(7.0));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn quartile_buckets_are_upper_inclusive() {
        let cutoffs = CohortCutoffs::compute(CohortPolicy::Quartile, &[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(cutoffs.values, vec![1.75, 2.5, 3.25]);
        assert_eq!(cutoffs.bucket(1.75), CohortLabel::Q1);
        assert_eq!(cutoffs.bucket(1.76), CohortLabel::Q2);
        assert_eq!(cutoffs.bucket(2.5), CohortLabel::Q2);
        assert_eq!(cutoffs.bucket(3.25), CohortLabel::Q3);
        assert_eq!(cutoffs.bucket(4.0), CohortLabel::Q4);
        assert_eq!(cutoffs.bucket(100.0), CohortLabel::Q4);
    }

    #[test]
    fn ties_at_the_maximum_land_in_the_top_bucket_or_cutoff() {
        let cutoffs = CohortCutoffs::compute(CohortPolicy::Quartile, &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(cutoffs.values, vec![1.0, 1.0, 1.0]);
        assert_eq!(cutoffs.bucket(1.0), CohortLabel::Q1);
    }

    #[test]
    fn quantile_with_zero_uses_nonzero_subset() {
        let cutoffs =
            CohortCutoffs::compute(CohortPolicy::QuantileWithZero, &[0.0, 0.0, 0.1, 0.2, 0.3, 0.4]);
        assert_eq!(cutoffs.sample_size, 4);
        assert_eq!(cutoffs.bucket(0.0), CohortLabel::Zero);
        assert_eq!(cutoffs.bucket(0.1), CohortLabel::Lowest);
        assert_eq!(cutoffs.bucket(0.25), CohortLabel::Middle);
        assert_eq!(cutoffs.bucket(0.4), CohortLabel::Top);
    }

    #[test]
    fn labels_propagate_to_every_year() {
        let panel = vec![
            row("a", 2005, 10.0, 90.0),
            row("a", 2006, 80.0, 20.0),
            row("b", 2005, 20.0, 80.0),
            row("b", 2006, 0.0, 100.0),
            row("c", 2005, 30.0, 70.0),
            row("d", 2005, 40.0, 60.0),
            row("e", 2006, 50.0, 50.0),
        ];
        let labeled =
            assign_cohorts(panel, &Sector::Military, 2005, CohortPolicy::Quartile).unwrap();
        assert_eq!(labeled.assignments.len(), 4);
        assert_eq!(labeled.cohort_of(&MsaId::Name("a".into())), Some(CohortLabel::Q1));
        assert_eq!(labeled.cohort_of(&MsaId::Name("d".into())), Some(CohortLabel::Q4));
        assert_eq!(labeled.exclusions.unlabeled_rows, 1);

        let a_rows: Vec<_> = labeled
            .rows
            .iter()
            .filter(|r| r.row.msa == MsaId::Name("a".into()))
            .collect();
        assert_eq!(a_rows.len(), 2);
        assert!(a_rows.iter().all(|r| r.cohort == CohortLabel::Q1));
        assert!((a_rows[1].share - 0.8).abs() < 1e-12);
    }

    #[test]
    fn quartile_policy_excludes_zero_total_msas() {
        let panel = vec![
            row("a", 2005, 10.0, 90.0),
            row("b", 2005, 0.0, 0.0),
            row("b", 2006, 5.0, 5.0),
            filled("c", 2005),
        ];
        let labeled =
            assign_cohorts(panel, &Sector::Military, 2005, CohortPolicy::Quartile).unwrap();
        assert_eq!(labeled.cutoffs.sample_size, 1);
        assert_eq!(labeled.exclusions.undefined_share_rows, 2);
        assert_eq!(labeled.exclusions.undefined_share_msas, vec!["name:b", "name:c"]);
        assert_eq!(labeled.exclusions.unlabeled_rows, 3);
        assert_eq!(labeled.rows.len(), 1);
    }

    #[test]
    fn zero_total_in_a_later_year_is_excluded_from_labeled_rows() {
        let mut a_2006 = row("a", 2006, 0.0, 0.0);
        a_2006.unemployment_rate = Some(50.0);
        let panel = vec![
            row("a", 2005, 10.0, 90.0),
            a_2006,
            row("b", 2005, 20.0, 80.0),
            row("b", 2006, 20.0, 80.0),
        ];
        let labeled =
            assign_cohorts(panel, &Sector::Military, 2005, CohortPolicy::Quartile).unwrap();
        assert_eq!(labeled.cohort_of(&MsaId::Name("a".into())), Some(CohortLabel::Q1));
        assert_eq!(labeled.exclusions.undefined_share_rows, 1);
        assert!(labeled.exclusions.undefined_share_msas.is_empty());
        assert_eq!(labeled.rows.len(), 3);
        assert!(
            labeled
                .rows
                .iter()
                .all(|r| !(r.row.year == 2006 && r.row.msa == MsaId::Name("a".into())))
        );
    }

    #[test]
    fn quantile_with_zero_keeps_fill_and_zero_total_apart() {
        let panel = vec![
            row("a", 2005, 0.0, 90.0),
            row("b", 2005, 0.0, 0.0),
            filled("c", 2005),
            row("d", 2005, 10.0, 90.0),
            row("e", 2005, 20.0, 80.0),
            row("f", 2005, 30.0, 70.0),
        ];
        let labeled =
            assign_cohorts(panel, &Sector::Military, 2005, CohortPolicy::QuantileWithZero).unwrap();
        assert_eq!(labeled.cohort_of(&MsaId::Name("a".into())), Some(CohortLabel::Zero));
        assert_eq!(labeled.cohort_of(&MsaId::Name("c".into())), Some(CohortLabel::Zero));
        assert_eq!(labeled.cohort_of(&MsaId::Name("b".into())), None);
        assert_eq!(labeled.cohort_of(&MsaId::Name("d".into())), Some(CohortLabel::Lowest));
        assert_eq!(labeled.cohort_of(&MsaId::Name("e".into())), Some(CohortLabel::Middle));
        assert_eq!(labeled.cohort_of(&MsaId::Name("f".into())), Some(CohortLabel::Top));
        assert_eq!(labeled.exclusions.filled_zero_rows, 1);
        assert_eq!(labeled.exclusions.undefined_share_rows, 1);
        assert_eq!(labeled.exclusions.undefined_share_msas, vec!["name:b"]);
    }

    #[test]
    fn empty_base_year_is_an_error() {
        let panel = vec![row("a", 2006, 10.0, 90.0)];
        let err =
            assign_cohorts(panel, &Sector::Military, 2005, CohortPolicy::Quartile).unwrap_err();
        assert!(matches!(err, PanelError::EmptyDistribution { year: 2005, .. }));
    }

    #[test]
    fn assignment_is_deterministic() {
        let build = || {
            vec![
                row("a", 2005, 1.0, 2.0),
                row("b", 2005, 3.0, 5.0),
                row("c", 2005, 7.0, 11.0),
                row("d", 2005, 13.0, 17.0),
                row("e", 2005, 19.0, 23.0),
            ]
        };
        let first =
            assign_cohorts(build(), &Sector::Military, 2005, CohortPolicy::Quartile).unwrap();
        let mut reversed = build();
        reversed.reverse();
        let second =
            assign_cohorts(reversed, &Sector::Military, 2005, CohortPolicy::Quartile).unwrap();
        assert_eq!(first.cutoffs, second.cutoffs);
        assert_eq!(first.assignments, second.assignments);
    }
}
