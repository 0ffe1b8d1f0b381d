//! Keyed hash joins with coverage diagnostics.
//!
//! Joins return index pairs into the two inputs instead of materialized rows,
//! so callers build only the output they need. Every join reports how many
//! rows on each side matched. Through [`keyed_join`] a join with zero matches
//! is a [`PanelError::JoinIntegrity`] error; [`counted_join`] only counts it.
//! A partial match is logged either way.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::join::UNMATCHED_SAMPLE_LIMIT;
use crate::errors::PanelError;
use crate::types::SampleKey;

/// Which unmatched rows a join keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// Matched pairs only.
    Inner,
    /// Matched pairs plus every unmatched right row.
    Right,
}

/// Names used in diagnostics and errors for one join.
#[derive(Clone, Copy, Debug)]
pub struct JoinSpec<'a> {
    /// Join name used in logs.
    pub name: &'a str,
    /// Left key column, for messages.
    pub left_key: &'a str,
    /// Right key column, for messages.
    pub right_key: &'a str,
    /// Which unmatched rows are kept.
    pub kind: JoinKind,
}

/// Row coverage of one join.
///
/// `matched_left + left_only == left_rows` and
/// `matched_right + right_only == right_rows` always hold.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinDiagnostics {
    /// Join name.
    pub join: String,
    /// Left key column.
    pub left_key: String,
    /// Right key column.
    pub right_key: String,
    /// Rows on the left side.
    pub left_rows: usize,
    /// Rows on the right side.
    pub right_rows: usize,
    /// Left rows with at least one partner.
    pub matched_left: usize,
    /// Right rows with at least one partner.
    pub matched_right: usize,
    /// Left rows without a partner.
    pub left_only: usize,
    /// Right rows without a partner.
    pub right_only: usize,
    /// Rows emitted by the join (pairs plus kept unmatched rows).
    pub output_rows: usize,
    /// Up to a few distinct unmatched left keys, sorted.
    pub left_only_sample: Vec<SampleKey>,
    /// Up to a few distinct unmatched right keys, sorted.
    pub right_only_sample: Vec<SampleKey>,
}

impl JoinDiagnostics {
    /// True when every row on both sides found a partner.
    pub fn is_complete(&self) -> bool {
        self.left_only == 0 && self.right_only == 0
    }

    /// True when no pair was produced.
    pub fn matched_nothing(&self) -> bool {
        self.matched_left == 0
    }

    fn integrity_error(&self) -> PanelError {
        PanelError::JoinIntegrity {
            join: self.join.clone(),
            left_key: self.left_key.clone(),
            right_key: self.right_key.clone(),
            left_sample: self.left_only_sample.clone(),
            right_sample: self.right_only_sample.clone(),
        }
    }
}

/// Output of [`keyed_join`]: `(left, right)` index pairs plus diagnostics.
///
/// For [`JoinKind::Right`], unmatched right rows appear as `(None, right)`.
#[derive(Clone, Debug)]
pub struct JoinOutput {
    /// Index pairs; `None` on the left for kept unmatched right rows.
    pub pairs: Vec<(Option<usize>, usize)>,
    /// Join coverage.
    pub diagnostics: JoinDiagnostics,
}

/// Hash join `left` and `right` on the keys produced by the two closures.
///
/// A `None` key never matches. Pairs are emitted in right-row order, then
/// left-row order, so output depends only on the inputs. Fails when no pair is
/// produced.
pub fn keyed_join<L, R, K, FL, FR>(
    left: &[L],
    right: &[R],
    spec: JoinSpec<'_>,
    left_key: FL,
    right_key: FR,
) -> Result<JoinOutput, PanelError>
where
    K: Eq + Hash + Ord + Display,
    FL: Fn(&L) -> Option<K>,
    FR: Fn(&R) -> Option<K>,
{
    let output = counted_join(left, right, spec, left_key, right_key);
    if output.diagnostics.matched_nothing() {
        return Err(output.diagnostics.integrity_error());
    }
    Ok(output)
}

/// [`keyed_join`] without the integrity check: zero matches (or an empty side)
/// is reported through the diagnostics only.
pub fn counted_join<L, R, K, FL, FR>(
    left: &[L],
    right: &[R],
    spec: JoinSpec<'_>,
    left_key: FL,
    right_key: FR,
) -> JoinOutput
where
    K: Eq + Hash + Ord + Display,
    FL: Fn(&L) -> Option<K>,
    FR: Fn(&R) -> Option<K>,
{
    let left_keys: Vec<Option<K>> = left.iter().map(&left_key).collect();
    let mut left_index: HashMap<&K, Vec<usize>> = HashMap::new();
    for (idx, key) in left_keys.iter().enumerate() {
        if let Some(key) = key {
            left_index.entry(key).or_default().push(idx);
        }
    }

    let mut left_matched = vec![false; left.len()];
    let mut right_only_keys: BTreeSet<SampleKey> = BTreeSet::new();
    let mut pairs = Vec::new();
    let mut matched_right = 0usize;
    let mut right_only = 0usize;

    for (right_idx, row) in right.iter().enumerate() {
        let key = right_key(row);
        let partners = key.as_ref().and_then(|key| left_index.get(key));
        match partners {
            Some(partners) => {
                matched_right += 1;
                for &left_idx in partners {
                    left_matched[left_idx] = true;
                    pairs.push((Some(left_idx), right_idx));
                }
            }
            None => {
                right_only += 1;
                right_only_keys.insert(sample_key(key.as_ref()));
                if spec.kind == JoinKind::Right {
                    pairs.push((None, right_idx));
                }
            }
        }
    }

    let mut left_only_keys: BTreeSet<SampleKey> = BTreeSet::new();
    let mut matched_left = 0usize;
    for (idx, matched) in left_matched.iter().enumerate() {
        if *matched {
            matched_left += 1;
        } else {
            left_only_keys.insert(sample_key(left_keys[idx].as_ref()));
        }
    }

    let diagnostics = JoinDiagnostics {
        join: spec.name.to_string(),
        left_key: spec.left_key.to_string(),
        right_key: spec.right_key.to_string(),
        left_rows: left.len(),
        right_rows: right.len(),
        matched_left,
        matched_right,
        left_only: left.len() - matched_left,
        right_only,
        output_rows: pairs.len(),
        left_only_sample: left_only_keys
            .into_iter()
            .take(UNMATCHED_SAMPLE_LIMIT)
            .collect(),
        right_only_sample: right_only_keys
            .into_iter()
            .take(UNMATCHED_SAMPLE_LIMIT)
            .collect(),
    };

    if !diagnostics.is_complete() {
        warn!(
            "[msa_panel:join] '{}' partial coverage: matched={} left_only={} right_only={} (left sample {:?}, right sample {:?})",
            diagnostics.join,
            diagnostics.matched_left,
            diagnostics.left_only,
            diagnostics.right_only,
            diagnostics.left_only_sample,
            diagnostics.right_only_sample
        );
    }

    JoinOutput { pairs, diagnostics }
}

fn sample_key<K: Display>(key: Option<&K>) -> SampleKey {
    match key {
        Some(key) => key.to_string(),
        None => "<missing>".to_string(),
    }
}
