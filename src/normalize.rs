//! Deterministic key normalization shared by every join.
//!
//! Normalization is limited to trimming, case-folding, literal substring
//! removal and the crosswalk county reformatting. No fuzzy matching.

use serde::{Deserialize, Serialize};

use crate::constants::normalize::{
    COUNTY_STATE_SEPARATOR, CROSSWALK_MSA_SUFFIXES, UNEMPLOYMENT_MSA_SUFFIXES,
};

/// Trim surrounding whitespace and case-fold.
///
/// Applied to every string key at load time.
pub fn canonical_key<T: AsRef<str>>(raw: T) -> String {
    raw.as_ref().trim().to_lowercase()
}

/// Remove every occurrence of each substring, in order.
///
/// Later substrings are applied to the already-modified string, so
/// `["ab", "c"]` on `"aabcb"` removes `ab` first (`"acb"`) and then `c` (`"ab"`).
pub fn strip_substrings<S: AsRef<str>>(raw: &str, substrings: &[S]) -> String {
    let mut value = raw.to_string();
    for substring in substrings {
        let substring = substring.as_ref();
        if substring.is_empty() {
            continue;
        }
        value = value.replace(substring, "");
    }
    value
}

/// Turn a crosswalk county label (`Autauga AL`) into the `County, ST` form.
///
/// The last two characters are taken as the state code. Labels too short to
/// carry a state, or already in `County, ST` form, are returned trimmed.
pub fn format_county_state(raw: &str) -> String {
    let trimmed = raw.trim();
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() < 4 || trimmed.contains(COUNTY_STATE_SEPARATOR.trim_end()) {
        return trimmed.to_string();
    }
    let (county, state) = chars.split_at(chars.len() - 2);
    let county: String = county.iter().collect();
    let state: String = state.iter().collect();
    format!("{}{}{}", county.trim_end(), COUNTY_STATE_SEPARATOR, state)
}

/// Canonicalizes one identifier column: case-fold, trim, strip substrings, trim.
///
/// The substrings are case-folded once on construction so they match the
/// canonical form of the value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyNormalizer {
    substrings: Vec<String>,
}

impl KeyNormalizer {
    /// Normalizer that removes `substrings` in order.
    pub fn new<S: AsRef<str>>(substrings: &[S]) -> Self {
        Self {
            substrings: substrings
                .iter()
                .map(|s| s.as_ref().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Normalizer that only canonicalizes (no substring removal).
    pub fn canonical_only() -> Self {
        Self::default()
    }

    /// Case-folded substrings removed by this normalizer.
    pub fn substrings(&self) -> &[String] {
        &self.substrings
    }

    /// Normalize one value.
    pub fn normalize(&self, raw: &str) -> String {
        let folded = canonical_key(raw);
        strip_substrings(&folded, &self.substrings).trim().to_string()
    }

    /// Normalize every value of a column in place.
    pub fn normalize_in_place<'a, I>(&self, values: I)
    where
        I: IntoIterator<Item = &'a mut String>,
    {
        for value in values {
            *value = self.normalize(value);
        }
    }
}

/// Key normalization settings for the three loader tables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyNormalization {
    /// Substrings removed from unemployment-series MSA names.
    pub unemployment_msa_substrings: Vec<String>,
    /// Substrings removed from crosswalk MSA names.
    pub crosswalk_msa_substrings: Vec<String>,
    /// Substrings removed from county names on both sides of the county join.
    pub county_substrings: Vec<String>,
    /// Rewrite crosswalk counties from `Name ST` into `Name, ST`.
    pub format_crosswalk_counties: bool,
}

impl Default for KeyNormalization {
    fn default() -> Self {
        Self {
            unemployment_msa_substrings: UNEMPLOYMENT_MSA_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            crosswalk_msa_substrings: CROSSWALK_MSA_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            county_substrings: Vec::new(),
            format_crosswalk_counties: true,
        }
    }
}

impl KeyNormalization {
    /// Normalizer for unemployment MSA names.
    pub fn unemployment_msa(&self) -> KeyNormalizer {
        KeyNormalizer::new(&self.unemployment_msa_substrings)
    }

    /// Normalizer for crosswalk MSA names.
    pub fn crosswalk_msa(&self) -> KeyNormalizer {
        KeyNormalizer::new(&self.crosswalk_msa_substrings)
    }

    /// Normalizer for county names (same on both sides of the county join).
    pub fn county(&self) -> KeyNormalizer {
        KeyNormalizer::new(&self.county_substrings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_trims_and_folds() {
        assert_eq!(canonical_key("  Abilene, TX "), "abilene, tx");
        assert_eq!(canonical_key(""), "");
    }

    #[test]
    fn strip_substrings_is_order_sensitive() {
        assert_eq!(strip_substrings("aabcb", &["ab", "c"]), "ab");
        assert_eq!(strip_substrings("aabcb", &["c", "ab"]), "b");
        assert_eq!(strip_substrings("abc", &[""]), "abc");
    }

    #[test]
    fn crosswalk_suffixes_strip_full_forms_first() {
        let normalizer = KeyNormalization::default().crosswalk_msa();
        assert_eq!(
            normalizer.normalize("Abilene, TX Metropolitan Statistical Area"),
            "abilene, tx"
        );
        assert_eq!(
            normalizer.normalize("Athens, OH Micropolitan Statistical"),
            "athens, oh"
        );
    }

    #[test]
    fn both_sides_of_the_msa_join_agree() {
        let config = KeyNormalization::default();
        let bls = config.unemployment_msa().normalize("Abilene, TX MSA");
        let crosswalk = config
            .crosswalk_msa()
            .normalize(" Abilene, TX Metropolitan Statistical Area ");
        assert_eq!(bls, crosswalk);

        let necta = config
            .unemployment_msa()
            .normalize("Bangor, ME Met NECTA");
        assert_eq!(necta, "bangor, me");
    }

    #[test]
    fn format_county_state_inserts_separator() {
        assert_eq!(format_county_state("Autauga AL"), "Autauga, AL");
        assert_eq!(format_county_state(" Baldwin  AL "), "Baldwin, AL");
        assert_eq!(format_county_state("Autauga, AL"), "Autauga, AL");
        assert_eq!(format_county_state("AL"), "AL");
    }

    #[test]
    fn normalize_in_place_rewrites_column() {
        let normalizer = KeyNormalizer::new(&[" MSA"]);
        let mut column = vec!["Abilene, TX MSA".to_string(), " Akron, OH MSA".to_string()];
        normalizer.normalize_in_place(column.iter_mut());
        assert_eq!(column, vec!["abilene, tx", "akron, oh"]);
    }
}
