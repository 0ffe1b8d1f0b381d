//! MSA CBSA codes and the historical code remap table.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::geography::{FIPS_REMAP_VERSION, HISTORICAL_FIPS_REMAP};
use crate::errors::PanelError;

/// Numeric CBSA/FIPS code of an MSA.
///
/// Parsing accepts the spellings loaders tend to produce (`12700`, `012700`,
/// `12700.0`), so codes compare equal regardless of the source column type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsaCode(u32);

impl MsaCode {
    /// Wrap a raw numeric code.
    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    /// Return the numeric code.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Build a code from a float cell (spreadsheet loaders emit codes as floats).
    pub fn from_f64(value: f64) -> Result<Self, PanelError> {
        if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX)
        {
            Ok(Self(value as u32))
        } else {
            Err(PanelError::InvalidIdentifier {
                kind: "msa code",
                value: value.to_string(),
            })
        }
    }
}

impl fmt::Display for MsaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}", self.0)
    }
}

impl FromStr for MsaCode {
    type Err = PanelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || PanelError::InvalidIdentifier {
            kind: "msa code",
            value: raw.to_string(),
        };
        let trimmed = raw.trim();
        let (digits, fraction) = match trimmed.split_once('.') {
            Some((digits, fraction)) => (digits, fraction),
            None => (trimmed, ""),
        };
        if digits.is_empty()
            || !digits.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b == b'0')
        {
            return Err(invalid());
        }
        digits.parse::<u32>().map(Self).map_err(|_| invalid())
    }
}

/// One old -> new code correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FipsRemap {
    /// Deprecated code.
    pub from: MsaCode,
    /// Code that replaces it.
    pub to: MsaCode,
}

/// Versioned old -> new MSA code lookup with identity default.
///
/// Applied to the analysis side once, before any code-keyed geometry join.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FipsRemapTable {
    /// Version tag so callers can tell which correction set was applied.
    pub version: String,
    /// Corrections, one per deprecated code.
    pub entries: Vec<FipsRemap>,
}

impl Default for FipsRemapTable {
    fn default() -> Self {
        Self::historical()
    }
}

impl FipsRemapTable {
    /// The fixed New England / Dayton corrections.
    pub fn historical() -> Self {
        Self {
            version: FIPS_REMAP_VERSION.to_string(),
            entries: HISTORICAL_FIPS_REMAP
                .iter()
                .map(|&(from, to)| FipsRemap {
                    from: MsaCode::new(from),
                    to: MsaCode::new(to),
                })
                .collect(),
        }
    }

    /// An empty table (every code maps to itself).
    pub fn identity() -> Self {
        Self {
            version: "identity".to_string(),
            entries: Vec::new(),
        }
    }

    /// Number of corrections.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table has no corrections.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map `code` to its replacement, or return it unchanged.
    pub fn apply(&self, code: MsaCode) -> MsaCode {
        self.entries
            .iter()
            .find(|entry| entry.from == code)
            .map(|entry| entry.to)
            .unwrap_or(code)
    }

    /// True when `code` is a deprecated code in this table.
    pub fn remaps(&self, code: MsaCode) -> bool {
        self.entries.iter().any(|entry| entry.from == code)
    }

    /// Reject tables that are not single-step lookups.
    ///
    /// A target that is itself a source would make `apply` order-dependent and
    /// break idempotence, and duplicate sources are ambiguous.
    pub fn validate(&self) -> Result<(), PanelError> {
        let mut seen: BTreeMap<MsaCode, MsaCode> = BTreeMap::new();
        for entry in &self.entries {
            if let Some(previous) = seen.insert(entry.from, entry.to) {
                return Err(PanelError::Configuration(format!(
                    "fips remap '{}' lists {} twice (-> {} and -> {})",
                    self.version, entry.from, previous, entry.to
                )));
            }
        }
        for entry in &self.entries {
            if seen.contains_key(&entry.to) {
                return Err(PanelError::Configuration(format!(
                    "fips remap '{}' chains {} -> {} through a remapped code",
                    self.version, entry.from, entry.to
                )));
            }
        }
        Ok(())
    }
}
