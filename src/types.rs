/// Canonical (trimmed, case-folded) county join key.
/// Examples: `autauga, al`, `01001`
pub type CountyKey = String;
/// Canonical (trimmed, case-folded, suffix-stripped) MSA name.
/// Examples: `abilene, tx`, `boston-cambridge-newton, ma-nh`
pub type MsaKey = String;
/// Calendar year of an observation.
/// Example: `2005`
pub type Year = i32;
/// Calendar month of an observation (1-12).
pub type Month = u32;
/// Lower-cased, trimmed column name declared by the loader.
/// Examples: `geoname`, `cbsaname10`, `unemployment rate`
pub type ColumnName = String;
/// Rendered join key kept in diagnostics samples.
/// Examples: `name:abilene, tx`, `code:12700`
pub type SampleKey = String;
/// Two-letter USPS state/territory code.
/// Examples: `AK`, `HI`, `PR`
pub type PostalCode = String;
/// Name of a loader table, used in error messages.
/// Examples: `county_sectors`, `crosswalk`, `unemployment`
pub type TableName = String;
