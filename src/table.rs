//! Loader-facing tables and their typed views.
//!
//! An external loader hands over each source as rows of column name -> cell.
//! This module maps those rows onto the typed records the panel builder
//! consumes. String keys are canonicalized here (trim + case-fold); source
//! specific substring removal happens later, in the panel builder.
//!
//! Boundary files arrive as GeoJSON feature collections: feature properties
//! become a [`RawTable`] read the same way, polygons become `geo` shapes.

use std::collections::BTreeMap;
use std::path::Path;

use geo::{LineString, MultiPolygon, Polygon};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants::columns;
use crate::data::{CrosswalkEntry, MsaUnemploymentObservation, Sector, Year};
use crate::effects::DirectEffectRecord;
use crate::errors::PanelError;
use crate::fips::MsaCode;
use crate::geography::{MsaRecord, StateRecord};
use crate::normalize::canonical_key;
use crate::reshape::WideSectorRow;
use crate::types::{ColumnName, TableName};

/// One loader cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Numeric cell.
    Number(f64),
    /// Text cell.
    Text(String),
    /// JSON `null`.
    Missing,
}

/// One loader row: column name -> cell, in declared column order.
pub type RawRow = IndexMap<ColumnName, CellValue>;

/// A loader table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// Name used in error messages.
    pub name: TableName,
    /// Rows in declared order.
    pub rows: Vec<RawRow>,
}

impl RawTable {
    /// Build a table, canonicalizing column names (trim + lower-case).
    pub fn new(name: impl Into<TableName>, rows: Vec<RawRow>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(column, value)| (canonical_key(column), value))
                    .collect()
            })
            .collect();
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Parse a JSON array of objects.
    pub fn from_json_str(name: impl Into<TableName>, json: &str) -> Result<Self, PanelError> {
        let rows: Vec<RawRow> = serde_json::from_str(json)?;
        Ok(Self::new(name, rows))
    }

    /// Read a JSON array of objects from `path`.
    pub fn from_json_path(name: impl Into<TableName>, path: &Path) -> Result<Self, PanelError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(name, &json)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn reader(&self, idx: usize) -> RowReader<'_> {
        RowReader {
            table: &self.name,
            idx,
            row: &self.rows[idx],
        }
    }
}

/// One position as written in GeoJSON; a third (altitude) value is ignored.
type Position = Vec<f64>;

#[derive(Deserialize)]
struct FeatureCollectionJson {
    features: Vec<FeatureJson>,
}

#[derive(Deserialize)]
struct FeatureJson {
    #[serde(default)]
    properties: Option<RawRow>,
    geometry: Option<GeometryJson>,
}

#[derive(Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum GeometryJson {
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

/// Boundary features: one property row and one shape per feature.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureTable {
    /// Feature properties, one row per feature.
    pub properties: RawTable,
    /// Feature shapes, aligned with the property rows.
    pub geometries: Vec<MultiPolygon<f64>>,
}

impl FeatureTable {
    /// Parse a GeoJSON `FeatureCollection` of polygon features.
    pub fn from_geojson_str(name: impl Into<TableName>, json: &str) -> Result<Self, PanelError> {
        let name = name.into();
        let collection: FeatureCollectionJson = serde_json::from_str(json)?;
        let mut rows = Vec::with_capacity(collection.features.len());
        let mut geometries = Vec::with_capacity(collection.features.len());
        for (idx, feature) in collection.features.into_iter().enumerate() {
            let invalid = |value: &str| PanelError::InvalidValue {
                table: name.clone(),
                column: "geometry".to_string(),
                row: idx,
                value: value.to_string(),
            };
            let geometry = match feature.geometry {
                Some(GeometryJson::Polygon(rings)) => {
                    MultiPolygon::new(vec![polygon(rings).ok_or_else(|| invalid("bad ring"))?])
                }
                Some(GeometryJson::MultiPolygon(polygons)) => MultiPolygon::new(
                    polygons
                        .into_iter()
                        .map(polygon)
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| invalid("bad ring"))?,
                ),
                None => return Err(invalid("<missing>")),
            };
            rows.push(feature.properties.unwrap_or_default());
            geometries.push(geometry);
        }
        Ok(Self {
            properties: RawTable::new(name, rows),
            geometries,
        })
    }

    /// Read a GeoJSON `FeatureCollection` from `path`.
    pub fn from_geojson_path(name: impl Into<TableName>, path: &Path) -> Result<Self, PanelError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_geojson_str(name, &json)
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    /// True when there are no features.
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }
}

/// Exterior ring first, then holes. `None` when a position has fewer than
/// two coordinates.
fn polygon(rings: Vec<Vec<Position>>) -> Option<Polygon<f64>> {
    let mut rings = rings.into_iter().map(|ring| {
        ring.into_iter()
            .map(|position| match position.as_slice() {
                [x, y, ..] => Some((*x, *y)),
                _ => None,
            })
            .collect::<Option<Vec<(f64, f64)>>>()
            .map(LineString::from)
    });
    let exterior = rings.next().unwrap_or(Some(LineString::new(Vec::new())))?;
    let interiors = rings.collect::<Option<Vec<_>>>()?;
    Some(Polygon::new(exterior, interiors))
}

/// Typed, error-reporting access to one row.
struct RowReader<'a> {
    table: &'a str,
    idx: usize,
    row: &'a RawRow,
}

impl RowReader<'_> {
    fn cell(&self, column: &str) -> Result<&CellValue, PanelError> {
        self.row
            .get(column)
            .ok_or_else(|| PanelError::MissingColumn {
                table: self.table.to_string(),
                column: column.to_string(),
                row: self.idx,
            })
    }

    fn invalid(&self, column: &str, value: impl ToString) -> PanelError {
        PanelError::InvalidValue {
            table: self.table.to_string(),
            column: column.to_string(),
            row: self.idx,
            value: value.to_string(),
        }
    }

    fn text(&self, column: &str) -> Result<String, PanelError> {
        self.optional_text(column)?
            .ok_or_else(|| self.invalid(column, "<missing>"))
    }

    /// Absent column and missing cell both read as `None`.
    fn optional_text(&self, column: &str) -> Result<Option<String>, PanelError> {
        match self.row.get(column) {
            None | Some(CellValue::Missing) => Ok(None),
            Some(CellValue::Text(text)) if text.trim().is_empty() => Ok(None),
            Some(CellValue::Text(text)) => Ok(Some(text.clone())),
            Some(CellValue::Number(number)) if number.fract() == 0.0 => {
                Ok(Some(format!("{}", *number as i64)))
            }
            Some(CellValue::Number(number)) => Ok(Some(number.to_string())),
        }
    }

    fn optional_number(&self, column: &str) -> Result<Option<f64>, PanelError> {
        match self.cell(column)? {
            CellValue::Missing => Ok(None),
            CellValue::Number(number) => Ok(Some(*number)),
            CellValue::Text(text) if text.trim().is_empty() => Ok(None),
            CellValue::Text(text) => text
                .trim()
                .replace(',', "")
                .parse::<f64>()
                .map(Some)
                .map_err(|_| self.invalid(column, text)),
        }
    }

    fn non_negative(&self, column: &str) -> Result<Option<f64>, PanelError> {
        match self.optional_number(column)? {
            Some(value) if value < 0.0 || !value.is_finite() => Err(self.invalid(column, value)),
            other => Ok(other),
        }
    }

    fn optional_integer(&self, column: &str) -> Result<Option<i64>, PanelError> {
        match self.row.get(column) {
            None => Ok(None),
            Some(_) => match self.optional_number(column)? {
                None => Ok(None),
                Some(value) if value.fract() == 0.0 => Ok(Some(value as i64)),
                Some(value) => Err(self.invalid(column, value)),
            },
        }
    }

    fn integer(&self, column: &str) -> Result<i64, PanelError> {
        self.cell(column)?;
        self.optional_integer(column)?
            .ok_or_else(|| self.invalid(column, "<missing>"))
    }

    fn optional_code(&self, column: &str) -> Result<Option<MsaCode>, PanelError> {
        match self.row.get(column) {
            None | Some(CellValue::Missing) => Ok(None),
            Some(CellValue::Number(number)) => MsaCode::from_f64(*number)
                .map(Some)
                .map_err(|_| self.invalid(column, number)),
            Some(CellValue::Text(text)) if text.trim().is_empty() => Ok(None),
            Some(CellValue::Text(text)) => text
                .parse::<MsaCode>()
                .map(Some)
                .map_err(|_| self.invalid(column, text)),
        }
    }
}

/// Column names of the wide county-sector table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectorColumns {
    /// County name column.
    pub county: ColumnName,
    /// Sector description column.
    pub sector: ColumnName,
}

impl Default for SectorColumns {
    fn default() -> Self {
        Self {
            county: columns::SECTOR_COUNTY.to_string(),
            sector: columns::SECTOR_DESCRIPTION.to_string(),
        }
    }
}

/// Column names of the crosswalk table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrosswalkColumns {
    /// County name column.
    pub county: ColumnName,
    /// County FIPS column.
    pub county_fips: ColumnName,
    /// MSA name column.
    pub msa: ColumnName,
    /// CBSA code column.
    pub msa_fips: ColumnName,
}

impl Default for CrosswalkColumns {
    fn default() -> Self {
        Self {
            county: columns::CROSSWALK_COUNTY.to_string(),
            county_fips: columns::CROSSWALK_COUNTY_FIPS.to_string(),
            msa: columns::CROSSWALK_MSA.to_string(),
            msa_fips: columns::CROSSWALK_MSA_FIPS.to_string(),
        }
    }
}

/// Column names of the unemployment table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnemploymentColumns {
    /// MSA name column.
    pub msa: ColumnName,
    /// CBSA code column.
    pub msa_fips: ColumnName,
    /// Year column.
    pub year: ColumnName,
    /// Optional; absent for annual data.
    pub month: ColumnName,
    /// Unemployment rate column.
    pub rate: ColumnName,
}

impl Default for UnemploymentColumns {
    fn default() -> Self {
        Self {
            msa: columns::UNEMPLOYMENT_MSA.to_string(),
            msa_fips: columns::UNEMPLOYMENT_MSA_FIPS.to_string(),
            year: columns::UNEMPLOYMENT_YEAR.to_string(),
            month: columns::UNEMPLOYMENT_MONTH.to_string(),
            rate: columns::UNEMPLOYMENT_RATE.to_string(),
        }
    }
}

/// Column names of the direct-effect table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectColumns {
    /// CBSA code column.
    pub msa_fips: ColumnName,
    /// Direct effect column.
    pub direct: ColumnName,
}

impl Default for EffectColumns {
    fn default() -> Self {
        Self {
            msa_fips: columns::EFFECT_MSA_FIPS.to_string(),
            direct: columns::EFFECT_DIRECT.to_string(),
        }
    }
}

/// Property names of the state boundary features.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateShapeColumns {
    /// State FIPS property.
    pub geoid: ColumnName,
    /// Postal code property.
    pub postal: ColumnName,
    /// Name property.
    pub name: ColumnName,
}

impl Default for StateShapeColumns {
    fn default() -> Self {
        Self {
            geoid: columns::STATE_GEOID.to_string(),
            postal: columns::STATE_POSTAL.to_string(),
            name: columns::SHAPE_NAME.to_string(),
        }
    }
}

/// Property names of the MSA boundary features.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsaShapeColumns {
    /// CBSA code column.
    pub msa_fips: ColumnName,
    /// Name property.
    pub name: ColumnName,
}

impl Default for MsaShapeColumns {
    fn default() -> Self {
        Self {
            msa_fips: columns::MSA_SHAPE_FIPS.to_string(),
            name: columns::SHAPE_NAME.to_string(),
        }
    }
}

/// All loader column names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    /// County-sector table columns.
    pub sectors: SectorColumns,
    /// Crosswalk table columns.
    pub crosswalk: CrosswalkColumns,
    /// Unemployment table columns.
    pub unemployment: UnemploymentColumns,
    /// Direct-effect table columns.
    pub effects: EffectColumns,
    /// State boundary feature properties.
    pub states: StateShapeColumns,
    /// MSA boundary feature properties.
    pub msas: MsaShapeColumns,
}

/// Read the wide county-sector table; every column named like a year is a value column.
pub fn wide_sector_rows(
    table: &RawTable,
    columns: &SectorColumns,
) -> Result<Vec<WideSectorRow>, PanelError> {
    let mut rows = Vec::with_capacity(table.len());
    for idx in 0..table.len() {
        let reader = table.reader(idx);
        let county_key = canonical_key(reader.text(&columns.county)?);
        let sector = Sector::parse(&reader.text(&columns.sector)?);
        let mut values = BTreeMap::new();
        for column in reader.row.keys() {
            if let Some(year) = year_column(column) {
                values.insert(year, reader.non_negative(column)?);
            }
        }
        rows.push(WideSectorRow {
            county_key,
            sector,
            values,
        });
    }
    Ok(rows)
}

/// Read the crosswalk table.
pub fn crosswalk_entries(
    table: &RawTable,
    columns: &CrosswalkColumns,
) -> Result<Vec<CrosswalkEntry>, PanelError> {
    let mut entries = Vec::with_capacity(table.len());
    for idx in 0..table.len() {
        let reader = table.reader(idx);
        entries.push(CrosswalkEntry {
            county_key: canonical_key(reader.text(&columns.county)?),
            msa_key: canonical_key(reader.optional_text(&columns.msa)?.unwrap_or_default()),
            county_fips: reader
                .optional_text(&columns.county_fips)?
                .map(canonical_key),
            msa_fips: reader.optional_code(&columns.msa_fips)?,
        });
    }
    Ok(entries)
}

/// Read the unemployment table.
pub fn unemployment_observations(
    table: &RawTable,
    columns: &UnemploymentColumns,
) -> Result<Vec<MsaUnemploymentObservation>, PanelError> {
    let mut observations = Vec::with_capacity(table.len());
    for idx in 0..table.len() {
        let reader = table.reader(idx);
        let year = reader.integer(&columns.year)?;
        let year = Year::try_from(year).map_err(|_| reader.invalid(&columns.year, year))?;
        let month = match reader.optional_integer(&columns.month)? {
            Some(month) if (1..=12).contains(&month) => Some(month as u32),
            Some(month) => return Err(reader.invalid(&columns.month, month)),
            None => None,
        };
        let rate = match reader.optional_number(&columns.rate)? {
            Some(rate) if !(0.0..=100.0).contains(&rate) => {
                return Err(reader.invalid(&columns.rate, rate));
            }
            other => other,
        };
        observations.push(MsaUnemploymentObservation {
            msa_key: canonical_key(reader.text(&columns.msa)?),
            msa_fips: reader.optional_code(&columns.msa_fips)?,
            year,
            month,
            unemployment_rate: rate,
        });
    }
    Ok(observations)
}

/// Read the direct-effect table.
pub fn direct_effect_records(
    table: &RawTable,
    columns: &EffectColumns,
) -> Result<Vec<DirectEffectRecord>, PanelError> {
    let mut records = Vec::with_capacity(table.len());
    for idx in 0..table.len() {
        let reader = table.reader(idx);
        records.push(DirectEffectRecord {
            msa_fips: reader.optional_code(&columns.msa_fips)?,
            direct: reader.optional_number(&columns.direct)?,
        });
    }
    Ok(records)
}

/// Read state boundary features. The GEOID stays text; it is parsed when
/// the states are classified.
pub fn state_records(
    features: &FeatureTable,
    columns: &StateShapeColumns,
) -> Result<Vec<StateRecord>, PanelError> {
    let table = &features.properties;
    let mut records = Vec::with_capacity(features.len());
    for (idx, geometry) in features.geometries.iter().enumerate() {
        let reader = table.reader(idx);
        records.push(StateRecord {
            geoid: reader.text(&columns.geoid)?,
            postal: reader.text(&columns.postal)?.trim().to_ascii_uppercase(),
            name: reader.optional_text(&columns.name)?.unwrap_or_default(),
            geometry: geometry.clone(),
        });
    }
    Ok(records)
}

/// Read MSA boundary features; every feature needs a CBSA code.
pub fn msa_records(
    features: &FeatureTable,
    columns: &MsaShapeColumns,
) -> Result<Vec<MsaRecord>, PanelError> {
    let table = &features.properties;
    let mut records = Vec::with_capacity(features.len());
    for (idx, geometry) in features.geometries.iter().enumerate() {
        let reader = table.reader(idx);
        let cbsa_fips = reader
            .optional_code(&columns.msa_fips)?
            .ok_or_else(|| reader.invalid(&columns.msa_fips, "<missing>"))?;
        records.push(MsaRecord {
            cbsa_fips,
            name: reader.optional_text(&columns.name)?.unwrap_or_default(),
            geometry: geometry.clone(),
        });
    }
    Ok(records)
}

fn year_column(column: &str) -> Option<Year> {
    if column.len() == 4 && column.bytes().all(|b| b.is_ascii_digit()) {
        column.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, json: &str) -> RawTable {
        RawTable::from_json_str(name, json).unwrap()
    }

    #[test]
    fn column_names_are_canonicalized() {
        let t = table("t", r#"[{" Unemployment Rate ": 4.5}]"#);
        assert!(t.rows[0].contains_key("unemployment rate"));
    }

    #[test]
    fn wide_rows_pick_up_year_columns() {
        let t = table(
            "county_sectors",
            r#"[
                {"GeoName": "Autauga, AL", "Description": " Manufacturing", "2005": 100, "2006": "110", "2007": null},
                {"GeoName": "Autauga, AL", "Description": "Military", "2005": 50, "2006": 40, "2007": ""}
            ]"#,
        );
        let rows = wide_sector_rows(&t, &SectorColumns::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].county_key, "autauga, al");
        assert_eq!(rows[0].sector, Sector::Manufacturing);
        assert_eq!(rows[0].values.get(&2006), Some(&Some(110.0)));
        assert_eq!(rows[0].values.get(&2007), Some(&None));
        assert_eq!(rows[1].values.get(&2007), Some(&None));
    }

    #[test]
    fn negative_sector_values_are_rejected() {
        let t = table(
            "county_sectors",
            r#"[{"geoname": "A", "description": "Military", "2005": -1}]"#,
        );
        let err = wide_sector_rows(&t, &SectorColumns::default()).unwrap_err();
        assert!(matches!(err, PanelError::InvalidValue { ref column, .. } if column == "2005"));
    }

    #[test]
    fn suppression_markers_are_invalid_numbers() {
        let t = table(
            "county_sectors",
            r#"[{"geoname": "A", "description": "Military", "2005": "(D)"}]"#,
        );
        assert!(wide_sector_rows(&t, &SectorColumns::default()).is_err());
    }

    #[test]
    fn crosswalk_reads_codes_and_names() {
        let t = table(
            "crosswalk",
            r#"[{"county": "01001", "cntyname": "Autauga AL", "cbsaname10": "Montgomery, AL Metropolitan Statistical Area", "cbsa10": "33860"}]"#,
        );
        let entries = crosswalk_entries(&t, &CrosswalkColumns::default()).unwrap();
        assert_eq!(entries[0].county_key, "autauga al");
        assert_eq!(entries[0].county_fips.as_deref(), Some("01001"));
        assert_eq!(entries[0].msa_fips, Some(MsaCode::new(33860)));
    }

    #[test]
    fn unemployment_rows_validate_month_and_rate() {
        let t = table(
            "unemployment",
            r#"[
                {"area": "Abilene, TX MSA", "area fips code": 10180, "year": 2005, "month": 1, "unemployment rate": 4.1},
                {"area": "Abilene, TX MSA", "area fips code": 10180, "year": "2005", "month": 2, "unemployment rate": null}
            ]"#,
        );
        let obs = unemployment_observations(&t, &UnemploymentColumns::default()).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].msa_key, "abilene, tx msa");
        assert_eq!(obs[1].year, 2005);
        assert_eq!(obs[1].unemployment_rate, None);

        let bad = table(
            "unemployment",
            r#"[{"area": "A", "year": 2005, "month": 13, "unemployment rate": 4.1}]"#,
        );
        assert!(unemployment_observations(&bad, &UnemploymentColumns::default()).is_err());
    }

    #[test]
    fn missing_required_column_is_reported() {
        let t = table("unemployment", r#"[{"area": "A", "month": 1}]"#);
        let err = unemployment_observations(&t, &UnemploymentColumns::default()).unwrap_err();
        assert!(matches!(
            err,
            PanelError::MissingColumn { ref column, row: 0, .. } if column == "year"
        ));
    }

    const STATES: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {"type": "Feature", "properties": {"GEOID": "02", "STUSPS": "ak", "NAME": "Alaska"},
         "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]}},
        {"type": "Feature", "properties": {"GEOID": "15", "STUSPS": "HI", "NAME": "Hawaii"},
         "geometry": {"type": "MultiPolygon", "coordinates": [
           [[[20, 0, 5], [22, 0, 5], [22, 2, 5], [20, 0, 5]]],
           [[[30, 0], [32, 0], [32, 2], [30, 0]]]
         ]}}
      ]
    }"#;

    #[test]
    fn geojson_features_become_state_records() {
        let features = FeatureTable::from_geojson_str("states", STATES).unwrap();
        assert_eq!(features.len(), 2);
        let states = state_records(&features, &StateShapeColumns::default()).unwrap();
        assert_eq!(states[0].geoid, "02");
        assert_eq!(states[0].postal, "AK");
        assert_eq!(states[0].name, "Alaska");
        assert_eq!(states[0].geometry.0.len(), 1);
        assert_eq!(states[0].geometry.0[0].exterior().0.len(), 5);
        assert_eq!(states[1].geometry.0.len(), 2);
    }

    #[test]
    fn msa_features_need_a_code_and_a_shape() {
        let missing_code = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"NAME": "Nowhere"},
             "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}}
        ]}"#;
        let features = FeatureTable::from_geojson_str("msas", missing_code).unwrap();
        let err = msa_records(&features, &MsaShapeColumns::default()).unwrap_err();
        assert!(matches!(err, PanelError::InvalidValue { ref column, .. } if column == "cbsafp"));

        let missing_shape = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"CBSAFP": "12700"}, "geometry": null}
        ]}"#;
        let err = FeatureTable::from_geojson_str("msas", missing_shape).unwrap_err();
        assert!(matches!(
            err,
            PanelError::InvalidValue { ref column, row: 0, .. } if column == "geometry"
        ));

        let short_position = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"CBSAFP": 12700},
             "geometry": {"type": "Polygon", "coordinates": [[[0], [1, 0], [1, 1]]]}}
        ]}"#;
        assert!(FeatureTable::from_geojson_str("msas", short_position).is_err());
    }
}
