use std::fs;
use std::path::Path;

use msa_panel::cohort::{CohortLabel, CohortPolicy};
use msa_panel::config::PipelineConfig;
use msa_panel::data::{MsaId, Sector, SectorCoverage};
use msa_panel::effects::DirectEffectRecord;
use msa_panel::fips::MsaCode;
use msa_panel::geography::RegionClass;
use msa_panel::example_apps::run_panel_report;
use msa_panel::panel::{PanelOptions, PanelSources, UnemploymentJoin, build_panel};
use msa_panel::pipeline::{PipelineInputs, run};
use msa_panel::table::{
    ColumnMapping, FeatureTable, RawTable, crosswalk_entries, unemployment_observations,
    wide_sector_rows,
};
use msa_panel::PanelError;

const COUNTY_SECTORS: &str = r#"[
  {"GeoName": "Autauga, AL", "Description": "Manufacturing", "2005": 100, "2006": 110},
  {"GeoName": "Autauga, AL", "Description": "Military",      "2005": 50,  "2006": 40},
  {"GeoName": "Baldwin, AL", "Description": "Manufacturing", "2005": 200, "2006": 190},
  {"GeoName": "Baldwin, AL", "Description": "Military",      "2005": 0,   "2006": 0},
  {"GeoName": "Cook, IL",    "Description": "Manufacturing", "2005": 100, "2006": 100},
  {"GeoName": "Cook, IL",    "Description": "Military",      "2005": 10,  "2006": 12},
  {"GeoName": "Dade, FL",    "Description": "Manufacturing", "2005": 100, "2006": 90},
  {"GeoName": "Dade, FL",    "Description": "Military",      "2005": 100, "2006": 100},
  {"GeoName": "Erie, NY",    "Description": "Manufacturing", "2005": 100, "2006": 100},
  {"GeoName": "Erie, NY",    "Description": "Military",      "2005": 300, "2006": 280},
  {"GeoName": "Erie, NY",    "Description": "Retail trade",  "2005": 999, "2006": 999}
]"#;

const CROSSWALK: &str = r#"[
  {"cntyname": "Autauga AL", "county": "01001", "cbsaname10": "A Metropolitan Statistical Area", "cbsa10": "10000"},
  {"cntyname": "Baldwin AL", "county": "01003", "cbsaname10": "A Metropolitan Statistical Area", "cbsa10": "10000"},
  {"cntyname": "Baldwin AL", "county": "01003", "cbsaname10": "A Metropolitan Statistical Area", "cbsa10": "10000"},
  {"cntyname": "Cook IL",    "county": "17031", "cbsaname10": "B Metropolitan Statistical Area", "cbsa10": "20000"},
  {"cntyname": "Dade FL",    "county": "12086", "cbsaname10": "C Micropolitan Statistical Area", "cbsa10": "30000"},
  {"cntyname": "Erie NY",    "county": "36029", "cbsaname10": "D Metropolitan Statistical", "cbsa10": "40000"},
  {"cntyname": "Rural WY",   "county": "56001", "cbsaname10": null, "cbsa10": "99999"}
]"#;

fn unemployment_json() -> String {
    // (msa name, code, 2005 rate, 2006 rate); each year gets two months averaging to the rate.
    let series = [
        ("A MSA", 10000, 12.0, 11.2),
        ("B MSA", 20000, 10.0, 9.0),
        ("C Met NECTA", 30000, 8.0, 8.3),
        ("D MSA", 40000, 15.0, 14.5),
        ("E MSA", 50000, 7.0, 6.0),
    ];
    let mut rows = Vec::new();
    for (name, code, rate_2005, rate_2006) in series {
        for (year, rate) in [(2005, rate_2005), (2006, rate_2006)] {
            for (month, offset) in [(1, -0.5), (2, 0.5)] {
                rows.push(format!(
                    r#"{{"Area": "{name}", "Area FIPS Code": {code}, "Year": {year}, "Month": {month}, "Unemployment Rate": {}}}"#,
                    rate + offset
                ));
            }
        }
    }
    format!("[{}]", rows.join(",\n"))
}

fn inputs() -> PipelineInputs {
    PipelineInputs::from_tables(
        &RawTable::from_json_str("county_sectors", COUNTY_SECTORS).unwrap(),
        &RawTable::from_json_str("crosswalk", CROSSWALK).unwrap(),
        &RawTable::from_json_str("unemployment", &unemployment_json()).unwrap(),
        None,
        &ColumnMapping::default(),
    )
    .unwrap()
}

fn square_feature(properties: &str, x: f64, y: f64, size: f64) -> String {
    format!(
        r#"{{"type": "Feature", "properties": {properties}, "geometry": {{"type": "Polygon", "coordinates": [[[{x}, {y}], [{x2}, {y}], [{x2}, {y2}], [{x}, {y2}], [{x}, {y}]]]}}}}"#,
        x2 = x + size,
        y2 = y + size
    )
}

fn feature_collection(features: &[String]) -> String {
    format!(
        r#"{{"type": "FeatureCollection", "features": [{}]}}"#,
        features.join(",\n")
    )
}

fn states_geojson() -> String {
    feature_collection(&[
        square_feature(r#"{"GEOID": "01", "STUSPS": "AL", "NAME": "Alabama"}"#, 0.0, 0.0, 10.0),
        square_feature(r#"{"GEOID": "02", "STUSPS": "AK", "NAME": "Alaska"}"#, 100.0, 0.0, 10.0),
    ])
}

fn msas_geojson() -> String {
    feature_collection(&[
        square_feature(r#"{"CBSAFP": "10000", "NAME": "A"}"#, 1.0, 1.0, 2.0),
        square_feature(r#"{"CBSAFP": "40000", "NAME": "D"}"#, 101.0, 1.0, 2.0),
        square_feature(r#"{"CBSAFP": 77777, "NAME": "Outline only"}"#, 5.0, 5.0, 2.0),
    ])
}

fn write_inputs(dir: &Path) {
    fs::write(dir.join("county_sectors.json"), COUNTY_SECTORS).unwrap();
    fs::write(dir.join("crosswalk.json"), CROSSWALK).unwrap();
    fs::write(dir.join("unemployment.json"), unemployment_json()).unwrap();
}

#[test]
fn two_counties_fuse_into_one_msa_row() {
    let columns = ColumnMapping::default();
    let county_sectors = wide_sector_rows(
        &RawTable::from_json_str(
            "county_sectors",
            r#"[
              {"GeoName": "Autauga, AL", "Description": "Manufacturing", "2005": 100},
              {"GeoName": "Autauga, AL", "Description": "Military", "2005": 50},
              {"GeoName": "Baldwin, AL", "Description": "Manufacturing", "2005": 200},
              {"GeoName": "Baldwin, AL", "Description": "Military", "2005": 0}
            ]"#,
        )
        .unwrap(),
        &columns.sectors,
    )
    .unwrap();
    let crosswalk = crosswalk_entries(
        &RawTable::from_json_str(
            "crosswalk",
            r#"[
              {"cntyname": "Autauga AL", "cbsaname10": "A"},
              {"cntyname": "Baldwin AL", "cbsaname10": "A"}
            ]"#,
        )
        .unwrap(),
        &columns.crosswalk,
    )
    .unwrap();
    let unemployment = unemployment_observations(
        &RawTable::from_json_str(
            "unemployment",
            r#"[{"area": "A", "year": 2005, "unemployment rate": 6.0}]"#,
        )
        .unwrap(),
        &columns.unemployment,
    )
    .unwrap();

    let build = build_panel(
        PanelSources {
            county_sectors,
            crosswalk,
            unemployment,
        },
        &PanelOptions::default(),
    )
    .unwrap();

    assert_eq!(build.rows.len(), 1);
    let row = &build.rows[0];
    assert_eq!(row.msa, MsaId::Name("a".to_string()));
    assert_eq!(row.year, 2005);
    assert_eq!(row.sector_value(&Sector::Manufacturing), Some(300.0));
    assert_eq!(row.sector_value(&Sector::Military), Some(50.0));
    assert_eq!(row.total(), 350.0);
    assert_eq!(row.unemployment_rate, Some(6.0));
    assert!((row.share(&Sector::Military).unwrap() - 0.1429).abs() < 1e-4);
    assert!(build.diagnostics.county_join.is_complete());
}

#[test]
fn quartile_pipeline_reports_aligned_deltas() {
    let output = run(inputs(), &PipelineConfig::default()).unwrap();

    let diagnostics = &output.panel_diagnostics;
    assert_eq!(diagnostics.crosswalk.sentinel_entries, 1);
    assert_eq!(diagnostics.crosswalk.duplicate_entries, 1);
    // Msa "e" has unemployment but no sectors; the inner join leaves it out.
    assert_eq!(diagnostics.unemployment_join.right_only, 2);

    let labeled = &output.labeled;
    let cohort = |name: &str| labeled.cohort_of(&MsaId::Name(name.to_string()));
    assert_eq!(cohort("b"), Some(CohortLabel::Q1));
    assert_eq!(cohort("a"), Some(CohortLabel::Q2));
    assert_eq!(cohort("c"), Some(CohortLabel::Q3));
    assert_eq!(cohort("d"), Some(CohortLabel::Q4));
    assert_eq!(labeled.rows.len(), 8);

    let expected = [
        (CohortLabel::Q1, -1.0),
        (CohortLabel::Q2, -0.8),
        (CohortLabel::Q3, 0.3),
        (CohortLabel::Q4, -0.5),
    ];
    for (label, want) in expected {
        let got = output.delta.get(label).unwrap().delta.unwrap();
        assert!((got - want).abs() < 1e-9, "{label}: {got} vs {want}");
    }

    // Monthly cohort means over the base year: Q1 is msa "b" at 9.5 then 10.5.
    let q1: Vec<f64> = output
        .cohort_monthly
        .points
        .iter()
        .filter(|point| point.cohort == CohortLabel::Q1)
        .filter_map(|point| point.mean_rate)
        .collect();
    assert_eq!(q1, vec![9.5, 10.5]);
    assert_eq!(output.cohort_monthly.unlabeled_observations, 2);
    assert!(output.effects.is_none());
    assert!(output.geography.is_none());
}

#[test]
fn quantile_with_zero_right_join_labels_filled_msas_zero() {
    let mut config = PipelineConfig::default();
    config.cohort_policy = CohortPolicy::QuantileWithZero;
    config.panel.unemployment_join = UnemploymentJoin::Right;

    let output = run(inputs(), &config).unwrap();
    assert_eq!(output.panel_diagnostics.filled_rows, 2);

    let labeled = &output.labeled;
    assert_eq!(labeled.exclusions.filled_zero_rows, 1);
    assert_eq!(
        labeled.cohort_of(&MsaId::Name("e".to_string())),
        Some(CohortLabel::Zero)
    );
    let filled: Vec<_> = labeled
        .rows
        .iter()
        .filter(|row| row.row.coverage == SectorCoverage::Filled)
        .collect();
    assert_eq!(filled.len(), 2);
    assert!(filled.iter().all(|row| row.share == 0.0));

    let zero = output.delta.get(CohortLabel::Zero).unwrap();
    assert_eq!((zero.rows_a, zero.rows_b), (1, 1));
    assert!((zero.delta.unwrap() - -1.0).abs() < 1e-9);
    assert_eq!(output.delta.deltas.len(), 4);
}

#[test]
fn unmatched_unemployment_keys_are_an_integrity_error() {
    let mut inputs = inputs();
    for obs in &mut inputs.unemployment {
        obs.msa_key = format!("elsewhere {}", obs.msa_key);
    }
    let err = run(inputs, &PipelineConfig::default()).unwrap_err();
    match err {
        PanelError::JoinIntegrity {
            left_key,
            right_key,
            left_sample,
            right_sample,
            ..
        } => {
            assert!(left_key.contains("msa_sectors"));
            assert!(right_key.contains("unemployment"));
            assert!(!left_sample.is_empty());
            assert!(!right_sample.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn fips_keyed_panel_matches_name_keyed_panel() {
    let mut config = PipelineConfig::default();
    config.panel.msa_scheme = msa_panel::data::MsaKeyScheme::Fips;
    let by_code = run(inputs(), &config).unwrap();
    let by_name = run(inputs(), &PipelineConfig::default()).unwrap();
    let deltas = |output: &msa_panel::pipeline::PipelineOutput| {
        output
            .delta
            .deltas
            .iter()
            .map(|d| (d.cohort, d.delta.map(|v| (v * 1e9).round())))
            .collect::<Vec<_>>()
    };
    assert_eq!(deltas(&by_code), deltas(&by_name));
}

#[test]
fn panel_report_cli_runs_over_input_dir() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    fs::write(
        dir.path().join("direct_effects.json"),
        r#"[{"msa_fips": 10000, "direct": 120}, {"msa_fips": 40000, "direct": -80}, {"msa_fips": null, "direct": 5}]"#,
    )
    .unwrap();
    let config_path = dir.path().join("pipeline.json");
    fs::write(&config_path, r#"{"panel": {"years": [2005, 2006]}}"#).unwrap();

    let args = vec![
        "--inputs".to_string(),
        dir.path().display().to_string(),
        "--config".to_string(),
        config_path.display().to_string(),
        "--policy".to_string(),
        "quartile".to_string(),
    ];
    run_panel_report(args.into_iter()).unwrap();

    let json_args = vec![
        "--inputs".to_string(),
        dir.path().display().to_string(),
        "--json".to_string(),
    ];
    run_panel_report(json_args.into_iter()).unwrap();
}

#[test]
fn bad_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let config_path = dir.path().join("pipeline.json");
    fs::write(&config_path, r#"{"base_year": 2006, "comparison_year": 2006}"#).unwrap();
    let args = vec![
        "--inputs".to_string(),
        dir.path().display().to_string(),
        "--config".to_string(),
        config_path.display().to_string(),
    ];
    assert!(run_panel_report(args.into_iter()).is_err());
}

#[test]
fn boundary_files_reach_the_geometry_join() {
    let columns = ColumnMapping::default();
    let mut inputs = inputs()
        .with_geometry(
            &FeatureTable::from_geojson_str("states", &states_geojson()).unwrap(),
            &FeatureTable::from_geojson_str("msas", &msas_geojson()).unwrap(),
            &columns,
        )
        .unwrap();
    inputs.direct_effects = vec![
        DirectEffectRecord {
            msa_fips: Some(MsaCode::new(10000)),
            direct: Some(120.0),
        },
        DirectEffectRecord {
            msa_fips: Some(MsaCode::new(40000)),
            direct: Some(-80.0),
        },
        DirectEffectRecord {
            msa_fips: Some(MsaCode::new(55555)),
            direct: Some(3.0),
        },
    ];

    let output = run(inputs, &PipelineConfig::default()).unwrap();
    let geography = output.geography.expect("geometry branch ran");
    assert_eq!(geography.records.len(), 3);
    assert_eq!(geography.dropped_analysis_rows, 1);
    assert_eq!(geography.dropped_sample, vec!["55555".to_string()]);

    let record = |code: u32| {
        geography
            .records
            .iter()
            .find(|record| record.cbsa_fips == MsaCode::new(code))
            .unwrap()
    };
    assert_eq!(record(10000).value, Some(120.0));
    assert_eq!(record(10000).region_class, RegionClass::Continental);
    assert_eq!(record(40000).value, Some(-80.0));
    assert_eq!(record(40000).territory_states, vec!["AK".to_string()]);
    assert_eq!(record(77777).value, None);
    assert_eq!(record(77777).geometry.0[0].exterior().0.len(), 5);
    assert_eq!(geography.value_range(), Some((-80.0, 120.0)));
}

#[test]
fn geometry_mismatch_does_not_abort_the_run() {
    let shapes = feature_collection(&[square_feature(r#"{"CBSAFP": "00100"}"#, 1.0, 1.0, 1.0)]);
    // Without direct effects the base-year shares are mapped; none has a shape.
    let inputs = inputs()
        .with_geometry(
            &FeatureTable::from_geojson_str("states", &states_geojson()).unwrap(),
            &FeatureTable::from_geojson_str("msas", &shapes).unwrap(),
            &ColumnMapping::default(),
        )
        .unwrap();
    let output = run(inputs, &PipelineConfig::default()).unwrap();
    let geography = output.geography.unwrap();
    assert_eq!(geography.records.len(), 1);
    assert_eq!(geography.records[0].value, None);
    let coded = output
        .labeled
        .assignments
        .iter()
        .filter(|assignment| assignment.msa_fips.is_some())
        .count();
    assert!(coded > 0);
    assert_eq!(geography.dropped_analysis_rows, coded);
    assert!(geography.diagnostics.matched_nothing());
}

#[test]
fn panel_report_cli_reads_boundary_files() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    fs::write(dir.path().join("states.geojson"), states_geojson()).unwrap();
    fs::write(dir.path().join("msas.geojson"), msas_geojson()).unwrap();
    let args = vec!["--inputs".to_string(), dir.path().display().to_string()];
    run_panel_report(args.into_iter()).unwrap();

    fs::write(dir.path().join("msas.geojson"), r#"{"type": "FeatureCollection""#).unwrap();
    let args = vec!["--inputs".to_string(), dir.path().display().to_string()];
    assert!(run_panel_report(args.into_iter()).is_err());
}
