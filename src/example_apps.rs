use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum, error::ErrorKind};
use tracing_subscriber::EnvFilter;

use crate::cohort::CohortPolicy;
use crate::config::PipelineConfig;
use crate::data::{Sector, Year};
use crate::panel::UnemploymentJoin;
use crate::pipeline::{PipelineInputs, PipelineOutput, run};
use crate::table::{FeatureTable, RawTable};

const PROGRAM_NAME: &str = "panel_report";
/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "msa_panel=warn";

/// File names looked up under `--inputs`.
const COUNTY_SECTORS_FILE: &str = "county_sectors.json";
const CROSSWALK_FILE: &str = "crosswalk.json";
const UNEMPLOYMENT_FILE: &str = "unemployment.json";
const DIRECT_EFFECTS_FILE: &str = "direct_effects.json";
const STATES_FILE: &str = "states.geojson";
const MSAS_FILE: &str = "msas.geojson";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Quartile,
    QuantileWithZero,
}

impl From<PolicyArg> for CohortPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Quartile => CohortPolicy::Quartile,
            PolicyArg::QuantileWithZero => CohortPolicy::QuantileWithZero,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = PROGRAM_NAME,
    disable_help_subcommand = true,
    about = "Build the MSA panel and report cohort deltas",
    long_about = "Fuse county sector employment, the county-MSA crosswalk and MSA unemployment into an MSA-year panel, label MSAs by base-year sector share and print the per-cohort unemployment change.",
    after_help = "Input tables are JSON arrays of row objects. direct_effects.json is optional; when present the net gain/loss monthly profile is reported too. states.geojson and msas.geojson are optional; when both are present the continental/territory map join is reported."
)]
/// CLI for `panel_report`.
///
/// Common usage:
/// - `--inputs data/` with `county_sectors.json`, `crosswalk.json`, `unemployment.json`
/// - `--config pipeline.json` for column names, suffix lists and the remap table
/// - `--policy quantile-with-zero --right-join` for the zero-fill dashboard view
struct PanelReportCli {
    #[arg(long, value_name = "DIR", help = "Directory holding the input tables")]
    inputs: PathBuf,
    #[arg(long, value_name = "FILE", help = "Optional JSON pipeline config")]
    config: Option<PathBuf>,
    #[arg(long, value_enum, help = "Cohort policy override")]
    policy: Option<PolicyArg>,
    #[arg(long, value_name = "SECTOR", help = "Metric sector override, e.g. military")]
    sector: Option<String>,
    #[arg(long = "base-year", help = "Base year override")]
    base_year: Option<Year>,
    #[arg(long = "compare-year", help = "Comparison year override")]
    compare_year: Option<Year>,
    #[arg(
        long = "right-join",
        help = "Keep every unemployment MSA-year, zero-filling missing sectors"
    )]
    right_join: bool,
    #[arg(long, help = "Print the delta table as JSON instead of text")]
    json: bool,
}

/// Run the `panel_report` CLI over `args_iter` (without the program name).
pub fn run_panel_report<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_logging();

    let Some(cli) = parse_report_args(args_iter)? else {
        return Ok(());
    };

    let config = resolve_config(&cli)?;
    let inputs = load_inputs(&cli.inputs, &config)?;
    let output = run(inputs, &config)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output.delta)?);
    } else {
        print_report(&config, &output);
    }
    Ok(())
}

fn resolve_config(cli: &PanelReportCli) -> Result<PipelineConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_path(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(policy) = cli.policy {
        config.cohort_policy = policy.into();
    }
    if let Some(sector) = &cli.sector {
        config.metric_sector = Sector::parse(sector);
    }
    if let Some(year) = cli.base_year {
        config.base_year = year;
    }
    if let Some(year) = cli.compare_year {
        config.comparison_year = year;
    }
    if cli.right_join {
        config.panel.unemployment_join = UnemploymentJoin::Right;
    }
    config.validate()?;
    Ok(config)
}

fn load_inputs(dir: &Path, config: &PipelineConfig) -> Result<PipelineInputs, Box<dyn Error>> {
    let county_sectors =
        RawTable::from_json_path("county_sectors", &dir.join(COUNTY_SECTORS_FILE))?;
    let crosswalk = RawTable::from_json_path("crosswalk", &dir.join(CROSSWALK_FILE))?;
    let unemployment = RawTable::from_json_path("unemployment", &dir.join(UNEMPLOYMENT_FILE))?;
    let effects_path = dir.join(DIRECT_EFFECTS_FILE);
    let direct_effects = if effects_path.is_file() {
        Some(RawTable::from_json_path("direct_effects", &effects_path)?)
    } else {
        None
    };
    let inputs = PipelineInputs::from_tables(
        &county_sectors,
        &crosswalk,
        &unemployment,
        direct_effects.as_ref(),
        &config.columns,
    )?;

    let (states_path, msas_path) = (dir.join(STATES_FILE), dir.join(MSAS_FILE));
    if !(states_path.is_file() && msas_path.is_file()) {
        return Ok(inputs);
    }
    let states = FeatureTable::from_geojson_path("states", &states_path)?;
    let msas = FeatureTable::from_geojson_path("msas", &msas_path)?;
    Ok(inputs.with_geometry(&states, &msas, &config.columns)?)
}

fn print_report(config: &PipelineConfig, output: &PipelineOutput) {
    let diagnostics = &output.panel_diagnostics;
    println!("=== msa panel report ===");
    println!(
        "metric: {} share, base year {}, policy {:?}",
        config.metric_sector, config.base_year, config.cohort_policy
    );
    println!();

    println!("[JOINS]");
    for join in [&diagnostics.county_join, &diagnostics.unemployment_join] {
        println!(
            "  {}: {} = {} | left {}/{} matched, right {}/{} matched, {} rows out",
            join.join,
            join.left_key,
            join.right_key,
            join.matched_left,
            join.left_rows,
            join.matched_right,
            join.right_rows,
            join.output_rows
        );
        if !join.left_only_sample.is_empty() || !join.right_only_sample.is_empty() {
            println!(
                "    unmatched sample: left {:?} right {:?}",
                join.left_only_sample, join.right_only_sample
            );
        }
    }
    println!(
        "  crosswalk: {} kept of {} ({} outside any MSA, {} duplicate)",
        diagnostics.crosswalk.kept_entries,
        diagnostics.crosswalk.input_entries,
        diagnostics.crosswalk.sentinel_entries,
        diagnostics.crosswalk.duplicate_entries
    );
    println!(
        "  panel rows: filled {}, incomplete {}, missing sector values skipped {}",
        diagnostics.filled_rows, diagnostics.incomplete_rows, diagnostics.missing_values_skipped
    );
    println!();

    let labeled = &output.labeled;
    println!("[COHORTS]");
    println!("  cutoffs: {:?}", labeled.cutoffs.values);
    println!("  labeled MSAs: {}", labeled.assignments.len());
    println!(
        "  excluded: {} undefined-share rows, {} unlabeled rows, {} zero-filled rows",
        labeled.exclusions.undefined_share_rows,
        labeled.exclusions.unlabeled_rows,
        labeled.exclusions.filled_zero_rows
    );
    println!();

    let delta = &output.delta;
    println!("[DELTA {} -> {}]", delta.year_a, delta.year_b);
    for entry in &delta.deltas {
        println!(
            "  {:<7} mean_a {:>8} mean_b {:>8} delta {:>8}  (rows {}/{})",
            entry.cohort.to_string(),
            format_optional(entry.mean_a),
            format_optional(entry.mean_b),
            format_optional(entry.delta),
            entry.rows_a,
            entry.rows_b
        );
    }

    if let Some(effects) = &output.effects {
        println!();
        println!("[DIRECT EFFECTS]");
        println!(
            "  MSAs with effects: {} (dropped {} rows without a code)",
            effects.totals.totals.len(),
            effects.totals.missing_code_rows
        );
        println!(
            "  monthly rows: {} ({} zero-filled)",
            effects.monthly.rows.len(),
            effects.monthly.filled_rows
        );
        for mean in &effects.class_means {
            println!(
                "  {} {:<20} {:>8}",
                mean.date,
                mean.class.to_string(),
                format_optional(mean.mean_rate)
            );
        }
    }

    if let Some(geography) = &output.geography {
        println!();
        println!("[GEOGRAPHY remap {}]", geography.remap_version);
        println!(
            "  MSA shapes: {} continental, {} territory ({} without a value)",
            geography.continental().count(),
            geography.territory().count(),
            geography
                .records
                .iter()
                .filter(|record| record.value.is_none())
                .count()
        );
        println!(
            "  analysis rows: {} dropped without geometry {:?}, {} merged by remap",
            geography.dropped_analysis_rows, geography.dropped_sample, geography.merged_codes
        );
        if let Some((lo, hi)) = geography.value_range() {
            println!("  value range: {lo:.3} .. {hi:.3}");
        }
    }
}

fn format_optional(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.3}"),
        None => "n/a".to_string(),
    }
}

/// Log to stderr so the report on stdout stays clean; `RUST_LOG` overrides
/// [`DEFAULT_LOG_FILTER`].
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// `Ok(None)` when `--help` was printed.
fn parse_report_args<I>(args_iter: I) -> Result<Option<PanelReportCli>, Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let argv = std::iter::once(PROGRAM_NAME.to_string()).chain(args_iter);
    match PanelReportCli::try_parse_from(argv) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) if err.kind() == ErrorKind::DisplayHelp => {
            err.print()?;
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}
