/// Constants used by key normalization.
pub mod normalize {
    /// Suffixes stripped from MSA names in the BLS unemployment source.
    pub const UNEMPLOYMENT_MSA_SUFFIXES: [&str; 2] = [" MSA", " Met NECTA"];
    /// Suffixes stripped from MSA names in the geographic crosswalk.
    ///
    /// Order matters: the full `Statistical Area` forms must be removed before
    /// the truncated `Statistical` forms.
    pub const CROSSWALK_MSA_SUFFIXES: [&str; 4] = [
        " Metropolitan Statistical Area",
        " Micropolitan Statistical Area",
        " Metropolitan Statistical",
        " Micropolitan Statistical",
    ];
    /// Separator inserted between county name and state code (`Autauga, AL`).
    pub const COUNTY_STATE_SEPARATOR: &str = ", ";
}

/// Constants used when preparing the county-MSA crosswalk.
pub mod crosswalk {
    /// Value used by the crosswalk for counties outside any MSA.
    pub const NO_MSA_SENTINEL: &str = "99999";
}

/// Default loader column names (lower-cased, trimmed).
pub mod columns {
    /// County name column in the wide county-sector table.
    pub const SECTOR_COUNTY: &str = "geoname";
    /// Sector description column in the wide county-sector table.
    pub const SECTOR_DESCRIPTION: &str = "description";

    /// County name column in the crosswalk.
    pub const CROSSWALK_COUNTY: &str = "cntyname";
    /// County FIPS column in the crosswalk.
    pub const CROSSWALK_COUNTY_FIPS: &str = "county";
    /// MSA name column in the crosswalk.
    pub const CROSSWALK_MSA: &str = "cbsaname10";
    /// MSA CBSA code column in the crosswalk.
    pub const CROSSWALK_MSA_FIPS: &str = "cbsa10";

    /// MSA name column in the unemployment series.
    pub const UNEMPLOYMENT_MSA: &str = "area";
    /// MSA CBSA code column in the unemployment series.
    pub const UNEMPLOYMENT_MSA_FIPS: &str = "area fips code";
    /// Year column in the unemployment series.
    pub const UNEMPLOYMENT_YEAR: &str = "year";
    /// Month column in the unemployment series.
    pub const UNEMPLOYMENT_MONTH: &str = "month";
    /// Rate column in the unemployment series.
    pub const UNEMPLOYMENT_RATE: &str = "unemployment rate";

    /// MSA code column in the direct-effect table.
    pub const EFFECT_MSA_FIPS: &str = "msa_fips";
    /// Net direct effect column in the direct-effect table.
    pub const EFFECT_DIRECT: &str = "direct";

    /// State FIPS property of the state boundary features.
    pub const STATE_GEOID: &str = "geoid";
    /// Postal code property of the state boundary features.
    pub const STATE_POSTAL: &str = "stusps";
    /// Name property of state and MSA boundary features.
    pub const SHAPE_NAME: &str = "name";
    /// CBSA code property of the MSA boundary features.
    pub const MSA_SHAPE_FIPS: &str = "cbsafp";
}

/// Default analysis window.
pub mod analysis {
    /// Year whose shares define the cohorts.
    pub const DEFAULT_BASE_YEAR: i32 = 2005;
    /// Year compared against the base year.
    pub const DEFAULT_COMPARISON_YEAR: i32 = 2006;
}

/// Constants used by cohort assignment.
pub mod cohort {
    /// Percentiles used by the quartile policy.
    pub const QUARTILE_PERCENTILES: [f64; 3] = [25.0, 50.0, 75.0];
    /// Percentiles used by the quantile-with-zero policy (non-zero subset only).
    pub const TERTILE_PERCENTILES: [f64; 2] = [33.33, 66.67];
}

/// Constants used by join diagnostics.
pub mod join {
    /// Max number of unmatched keys kept per side in diagnostics.
    pub const UNMATCHED_SAMPLE_LIMIT: usize = 5;
}

/// Constants used by geographic harmonization.
pub mod geography {
    /// Version tag of [`HISTORICAL_FIPS_REMAP`].
    pub const FIPS_REMAP_VERSION: &str = "cbsa-2019-new-england-v1";
    /// Old to new MSA CBSA codes for New England NECTAs and Dayton, OH.
    pub const HISTORICAL_FIPS_REMAP: [(u32, u32); 12] = [
        (19380, 19660), // Dayton, OH
        (70750, 12700), // Bangor, ME
        (70900, 12940), // Barnstable, MA
        (71650, 12700), // Boston, MA
        (71950, 14860), // Bridgeport, CT
        (72400, 15540), // Burlington, VT
        (73450, 25860), // Hartford, CT
        (75700, 35380), // New Haven, CT
        (76450, 35980), // Norwich, CT
        (76750, 38860), // Portland, ME
        (77200, 39300), // Providence, RI
        (78100, 44140), // Springfield, MA
    ];
    /// States with a numeric GEOID above this value are territories.
    pub const TERRITORY_GEOID_THRESHOLD: u32 = 60;
    /// Postal codes always treated as territories regardless of GEOID.
    pub const TERRITORY_POSTAL_EXCEPTIONS: [&str; 2] = ["HI", "AK"];
}
