use serde::{Deserialize, Serialize};

/// Neighborhood code for tracts no neighborhood polygon claims.
pub const UNASSIGNED_CODE: &str = "UNASSIGNED";
pub const UNASSIGNED_NAME: &str = "Unassigned";

/// One raw row of the weight table, before any normalization.
/// `line` is the 1-based line number in the source file (header is line 1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightRow {
    pub line: usize,
    pub zip: Option<String>,
    pub county: Option<String>,
    pub tract: Option<String>,
    pub state: Option<String>,
    pub weight_res: Option<String>,
    pub weight_tot: Option<String>,
}

/// One (ZIP, tract) pair of the crosswalk. Field order is the output column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrosswalkRow {
    pub zip: String,
    /// Three-digit county code.
    pub county_fips: String,
    pub state_fips: String,
    /// state (2) + county (3) + tract (6).
    pub tract_geoid: String,
    /// Six-digit tract code.
    pub tract: String,
    pub weight_res: f64,
    pub weight_tot: f64,
    pub nta_code: String,
    pub nta_name: String,
}

impl CrosswalkRow {
    /// Column order of the tabular output.
    pub const COLUMNS: [&'static str; 9] = [
        "zip", "county_fips", "state_fips", "tract_geoid", "tract",
        "weight_res", "weight_tot", "nta_code", "nta_name",
    ];

    /// Identity key; unique across a valid crosswalk.
    pub fn key(&self) -> (&str, &str) {
        (&self.zip, &self.tract_geoid)
    }

    pub fn is_assigned(&self) -> bool {
        self.nta_code != UNASSIGNED_CODE
    }
}
