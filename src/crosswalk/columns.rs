use anyhow::{Result, bail};
use polars::frame::DataFrame;

use crate::common::{read_csv_bytes_as_strings, string_column};

use super::WeightRow;

// Known spellings of each logical column across weight-table vintages, tried in order.
// Matching is case-insensitive.
pub const ZIP_COLUMNS: &[&str] = &["zip", "zip5", "zip_code", "zipcode", "zcta5"];
pub const COUNTY_COLUMNS: &[&str] = &["county", "county_fips", "countyfp", "cnty_fips", "county_geoid"];
pub const TRACT_COLUMNS: &[&str] = &["tract", "tract_code", "tractce", "tract_geoid", "geoid"];
pub const STATE_COLUMNS: &[&str] = &["state", "state_fips", "statefp", "st_fips"];
pub const RES_RATIO_COLUMNS: &[&str] = &["res_ratio", "residential_ratio", "weight_res", "res_rat"];
pub const TOT_RATIO_COLUMNS: &[&str] = &["tot_ratio", "total_ratio", "weight_tot", "tot_rat"];

/// Actual header names of the weight table, resolved from the alias lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub zip: String,
    /// Absent in vintages that only carry a full tract GEOID.
    pub county: Option<String>,
    pub tract: String,
    pub state: Option<String>,
    pub weight_res: String,
    pub weight_tot: String,
}

impl ColumnMap {
    /// Resolve each logical field against the header. Errors name every missing field.
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Result<Self> {
        let find = |aliases: &[&str]| -> Option<String> {
            aliases.iter().find_map(|alias| headers.iter()
                .map(AsRef::as_ref)
                .find(|h| normalize_header(h) == *alias)
                .map(str::to_string))
        };

        let zip = find(ZIP_COLUMNS);
        let tract = find(TRACT_COLUMNS);
        let weight_res = find(RES_RATIO_COLUMNS);
        let weight_tot = find(TOT_RATIO_COLUMNS);

        let missing: Vec<&str> = [
            ("zip", zip.is_none()),
            ("tract", tract.is_none()),
            ("residential ratio", weight_res.is_none()),
            ("total ratio", weight_tot.is_none()),
        ].into_iter().filter_map(|(name, absent)| absent.then_some(name)).collect();

        match (zip, tract, weight_res, weight_tot) {
            (Some(zip), Some(tract), Some(weight_res), Some(weight_tot)) => Ok(Self {
                zip,
                county: find(COUNTY_COLUMNS),
                tract,
                state: find(STATE_COLUMNS),
                weight_res,
                weight_tot,
            }),
            _ => bail!(
                "weight table is missing required column(s) {}; header was [{}]",
                missing.join(", "),
                headers.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", "),
            ),
        }
    }
}

/// Lowercase, trimmed, without a UTF-8 byte order mark.
fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_ascii_lowercase()
}

/// Parse the weight table into raw rows. Only structural problems (unreadable CSV,
/// missing required columns) are errors; bad cell values are left for the mapper.
pub fn read_weight_table(bytes: &[u8]) -> Result<Vec<WeightRow>> {
    let df = read_csv_bytes_as_strings(bytes)?;
    let headers: Vec<String> = df.get_column_names().iter().map(|name| name.to_string()).collect();
    let columns = ColumnMap::resolve(&headers)?;

    let optional = |df: &DataFrame, name: &Option<String>| -> Result<Vec<Option<String>>> {
        match name {
            Some(name) => string_column(df, name),
            None => Ok(vec![None; df.height()]),
        }
    };

    let zips = string_column(&df, &columns.zip)?;
    let counties = optional(&df, &columns.county)?;
    let tracts = string_column(&df, &columns.tract)?;
    let states = optional(&df, &columns.state)?;
    let res = string_column(&df, &columns.weight_res)?;
    let tot = string_column(&df, &columns.weight_tot)?;

    Ok(zip_columns(zips, counties, tracts, states, res, tot)
        .enumerate()
        .map(|(i, (zip, county, tract, state, weight_res, weight_tot))| WeightRow {
            line: i + 2,
            zip, county, tract, state, weight_res, weight_tot,
        })
        .collect())
}

type Cells = Vec<Option<String>>;
type Row6 = (Option<String>, Option<String>, Option<String>, Option<String>, Option<String>, Option<String>);

/// Zip six equally long columns into row tuples.
fn zip_columns(a: Cells, b: Cells, c: Cells, d: Cells, e: Cells, f: Cells) -> impl Iterator<Item = Row6> {
    a.into_iter().zip(b).zip(c).zip(d).zip(e).zip(f)
        .map(|(((((a, b), c), d), e), f)| (a, b, c, d, e, f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_hud_style_headers() {
        let map = ColumnMap::resolve(&["ZIP", "COUNTY", "TRACT", "STATE", "RES_RATIO", "BUS_RATIO", "TOT_RATIO"]).unwrap();
        assert_eq!(map.zip, "ZIP");
        assert_eq!(map.county.as_deref(), Some("COUNTY"));
        assert_eq!(map.weight_res, "RES_RATIO");
        assert_eq!(map.weight_tot, "TOT_RATIO");
    }

    #[test]
    fn resolves_long_form_headers() {
        let map = ColumnMap::resolve(&["zip_code", "county_fips", "tract_code", "state_fips", "residential_ratio", "total_ratio"]).unwrap();
        assert_eq!(map.tract, "tract_code");
        assert_eq!(map.state.as_deref(), Some("state_fips"));
    }

    #[test]
    fn resolves_tiger_style_headers_with_bom() {
        let map = ColumnMap::resolve(&["\u{feff}ZIP5", "COUNTYFP", "TRACTCE", "STATEFP", "res_rat", "tot_rat"]).unwrap();
        assert_eq!(map.zip, "\u{feff}ZIP5");
        assert_eq!(map.county.as_deref(), Some("COUNTYFP"));
    }

    #[test]
    fn county_and_state_are_optional() {
        let map = ColumnMap::resolve(&["zip", "tract", "res_ratio", "tot_ratio"]).unwrap();
        assert_eq!(map.county, None);
        assert_eq!(map.state, None);
    }

    #[test]
    fn missing_columns_are_named() {
        let err = ColumnMap::resolve(&["zip", "tract"]).unwrap_err().to_string();
        assert!(err.contains("residential ratio"));
        assert!(err.contains("total ratio"));
    }

    #[test]
    fn reads_rows_with_line_numbers() {
        let csv = b"ZIP,COUNTY,TRACT,RES_RATIO,TOT_RATIO\n10456,36005,012300,0.6,0.5\n10457,,,,\n";
        let rows = read_weight_table(csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].zip.as_deref(), Some("10456"));
        assert_eq!(rows[0].tract.as_deref(), Some("012300"));
        assert_eq!(rows[0].state, None);
        assert_eq!(rows[1].line, 3);
        assert_eq!(rows[1].county, None);
    }
}
