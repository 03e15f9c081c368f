mod columns;
mod geoid;
mod mapper;
mod row;

use anyhow::{Context, Result};

pub use columns::{
    COUNTY_COLUMNS, ColumnMap, RES_RATIO_COLUMNS, STATE_COLUMNS, TOT_RATIO_COLUMNS, TRACT_COLUMNS, ZIP_COLUMNS,
    read_weight_table,
};
pub use geoid::{build_tract_geoid, normalize_county, normalize_state, normalize_tract, normalize_zip, split_tract_geoid};
pub use mapper::{DuplicateKey, MappingResult, RowIssue, RowOutcome, SkipReason, map_row, map_weight_rows};
pub use row::{CrosswalkRow, UNASSIGNED_CODE, UNASSIGNED_NAME, WeightRow};

use crate::config::Scope;

/// Parse the cached weight table and build the crosswalk rows for `scope`.
pub fn build_crosswalk(weight_table: &[u8], scope: &Scope) -> Result<MappingResult> {
    let raw = read_weight_table(weight_table).context("Failed to read weight table")?;
    Ok(map_weight_rows(&raw, scope))
}
