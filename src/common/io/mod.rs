mod csv;
mod geojson;
mod json;

pub(crate) use csv::*;
pub(crate) use geojson::*;
pub(crate) use json::*;
