use std::{collections::BTreeSet, path::{Path, PathBuf}, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// A named external dataset and where its bytes are cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Short name used in logs and errors, e.g. "weights".
    pub name: String,
    pub url: String,
    /// Tried once if the primary url fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_url: Option<String>,
    /// File name under the cache directory.
    pub file_name: String,
    /// Per-source override of `Config::max_age_days`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_days: Option<u64>,
}

impl SourceFile {
    pub fn new(name: &str, url: &str, file_name: &str) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            fallback_url: None,
            file_name: file_name.into(),
            max_age_days: None,
        }
    }

    pub fn with_fallback(mut self, url: &str) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    pub fn cache_path(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join(&self.file_name)
    }

    /// Freshness window, falling back to the configured default.
    pub fn max_age(&self, default_days: u64) -> Duration {
        Duration::from_secs(self.max_age_days.unwrap_or(default_days) * SECONDS_PER_DAY)
    }
}

/// The three datasets the pipeline consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sources {
    pub weights: SourceFile,
    pub tracts: SourceFile,
    pub neighborhoods: SourceFile,
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            weights: SourceFile::new(
                "weights",
                "https://www.huduser.gov/portal/datasets/usps/ZIP_TRACT_122023.csv",
                "zip_tract.csv",
            ).with_fallback(
                "https://www.huduser.gov/portal/datasets/usps/ZIP_TRACT_092023.csv",
            ),
            tracts: SourceFile::new(
                "tracts",
                "https://raw.githubusercontent.com/uscensusbureau/citysdk/master/v2/GeoJSON/500k/2020/36/tract.json",
                "tracts_36.geojson",
            ),
            neighborhoods: SourceFile::new(
                "neighborhoods",
                "https://data.cityofnewyork.us/api/geospatial/9nt8-h7nd?method=export&format=GeoJSON",
                "nta_2020.geojson",
            ),
        }
    }
}

/// Pipeline configuration. Every key is optional in the TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Two-digit state FIPS, e.g. "36".
    pub state_fips: String,
    /// Five-digit state+county FIPS, e.g. "36005".
    pub county_fips: String,
    /// Fixed ZIP set for the county.
    pub zips: Vec<String>,
    pub cache_dir: PathBuf,
    pub out_dir: PathBuf,
    pub max_age_days: u64,
    pub timeout_secs: u64,
    /// When false, a failed fetch falls back to a stale cache entry if one exists.
    pub fail_on_error: bool,
    pub sources: Sources,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_fips: "36".into(),
            county_fips: "36005".into(),
            zips: (10451..=10475).map(|zip| zip.to_string()).collect(),
            cache_dir: PathBuf::from("data/cache"),
            out_dir: PathBuf::from("data/out"),
            max_age_days: 30,
            timeout_secs: 60,
            fail_on_error: true,
            sources: Sources::default(),
        }
    }
}

impl Config {
    /// Read a TOML configuration file; omitted keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let all_digits = |s: &str, n: usize| s.len() == n && s.bytes().all(|b| b.is_ascii_digit());

        ensure!(all_digits(&self.state_fips, 2), "state_fips must be 2 digits, got {:?}", self.state_fips);
        ensure!(all_digits(&self.county_fips, 5), "county_fips must be 5 digits, got {:?}", self.county_fips);
        ensure!(
            self.county_fips.starts_with(&self.state_fips),
            "county_fips {:?} is not in state {:?}", self.county_fips, self.state_fips,
        );
        ensure!(!self.zips.is_empty(), "zips must not be empty");
        for zip in &self.zips {
            ensure!(all_digits(zip, 5), "zip must be 5 digits, got {zip:?}");
        }
        ensure!(self.timeout_secs > 0, "timeout_secs must be positive");
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the immutable lookup table the mapping and join phases filter on.
    pub fn scope(&self) -> Scope {
        Scope {
            state_fips: self.state_fips.clone(),
            county_code: self.county_fips.get(self.county_fips.len().saturating_sub(3)..)
                .unwrap_or_default()
                .to_string(),
            zips: self.zips.iter().cloned().collect(),
        }
    }
}

/// Geographic scope of one pipeline run. Built once from `Config` and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub state_fips: String,
    /// Three-digit county code within the state.
    pub county_code: String,
    pub zips: BTreeSet<String>,
}

impl Scope {
    /// Five-digit state+county FIPS.
    pub fn county_fips(&self) -> String {
        format!("{}{}", self.state_fips, self.county_code)
    }

    pub fn contains_zip(&self, zip: &str) -> bool {
        self.zips.contains(zip)
    }

    pub fn contains_county(&self, state_fips: &str, county_code: &str) -> bool {
        self.state_fips == state_fips && self.county_code == county_code
    }
}
