use std::{fmt, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{common::{file_age, write_atomic}, config::SourceFile, error::FetchError};

use super::Fetcher;

/// How `ensure_fresh` decides between cache and network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Default freshness window in days (sources may override).
    pub max_age_days: u64,
    /// When false, a failed fetch falls back to an existing (possibly stale) cache entry.
    pub fail_on_error: bool,
    /// Ignore freshness and always fetch.
    pub force: bool,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self { max_age_days: 30, fail_on_error: true, force: false }
    }
}

/// Where the returned bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// Cached copy younger than the freshness window.
    Fresh,
    /// Downloaded from the primary url.
    Fetched,
    /// Primary failed; downloaded from the fallback url.
    FetchedFallback,
    /// All fetches failed; an expired cached copy was used.
    Stale,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CacheStatus::Fresh => "fresh",
            CacheStatus::Fetched => "fetched",
            CacheStatus::FetchedFallback => "fetched-fallback",
            CacheStatus::Stale => "stale",
        })
    }
}

/// Bytes of one source plus how they were obtained.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub status: CacheStatus,
}

/// Return the bytes of `source`, from cache if fresh, otherwise from the network.
/// Downloaded bytes are written to the cache before being returned, so a cached run
/// and a fetched run see identical input.
pub fn ensure_fresh(
    source: &SourceFile,
    cache_dir: &Path,
    policy: &FetchPolicy,
    fetcher: &dyn Fetcher,
) -> Result<Fetched> {
    let path = source.cache_path(cache_dir);
    let max_age = source.max_age(policy.max_age_days);
    let age = file_age(&path);

    if !policy.force {
        if let Some(age) = age.filter(|age| *age < max_age) {
            debug!(source = %source.name, path = %path.display(), age_secs = age.as_secs(), "cache hit");
            let bytes = std::fs::read(&path)
                .with_context(|| format!("read cached source {}", path.display()))?;
            return Ok(Fetched { bytes, status: CacheStatus::Fresh });
        }
    }

    match fetch_with_fallback(source, fetcher) {
        Ok((bytes, status)) => {
            write_atomic(&path, &bytes)
                .with_context(|| format!("cache source `{}` at {}", source.name, path.display()))?;
            info!(source = %source.name, bytes = bytes.len(), %status, path = %path.display(), "cached");
            Ok(Fetched { bytes, status })
        }
        Err(cause) if !policy.fail_on_error => {
            if age.is_none() {
                return Err(FetchError::NoCache {
                    source_name: source.name.clone(),
                    path: path.display().to_string(),
                    cause: format!("{cause:#}"),
                }.into());
            }
            warn!(source = %source.name, path = %path.display(), error = %format!("{cause:#}"), "fetch failed, using stale cache");
            let bytes = std::fs::read(&path)
                .with_context(|| format!("read stale cached source {}", path.display()))?;
            Ok(Fetched { bytes, status: CacheStatus::Stale })
        }
        Err(cause) => Err(cause),
    }
}

/// Try the primary url, then the fallback url (if any) exactly once.
fn fetch_with_fallback(source: &SourceFile, fetcher: &dyn Fetcher) -> Result<(Vec<u8>, CacheStatus)> {
    info!(source = %source.name, url = %source.url, "fetching");
    let primary = match fetcher.fetch(&source.url) {
        Ok(bytes) => return Ok((bytes, CacheStatus::Fetched)),
        Err(err) => err,
    };

    let Some(fallback) = &source.fallback_url else {
        return Err(FetchError::Failed {
            source_name: source.name.clone(),
            url: source.url.clone(),
            cause: format!("{primary:#}"),
        }.into());
    };

    warn!(source = %source.name, url = %source.url, error = %format!("{primary:#}"), "primary fetch failed, trying fallback");
    fetcher.fetch(fallback)
        .map(|bytes| (bytes, CacheStatus::FetchedFallback))
        .map_err(|err| FetchError::Failed {
            source_name: source.name.clone(),
            url: fallback.clone(),
            cause: format!("{err:#} (primary {}: {primary:#})", source.url),
        }.into())
}

#[cfg(test)]
mod tests {
    use std::{fs::File, time::{Duration, SystemTime}};

    use super::*;
    use crate::acquire::MemFetcher;

    fn source() -> SourceFile {
        SourceFile::new("weights", "https://primary/w.csv", "w.csv")
            .with_fallback("https://fallback/w.csv")
    }

    fn age_file(path: &Path, days: u64) {
        let then = SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60);
        File::options().write(true).open(path).unwrap().set_modified(then).unwrap();
    }

    #[test]
    fn fresh_cache_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("w.csv"), b"cached").unwrap();
        let fetcher = MemFetcher::default().with("https://primary/w.csv", "remote");

        let got = ensure_fresh(&source(), dir.path(), &FetchPolicy::default(), &fetcher).unwrap();
        assert_eq!(got.bytes, b"cached");
        assert_eq!(got.status, CacheStatus::Fresh);
        assert!(fetcher.requests().is_empty());
    }

    #[test]
    fn expired_cache_is_refetched_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.csv");
        std::fs::write(&path, b"old").unwrap();
        age_file(&path, 31);
        let fetcher = MemFetcher::default().with("https://primary/w.csv", "new");

        let got = ensure_fresh(&source(), dir.path(), &FetchPolicy::default(), &fetcher).unwrap();
        assert_eq!(got.status, CacheStatus::Fetched);
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn force_ignores_freshness() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("w.csv"), b"cached").unwrap();
        let fetcher = MemFetcher::default().with("https://primary/w.csv", "remote");
        let policy = FetchPolicy { force: true, ..FetchPolicy::default() };

        let got = ensure_fresh(&source(), dir.path(), &policy, &fetcher).unwrap();
        assert_eq!(got.bytes, b"remote");
    }

    #[test]
    fn fallback_used_once_when_primary_fails() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemFetcher::default().with("https://fallback/w.csv", "mirror");

        let got = ensure_fresh(&source(), dir.path(), &FetchPolicy::default(), &fetcher).unwrap();
        assert_eq!(got.status, CacheStatus::FetchedFallback);
        assert_eq!(got.bytes, b"mirror");
        assert_eq!(fetcher.requests(), vec!["https://primary/w.csv", "https://fallback/w.csv"]);
    }

    #[test]
    fn both_failing_names_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemFetcher::default();

        let err = ensure_fresh(&source(), dir.path(), &FetchPolicy::default(), &fetcher).unwrap_err();
        let fetch_err = err.downcast_ref::<FetchError>().expect("FetchError");
        assert!(matches!(fetch_err, FetchError::Failed { source_name, .. } if source_name == "weights"));
        assert!(!dir.path().join("w.csv").exists());
    }

    #[test]
    fn stale_cache_used_when_tolerant() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.csv");
        std::fs::write(&path, b"old").unwrap();
        age_file(&path, 90);
        let policy = FetchPolicy { fail_on_error: false, ..FetchPolicy::default() };

        let got = ensure_fresh(&source(), dir.path(), &policy, &MemFetcher::default()).unwrap();
        assert_eq!(got.status, CacheStatus::Stale);
        assert_eq!(got.bytes, b"old");
    }

    #[test]
    fn stale_cache_rejected_when_strict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.csv");
        std::fs::write(&path, b"old").unwrap();
        age_file(&path, 90);

        assert!(ensure_fresh(&source(), dir.path(), &FetchPolicy::default(), &MemFetcher::default()).is_err());
    }

    #[test]
    fn tolerant_without_cache_still_fails() {
        let dir = tempfile::tempdir().unwrap();
        let policy = FetchPolicy { fail_on_error: false, ..FetchPolicy::default() };

        let err = ensure_fresh(&source(), dir.path(), &policy, &MemFetcher::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<FetchError>(), Some(FetchError::NoCache { .. })));
    }
}
