use std::{cell::RefCell, collections::HashMap, time::Duration};

use anyhow::{Context, Result, anyhow};
use reqwest::{blocking::Client, redirect::Policy};

/// Retrieves raw bytes for a url. The only seam through which the pipeline touches the network.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP fetcher: one redirect hop, fixed per-request timeout.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ntawalk/", env!("CARGO_PKG_VERSION")))
            .redirect(Policy::limited(1))
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(url)
            .send()
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url} returned error status"))?;

        let bytes = resp.bytes().with_context(|| format!("read body of {url}"))?;
        Ok(bytes.to_vec())
    }
}

/// In-memory fetcher keyed by url. Unknown urls fail like a 404.
/// Records every requested url so callers can check whether the network was touched.
#[derive(Default)]
pub struct MemFetcher {
    files: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<String>>,
}

impl MemFetcher {
    pub fn new(files: HashMap<String, Vec<u8>>) -> Self {
        Self { files, requests: RefCell::default() }
    }

    pub fn with(mut self, url: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(url.to_string(), bytes.into());
        self
    }

    /// Urls requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl Fetcher for MemFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.borrow_mut().push(url.to_string());
        self.files.get(url).cloned()
            .ok_or_else(|| anyhow!("GET {url} returned error status: 404 Not Found"))
    }
}
