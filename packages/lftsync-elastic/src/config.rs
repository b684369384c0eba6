use std::time::Duration;

use url::Url;

use lftsync_core::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:9200";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElasticConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl ElasticConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::InvalidConfig(format!("elasticsearch url {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidConfig(format!(
                "elasticsearch url {base_url} cannot be a base"
            )));
        }
        Ok(Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve `path` (which starts with `/`) against the base url, keeping any base path prefix.
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!("{}{}", url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        url
    }
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default elasticsearch url parses"),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}
