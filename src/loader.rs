//! Document loading: local files and HTTP(S) URLs
//!
//! One call to [`DocumentLoader::load`] performs exactly one read or one
//! GET. Deduplication is the resolver's job.

use crate::error::{Error, Result};
use crate::tree::{parse_document, Node};
use clap::Args;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use url::Url;

/// Loader settings
#[derive(Args, Debug, Clone)]
pub struct LoaderConfig {
    /// Timeout per network fetch in milliseconds
    #[arg(long = "timeout", env = "REF_RESOLVE_TIMEOUT_MS", default_value = "30000")]
    pub timeout_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

/// Where a document lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Url(Url),
    Path(PathBuf),
}

impl Locator {
    /// Classify a path-or-URL string.
    ///
    /// `scheme://...` strings are URLs, except `file://` which maps to a
    /// local path. Everything else (including `C:\...`) is a path.
    pub fn parse(raw: &str) -> Locator {
        match Url::parse(raw) {
            Ok(url) if has_authority_marker(raw, &url) => {
                if url.scheme() == "file" {
                    if let Ok(path) = url.to_file_path() {
                        return Locator::Path(path);
                    }
                }
                Locator::Url(url)
            }
            _ => Locator::Path(PathBuf::from(raw)),
        }
    }

    /// Locate `relative` against the directory containing `self`.
    ///
    /// URLs and absolute paths are returned as-is.
    pub fn join(&self, relative: &str) -> Result<Locator> {
        let rel_path = match Locator::parse(relative) {
            Locator::Path(p) if p.is_relative() => p,
            target => return Ok(target),
        };

        match self {
            Locator::Url(base) => base
                .join(relative)
                .map(Locator::Url)
                .map_err(|e| Error::Network {
                    url: base.to_string(),
                    message: format!("cannot join '{}': {}", relative, e),
                }),
            Locator::Path(base) => {
                let dir = base.parent().unwrap_or_else(|| Path::new(""));
                Ok(Locator::Path(dir.join(rel_path)))
            }
        }
    }

    /// Canonical identity: the URL, or the absolute path.
    pub fn identity(&self) -> String {
        match self {
            Locator::Url(url) => url.to_string(),
            Locator::Path(path) => std::path::absolute(path)
                .unwrap_or_else(|_| path.clone())
                .display()
                .to_string(),
        }
    }

    pub fn is_url(&self) -> bool {
        matches!(self, Locator::Url(_))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Url(url) => write!(f, "{}", url),
            Locator::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

fn has_authority_marker(raw: &str, url: &Url) -> bool {
    raw.get(url.scheme().len()..)
        .is_some_and(|rest| rest.starts_with("://"))
}

/// A parsed document and the identity it was loaded under
#[derive(Debug)]
pub struct ResolvedDocument {
    pub identity: String,
    pub root: Node,
}

/// Reads files and fetches URLs, then parses them into trees
pub struct DocumentLoader {
    client: reqwest::Client,
    timeout_ms: u64,
}

impl DocumentLoader {
    pub fn new(config: &LoaderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            timeout_ms: config.timeout_ms,
        })
    }

    pub async fn load(&self, locator: &Locator) -> Result<ResolvedDocument> {
        let identity = locator.identity();
        let bytes = match locator {
            Locator::Path(path) => {
                info!("reading {}", path.display());
                tokio::fs::read(path).await.map_err(|source| Error::Io {
                    path: path.display().to_string(),
                    source,
                })?
            }
            Locator::Url(url) => self.fetch(url).await?,
        };

        let root = parse_document(&bytes).map_err(|e| Error::Parse {
            locator: identity.clone(),
            message: e.to_string(),
        })?;

        Ok(ResolvedDocument { identity, root })
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Network {
                url: url.to_string(),
                message: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        info!("fetching {}", url);
        let network_error = |e: reqwest::Error| Error::Network {
            url: url.to_string(),
            message: if e.is_timeout() {
                format!("timed out after {} ms", self.timeout_ms)
            } else {
                e.to_string()
            },
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network {
                url: url.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let body = response.bytes().await.map_err(network_error)?;
        Ok(body.to_vec())
    }
}
