//! URL-keyed page cache.
//!
//! [`DiskCache`] persists one plain HTML file per URL across runs;
//! [`MemoryCache`] keeps pages in a concurrent map and is used in tests.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

/// Key-value store for raw listing pages
#[async_trait]
pub trait PageCache: Send + Sync {
    /// Previously stored content for `url`, if any
    async fn get(&self, url: &str) -> Option<String>;

    /// Store `content` for `url`, replacing any earlier entry
    async fn put(&self, url: &str, content: &str) -> io::Result<()>;
}

/// Deterministic file name for a URL: a readable slug from the last path
/// segment plus a hash of the whole URL, query string included.
pub fn cache_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let hash: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();

    let slug: String = last_segment(url)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(60)
        .collect();

    if slug.is_empty() {
        format!("{}.html", hash)
    } else {
        format!("{}-{}.html", slug, hash)
    }
}

fn last_segment(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.trim().is_empty()).last())
            .map(str::to_string)
            .unwrap_or_else(|| parsed.host_str().unwrap_or_default().to_string()),
        Err(_) => url
            .split('/')
            .filter(|s| !s.trim().is_empty())
            .last()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Cache directory with one file per URL
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Open the cache at `dir`, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            info!("Creating cache directory {}", dir.display());
        }
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(cache_key(url))
    }
}

#[async_trait]
impl PageCache for DiskCache {
    async fn get(&self, url: &str) -> Option<String> {
        let path = self.path_for(url);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                debug!("Cache hit for {} ({})", url, path.display());
                Some(content)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Unreadable cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn put(&self, url: &str, content: &str) -> io::Result<()> {
        let path = self.path_for(url);
        // Rename keeps readers from ever seeing a half-written page
        let tmp = path.with_extension(format!("tmp-{}", std::process::id()));
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Cached {} bytes for {} at {}", content.len(), url, path.display());
        Ok(())
    }
}

/// In-memory cache
#[derive(Default)]
pub struct MemoryCache {
    store: DashMap<String, String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[async_trait]
impl PageCache for MemoryCache {
    async fn get(&self, url: &str) -> Option<String> {
        self.store.get(url).map(|entry| entry.value().clone())
    }

    async fn put(&self, url: &str, content: &str) -> io::Result<()> {
        self.store.insert(url.to_string(), content.to_string());
        Ok(())
    }
}
