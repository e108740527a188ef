use crate::cache::PageCache;
use crate::error::FetchError;
use crate::scrapers::traits::PageSource;
use crate::scrapers::types::Fetched;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cache-then-fetch. The network is only touched on a cache miss, and every
/// successful download is written to the cache before it is returned.
#[derive(Clone)]
pub struct CachingFetcher {
    cache: Arc<dyn PageCache>,
    source: Arc<dyn PageSource>,
}

impl CachingFetcher {
    pub fn new(cache: Arc<dyn PageCache>, source: Arc<dyn PageSource>) -> Self {
        Self { cache, source }
    }

    pub async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        if let Some(content) = self.cache.get(url).await {
            debug!("Using cached page for {}", url);
            return Ok(Fetched::cached(content));
        }

        debug!("Cache miss for {}, fetching from {}", url, self.source.source_name());
        let content = self.source.fetch(url).await?;

        if let Err(e) = self.cache.put(url, &content).await {
            warn!("Failed to cache page for {}: {}", url, e);
        }

        Ok(Fetched::network(content))
    }
}
