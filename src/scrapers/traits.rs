use crate::error::FetchError;
use async_trait::async_trait;

/// Anything that can turn a listing URL into raw page content.
/// Tests substitute fakes for the HTTP fetcher through this trait.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Retrieve the page at `url`
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    /// Get the name of the page source
    fn source_name(&self) -> &'static str;
}
