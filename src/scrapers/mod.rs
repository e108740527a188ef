pub mod cached;
pub mod fetcher;
pub mod traits;
pub mod types;

pub use cached::CachingFetcher;
pub use fetcher::HttpFetcher;
pub use traits::PageSource;
pub use types::Fetched;
