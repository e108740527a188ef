/// Page content together with where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub content: String,
    /// True when served from the cache without touching the network
    pub from_cache: bool,
}

impl Fetched {
    pub fn cached(content: String) -> Self {
        Self {
            content,
            from_cache: true,
        }
    }

    pub fn network(content: String) -> Self {
        Self {
            content,
            from_cache: false,
        }
    }
}
