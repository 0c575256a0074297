use std::sync::Arc;

use anyhow::{Context, Result};

use crate::unsplash::{self, Photo};

#[cfg_attr(test, mockall::automock)]
pub trait SearchService: Send + Sync {
    fn search_photos(&self, query: &str) -> Result<Vec<Photo>>;
}

pub struct UnsplashSearchService {
    client: Arc<unsplash::Client>,
}

impl UnsplashSearchService {
    pub fn new(client: Arc<unsplash::Client>) -> Self {
        Self { client }
    }
}

impl SearchService for UnsplashSearchService {
    fn search_photos(&self, query: &str) -> Result<Vec<Photo>> {
        self.client
            .search_photos(query)
            .with_context(|| format!("search photos for {query:?}"))
    }
}

/// Stand-in used when no access key is configured. Every search fails with
/// a message pointing at the missing setting.
#[derive(Default)]
pub struct UnconfiguredSearchService;

impl SearchService for UnconfiguredSearchService {
    fn search_photos(&self, _query: &str) -> Result<Vec<Photo>> {
        anyhow::bail!(
            "no Unsplash access key configured (set unsplash.access_key or PHOTO_GALLERY_UNSPLASH__ACCESS_KEY)"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_service_always_fails() {
        let err = UnconfiguredSearchService.search_photos("cats").unwrap_err();
        assert!(err.to_string().contains("access key"));
    }
}
