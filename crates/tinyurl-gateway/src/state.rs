use std::sync::Arc;

use tinyurl_allocator::UrlAllocator;

#[derive(Clone)]
pub struct AppState {
    allocator: Arc<dyn UrlAllocator>,
    base_url: Option<String>,
}

impl AppState {
    /// `public_base_url` overrides the base derived from request headers.
    pub fn new(allocator: Arc<dyn UrlAllocator>, public_base_url: Option<String>) -> Self {
        Self {
            allocator,
            base_url: public_base_url,
        }
    }

    pub fn allocator(&self) -> &dyn UrlAllocator {
        self.allocator.as_ref()
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }
}
