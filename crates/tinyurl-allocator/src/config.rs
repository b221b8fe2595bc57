use std::time::Duration;
use typed_builder::TypedBuilder;

/// Default number of salted attempts before giving up on a URL.
pub const DEFAULT_COLLISION_LIMIT: u32 = 100;

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Tunables of the [`Allocator`](crate::Allocator).
#[derive(Debug, Clone, TypedBuilder)]
pub struct AllocatorConfig {
    /// Salts `0..collision_limit` are tried before the call fails.
    #[builder(default = DEFAULT_COLLISION_LIMIT)]
    pub collision_limit: u32,
    /// Timeout applied to every store call.
    #[builder(default = DEFAULT_STORE_TIMEOUT)]
    pub store_timeout: Duration,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
