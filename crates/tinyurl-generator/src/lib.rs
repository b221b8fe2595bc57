pub mod hashed;

pub use hashed::HashCodeGenerator;

use tinyurl_core::{NormalizedUrl, ShortCode};

/// Trait for generating short code candidates.
///
/// Implementations are pure functions of `(url, salt)`: the same inputs always
/// produce the same code, with no hidden randomness or clock dependency.
/// Uniqueness is not the generator's concern; a caller that hits a collision
/// asks again with the next salt.
pub trait CodeGenerator: Send + Sync + 'static {
    fn generate(&self, url: &NormalizedUrl, salt: u32) -> ShortCode;
}
