use crate::CodeGenerator;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use tinyurl_core::{NormalizedUrl, ShortCode, SHORT_CODE_LENGTH};

/// Bytes of digest needed to fill [`SHORT_CODE_LENGTH`] Base64 characters
/// (6 bits each), rounded up.
const REQUIRED_BYTE_COUNT: usize = (SHORT_CODE_LENGTH * 6).div_ceil(8);

/// Hash-based generator: `base64url(sha256(url ++ salt)[..7])[..9]`.
///
/// The salt is appended as its decimal string, so salt `0` hashes
/// `"<url>0"`, salt `1` hashes `"<url>1"`, and so on.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashCodeGenerator;

impl HashCodeGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl CodeGenerator for HashCodeGenerator {
    fn generate(&self, url: &NormalizedUrl, salt: u32) -> ShortCode {
        let mut hasher = Sha256::new();
        hasher.update(url.as_str().as_bytes());
        hasher.update(salt.to_string().as_bytes());
        let digest = hasher.finalize();

        let mut encoded = URL_SAFE_NO_PAD.encode(&digest[..REQUIRED_BYTE_COUNT]);
        encoded.truncate(SHORT_CODE_LENGTH);
        ShortCode::new_unchecked(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn url(raw: &str) -> NormalizedUrl {
        NormalizedUrl::parse(raw).unwrap()
    }

    #[test]
    fn required_bytes_cover_nine_characters() {
        assert_eq!(REQUIRED_BYTE_COUNT, 7);
    }

    #[test]
    fn generates_nine_url_safe_characters() {
        let generator = HashCodeGenerator::new();
        for salt in 0..100 {
            let code = generator.generate(&url("https://spring.io/projects/spring-boot"), salt);
            assert_eq!(code.as_str().len(), SHORT_CODE_LENGTH);
            assert!(code.as_str().chars().all(ShortCode::is_alphabet_char));
            assert!(ShortCode::new(code.as_str()).is_ok());
        }
    }

    #[test]
    fn is_deterministic() {
        let generator = HashCodeGenerator::new();
        let u = url("example.com/a");
        assert_eq!(generator.generate(&u, 0), generator.generate(&u, 0));
        assert_eq!(generator.generate(&u, 7), HashCodeGenerator.generate(&u, 7));
    }

    #[test]
    fn different_salts_give_different_codes() {
        let generator = HashCodeGenerator::new();
        let u = url("https://spring.io/projects/spring-boot");
        assert_ne!(generator.generate(&u, 0), generator.generate(&u, 1));
    }

    #[test]
    fn matches_manual_digest() {
        let u = url("example.com/a");
        let digest = Sha256::digest(format!("{}0", u.as_str()).as_bytes());
        let expected = &URL_SAFE_NO_PAD.encode(&digest[..7])[..9];
        assert_eq!(HashCodeGenerator.generate(&u, 0).as_str(), expected);
    }

    #[test]
    fn salt_zero_and_one_differ_across_many_urls() {
        let generator = HashCodeGenerator::new();
        let same = (0..10_000)
            .map(|i| url(&format!("example.com/page/{i}")))
            .filter(|u| generator.generate(u, 0) == generator.generate(u, 1))
            .count();
        // 54 bits of hash make a coincidence astronomically unlikely.
        assert_eq!(same, 0);
    }

    #[test]
    fn codes_spread_over_distinct_urls() {
        let generator = HashCodeGenerator::new();
        let codes: HashSet<_> = (0..10_000)
            .map(|i| generator.generate(&url(&format!("example.com/{i}")), 0))
            .collect();
        assert_eq!(codes.len(), 10_000);
    }
}
