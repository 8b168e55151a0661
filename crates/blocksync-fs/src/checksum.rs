//! Content hashes recorded in the manifest
//!
//! Hashes are rendered as `sha256:<lowercase hex>` so a manifest can be
//! read and diffed by hand.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

const PREFIX: &str = "sha256:";

/// Hash of `content` in `sha256:<hex>` form.
pub fn compute_content_checksum(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut rendered = String::with_capacity(PREFIX.len() + digest.len() * 2);
    rendered.push_str(PREFIX);
    for byte in digest {
        // Writing to a String cannot fail.
        let _ = write!(rendered, "{byte:02x}");
    }
    rendered
}

/// Compare two hashes, ignoring the case of hex digits.
///
/// Hand-edited manifests sometimes carry upper-case digits.
pub fn checksums_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_known_value() {
        assert_eq!(
            compute_content_checksum(""),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn one_changed_character_changes_the_hash() {
        let a = compute_content_checksum("<Member Name=\"A\"/>");
        let b = compute_content_checksum("<Member Name=\"B\"/>");
        assert_ne!(a, b);
        assert_eq!(a.len(), PREFIX.len() + 64);
    }

    #[test]
    fn match_ignores_hex_case() {
        let lower = compute_content_checksum("x");
        assert!(checksums_match(&lower, &lower.to_uppercase()));
        assert!(!checksums_match(&lower, &compute_content_checksum("y")));
    }
}
