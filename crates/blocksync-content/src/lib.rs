//! Canonical formatting of exported artifact markup
//!
//! The external environment re-serializes artifacts with cosmetic noise
//! (attribute order, indentation, line endings, byte-order marks). This
//! crate reduces that text to one canonical form so content hashes stay
//! stable across re-exports and version-control diffs only show real
//! changes.
//!
//! ```
//! use blocksync_content::ContentNormalizer;
//!
//! let normalizer = ContentNormalizer::new();
//! let a = normalizer.normalize("<Block b=\"2\" a=\"1\"/>").unwrap();
//! let b = normalizer.normalize("<Block  a=\"1\"\n  b=\"2\" />").unwrap();
//! assert_eq!(a, b);
//! ```

pub mod error;
pub mod normalize;
pub mod scrub;

pub use error::{Error, Result};
pub use normalize::ContentNormalizer;
pub use scrub::{ScrubRule, Scrubber};
