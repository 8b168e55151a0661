//! Filesystem primitives for blocksync
//!
//! Provides forward-slash normalized paths, atomic locked writes,
//! content checksums and the fixed metadata locations under an output root.

pub mod checksum;
pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod path;

pub use checksum::{checksums_match, compute_content_checksum};
pub use config::ConfigStore;
pub use constants::MetaPath;
pub use error::{Error, Result};
pub use io::RobustnessConfig;
pub use path::{NormalizedPath, canonical_root};
