//! Deterministic mapping from descriptors to output paths
//!
//! Export and import both resolve files exclusively through
//! [`output_file_path`], so the file export writes for a descriptor is
//! always the file import reads back.
//!
//! Layout: `<container>/<category>/<group...>/<name>__<hash8>.xml`, every
//! segment passed through [`sanitize`]. Sanitizing is lossy, so the file
//! name carries the first 8 hex digits of a SHA-256 over the descriptor's
//! logical key to keep distinct artifacts apart.
//!
//! Segments keep the case the environment reports while the hash is taken
//! over the case-folded logical key. `Motor` and `MOTOR` are one artifact
//! and get the same hash but differently cased paths:
//!
//! - On case-insensitive filesystems (Windows, default macOS) both paths
//!   name the same file, so a rename in the environment overwrites it.
//! - On case-sensitive filesystems the paths are distinct. A rename that
//!   only changes case writes a new file next to the old one. The old file
//!   and its manifest entry stay until the file is deleted by hand.

use std::path::PathBuf;

use blocksync_fs::NormalizedPath;
use sha2::{Digest, Sha256};

use crate::descriptor::ArtifactDescriptor;

/// Replacement for characters that are illegal in file names.
pub const PLACEHOLDER: char = '_';

/// Longest sanitized segment, in characters.
pub const MAX_SEGMENT_CHARS: usize = 120;

const FILE_EXTENSION: &str = "xml";

const RESERVED_NAMES: [&str; 22] = [
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

fn is_illegal(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control()
}

fn is_reserved(name: &str) -> bool {
    // Device names stay reserved with any extension ("CON.xml").
    let stem = name.split('.').next().unwrap_or(name).trim_end();
    RESERVED_NAMES
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
}

/// Make `raw` usable as a single path segment on every host platform.
///
/// Illegal characters become [`PLACEHOLDER`], the result is capped at
/// [`MAX_SEGMENT_CHARS`], trailing dots and spaces are removed, names that
/// end up empty (including `"."` and `".."`) become `"_"`, and reserved
/// device names get a `_` prefix. `sanitize(sanitize(s)) == sanitize(s)`.
pub fn sanitize(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if is_illegal(c) { PLACEHOLDER } else { c })
        .take(MAX_SEGMENT_CHARS)
        .collect();

    let trimmed = replaced.trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        return PLACEHOLDER.to_string();
    }

    if !is_reserved(trimmed) {
        return trimmed.to_string();
    }

    let prefixed: String = std::iter::once(PLACEHOLDER)
        .chain(trimmed.chars())
        .take(MAX_SEGMENT_CHARS)
        .collect();
    prefixed.trim_end_matches(['.', ' ']).to_string()
}

fn sanitized_segments(path: &str) -> impl Iterator<Item = String> + '_ {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .map(sanitize)
}

/// Root-relative folder for `descriptor`:
/// `<container...>/<category>/<group...>`.
///
/// An empty group yields the category folder itself.
pub fn relative_folder(descriptor: &ArtifactDescriptor) -> String {
    let mut segments: Vec<String> = sanitized_segments(descriptor.container()).collect();
    if segments.is_empty() {
        segments.push(PLACEHOLDER.to_string());
    }
    segments.push(descriptor.kind().category().dir_name().to_string());
    segments.extend(descriptor.group_segments().map(sanitize));
    segments.join("/")
}

/// First 8 hex digits of SHA-256 over the logical key.
pub fn disambiguator(descriptor: &ArtifactDescriptor) -> String {
    let digest = Sha256::digest(descriptor.logical_key().as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..8].to_string()
}

/// `<sanitized name>__<hash8>.xml`
pub fn file_name(descriptor: &ArtifactDescriptor) -> String {
    format!(
        "{}__{}.{}",
        sanitize(descriptor.name()),
        disambiguator(descriptor),
        FILE_EXTENSION
    )
}

/// Root-relative, forward-slash file path; also the manifest key.
pub fn relative_file_path(descriptor: &ArtifactDescriptor) -> String {
    format!("{}/{}", relative_folder(descriptor), file_name(descriptor))
}

/// The canonical location of `descriptor`'s file under `root`.
pub fn output_path(root: &NormalizedPath, descriptor: &ArtifactDescriptor) -> NormalizedPath {
    root.join(&relative_file_path(descriptor))
}

/// Platform-native form of [`output_path`].
pub fn output_file_path(root: &NormalizedPath, descriptor: &ArtifactDescriptor) -> PathBuf {
    output_path(root, descriptor).to_native()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ArtifactKind;

    #[test]
    fn reserved_names_are_prefixed() {
        assert_eq!(sanitize("CON"), "_CON");
        assert_eq!(sanitize("lpt1.xml"), "_lpt1.xml");
        assert_eq!(sanitize("CONSOLE"), "CONSOLE");
    }

    #[test]
    fn traversal_tokens_collapse() {
        assert_eq!(sanitize("."), "_");
        assert_eq!(sanitize(".."), "_");
        assert_eq!(sanitize(""), "_");
        assert_eq!(sanitize("   "), "_");
    }

    #[test]
    fn illegal_characters_are_replaced() {
        assert_eq!(sanitize("a/b:c*d?"), "a_b_c_d_");
        assert_eq!(sanitize("tab\there"), "tab_here");
    }

    #[test]
    fn trailing_dots_and_spaces_are_stripped() {
        assert_eq!(sanitize("Motor. . "), "Motor");
    }

    #[test]
    fn long_names_are_capped() {
        let long = "x".repeat(500);
        assert_eq!(sanitize(&long).chars().count(), MAX_SEGMENT_CHARS);
    }

    #[test]
    fn empty_group_uses_category_root() {
        let d = ArtifactDescriptor::new("PLC_1", "", "Main", ArtifactKind::OrganizationBlock);
        assert_eq!(relative_folder(&d), "PLC_1/blocks");
    }

    #[test]
    fn colliding_sanitized_names_get_distinct_files() {
        let a = ArtifactDescriptor::new("PLC_1", "", "a:b", ArtifactKind::Function);
        let b = ArtifactDescriptor::new("PLC_1", "", "a*b", ArtifactKind::Function);
        assert_eq!(sanitize(a.name()), sanitize(b.name()));
        assert_ne!(file_name(&a), file_name(&b));
    }

    #[test]
    fn case_variants_share_hash_but_keep_their_own_case() {
        let lower = ArtifactDescriptor::new("PLC_1", "Drives", "Motor", ArtifactKind::FunctionBlock);
        let upper = ArtifactDescriptor::new("plc_1", "DRIVES", "MOTOR", ArtifactKind::FunctionBlock);

        assert_eq!(disambiguator(&lower), disambiguator(&upper));
        assert_eq!(
            relative_file_path(&lower).to_lowercase(),
            relative_file_path(&upper).to_lowercase()
        );
        assert_ne!(relative_file_path(&lower), relative_file_path(&upper));
        assert!(relative_file_path(&upper).starts_with("plc_1/blocks/DRIVES/MOTOR__"));
    }

    #[test]
    fn disambiguator_is_eight_hex_chars() {
        let d = ArtifactDescriptor::new("PLC_1", "Types", "Alarms", ArtifactKind::DataType);
        let hash = disambiguator(&d);
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
