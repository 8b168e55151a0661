//! Artifact descriptors
//!
//! A descriptor identifies one synchronizable object inside the external
//! environment. Descriptors are produced fresh by every inventory scan and
//! never mutated; only the paths and keys derived from them outlive a
//! batch.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of artifact kinds.
///
/// Variant order is the processing precedence: type definitions first,
/// then executable units (entry points, stateful, stateless, data
/// storage), then tag tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// User-defined data type
    DataType,
    /// Entry-point unit invoked by the runtime
    OrganizationBlock,
    /// Reusable unit with its own persistent state
    FunctionBlock,
    /// Reusable unit without persistent state
    Function,
    /// Data-storage unit (global or bound to a function block instance)
    DataBlock,
    /// Table of symbolic tags
    TagTable,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 6] = [
        Self::DataType,
        Self::OrganizationBlock,
        Self::FunctionBlock,
        Self::Function,
        Self::DataBlock,
        Self::TagTable,
    ];

    /// Stable short tag, used in logical keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataType => "udt",
            Self::OrganizationBlock => "ob",
            Self::FunctionBlock => "fb",
            Self::Function => "fc",
            Self::DataBlock => "db",
            Self::TagTable => "tag_table",
        }
    }

    /// Rank used when ordering a batch; lower runs first.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::DataType => 0,
            Self::OrganizationBlock => 1,
            Self::FunctionBlock => 2,
            Self::Function => 3,
            Self::DataBlock => 4,
            Self::TagTable => 5,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::DataType => Category::Types,
            Self::OrganizationBlock | Self::FunctionBlock | Self::Function | Self::DataBlock => {
                Category::Blocks
            }
            Self::TagTable => Category::Tags,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level folder under a container, one per family of kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Types,
    Blocks,
    Tags,
}

impl Category {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Types => "types",
            Self::Blocks => "blocks",
            Self::Tags => "tags",
        }
    }
}

/// Identity of one artifact in the external environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactDescriptor {
    container: String,
    group: String,
    name: String,
    kind: ArtifactKind,
    logical_key: String,
}

impl ArtifactDescriptor {
    /// Build a descriptor.
    ///
    /// `group` may use either separator; empty segments are dropped so
    /// `"/Blocks//Drives/"` and `"Blocks\\Drives"` describe the same group.
    pub fn new(
        container: impl Into<String>,
        group: impl AsRef<str>,
        name: impl Into<String>,
        kind: ArtifactKind,
    ) -> Self {
        let container = container.into();
        let group = group
            .as_ref()
            .split(['/', '\\'])
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        let name = name.into();
        let logical_key = logical_key(&container, kind, &group, &name);
        Self {
            container,
            group,
            name,
            kind,
            logical_key,
        }
    }

    /// Container path, e.g. the processing-unit identifier.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Forward-slash group path inside the container; empty at the root.
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn group_segments(&self) -> impl Iterator<Item = &str> {
        self.group.split('/').filter(|s| !s.is_empty())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Case-insensitive identity used to correlate selections across scans.
    pub fn logical_key(&self) -> &str {
        &self.logical_key
    }

    /// Total order used for batch processing.
    pub fn processing_cmp(&self, other: &Self) -> Ordering {
        self.kind
            .precedence()
            .cmp(&other.kind.precedence())
            .then_with(|| cmp_ignore_case(&self.container, &other.container))
            .then_with(|| cmp_ignore_case(&self.group, &other.group))
            .then_with(|| cmp_ignore_case(&self.name, &other.name))
            .then_with(|| self.logical_key.cmp(&other.logical_key))
    }
}

impl fmt::Display for ArtifactDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}:{}/{}", self.kind, self.container, self.name)
        } else {
            write!(f, "{}:{}/{}/{}", self.kind, self.container, self.group, self.name)
        }
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Length-prefixed, lowercased encoding of the identity tuple.
///
/// The length prefixes keep the encoding injective even when a field
/// contains the `|` separator.
fn logical_key(container: &str, kind: ArtifactKind, group: &str, name: &str) -> String {
    let container = container.to_lowercase();
    let group = group.to_lowercase();
    let name = name.to_lowercase();
    format!(
        "{}|{}:{}|{}:{}|{}:{}",
        kind.as_str(),
        container.len(),
        container,
        group.len(),
        group,
        name.len(),
        name
    )
}

/// Sort descriptors into processing order in place.
pub fn sort_for_processing(descriptors: &mut [ArtifactDescriptor]) {
    descriptors.sort_by(ArtifactDescriptor::processing_cmp);
}
