//! Environment version hint written next to every export
//!
//! `meta/environment-version.txt` is a tiny `key=value` file recording
//! which environment version produced the exported tree. Import reads it
//! back to warn about cross-version round trips.

use blocksync_fs::{MetaPath, NormalizedPath, RobustnessConfig, io};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use crate::Result;
use crate::manifest::TOOL_VERSION;

/// Contents of the version hint file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionHint {
    pub environment: String,
    pub tool: String,
    pub exported: DateTime<Utc>,
}

impl VersionHint {
    /// A hint for an export running now under `environment`.
    pub fn current(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            tool: TOOL_VERSION.to_string(),
            exported: Utc::now(),
        }
    }

    pub fn path(root: &NormalizedPath) -> NormalizedPath {
        root.join(MetaPath::VersionHint.as_str())
    }

    pub fn write(&self, root: &NormalizedPath, robustness: RobustnessConfig) -> Result<()> {
        io::write_atomic(&Self::path(root), self.render().as_bytes(), robustness)?;
        Ok(())
    }

    /// Read the hint under `root`; `None` if absent or unparsable.
    pub fn read(root: &NormalizedPath) -> Option<Self> {
        let path = Self::path(root);
        if !path.is_file() {
            return None;
        }
        let parsed = io::read_text(&path).ok().and_then(|text| Self::parse(&text));
        if parsed.is_none() {
            warn!(path = %path, "version hint unreadable, ignoring");
        }
        parsed
    }

    pub fn render(&self) -> String {
        format!(
            "environment={}\ntool={}\nexported={}\n",
            self.environment,
            self.tool,
            self.exported.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    /// Parse `key=value` lines. Unknown keys are ignored; all three known
    /// keys must be present.
    pub fn parse(text: &str) -> Option<Self> {
        let mut environment = None;
        let mut tool = None;
        let mut exported = None;

        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "environment" => environment = Some(value.to_string()),
                "tool" => tool = Some(value.to_string()),
                "exported" => {
                    exported = DateTime::parse_from_rfc3339(value)
                        .ok()
                        .map(|t| t.with_timezone(&Utc));
                }
                _ => {}
            }
        }

        Some(Self {
            environment: environment.filter(|e| !e.is_empty())?,
            tool: tool?,
            exported: exported?,
        })
    }

    /// Whether this hint was produced under `environment`.
    pub fn matches_environment(&self, environment: &str) -> bool {
        self.environment.eq_ignore_ascii_case(environment)
    }
}
