//! Unit manifest stored in every archive.
//!
//! One identifier per line, in discovery order. Adapters write it only after
//! every payload is in place, so an archive without a manifest is partial.
//!
//! Payloads live under `units/`, one entry per unit, named by the encoded
//! identifier. The identifier itself is only ever stored in the manifest.

use super::error::{DomainError, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::path::{Path, PathBuf};

/// File name of the manifest inside a snapshot directory
pub const MANIFEST_FILE: &str = "units.txt";

/// Subdirectory holding the per-unit payloads
pub const PAYLOAD_DIR: &str = "units";

/// Everything but ASCII alphanumerics, `-` and `_`; dots included, so a name
/// can never be `..` or hidden
const PAYLOAD_NAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

/// Single path segment for a unit identifier
pub fn payload_name(unit: &str) -> String {
    utf8_percent_encode(unit, PAYLOAD_NAME_ENCODE_SET).to_string()
}

/// `<dir>/units`
pub fn payload_dir(dir: &Path) -> PathBuf {
    dir.join(PAYLOAD_DIR)
}

/// Ordered list of logical units (indices, databases) captured by a backup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitManifest {
    units: Vec<String>,
}

/// Search indices captured by a snapshot
pub type IndexManifest = UnitManifest;

/// Time-series or relational databases captured by a dump
pub type DatabaseManifest = UnitManifest;

impl UnitManifest {
    pub fn new<I, S>(units: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let units: Vec<String> = units.into_iter().map(Into::into).collect();
        for unit in &units {
            if unit.trim().is_empty() || unit.contains(['\n', '\r']) || unit.trim() != unit {
                return Err(DomainError::InvalidManifest(format!(
                    "unit identifier {:?} cannot be stored one-per-line",
                    unit
                )));
            }
        }
        Ok(Self { units })
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Render as one identifier per line with trailing newline
    pub fn render(&self) -> String {
        let mut out = String::new();
        for unit in &self.units {
            out.push_str(unit);
            out.push('\n');
        }
        out
    }

    /// Parse manifest text; surrounding whitespace trimmed, blank lines ignored
    pub fn parse(text: &str) -> Self {
        let units = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { units }
    }

    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    pub async fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = Self::path_in(dir);
        tokio::fs::write(&path, self.render()).await?;
        Ok(path)
    }

    pub async fn read_from(dir: &Path) -> std::io::Result<Self> {
        let text = tokio::fs::read_to_string(Self::path_in(dir)).await?;
        Ok(Self::parse(&text))
    }
}
