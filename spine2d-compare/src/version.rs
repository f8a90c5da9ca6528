//! Spine export versions and runtime line selection.

use serde::Deserialize;

/// Target Spine major version for exported data.
pub const SPINE_EXPORT_MAJOR: u32 = 4;

/// Newest Spine minor version the description readers understand.
pub const SPINE_EXPORT_MINOR: u32 = 3;

/// Runtime line a host should instantiate for a given export.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuntimeLine {
    V4_1,
    V4_2,
    V4_3,
}

impl RuntimeLine {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V4_1 => "4.1",
            Self::V4_2 => "4.2",
            Self::V4_3 => "4.3",
        }
    }

    /// Line whose export layout matches `version`, or `None` for exports the
    /// description readers do not understand.
    pub fn parse(version: &str) -> Option<Self> {
        match parse_major_minor(version)? {
            (SPINE_EXPORT_MAJOR, 1) => Some(Self::V4_1),
            (SPINE_EXPORT_MAJOR, 2) => Some(Self::V4_2),
            (SPINE_EXPORT_MAJOR, SPINE_EXPORT_MINOR) => Some(Self::V4_3),
            _ => None,
        }
    }

    /// Maps an editor version string (`"4.2.43"`) to the runtime line that reads it.
    ///
    /// Anything that is not recognised as 4.2 or 4.3 falls back to 4.1.
    pub fn for_version(version: &str) -> Self {
        Self::parse(version).unwrap_or(Self::V4_1)
    }
}

/// Result of sniffing a JSON skeleton before a runtime is picked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectedVersion {
    /// `skeleton.spine` as written by the editor, if readable.
    pub skeleton: Option<String>,
    pub runtime: RuntimeLine,
}

#[derive(Deserialize)]
struct VersionDocument {
    skeleton: Option<VersionHeader>,
}

#[derive(Deserialize)]
struct VersionHeader {
    spine: Option<String>,
}

/// Reads `skeleton.spine` from a JSON export and selects the matching runtime line.
///
/// Never fails: unreadable input is logged and mapped to the 4.1 line.
pub fn detect_spine_version(json_text: &str) -> DetectedVersion {
    let skeleton = match serde_json::from_str::<VersionDocument>(json_text) {
        Ok(document) => document.skeleton.and_then(|s| s.spine),
        Err(e) => {
            log::warn!("could not read Spine version, defaulting to 4.1: {e}");
            None
        }
    };
    let runtime = skeleton
        .as_deref()
        .map(RuntimeLine::for_version)
        .unwrap_or(RuntimeLine::V4_1);
    DetectedVersion { skeleton, runtime }
}

pub(crate) fn parse_major_minor(value: &str) -> Option<(u32, u32)> {
    let mut parts = value.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()
        .map(|m| {
            let digits: String = m.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .unwrap_or(Some(0))?;
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_picks_runtime_line_from_skeleton_header() {
        let v = detect_spine_version(r#"{"skeleton":{"spine":"4.2.43"}}"#);
        assert_eq!(v.skeleton.as_deref(), Some("4.2.43"));
        assert_eq!(v.runtime, RuntimeLine::V4_2);

        let v = detect_spine_version(r#"{"skeleton":{"spine":"4.3.39-beta"}}"#);
        assert_eq!(v.runtime, RuntimeLine::V4_3);

        let v = detect_spine_version(r#"{"skeleton":{"spine":"4.1.24"}}"#);
        assert_eq!(v.runtime, RuntimeLine::V4_1);
    }

    #[test]
    fn detect_falls_back_to_4_1() {
        assert_eq!(detect_spine_version("not json").runtime, RuntimeLine::V4_1);
        assert_eq!(detect_spine_version("{}").runtime, RuntimeLine::V4_1);
        let v = detect_spine_version(r#"{"skeleton":{"spine":"3.8.99"}}"#);
        assert_eq!(v.runtime, RuntimeLine::V4_1);
        assert_eq!(v.skeleton.as_deref(), Some("3.8.99"));
    }

    #[test]
    fn parse_accepts_only_known_layouts() {
        assert_eq!(RuntimeLine::parse("4.1.24"), Some(RuntimeLine::V4_1));
        assert_eq!(RuntimeLine::parse("4.2.43"), Some(RuntimeLine::V4_2));
        assert_eq!(RuntimeLine::parse("4.3.39-beta"), Some(RuntimeLine::V4_3));
        for other in ["4.0.64", "4.4.1", "3.8.99", "5.0", "4", "beta"] {
            assert_eq!(RuntimeLine::parse(other), None, "{other}");
        }
        assert!(RuntimeLine::V4_1 < RuntimeLine::V4_2);
        assert!(RuntimeLine::V4_2 < RuntimeLine::V4_3);
    }

    #[test]
    fn parse_major_minor_accepts_suffixes() {
        assert_eq!(parse_major_minor("4.3.39-beta"), Some((4, 3)));
        assert_eq!(parse_major_minor("4"), Some((4, 0)));
        assert_eq!(parse_major_minor("x.1"), None);
    }
}
