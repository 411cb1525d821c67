//! Tool versions and distribution resolution

mod resolver;

pub use resolver::{
    DEFAULT_GRADLE_VERSION, RELEASE_DISTRIBUTIONS, SNAPSHOT_DISTRIBUTIONS, VersionResolver,
};

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// A parsed Gradle version such as `7.0`, `6.8.3` or `7.0-rc-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GradleVersion {
    text: String,
    major: u32,
    minor: u32,
    patch: u32,
    stage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid Gradle version")]
pub struct VersionParseError(pub String);

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)\.(\d+)(?:\.(\d+))?(?:-(\S+))?$").expect("valid version pattern")
    })
}

fn snapshot_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d{14}[+-]\d{4}$").expect("valid snapshot pattern"))
}

impl GradleVersion {
    pub fn parse(text: &str) -> Result<Self, VersionParseError> {
        let trimmed = text.trim();
        let captures = version_pattern()
            .captures(trimmed)
            .ok_or_else(|| VersionParseError(text.to_string()))?;
        let number = |index: usize| -> Result<u32, VersionParseError> {
            match captures.get(index) {
                Some(m) => m
                    .as_str()
                    .parse()
                    .map_err(|_| VersionParseError(text.to_string())),
                None => Ok(0),
            }
        };
        Ok(Self {
            text: trimmed.to_string(),
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            stage: captures.get(4).map(|m| m.as_str().to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }

    /// Nightly/snapshot builds carry a timestamp suffix.
    pub fn is_snapshot(&self) -> bool {
        self.stage
            .as_deref()
            .is_some_and(|stage| snapshot_pattern().is_match(stage))
    }

    /// Release candidates, milestones and snapshots.
    pub fn is_pre_release(&self) -> bool {
        self.stage.is_some()
    }
}

impl Ord for GradleVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.stage, &other.stage) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => compare_stages(a, b),
            })
    }
}

/// Compares stages segment by segment, numeric segments by value (`rc-2 < rc-10`).
fn compare_stages(left: &str, right: &str) -> Ordering {
    let mut left = left.split(['-', '.']);
    let mut right = right.split(['-', '.']);
    loop {
        let ordering = match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(a), Some(b)) => compare_segments(a, b),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

fn compare_segments(left: &str, right: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if numeric(left) && numeric(right) {
        // compared as digit strings so arbitrarily long timestamps cannot overflow
        let left = left.trim_start_matches('0');
        let right = right.trim_start_matches('0');
        left.len().cmp(&right.len()).then_with(|| left.cmp(right))
    } else {
        left.cmp(right)
    }
}

impl PartialOrd for GradleVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for GradleVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for GradleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release_versions() {
        let v = GradleVersion::parse("7.0").unwrap();
        assert_eq!((v.major(), v.minor(), v.patch()), (7, 0, 0));
        assert!(!v.is_pre_release());

        let v = GradleVersion::parse("6.8.3").unwrap();
        assert_eq!((v.major(), v.minor(), v.patch()), (6, 8, 3));
        assert_eq!(v.to_string(), "6.8.3");
    }

    #[test]
    fn test_parse_pre_release_and_snapshot() {
        let rc = GradleVersion::parse("7.0-rc-1").unwrap();
        assert!(rc.is_pre_release());
        assert!(!rc.is_snapshot());

        let nightly = GradleVersion::parse("8.1-20230101000000+0000").unwrap();
        assert!(nightly.is_snapshot());
    }

    #[test]
    fn test_reject_malformed() {
        for text in ["", "7", "seven", "7.x", "7.0 rc", "v7.0", "7..0"] {
            assert!(GradleVersion::parse(text).is_err(), "accepted {text:?}");
        }
    }

    #[test]
    fn test_ordering() {
        let v = |s: &str| GradleVersion::parse(s).unwrap();
        assert!(v("3.5") > v("2.14.1"));
        assert!(v("7.0") > v("7.0-rc-1"));
        assert!(v("10.0") > v("9.9.9"));
        assert_eq!(v("7.0"), v("7.0"));
    }

    #[test]
    fn test_pre_release_numbers_compare_by_value() {
        let v = |s: &str| GradleVersion::parse(s).unwrap();
        assert!(v("7.0-rc-10") > v("7.0-rc-2"));
        assert!(v("7.0-milestone-11") > v("7.0-milestone-9"));
        assert!(v("7.0-rc-1") > v("7.0-milestone-3"));
        assert!(v("7.0-rc-1.1") > v("7.0-rc-1"));
        assert_eq!(v("7.0-rc-2").cmp(&v("7.0-rc-2")), Ordering::Equal);
    }
}
