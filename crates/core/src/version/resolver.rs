use super::GradleVersion;
use tracing::{debug, warn};
use url::Url;

/// Version the bundled connector speaks natively; used when no version is requested.
pub const DEFAULT_GRADLE_VERSION: &str = "7.6";

pub const RELEASE_DISTRIBUTIONS: &str = "https://services.gradle.org/distributions";

pub const SNAPSHOT_DISTRIBUTIONS: &str = "https://services.gradle.org/distributions-snapshots";

/// Turns a requested version into a distribution locator.
///
/// Resolution never fails hard: a malformed version or a locator that cannot
/// be rebuilt yields `None`, meaning "connect by version name instead".
#[derive(Debug, Clone)]
pub struct VersionResolver {
    default_version: String,
}

impl Default for VersionResolver {
    fn default() -> Self {
        Self::new(DEFAULT_GRADLE_VERSION)
    }
}

impl VersionResolver {
    pub fn new(default_version: impl Into<String>) -> Self {
        Self {
            default_version: default_version.into(),
        }
    }

    pub fn default_version(&self) -> &str {
        &self.default_version
    }

    pub fn resolve(&self, version: Option<&str>, use_https: bool) -> Option<Url> {
        let requested = version.unwrap_or(&self.default_version);
        let parsed = match GradleVersion::parse(requested) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("{}; falling back to resolution by version name", e);
                return None;
            }
        };
        let locator = match Self::canonical_locator(&parsed) {
            Ok(locator) => locator,
            Err(e) => {
                warn!("Failed to build distribution URI for {}: {}", parsed, e);
                return None;
            }
        };
        let resolved = Self::apply_scheme(locator, use_https);
        if let Some(ref url) = resolved {
            debug!("Resolved Gradle {} to {}", parsed, url);
        }
        resolved
    }

    /// Canonical download locator for a version, always `https`.
    pub fn canonical_locator(version: &GradleVersion) -> Result<Url, url::ParseError> {
        let base = if version.is_snapshot() {
            SNAPSHOT_DISTRIBUTIONS
        } else {
            RELEASE_DISTRIBUTIONS
        };
        Url::parse(&format!("{base}/gradle-{version}-bin.zip"))
    }

    /// Rewrites only the scheme; host, path, query and fragment are kept.
    pub fn apply_scheme(mut locator: Url, use_https: bool) -> Option<Url> {
        let wanted = if use_https { "https" } else { "http" };
        if locator.scheme() == wanted {
            return Some(locator);
        }
        match locator.set_scheme(wanted) {
            Ok(()) => Some(locator),
            Err(()) => {
                warn!("Cannot switch scheme of {} to {}", locator, wanted);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_release_locator() {
        let resolver = VersionResolver::default();
        let url = resolver.resolve(Some("7.0"), true).unwrap();
        assert_eq!(
            url.as_str(),
            "https://services.gradle.org/distributions/gradle-7.0-bin.zip"
        );
    }

    #[test]
    fn test_insecure_only_changes_scheme() {
        let resolver = VersionResolver::default();
        for version in ["7.0", "6.8.3", "7.0-rc-1", "8.1-20230101000000+0000"] {
            let secure = resolver.resolve(Some(version), true).unwrap();
            let plain = resolver.resolve(Some(version), false).unwrap();
            assert_eq!(secure.scheme(), "https");
            assert_eq!(plain.scheme(), "http");
            assert_eq!(secure.host_str(), plain.host_str());
            assert_eq!(secure.path(), plain.path());
            assert_eq!(secure.query(), plain.query());
            assert_eq!(secure.fragment(), plain.fragment());
        }
    }

    #[test]
    fn test_scheme_rewrite_keeps_query_and_fragment() {
        let url = Url::parse("https://mirror.example.com/g/gradle-7.0-bin.zip?token=a#frag").unwrap();
        let rewritten = VersionResolver::apply_scheme(url, false).unwrap();
        assert_eq!(
            rewritten.as_str(),
            "http://mirror.example.com/g/gradle-7.0-bin.zip?token=a#frag"
        );
    }

    #[test]
    fn test_snapshots_use_snapshot_repository() {
        let resolver = VersionResolver::default();
        let url = resolver
            .resolve(Some("8.1-20230101000000+0000"), true)
            .unwrap();
        assert!(url.as_str().starts_with(SNAPSHOT_DISTRIBUTIONS));
    }

    #[test]
    fn test_malformed_versions_resolve_to_none() {
        let resolver = VersionResolver::default();
        for version in ["", "latest", "7", "7.x", "../../etc"] {
            assert!(resolver.resolve(Some(version), true).is_none());
        }
    }

    #[test]
    fn test_missing_version_uses_default() {
        let resolver = VersionResolver::new("6.9");
        let url = resolver.resolve(None, true).unwrap();
        assert!(url.path().ends_with("/gradle-6.9-bin.zip"));
    }

    #[test]
    fn test_malformed_default_resolves_to_none() {
        let resolver = VersionResolver::new("unknown");
        assert!(resolver.resolve(None, false).is_none());
    }
}
