//! Feature negotiation against the tool version discovered on the server side

use crate::context::GradleContext;
use crate::version::GradleVersion;
use std::fmt;
use tracing::debug;

/// Optional features whose availability depends on the tool version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Passing environment variables to the build.
    EnvironmentVariables,
    /// Stopping a running build through an in-process token.
    CancellationToken,
}

impl Feature {
    pub fn minimum_version(self) -> &'static str {
        match self {
            Feature::EnvironmentVariables => "3.5",
            Feature::CancellationToken => "2.1",
        }
    }

    pub fn fallback(self) -> &'static str {
        match self {
            Feature::EnvironmentVariables => "environment variables are not passed to the build",
            Feature::CancellationToken => "cancellation relies on the marker file only",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::EnvironmentVariables => f.write_str("environment variables"),
            Feature::CancellationToken => f.write_str("cancellation tokens"),
        }
    }
}

/// Decides whether a feature may be used. Never fails: anything it cannot
/// prove supported is treated as unsupported.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityGate;

impl CapabilityGate {
    pub fn new() -> Self {
        Self
    }

    pub fn supports(&self, server_version: Option<&str>, minimum: &GradleVersion) -> bool {
        match server_version.map(GradleVersion::parse) {
            Some(Ok(server)) => server >= *minimum,
            Some(Err(_)) | None => false,
        }
    }

    /// Checks `feature`, telling the user through the context when it is demoted.
    pub fn allows(
        &self,
        feature: Feature,
        server_version: Option<&str>,
        context: &GradleContext,
    ) -> bool {
        let minimum = match GradleVersion::parse(feature.minimum_version()) {
            Ok(minimum) => minimum,
            Err(_) => return false,
        };
        if self.supports(server_version, &minimum) {
            debug!("{} supported by Gradle {:?}", feature, server_version);
            return true;
        }
        let server = server_version.unwrap_or("(unknown)");
        context.information(&format!(
            "Gradle {server} does not support {feature} (requires {minimum} or later); {}",
            feature.fallback()
        ));
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OutputSink;
    use std::sync::{Arc, Mutex};

    fn v(text: &str) -> GradleVersion {
        GradleVersion::parse(text).unwrap()
    }

    #[test]
    fn test_missing_or_unparsable_server_is_unsupported() {
        let gate = CapabilityGate::new();
        for minimum in ["1.0", "3.5", "99.0"] {
            assert!(!gate.supports(None, &v(minimum)));
            assert!(!gate.supports(Some("garbage"), &v(minimum)));
            assert!(!gate.supports(Some(""), &v(minimum)));
        }
    }

    #[test]
    fn test_version_threshold() {
        let gate = CapabilityGate::new();
        assert!(gate.supports(Some("3.5"), &v("3.5")));
        assert!(gate.supports(Some("7.0"), &v("3.5")));
        assert!(!gate.supports(Some("3.4.1"), &v("3.5")));
        assert!(!gate.supports(Some("3.5-rc-1"), &v("3.5")));
    }

    #[test]
    fn test_demotion_emits_one_message() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink: OutputSink = buffer.clone();
        let context = GradleContext::new("/tmp/project").with_information_output(sink);
        let gate = CapabilityGate::new();

        assert!(!gate.allows(Feature::EnvironmentVariables, Some("2.0"), &context));
        assert!(gate.allows(Feature::EnvironmentVariables, Some("4.0"), &context));

        let text = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("environment variables"));
    }
}
