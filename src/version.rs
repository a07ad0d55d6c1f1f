//! Version parsing and gating for managed-software behavior.
//!
//! Generated specs change shape depending on the Basalt release being
//! deployed (newer releases ship an HTTP health endpoint, for example). The
//! gate compares the image's version against the release lines where a
//! behavior first appeared. The policy fails closed: a version the gate
//! cannot place in a known release line is an error, never "assume newest",
//! because guessing for an untested line risks generating an invalid
//! deployment.

use crate::error::{OperatorError, OperatorResult};

/// Marker that short-circuits gating: a "latest" image is always current.
const LATEST_MARKER: &str = "latest";

/// A parsed three-part semantic version. Used only for comparison, never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    /// Major release number.
    pub major: u64,
    /// Minor release number.
    pub minor: u64,
    /// Patch release number.
    pub patch: u64,
}

impl Version {
    /// Parse `MAJOR.MINOR.PATCH[-suffix]`.
    ///
    /// Anything after the first hyphen is discarded; the remaining core must
    /// be exactly three dot-separated numeric components.
    pub fn parse(text: &str) -> OperatorResult<Version> {
        let core = text.split('-').next().unwrap_or(text);
        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(OperatorError::VersionFormat(text.to_string()));
        }
        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part
                .parse::<u64>()
                .map_err(|_| OperatorError::VersionFormat(text.to_string()))?;
        }
        Ok(Version {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
        })
    }
}

/// Decide whether `check` is older than the reference release lines.
///
/// The first reference sharing `(major, minor)` with `check` decides the
/// result via patch comparison; later references are not consulted. A
/// `check` containing the literal `latest` marker is treated as
/// always-current. A `check` that matches no reference line is an error:
/// the engine has no defined behavior for an untested release line.
pub fn is_lower_than_any(check: &str, references: &[&str]) -> OperatorResult<bool> {
    if check.contains(LATEST_MARKER) {
        return Ok(false);
    }
    let version = Version::parse(check)?;
    for reference in references {
        let candidate = Version::parse(reference)?;
        if candidate.major == version.major && candidate.minor == version.minor {
            return Ok(version.patch < candidate.patch);
        }
    }
    Err(OperatorError::UnknownReleaseLine(check.to_string()))
}

/// The version tag of an image reference: everything after the last `:`.
///
/// An image without a tag is treated as `latest`.
pub fn image_tag(image: &str) -> &str {
    match image.rsplit_once(':') {
        // A colon inside a registry host:port is not a tag separator.
        Some((_, tag)) if !tag.contains('/') => tag,
        _ => LATEST_MARKER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_three_components() {
        let version = Version::parse("3.3.17").unwrap();
        assert_eq!(version.major, 3);
        assert_eq!(version.minor, 3);
        assert_eq!(version.patch, 17);
    }

    #[test]
    fn parse_discards_hyphen_suffix() {
        let version = Version::parse("3.4.6-rc1").unwrap();
        assert_eq!(version.major, 3);
        assert_eq!(version.minor, 4);
        assert_eq!(version.patch, 6);
    }

    #[test]
    fn parse_rejects_malformed_input() {
        for bad in ["", "3.3", "3.3.3.3", "3.x.1", "v3.3.1", "3..1"] {
            assert!(Version::parse(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn lower_patch_in_matching_line_is_lower() {
        let result = is_lower_than_any("3.3.9", &["3.3.17", "3.4.6"]).unwrap();
        assert!(result);
    }

    #[test]
    fn equal_patch_is_not_lower() {
        let result = is_lower_than_any("3.3.17", &["3.3.17"]).unwrap();
        assert!(!result);
    }

    #[test]
    fn first_matching_line_wins() {
        // The second 3.3 entry would flip the answer; it must not be reached.
        let result = is_lower_than_any("3.3.9", &["3.3.5", "3.3.17"]).unwrap();
        assert!(!result);
    }

    #[test]
    fn latest_marker_short_circuits() {
        let result = is_lower_than_any("3.3-latest", &["3.3.17"]).unwrap();
        assert!(!result);
    }

    #[test]
    fn unmatched_release_line_is_an_error() {
        let result = is_lower_than_any("4.0.0", &["3.3.17"]);
        assert!(matches!(result, Err(OperatorError::UnknownReleaseLine(_))));
    }

    #[test]
    fn unparsable_reference_is_an_error() {
        let result = is_lower_than_any("3.3.9", &["not-a-version", "3.3.17"]);
        assert!(matches!(result, Err(OperatorError::VersionFormat(_))));
    }

    #[test]
    fn image_tag_extraction() {
        assert_eq!(image_tag("basalt/frontend:3.3.9"), "3.3.9");
        assert_eq!(image_tag("basalt/frontend"), "latest");
        assert_eq!(image_tag("registry:5000/basalt/frontend"), "latest");
        assert_eq!(image_tag("registry:5000/basalt/frontend:3.4.1"), "3.4.1");
    }
}
