//! Published-version arithmetic.
//!
//! Working documents carry a monotonic integer clock; published documents
//! carry SemVer strings. The publish pipeline starts a version line at
//! [`INITIAL_VERSION`] and advances it by patch increments unless the caller
//! overrides with a strictly greater version.

use semver::Version;

use crate::error::CoreError;

/// First version assigned when a document is published with no prior.
pub const INITIAL_VERSION: &str = "0.0.1";

/// Parse a SemVer string, mapping failures to `InvalidArgument`.
pub fn parse(version: &str) -> Result<Version, CoreError> {
    Version::parse(version)
        .map_err(|e| CoreError::InvalidArgument(format!("invalid version {version:?}: {e}")))
}

/// The next patch version after `prior`, dropping pre-release and build
/// metadata.
pub fn inc_patch(prior: &Version) -> Version {
    Version::new(prior.major, prior.minor, prior.patch + 1)
}

/// Compute the version for a new publish.
///
/// With no prior publish the result is [`INITIAL_VERSION`], or the override
/// when given. With a prior, the candidate is `prior` patch-incremented; an
/// override must parse and be strictly greater than the prior or the publish
/// fails.
pub fn next_published_version(
    prior: Option<&str>,
    requested: Option<&str>,
) -> Result<Version, CoreError> {
    match prior {
        None => match requested {
            Some(raw) => parse(raw),
            None => Ok(Version::parse(INITIAL_VERSION).expect("initial version is valid")),
        },
        Some(prior_raw) => {
            let prior = parse(prior_raw)
                .map_err(|_| CoreError::Internal(format!("stored version {prior_raw:?} is not SemVer")))?;
            match requested {
                None => Ok(inc_patch(&prior)),
                Some(raw) => {
                    let requested = parse(raw)?;
                    if requested <= prior {
                        return Err(CoreError::FailedPrecondition(format!(
                            "new version {requested} must be greater than the published version {prior}"
                        )));
                    }
                    Ok(requested)
                }
            }
        }
    }
}
