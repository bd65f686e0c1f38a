//! AWS environment checks.

use crate::error::EnvironmentError;
use crate::kubeconfig::KubeconfigOptions;

/// Named AWS profile.
pub const AWS_PROFILE: &str = "AWS_PROFILE";
/// AWS region.
pub const AWS_REGION: &str = "AWS_REGION";

/// The AWS profile and region a composition runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsEnvironment {
    /// Value of `AWS_PROFILE`.
    pub profile: String,
    /// Value of `AWS_REGION`.
    pub region: String,
}

impl AwsEnvironment {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self, EnvironmentError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read through `lookup`. Both variables must be set and non-blank.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EnvironmentError> {
        let require = |name: &'static str| match lookup(name) {
            None => Err(EnvironmentError::Missing(name)),
            Some(value) if value.trim().is_empty() => Err(EnvironmentError::Empty(name)),
            Some(value) => Ok(value),
        };
        Ok(Self {
            profile: require(AWS_PROFILE)?,
            region: require(AWS_REGION)?,
        })
    }

    /// Fill in the kubeconfig profile when none is configured.
    pub fn apply_to(&self, options: &mut KubeconfigOptions) {
        if options.profile_name.is_none() {
            options.profile_name = Some(self.profile.clone());
        }
    }
}
