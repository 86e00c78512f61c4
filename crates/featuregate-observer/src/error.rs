use featuregate_core::TreeError;
use thiserror::Error;

use crate::feature_set::FeatureSet;

/// Errors raised by a [`FeatureGateLister`](crate::lister::FeatureGateLister)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListerError {
    #[error("feature gate cache has not synced yet")]
    NotSynced,

    #[error("feature gate source unavailable: {0}")]
    Unavailable(String),
}

impl ListerError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Errors collected while observing configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserveError {
    /// Reading or writing the managed path failed
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Looking up the `FeatureGate` failed for a reason other than absence
    #[error("failed to get featuregate {name:?}: {source}")]
    Lookup {
        name: String,
        #[source]
        source: ListerError,
    },

    #[error(".spec.featureGateSelection.customNoUpgrade is empty but the feature set {0} was set")]
    MissingCustomSelection(FeatureSet),

    #[error(".spec.featureSet {0:?} not found")]
    UnknownFeatureSet(String),
}

impl ObserveError {
    pub fn lookup(name: impl Into<String>, source: ListerError) -> Self {
        Self::Lookup {
            name: name.into(),
            source,
        }
    }
}

/// Errors loading [`ObserverSettings`](crate::settings::ObserverSettings)
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl SettingsError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
