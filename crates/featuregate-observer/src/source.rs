//! The cluster-scoped `FeatureGate` object observers derive flags from

use serde::{Deserialize, Deserializer, Serialize};

use crate::feature_set::{FeatureGateEnabledDisabled, FeatureSet};

/// Well-known name of the singleton `FeatureGate`
pub const CLUSTER_FEATURE_GATE: &str = "cluster";

/// Identity and version of a stored object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// An absent, `null` or empty feature set all mean `Default`
fn deserialize_feature_set<'de, D>(deserializer: D) -> Result<FeatureSet, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(FeatureSet::from)
        .unwrap_or_default())
}

/// Which feature set the cluster runs with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureGateSelection {
    #[serde(default, deserialize_with = "deserialize_feature_set")]
    pub feature_set: FeatureSet,
    /// Only consulted when `feature_set` is `CustomNoUpgrade`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_no_upgrade: Option<FeatureGateEnabledDisabled>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGateSpec {
    #[serde(flatten)]
    pub selection: FeatureGateSelection,
}

/// Cluster-wide feature gate selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGate {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: FeatureGateSpec,
}

impl FeatureGate {
    /// Create a `FeatureGate` named `name` selecting `feature_set`
    pub fn new(name: impl Into<String>, feature_set: FeatureSet) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                resource_version: None,
            },
            spec: FeatureGateSpec {
                selection: FeatureGateSelection {
                    feature_set,
                    custom_no_upgrade: None,
                },
            },
        }
    }

    /// The cluster `FeatureGate` selecting `feature_set`
    pub fn cluster(feature_set: FeatureSet) -> Self {
        Self::new(CLUSTER_FEATURE_GATE, feature_set)
    }

    /// The cluster `FeatureGate` in `CustomNoUpgrade` mode with explicit names
    pub fn custom(names: FeatureGateEnabledDisabled) -> Self {
        Self::cluster(FeatureSet::CustomNoUpgrade).with_custom(names)
    }

    /// Set the explicit names used by `CustomNoUpgrade`
    pub fn with_custom(mut self, names: FeatureGateEnabledDisabled) -> Self {
        self.spec.selection.custom_no_upgrade = Some(names);
        self
    }

    pub fn with_resource_version(mut self, version: impl Into<String>) -> Self {
        self.metadata.resource_version = Some(version.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn feature_set(&self) -> &FeatureSet {
        &self.spec.selection.feature_set
    }

    pub fn custom_no_upgrade(&self) -> Option<&FeatureGateEnabledDisabled> {
        self.spec.selection.custom_no_upgrade.as_ref()
    }

    /// Parse from JSON value
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
