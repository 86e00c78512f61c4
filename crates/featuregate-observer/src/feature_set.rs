//! Named feature sets and the static registry that expands them
//!
//! A [`FeatureSet`] is the mode selected on the cluster `FeatureGate`. Every
//! mode except [`FeatureSet::CustomNoUpgrade`] expands to a fixed pair of
//! enabled/disabled feature names held in the [`FeatureSetRegistry`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Feature set selected on the cluster `FeatureGate`
///
/// Stored as a plain string on the wire. Names this crate does not know are
/// kept verbatim in [`FeatureSet::Unknown`] so they can be reported later
/// instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FeatureSet {
    /// Features every cluster runs with
    #[default]
    Default,
    /// Technology preview features; the cluster can no longer be upgraded
    TechPreviewNoUpgrade,
    /// Developer preview features; the cluster can no longer be upgraded
    DevPreviewNoUpgrade,
    /// Features tuned for latency sensitive workloads
    LatencySensitive,
    /// Enabled/disabled names supplied explicitly on the `FeatureGate`
    CustomNoUpgrade,
    /// A name with no known meaning
    Unknown(String),
}

impl FeatureSet {
    /// Name of this feature set as it appears on the wire
    pub fn as_str(&self) -> &str {
        match self {
            Self::Default => "Default",
            Self::TechPreviewNoUpgrade => "TechPreviewNoUpgrade",
            Self::DevPreviewNoUpgrade => "DevPreviewNoUpgrade",
            Self::LatencySensitive => "LatencySensitive",
            Self::CustomNoUpgrade => "CustomNoUpgrade",
            Self::Unknown(name) => name,
        }
    }

    /// Parse a feature set name; the empty string means `Default`
    pub fn parse(name: &str) -> Self {
        match name {
            "" | "Default" => Self::Default,
            "TechPreviewNoUpgrade" => Self::TechPreviewNoUpgrade,
            "DevPreviewNoUpgrade" => Self::DevPreviewNoUpgrade,
            "LatencySensitive" => Self::LatencySensitive,
            "CustomNoUpgrade" => Self::CustomNoUpgrade,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Whether the names come from the `FeatureGate` itself rather than the registry
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::CustomNoUpgrade)
    }
}

impl From<String> for FeatureSet {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<FeatureSet> for String {
    fn from(feature_set: FeatureSet) -> Self {
        match feature_set {
            FeatureSet::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered enabled and disabled feature names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGateEnabledDisabled {
    #[serde(default)]
    pub enabled: Vec<String>,
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl FeatureGateEnabledDisabled {
    pub fn new<E, D>(enabled: E, disabled: D) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            enabled: enabled.into_iter().map(Into::into).collect(),
            disabled: disabled.into_iter().map(Into::into).collect(),
        }
    }
}

const DEFAULT_ENABLED: &[&str] = &[
    "APIPriorityAndFairness",
    "RotateKubeletServerCertificate",
    "DownwardAPIHugePages",
    "OpenShiftPodSecurityAdmission",
];

const DEFAULT_DISABLED: &[&str] = &[
    "CSIMigrationAzureFile",
    "CSIMigrationvSphere",
    "RetroactiveDefaultStorageClass",
];

const TECH_PREVIEW_ENABLED: &[&str] = &[
    "BuildCSIVolumes",
    "CSIDriverSharedResource",
    "InsightsConfigAPI",
    "MachineAPIProviderOpenStack",
    "NodeSwap",
];

const DEV_PREVIEW_ENABLED: &[&str] = &[
    "DynamicResourceAllocation",
    "GatewayAPI",
    "MaxUnavailableStatefulSet",
];

const LATENCY_SENSITIVE_ENABLED: &[&str] = &["TopologyManager"];

fn names(groups: &[&[&str]]) -> Vec<String> {
    groups
        .iter()
        .flat_map(|group| group.iter())
        .map(|name| name.to_string())
        .collect()
}

static BUILTIN: LazyLock<Arc<FeatureSetRegistry>> = LazyLock::new(|| {
    let mut registry = FeatureSetRegistry::new();
    registry.insert(
        FeatureSet::Default,
        FeatureGateEnabledDisabled {
            enabled: names(&[DEFAULT_ENABLED]),
            disabled: names(&[DEFAULT_DISABLED]),
        },
    );
    registry.insert(
        FeatureSet::TechPreviewNoUpgrade,
        FeatureGateEnabledDisabled {
            enabled: names(&[DEFAULT_ENABLED, TECH_PREVIEW_ENABLED]),
            disabled: names(&[DEFAULT_DISABLED]),
        },
    );
    registry.insert(
        FeatureSet::DevPreviewNoUpgrade,
        FeatureGateEnabledDisabled {
            enabled: names(&[DEFAULT_ENABLED, TECH_PREVIEW_ENABLED, DEV_PREVIEW_ENABLED]),
            disabled: names(&[DEFAULT_DISABLED]),
        },
    );
    registry.insert(
        FeatureSet::LatencySensitive,
        FeatureGateEnabledDisabled {
            enabled: names(&[DEFAULT_ENABLED, LATENCY_SENSITIVE_ENABLED]),
            disabled: names(&[DEFAULT_DISABLED]),
        },
    );
    Arc::new(registry)
});

/// Mapping from feature set to the names it enables and disables
#[derive(Debug, Clone, Default)]
pub struct FeatureSetRegistry {
    sets: HashMap<FeatureSet, FeatureGateEnabledDisabled>,
}

impl FeatureSetRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry of built-in feature sets
    pub fn builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    /// Register the names for a feature set, replacing any previous entry
    pub fn insert(&mut self, feature_set: FeatureSet, names: FeatureGateEnabledDisabled) {
        self.sets.insert(feature_set, names);
    }

    /// Builder-style variant of [`insert`](Self::insert)
    pub fn with(mut self, feature_set: FeatureSet, names: FeatureGateEnabledDisabled) -> Self {
        self.insert(feature_set, names);
        self
    }

    /// Look up the names for a feature set
    pub fn get(&self, feature_set: &FeatureSet) -> Option<&FeatureGateEnabledDisabled> {
        self.sets.get(feature_set)
    }

    pub fn contains(&self, feature_set: &FeatureSet) -> bool {
        self.sets.contains_key(feature_set)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
