//! Feature flag observer
//!
//! Derives the `name=true` / `name=false` flag list a server should run with
//! from the cluster `FeatureGate`, and writes it at a fixed path of the
//! observed configuration.
//!
//! Failures are handled asymmetrically:
//! - a malformed existing value or a failed write is recorded and the call
//!   still returns its best-effort output
//! - a failed `FeatureGate` lookup or an unusable feature set returns the
//!   previously observed flags untouched, so a transient read failure never
//!   wipes working configuration

use featuregate_core::tree::{join_path, nested_string_list, set_nested_string_list};
use featuregate_core::{ConfigTree, Recorder};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ObserveError;
use crate::feature_set::{FeatureSet, FeatureSetRegistry};
use crate::lister::FeatureGateLister;
use crate::source::{CLUSTER_FEATURE_GATE, FeatureGate};

/// Reason used for the event emitted when the flag list changes
pub const REASON_FLAGS_UPDATED: &str = "ObserveFeatureFlagsUpdated";
/// Reason used for the warning emitted when the flag list cannot be written
pub const REASON_FLAGS_FAILED: &str = "ObserveFeatureFlags";

/// Result of one observation: the observed fragment plus every error hit on the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub config: ConfigTree,
    pub errors: Vec<ObserveError>,
}

impl Observation {
    pub fn new(config: ConfigTree, errors: Vec<ObserveError>) -> Self {
        Self { config, errors }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_parts(self) -> (ConfigTree, Vec<ObserveError>) {
        (self.config, self.errors)
    }
}

/// Something that observes a slice of configuration from cluster state
pub trait ObserveConfig: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Compute the observed fragment from `existing` observed configuration
    fn observe(
        &self,
        lister: &dyn FeatureGateLister,
        recorder: &dyn Recorder,
        existing: &ConfigTree,
    ) -> Observation;
}

/// Observes the cluster `FeatureGate` and fills in the feature flag list
/// at `config_path`.
#[derive(Debug, Clone)]
pub struct FeatureFlagsObserver {
    allow_all: bool,
    known_features: HashSet<String>,
    config_path: Vec<String>,
    registry: Arc<FeatureSetRegistry>,
}

impl FeatureFlagsObserver {
    /// Create an observer writing to `config_path`.
    ///
    /// An empty `known_features` allows every feature name; otherwise only
    /// listed names are emitted for registry-backed feature sets.
    pub fn new<K, P>(known_features: K, config_path: P) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        let known_features: HashSet<String> = known_features.into_iter().map(Into::into).collect();
        Self {
            allow_all: known_features.is_empty(),
            known_features,
            config_path: config_path.into_iter().map(Into::into).collect(),
            registry: FeatureSetRegistry::builtin(),
        }
    }

    /// Resolve feature sets against `registry` instead of the built-in one
    pub fn with_registry(mut self, registry: Arc<FeatureSetRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn allow_all(&self) -> bool {
        self.allow_all
    }

    pub fn config_path(&self) -> &[String] {
        &self.config_path
    }

    pub fn registry(&self) -> &FeatureSetRegistry {
        &self.registry
    }

    /// Whether `name` may be emitted for a registry-backed feature set
    pub fn is_allowed(&self, name: &str) -> bool {
        self.allow_all || self.known_features.contains(name)
    }

    /// Reconcile the flag list at `config_path` with the cluster `FeatureGate`
    pub fn observe(
        &self,
        lister: &dyn FeatureGateLister,
        recorder: &dyn Recorder,
        existing: &ConfigTree,
    ) -> Observation {
        let mut errors = Vec::new();

        let current = match nested_string_list(existing, &self.config_path) {
            Ok(current) => current,
            Err(err) => {
                warn!(error = %err, "Ignoring malformed feature flags in existing config");
                errors.push(ObserveError::from(err));
                None
            }
        };

        let mut previous = ConfigTree::new();
        if let Some(current) = &current
            && let Err(err) = set_nested_string_list(&mut previous, &self.config_path, current)
        {
            errors.push(err.into());
        }
        let current = current.unwrap_or_default();

        let gate = match lister.get(CLUSTER_FEATURE_GATE) {
            Ok(Some(gate)) => gate,
            // No FeatureGate yet usually means the cluster is still being
            // installed; run with the default set until one shows up.
            Ok(None) => {
                debug!("No cluster featuregate found, assuming the Default feature set");
                Arc::new(FeatureGate::cluster(FeatureSet::Default))
            }
            Err(err) => {
                errors.push(ObserveError::lookup(CLUSTER_FEATURE_GATE, err));
                return Observation::new(previous, errors);
            }
        };

        let desired = match self.feature_names(&gate) {
            Ok(desired) => desired,
            Err(err) => {
                errors.push(err);
                return Observation::new(previous, errors);
            }
        };

        let path = join_path(&self.config_path);
        if current != desired {
            recorder.event(
                REASON_FLAGS_UPDATED,
                &format!("Updated {path} to {}", desired.join(",")),
            );
        }

        let mut observed = ConfigTree::new();
        if let Err(err) = set_nested_string_list(&mut observed, &self.config_path, &desired) {
            recorder.warning(REASON_FLAGS_FAILED, &format!("Failed setting {path}: {err}"));
            errors.push(err.into());
        }

        Observation::new(observed, errors)
    }

    /// Expand the feature set selected on `gate` into flag tokens.
    ///
    /// `CustomNoUpgrade` uses the names listed on the gate verbatim, order
    /// and duplicates included, without consulting the allow-list. Every
    /// other feature set is looked up in the registry and filtered through
    /// the allow-list. Enabled flags always precede disabled ones.
    pub fn feature_names(&self, gate: &FeatureGate) -> Result<Vec<String>, ObserveError> {
        let feature_set = gate.feature_set();

        if feature_set.is_custom() {
            let custom = gate
                .custom_no_upgrade()
                .ok_or_else(|| ObserveError::MissingCustomSelection(feature_set.clone()))?;

            let enabled = custom.enabled.iter().map(|name| enabled_flag(name));
            let disabled = custom.disabled.iter().map(|name| disabled_flag(name));
            return Ok(enabled.chain(disabled).collect());
        }

        let names = self
            .registry
            .get(feature_set)
            .ok_or_else(|| ObserveError::UnknownFeatureSet(feature_set.to_string()))?;

        let enabled = names
            .enabled
            .iter()
            .filter(|name| self.is_allowed(name))
            .map(|name| enabled_flag(name));
        let disabled = names
            .disabled
            .iter()
            .filter(|name| self.is_allowed(name))
            .map(|name| disabled_flag(name));

        Ok(enabled.chain(disabled).collect())
    }
}

impl ObserveConfig for FeatureFlagsObserver {
    fn name(&self) -> &str {
        "feature-flags"
    }

    fn observe(
        &self,
        lister: &dyn FeatureGateLister,
        recorder: &dyn Recorder,
        existing: &ConfigTree,
    ) -> Observation {
        FeatureFlagsObserver::observe(self, lister, recorder, existing)
    }
}

fn enabled_flag(name: &str) -> String {
    format!("{name}=true")
}

fn disabled_flag(name: &str) -> String {
    format!("{name}=false")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ListerError;
    use crate::feature_set::FeatureGateEnabledDisabled;
    use crate::lister::FeatureGateCache;
    use featuregate_core::{EventType, InMemoryRecorder, TreeError};
    use serde_json::{Value, json};

    const PATH: [&str; 2] = ["apiServerArguments", "feature-gates"];

    fn registry() -> Arc<FeatureSetRegistry> {
        Arc::new(FeatureSetRegistry::new().with(
            FeatureSet::Default,
            FeatureGateEnabledDisabled::new(["A", "B"], ["C"]),
        ))
    }

    fn tree(value: Value) -> ConfigTree {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    struct FailingLister;

    impl FeatureGateLister for FailingLister {
        fn get(&self, _name: &str) -> Result<Option<Arc<FeatureGate>>, ListerError> {
            Err(ListerError::unavailable("connection refused"))
        }
    }

    #[test]
    fn test_allow_all_keeps_registry_order() {
        let observer = FeatureFlagsObserver::new(Vec::<String>::new(), PATH).with_registry(registry());
        assert!(observer.allow_all());

        let names = observer
            .feature_names(&FeatureGate::cluster(FeatureSet::Default))
            .unwrap();
        assert_eq!(names, vec!["A=true", "B=true", "C=false"]);
    }

    #[test]
    fn test_allow_list_filters() {
        let observer = FeatureFlagsObserver::new(["A"], PATH).with_registry(registry());
        assert!(!observer.allow_all());

        let names = observer
            .feature_names(&FeatureGate::cluster(FeatureSet::Default))
            .unwrap();
        assert_eq!(names, vec!["A=true"]);
    }

    #[test]
    fn test_custom_ignores_allow_list_and_keeps_duplicates() {
        let observer = FeatureFlagsObserver::new(["Unrelated"], PATH);
        let gate = FeatureGate::custom(FeatureGateEnabledDisabled::new(["X", "Y", "X"], ["X"]));

        let names = observer.feature_names(&gate).unwrap();
        assert_eq!(names, vec!["X=true", "Y=true", "X=true", "X=false"]);
    }

    #[test]
    fn test_custom_without_selection() {
        let observer = FeatureFlagsObserver::new(Vec::<String>::new(), PATH);
        let err = observer
            .feature_names(&FeatureGate::cluster(FeatureSet::CustomNoUpgrade))
            .unwrap_err();
        assert_eq!(
            err,
            ObserveError::MissingCustomSelection(FeatureSet::CustomNoUpgrade)
        );
    }

    #[test]
    fn test_unknown_feature_set() {
        let observer = FeatureFlagsObserver::new(Vec::<String>::new(), PATH);
        let err = observer
            .feature_names(&FeatureGate::cluster(FeatureSet::parse("LatestBuilt")))
            .unwrap_err();
        assert_eq!(err, ObserveError::UnknownFeatureSet("LatestBuilt".to_string()));
    }

    #[test]
    fn test_registry_set_without_custom_data_ignores_custom_block() {
        let observer = FeatureFlagsObserver::new(Vec::<String>::new(), PATH).with_registry(registry());
        let gate = FeatureGate::cluster(FeatureSet::Default)
            .with_custom(FeatureGateEnabledDisabled::new(["Z"], Vec::<String>::new()));

        let names = observer.feature_names(&gate).unwrap();
        assert_eq!(names, vec!["A=true", "B=true", "C=false"]);
    }

    #[test]
    fn test_observe_writes_flags_and_records_change() {
        let observer = FeatureFlagsObserver::new(Vec::<String>::new(), PATH).with_registry(registry());
        let lister = FeatureGateCache::with_gates([FeatureGate::cluster(FeatureSet::Default)]);
        let recorder = InMemoryRecorder::new();

        let observation = observer.observe(&lister, &recorder, &ConfigTree::new());

        assert!(observation.is_ok());
        assert_eq!(
            Value::Object(observation.config),
            json!({ "apiServerArguments": { "feature-gates": ["A=true", "B=true", "C=false"] } })
        );

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Normal);
        assert_eq!(events[0].reason, REASON_FLAGS_UPDATED);
        assert_eq!(
            events[0].message,
            "Updated apiServerArguments.feature-gates to A=true,B=true,C=false"
        );
    }

    #[test]
    fn test_observe_lookup_failure_keeps_previous() {
        let observer = FeatureFlagsObserver::new(Vec::<String>::new(), PATH);
        let recorder = InMemoryRecorder::new();
        let existing = tree(json!({
            "apiServerArguments": { "feature-gates": ["Old=true"], "other": 1 }
        }));

        let observation = observer.observe(&FailingLister, &recorder, &existing);

        assert_eq!(
            Value::Object(observation.config),
            json!({ "apiServerArguments": { "feature-gates": ["Old=true"] } })
        );
        assert_eq!(
            observation.errors,
            vec![ObserveError::lookup(
                CLUSTER_FEATURE_GATE,
                ListerError::unavailable("connection refused")
            )]
        );
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_observe_lookup_failure_keeps_empty_previous_list() {
        let observer = FeatureFlagsObserver::new(Vec::<String>::new(), ["a", "b"]);
        let recorder = InMemoryRecorder::new();
        let existing = tree(json!({ "a": { "b": [] } }));

        let observation = observer.observe(&FailingLister, &recorder, &existing);

        assert_eq!(Value::Object(observation.config), json!({ "a": { "b": [] } }));
        assert_eq!(observation.errors.len(), 1);
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_observe_malformed_existing_value() {
        let observer = FeatureFlagsObserver::new(Vec::<String>::new(), PATH).with_registry(registry());
        let lister = FeatureGateCache::with_gates([]);
        let recorder = InMemoryRecorder::new();
        let existing = tree(json!({ "apiServerArguments": { "feature-gates": "A=true" } }));

        let observation = observer.observe(&lister, &recorder, &existing);

        assert_eq!(observation.errors.len(), 1);
        assert!(matches!(
            observation.errors[0],
            ObserveError::Tree(TreeError::WrongType { .. })
        ));
        assert_eq!(
            observation.config["apiServerArguments"]["feature-gates"],
            json!(["A=true", "B=true", "C=false"])
        );
        assert_eq!(recorder.events_of(EventType::Normal).len(), 1);
    }

    #[test]
    fn test_observe_empty_path_warns() {
        let observer = FeatureFlagsObserver::new(Vec::<String>::new(), Vec::<String>::new())
            .with_registry(registry());
        let lister = FeatureGateCache::with_gates([]);
        let recorder = InMemoryRecorder::new();

        let observation = observer.observe(&lister, &recorder, &ConfigTree::new());

        assert!(observation.config.is_empty());
        assert_eq!(
            observation.errors,
            vec![
                ObserveError::Tree(TreeError::EmptyPath),
                ObserveError::Tree(TreeError::EmptyPath),
            ]
        );
        let warnings = recorder.events_of(EventType::Warning);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].reason, REASON_FLAGS_FAILED);
    }

    #[test]
    fn test_observer_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FeatureFlagsObserver>();
    }
}
