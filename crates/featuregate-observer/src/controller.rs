//! Observer controller
//!
//! Runs every registered [`ObserveConfig`] against the current observed
//! configuration, deep-merges their fragments and publishes the result when
//! it differs from what was there before.

use arc_swap::ArcSwap;
use featuregate_core::tree::merge_trees;
use featuregate_core::{ConfigTree, Recorder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ObserveError;
use crate::lister::FeatureGateLister;
use crate::observer::ObserveConfig;

/// Reason used when the merged observed config changes
pub const REASON_CONFIG_CHANGED: &str = "ObservedConfigChanged";

/// Shortest interval the sync loop runs at
pub const MIN_RESYNC_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of one [`ConfigObserverController::sync`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Whether the observed config was replaced
    pub changed: bool,
    /// Errors from all observers, in registration order
    pub errors: Vec<ObserveError>,
}

impl SyncReport {
    /// A degraded sync still publishes what the observers returned
    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Drives a set of observers and holds the merged observed config
pub struct ConfigObserverController {
    observers: Vec<Box<dyn ObserveConfig>>,
    lister: Arc<dyn FeatureGateLister>,
    recorder: Arc<dyn Recorder>,
    observed: ArcSwap<ConfigTree>,
}

impl ConfigObserverController {
    pub fn new(lister: Arc<dyn FeatureGateLister>, recorder: Arc<dyn Recorder>) -> Self {
        Self {
            observers: Vec::new(),
            lister,
            recorder,
            observed: ArcSwap::from_pointee(ConfigTree::new()),
        }
    }

    /// Register an observer; observers run and merge in registration order
    pub fn with_observer(mut self, observer: impl ObserveConfig + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Start from previously persisted observed config
    pub fn with_observed_config(self, config: ConfigTree) -> Self {
        self.observed.store(Arc::new(config));
        self
    }

    /// Snapshot of the current observed config
    pub fn observed_config(&self) -> Arc<ConfigTree> {
        self.observed.load_full()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Run all observers once and publish the merged result
    pub fn sync(&self) -> SyncReport {
        let existing = self.observed.load_full();
        let mut merged = ConfigTree::new();
        let mut errors = Vec::new();

        for observer in &self.observers {
            let (config, observer_errors) = observer
                .observe(&*self.lister, &*self.recorder, &existing)
                .into_parts();
            if !observer_errors.is_empty() {
                warn!(
                    observer = observer.name(),
                    errors = observer_errors.len(),
                    "Observer reported errors"
                );
            }
            errors.extend(observer_errors);
            merge_trees(&mut merged, config);
        }

        let changed = *existing != merged;
        if changed {
            self.recorder.event(
                REASON_CONFIG_CHANGED,
                &format!(
                    "Writing updated observed config: {}",
                    serde_json::Value::Object(merged.clone())
                ),
            );
            self.observed.store(Arc::new(merged));
        } else {
            debug!("Observed config unchanged");
        }

        SyncReport { changed, errors }
    }

    /// Spawn a task calling [`sync`](Self::sync) every `interval`
    ///
    /// Intervals shorter than [`MIN_RESYNC_INTERVAL`] are raised to it.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> ControllerHandle {
        let interval = interval.max(MIN_RESYNC_INTERVAL);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            info!(
                observers = self.observer_count(),
                interval_ms = interval.as_millis() as u64,
                "Started config observer controller"
            );

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!("Stopping config observer controller");
                        break;
                    }
                    _ = ticker.tick() => {
                        let report = self.sync();
                        for err in &report.errors {
                            warn!(error = %err, "Config observation failed");
                        }
                    }
                }
            }
        });

        ControllerHandle {
            handle,
            shutdown: shutdown_tx,
        }
    }
}

impl std::fmt::Debug for ConfigObserverController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigObserverController")
            .field("observers", &self.observers.len())
            .field("observed", &self.observed.load_full())
            .finish()
    }
}

/// Handle for a running controller loop
pub struct ControllerHandle {
    handle: JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
}

impl ControllerHandle {
    /// Stop the loop and wait for it to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}
