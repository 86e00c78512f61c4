//! Feature gate observation
//!
//! Turns the cluster-wide `FeatureGate` selection into the
//! `--feature-gates`-style flag list a server should run with, and keeps that
//! list up to date inside an observed configuration document.
//!
//! # Architecture
//!
//! ```text
//!   FeatureGateCache ──get("cluster")──┐
//!                                      ▼
//!   existing config ──────────► FeatureFlagsObserver ──► Observation
//!                                      │                  (fragment + errors)
//!                          FeatureSetRegistry / allow-list
//!                                      │
//!                                   Recorder (events, warnings)
//!
//!   ConfigObserverController: runs observers, merges fragments,
//!   publishes the merged observed config
//! ```

pub mod controller;
pub mod error;
pub mod feature_set;
pub mod lister;
pub mod observer;
pub mod settings;
pub mod source;

// Re-export main types
pub use controller::{ConfigObserverController, ControllerHandle, SyncReport};
pub use error::{ListerError, ObserveError, SettingsError};
pub use feature_set::{FeatureGateEnabledDisabled, FeatureSet, FeatureSetRegistry};
pub use lister::{FeatureGateCache, FeatureGateLister};
pub use observer::{FeatureFlagsObserver, ObserveConfig, Observation};
pub use settings::ObserverSettings;
pub use source::{CLUSTER_FEATURE_GATE, FeatureGate, FeatureGateSelection, FeatureGateSpec};
