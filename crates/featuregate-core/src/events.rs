//! Event recording for observers
//!
//! Observers announce what they changed through a [`Recorder`]. Recording is
//! fire-and-forget: a recorder never reports failure back to the caller.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Default buffer size for the broadcast channel.
const DEFAULT_BUFFER_SIZE: usize = 256;

/// Severity of a recorded event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Informational change notification
    Normal,
    /// Something went wrong but the caller carried on
    Warning,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Warning => write!(f, "Warning"),
        }
    }
}

/// A single recorded event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Machine-readable reason, e.g. `ObserveFeatureFlagsUpdated`
    pub reason: String,
    /// Human-readable message
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Event {
    /// Create a new event stamped with the current time
    pub fn new(event_type: EventType, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event_type,
            reason: reason.into(),
            message: message.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Create a `Normal` event
    pub fn normal(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EventType::Normal, reason, message)
    }

    /// Create a `Warning` event
    pub fn warning(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EventType::Warning, reason, message)
    }
}

/// Sink for change and warning notifications
pub trait Recorder: Send + Sync {
    /// Record an informational event
    fn event(&self, reason: &str, message: &str);

    /// Record a warning event
    fn warning(&self, reason: &str, message: &str);
}

impl<R: Recorder + ?Sized> Recorder for Arc<R> {
    fn event(&self, reason: &str, message: &str) {
        (**self).event(reason, message);
    }

    fn warning(&self, reason: &str, message: &str) {
        (**self).warning(reason, message);
    }
}

/// Recorder that writes events to the `tracing` log
#[derive(Debug, Clone)]
pub struct TracingRecorder {
    component: String,
}

impl TracingRecorder {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }
}

impl Recorder for TracingRecorder {
    fn event(&self, reason: &str, message: &str) {
        info!(component = %self.component, reason, "{message}");
    }

    fn warning(&self, reason: &str, message: &str) {
        warn!(component = %self.component, reason, "{message}");
    }
}

/// Recorder that keeps every event in memory, in order
#[derive(Debug, Default)]
pub struct InMemoryRecorder {
    events: Mutex<Vec<Event>>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Snapshot of all recorded events
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded events of one type
    pub fn events_of(&self, event_type: EventType) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|event| event.event_type == event_type)
            .collect()
    }

    /// Drop all recorded events
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Recorder for InMemoryRecorder {
    fn event(&self, reason: &str, message: &str) {
        self.push(Event::normal(reason, message));
    }

    fn warning(&self, reason: &str, message: &str) {
        self.push(Event::warning(reason, message));
    }
}

/// Recorder that publishes events on a tokio broadcast channel.
///
/// Events sent while nobody is subscribed are dropped; slow receivers lose
/// the oldest events once the buffer fills.
#[derive(Debug, Clone)]
pub struct BroadcastRecorder {
    sender: broadcast::Sender<Event>,
}

impl BroadcastRecorder {
    /// Create a new recorder with default buffer size.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new recorder with custom buffer size.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events recorded from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Get the current number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn send(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}

impl Default for BroadcastRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for BroadcastRecorder {
    fn event(&self, reason: &str, message: &str) {
        self.send(Event::normal(reason, message));
    }

    fn warning(&self, reason: &str, message: &str) {
        self.send(Event::warning(reason, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_in_memory_recorder_keeps_order() {
        let recorder = InMemoryRecorder::new();
        recorder.event("First", "one");
        recorder.warning("Second", "two");
        recorder.event("Third", "three");

        let reasons: Vec<_> = recorder.events().into_iter().map(|e| e.reason).collect();
        assert_eq!(reasons, vec!["First", "Second", "Third"]);
        assert_eq!(recorder.events_of(EventType::Warning).len(), 1);

        recorder.clear();
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_recorder_through_arc() {
        let recorder = Arc::new(InMemoryRecorder::new());
        let shared: Arc<dyn Recorder> = recorder.clone();
        shared.event("Reason", "message");
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::warning("ObserveFeatureFlags", "Failed setting a.b");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Warning");
        assert_eq!(json["reason"], "ObserveFeatureFlags");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    #[traced_test]
    fn test_tracing_recorder_logs_events() {
        let recorder = TracingRecorder::new("kube-apiserver-operator");
        assert_eq!(recorder.component(), "kube-apiserver-operator");

        recorder.event("ObserveFeatureFlagsUpdated", "Updated a.b to A=true");
        recorder.warning("ObserveFeatureFlags", "Failed setting a.b");

        assert!(logs_contain("INFO"));
        assert!(logs_contain("Updated a.b to A=true"));
        assert!(logs_contain("WARN"));
        assert!(logs_contain("Failed setting a.b"));
        assert!(logs_contain("kube-apiserver-operator"));
    }

    #[tokio::test]
    async fn test_broadcast_zero_capacity_is_usable() {
        let recorder = BroadcastRecorder::with_capacity(0);
        let mut rx = recorder.subscribe();

        recorder.warning("ObserveFeatureFlags", "Failed setting a.b");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::Warning);
    }

    #[test]
    fn test_broadcast_without_subscribers() {
        let recorder = BroadcastRecorder::new();
        assert_eq!(recorder.subscriber_count(), 0);
        recorder.event("Dropped", "nobody listening");
    }

    #[tokio::test]
    async fn test_broadcast_recorder() {
        let recorder = BroadcastRecorder::with_capacity(8);
        let mut rx = recorder.subscribe();

        recorder.event("ObservedConfigChanged", "Writing updated observed config");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::Normal);
        assert_eq!(event.reason, "ObservedConfigChanged");
    }
}
