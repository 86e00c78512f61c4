//! Building blocks shared by featuregate observers.
//!
//! - [`tree`]: typed get/set of values inside an untyped nested configuration
//!   document, plus a recursive merge used when combining observer output
//! - [`events`]: the [`Recorder`] sink observers announce changes through,
//!   with tracing, in-memory and broadcast implementations

pub mod error;
pub mod events;
pub mod tree;

pub use error::TreeError;
pub use events::{
    BroadcastRecorder, Event, EventType, InMemoryRecorder, Recorder, TracingRecorder,
};
pub use tree::ConfigTree;
