//! Concurrent iterator trigger.
//!
//! Runs a graph's single leaf node once per element of a data source with
//! bounded parallelism, per-attempt timeouts, retries and optional streaming.

pub mod config;
pub mod iterator;
pub mod node;
pub mod policy;
pub mod source;

pub use config::TriggerConfig;
pub use iterator::{IteratorTrigger, TriggerOutput};
pub use node::{Graph, LeafGraph, MapNode, OutputStream, TerminalNode};
pub use policy::{RetryDecision, RetryPolicy, Sleeper, TokioSleeper};
pub use source::{
    DataSource, InputSource, IterableSource, SourcePayload, TaskContext, ValueSource, ValueStream,
};
