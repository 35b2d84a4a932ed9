//! Actuate Core: the action execution pipeline of an LLM agent framework.
//!
//! - [`action`]: structured action results, payload schema reflection,
//!   tolerant payload extraction from model text and the `Action` contract
//! - [`trigger`]: an iterator trigger that drives one terminal computation
//!   over many inputs with bounded parallelism, retries and timeouts
//!
//! Nothing here talks to a model or a network. Prompting, memory and the
//! graph engine live in the layers built on top.

pub mod action;
pub mod error;
pub mod trigger;

// Convenience re-exports
pub use action::{Action, ActionCore, ActionOutput, RunContext};
pub use error::{ActionError, BoxError, TriggerError};
pub use trigger::{IteratorTrigger, TriggerConfig, TriggerOutput};
