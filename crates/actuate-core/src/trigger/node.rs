//! Contracts of the computation an iterator trigger drives.
//!
//! The graph engine itself lives elsewhere. The trigger only needs the
//! graph's leaf nodes (it requires exactly one) and a cleanup hook to call
//! once a streamed element has finished.

use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_stream::Stream;

use crate::error::BoxError;

/// Stream of outputs produced by a streaming leaf call.
pub type OutputStream<O> = Pin<Box<dyn Stream<Item = Result<O, BoxError>> + Send>>;

/// The terminal node of a graph.
#[async_trait]
pub trait TerminalNode<I, O>: Send + Sync
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    fn node_id(&self) -> &str;

    /// Single-shot entry point.
    async fn call(&self, input: &I) -> Result<O, BoxError>;

    /// Streaming entry point. Defaults to a one-item stream over `call`.
    async fn call_stream(&self, input: &I) -> Result<OutputStream<O>, BoxError> {
        let output = self.call(input).await?;
        Ok(Box::pin(tokio_stream::once(Ok(output))))
    }
}

/// A graph as seen by the trigger.
#[async_trait]
pub trait Graph<I, O>: Send + Sync
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    fn leaf_nodes(&self) -> Vec<Arc<dyn TerminalNode<I, O>>>;

    /// Cleanup after a streamed element finished, successfully or not.
    async fn after_run(&self, _task_id: &str) {}
}

/// A graph that is just a fixed set of leaf nodes with no cleanup.
pub struct LeafGraph<I, O> {
    leaves: Vec<Arc<dyn TerminalNode<I, O>>>,
}

impl<I, O> LeafGraph<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    pub fn new(leaves: Vec<Arc<dyn TerminalNode<I, O>>>) -> Self {
        Self { leaves }
    }

    pub fn single(node: impl TerminalNode<I, O> + 'static) -> Self {
        Self::new(vec![Arc::new(node)])
    }
}

impl<I, O> Graph<I, O> for LeafGraph<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    fn leaf_nodes(&self) -> Vec<Arc<dyn TerminalNode<I, O>>> {
        self.leaves.clone()
    }
}

/// Leaf node backed by a plain function, e.g. `|x: &i64| x * x`.
pub struct MapNode<I, O, F> {
    node_id: String,
    func: F,
    _marker: PhantomData<fn(&I) -> O>,
}

impl<I, O, F> MapNode<I, O, F>
where
    F: Fn(&I) -> O + Send + Sync,
{
    pub fn new(node_id: impl Into<String>, func: F) -> Self {
        Self {
            node_id: node_id.into(),
            func,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<I, O, F> TerminalNode<I, O> for MapNode<I, O, F>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
    F: Fn(&I) -> O + Send + Sync,
{
    fn node_id(&self) -> &str {
        &self.node_id
    }

    async fn call(&self, input: &I) -> Result<O, BoxError> {
        Ok((self.func)(input))
    }
}
