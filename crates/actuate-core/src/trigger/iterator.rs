//! IteratorTrigger: replays a graph's leaf node once per input element.
//!
//! ```text
//! DataSource ──► into_stream ──► element 0 ─┐
//!                                element 1 ─┼─► Semaphore(parallel_limit) ──► leaf.call / leaf.call_stream
//!                                element 2 ─┘                                   │
//!                                                     slots[index] ◄────────────┘
//! ```
//!
//! Each element runs as its own task. Results land in a slot keyed by the
//! element's submission index, so the returned list follows input order no
//! matter which task finishes first. The first unrecoverable element failure
//! aborts the remaining tasks and fails the whole call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_stream::StreamExt;

use crate::error::TriggerError;
use crate::trigger::config::TriggerConfig;
use crate::trigger::node::{Graph, OutputStream, TerminalNode};
use crate::trigger::policy::{RetryDecision, RetryPolicy, Sleeper, TokioSleeper};
use crate::trigger::source::{DataSource, TaskContext};

/// Output paired with an input element.
pub enum TriggerOutput<O> {
    /// Single-shot result
    Value(O),
    /// Streaming result. The graph's `after_run` hook fires once the stream
    /// is exhausted or dropped.
    Stream(OutputStream<O>),
}

impl<O> TriggerOutput<O> {
    pub fn is_stream(&self) -> bool {
        matches!(self, TriggerOutput::Stream(_))
    }

    pub fn into_value(self) -> Option<O> {
        match self {
            TriggerOutput::Value(value) => Some(value),
            TriggerOutput::Stream(_) => None,
        }
    }

    pub fn into_stream(self) -> Option<OutputStream<O>> {
        match self {
            TriggerOutput::Stream(stream) => Some(stream),
            TriggerOutput::Value(_) => None,
        }
    }
}

impl<O: std::fmt::Debug> std::fmt::Debug for TriggerOutput<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerOutput::Value(value) => f.debug_tuple("Value").field(value).finish(),
            TriggerOutput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Drives a graph's single leaf node over every element of a data source.
pub struct IteratorTrigger<I, O> {
    node_id: String,
    data: DataSource<I>,
    parallel_limit: usize,
    streaming: bool,
    show_progress: bool,
    policy: RetryPolicy,
    graph: Option<Arc<dyn Graph<I, O>>>,
    sleeper: Arc<dyn Sleeper>,
}

impl<I, O> IteratorTrigger<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    pub fn new(data: impl Into<DataSource<I>>) -> Self {
        Self {
            node_id: uuid::Uuid::new_v4().to_string(),
            data: data.into(),
            parallel_limit: 1,
            streaming: false,
            show_progress: true,
            policy: RetryPolicy::default(),
            graph: None,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Build a trigger with every setting taken from `config`.
    pub fn from_config(
        data: impl Into<DataSource<I>>,
        config: &TriggerConfig,
    ) -> Result<Self, TriggerError> {
        let policy = config.retry_policy()?;
        let mut trigger = Self::new(data);
        trigger.parallel_limit = config.parallel_limit;
        trigger.streaming = config.streaming;
        trigger.show_progress = config.show_progress;
        trigger.policy = policy;
        Ok(trigger)
    }

    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = node_id.into();
        self
    }

    pub fn parallel_limit(mut self, limit: usize) -> Self {
        self.parallel_limit = limit;
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.policy.max_retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.policy.retry_delay = delay;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.policy.timeout = Some(timeout);
        self
    }

    /// Let every attempt run to completion.
    pub fn no_timeout(mut self) -> Self {
        self.policy.timeout = None;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Attach the graph whose leaf node is driven.
    pub fn bind(mut self, graph: Arc<dyn Graph<I, O>>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Run the leaf node once per element and return `(input, output)` pairs
    /// in input order.
    ///
    /// `parallel_limit` overrides the configured limit for this call.
    pub async fn trigger(
        self,
        parallel_limit: Option<usize>,
    ) -> Result<Vec<(I, TriggerOutput<O>)>, TriggerError> {
        let graph = self.graph.clone().ok_or_else(|| {
            TriggerError::Configuration("No graph bound to IteratorTrigger".to_string())
        })?;
        let leaf = single_leaf(graph.as_ref())?;
        let limit = parallel_limit.unwrap_or(self.parallel_limit);
        if limit == 0 {
            return Err(TriggerError::Configuration(
                "parallel_limit must be at least 1".to_string(),
            ));
        }

        tracing::info!(
            "[IteratorTrigger] Triggering node {} (leaf: {}, parallel: {}, streaming: {}, max_retries: {})",
            self.node_id,
            leaf.node_id(),
            limit,
            self.streaming,
            self.policy.max_retries
        );

        let limiter = Arc::new(Semaphore::new(limit));
        let mut tasks: JoinSet<(usize, Result<(I, TriggerOutput<O>), TriggerError>)> =
            JoinSet::new();
        let mut inputs = self.data.into_stream(TaskContext::new(self.node_id.clone()));
        let mut submitted = 0usize;

        while let Some(input) = inputs.next().await {
            // Returning drops the JoinSet, which aborts everything in flight.
            let input = input?;
            let element = ElementRun {
                index: submitted,
                task_id: format!("{}:{}", self.node_id, submitted),
                leaf: leaf.clone(),
                graph: graph.clone(),
                limiter: limiter.clone(),
                policy: self.policy,
                sleeper: self.sleeper.clone(),
                streaming: self.streaming,
            };
            tasks.spawn(element.run(input));
            submitted += 1;
        }

        let mut slots: Vec<Option<(I, TriggerOutput<O>)>> =
            std::iter::repeat_with(|| None).take(submitted).collect();
        let mut finished = 0usize;

        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined?;
            match result {
                Ok(pair) => slots[index] = Some(pair),
                Err(e) => {
                    tracing::error!(
                        "[IteratorTrigger] Element {} of node {} failed: {}",
                        index,
                        self.node_id,
                        e
                    );
                    return Err(e);
                }
            }
            finished += 1;
            if self.show_progress {
                tracing::debug!(
                    "[IteratorTrigger] {} progress: {}/{}",
                    self.node_id,
                    finished,
                    submitted
                );
            }
        }

        tracing::info!(
            "[IteratorTrigger] Node {} finished {} elements",
            self.node_id,
            submitted
        );
        Ok(slots.into_iter().flatten().collect())
    }
}

fn single_leaf<I, O>(graph: &dyn Graph<I, O>) -> Result<Arc<dyn TerminalNode<I, O>>, TriggerError>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    let mut leaves = graph.leaf_nodes();
    if leaves.len() != 1 {
        return Err(TriggerError::Configuration(format!(
            "IteratorTrigger requires exactly one leaf node, found {}",
            leaves.len()
        )));
    }
    Ok(leaves.remove(0))
}

// ─── Per-element Task ─────────────────────────────────────────────────────

struct ElementRun<I, O> {
    index: usize,
    task_id: String,
    leaf: Arc<dyn TerminalNode<I, O>>,
    graph: Arc<dyn Graph<I, O>>,
    limiter: Arc<Semaphore>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    streaming: bool,
}

impl<I, O> ElementRun<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    async fn run(self, input: I) -> (usize, Result<(I, TriggerOutput<O>), TriggerError>) {
        let index = self.index;
        let _permit = match self.limiter.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return (
                    index,
                    Err(TriggerError::Configuration("limiter closed".to_string())),
                )
            }
        };

        let result = if self.streaming {
            self.run_stream(input).await
        } else {
            self.run_with_retry(input).await
        };
        (index, result)
    }

    async fn run_stream(self, input: I) -> Result<(I, TriggerOutput<O>), TriggerError> {
        let node_id = self.leaf.node_id().to_string();
        let acquired = match self.policy.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.leaf.call_stream(&input)).await {
                Ok(result) => result.map_err(|source| TriggerError::Node {
                    node_id: node_id.clone(),
                    source,
                }),
                Err(_) => Err(TriggerError::Timeout {
                    node_id: node_id.clone(),
                    timeout,
                }),
            },
            None => self
                .leaf
                .call_stream(&input)
                .await
                .map_err(|source| TriggerError::Node {
                    node_id: node_id.clone(),
                    source,
                }),
        };

        match acquired {
            Ok(stream) => {
                let guard = AfterRunGuard::new(self.graph, self.task_id);
                Ok((input, TriggerOutput::Stream(guarded_stream(stream, guard))))
            }
            Err(e) => {
                tracing::warn!(
                    "[IteratorTrigger] Streaming call for {} failed: {}",
                    self.task_id,
                    e
                );
                self.graph.after_run(&self.task_id).await;
                Err(e)
            }
        }
    }

    async fn run_with_retry(self, input: I) -> Result<(I, TriggerOutput<O>), TriggerError> {
        let node_id = self.leaf.node_id().to_string();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let outcome = match self.policy.timeout {
                Some(timeout) => match tokio::time::timeout(timeout, self.leaf.call(&input)).await {
                    Ok(result) => result.map_err(|source| TriggerError::Node {
                        node_id: node_id.clone(),
                        source,
                    }),
                    Err(_) => Err(TriggerError::Timeout {
                        node_id: node_id.clone(),
                        timeout,
                    }),
                },
                None => self
                    .leaf
                    .call(&input)
                    .await
                    .map_err(|source| TriggerError::Node {
                        node_id: node_id.clone(),
                        source,
                    }),
            };

            let err = match outcome {
                Ok(output) => return Ok((input, TriggerOutput::Value(output))),
                Err(err) => err,
            };

            match self.policy.decide(attempts) {
                RetryDecision::Retry { delay } => {
                    tracing::warn!(
                        "[IteratorTrigger] Failed attempt {}/{} for task {}: {}",
                        attempts,
                        self.policy.max_attempts(),
                        self.task_id,
                        err
                    );
                    self.sleeper.sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    return Err(TriggerError::RetriesExhausted {
                        node_id,
                        attempts,
                        source: Box::new(err),
                    });
                }
            }
        }
    }
}

// ─── Streaming Cleanup ────────────────────────────────────────────────────

/// Calls `after_run` exactly once: when the stream completes, or on drop if
/// the consumer abandons it early.
struct AfterRunGuard<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    graph: Option<Arc<dyn Graph<I, O>>>,
    task_id: String,
}

impl<I, O> AfterRunGuard<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    fn new(graph: Arc<dyn Graph<I, O>>, task_id: String) -> Self {
        Self {
            graph: Some(graph),
            task_id,
        }
    }

    async fn finish(&mut self) {
        if let Some(graph) = self.graph.take() {
            graph.after_run(&self.task_id).await;
        }
    }
}

impl<I, O> Drop for AfterRunGuard<I, O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    fn drop(&mut self) {
        let Some(graph) = self.graph.take() else {
            return;
        };
        let task_id = std::mem::take(&mut self.task_id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    graph.after_run(&task_id).await;
                });
            }
            Err(_) => tracing::warn!(
                "[IteratorTrigger] Output stream for {} dropped outside a runtime; after_run skipped",
                task_id
            ),
        }
    }
}

fn guarded_stream<I, O>(mut inner: OutputStream<O>, guard: AfterRunGuard<I, O>) -> OutputStream<O>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut guard = guard;
        while let Some(item) = inner.next().await {
            yield item;
        }
        guard.finish().await;
    })
}
