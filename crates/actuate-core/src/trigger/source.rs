//! Data sources for the iterator trigger.
//!
//! Whatever the caller hands in is normalized into one asynchronous
//! sequence, in source order:
//!
//! - an async stream is consumed as-is
//! - a synchronous iterator is drained element by element
//! - an [`InputSource`] is read once; a streamed payload yields every
//!   element, a single payload yields itself
//! - any other value is the only element

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_stream::{Stream, StreamExt};

use crate::error::{BoxError, TriggerError};

pub type ValueStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Identity of the task reading an input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContext {
    pub task_id: String,
}

impl TaskContext {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }
}

/// Result of reading an [`InputSource`].
pub enum SourcePayload<T> {
    Single(T),
    Stream(ValueStream<T>),
}

impl<T> SourcePayload<T> {
    pub fn is_stream(&self) -> bool {
        matches!(self, SourcePayload::Stream(_))
    }
}

/// An abstract producer of one value or one stream of values.
#[async_trait]
pub trait InputSource<T>: Send + Sync {
    async fn read(&self, ctx: &TaskContext) -> Result<SourcePayload<T>, BoxError>;
}

/// Input source over an owned collection; every read streams a copy of it.
#[derive(Debug, Clone)]
pub struct IterableSource<T> {
    items: Vec<T>,
}

impl<T> IterableSource<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }
}

#[async_trait]
impl<T> InputSource<T> for IterableSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn read(&self, _ctx: &TaskContext) -> Result<SourcePayload<T>, BoxError> {
        let items = self.items.clone();
        Ok(SourcePayload::Stream(Box::pin(tokio_stream::iter(items))))
    }
}

/// Input source that yields a single value.
#[derive(Debug, Clone)]
pub struct ValueSource<T> {
    value: T,
}

impl<T> ValueSource<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

#[async_trait]
impl<T> InputSource<T> for ValueSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn read(&self, _ctx: &TaskContext) -> Result<SourcePayload<T>, BoxError> {
        Ok(SourcePayload::Single(self.value.clone()))
    }
}

/// Data handed to an iterator trigger.
pub enum DataSource<T> {
    Stream(ValueStream<T>),
    Iter(Box<dyn Iterator<Item = T> + Send>),
    Input(Arc<dyn InputSource<T>>),
    Value(T),
}

impl<T> DataSource<T>
where
    T: Send + 'static,
{
    pub fn stream(stream: impl Stream<Item = T> + Send + 'static) -> Self {
        DataSource::Stream(Box::pin(stream))
    }

    pub fn iter<It>(iter: It) -> Self
    where
        It: IntoIterator<Item = T>,
        It::IntoIter: Send + 'static,
    {
        DataSource::Iter(Box::new(iter.into_iter()))
    }

    pub fn input(source: impl InputSource<T> + 'static) -> Self {
        DataSource::Input(Arc::new(source))
    }

    pub fn value(value: T) -> Self {
        DataSource::Value(value)
    }

    /// Normalize into one ordered stream. A failed input-source read shows
    /// up as an `Err` item.
    pub fn into_stream(self, ctx: TaskContext) -> ValueStream<Result<T, TriggerError>> {
        match self {
            DataSource::Stream(stream) => Box::pin(stream.map(Ok)),
            DataSource::Iter(iter) => Box::pin(tokio_stream::iter(iter).map(Ok)),
            DataSource::Input(source) => Box::pin(async_stream::stream! {
                match source.read(&ctx).await {
                    Ok(SourcePayload::Single(value)) => yield Ok(value),
                    Ok(SourcePayload::Stream(mut stream)) => {
                        while let Some(value) = stream.next().await {
                            yield Ok(value);
                        }
                    }
                    Err(e) => yield Err(TriggerError::Input(e)),
                }
            }),
            DataSource::Value(value) => Box::pin(tokio_stream::once(Ok(value))),
        }
    }
}

impl<T: Send + 'static> From<Vec<T>> for DataSource<T> {
    fn from(items: Vec<T>) -> Self {
        DataSource::iter(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain<T: Send + 'static>(source: DataSource<T>) -> Vec<T> {
        source
            .into_stream(TaskContext::new("test"))
            .map(|item| item.unwrap())
            .collect()
            .await
    }

    struct FailingSource;

    #[async_trait]
    impl InputSource<u32> for FailingSource {
        async fn read(&self, ctx: &TaskContext) -> Result<SourcePayload<u32>, BoxError> {
            Err(format!("dataset offline for {}", ctx.task_id).into())
        }
    }

    #[tokio::test]
    async fn test_iter_preserves_order() {
        assert_eq!(drain(DataSource::from(vec![3, 1, 2])).await, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_async_stream_source() {
        let source = DataSource::stream(tokio_stream::iter(vec!["a", "b"]));
        assert_eq!(drain(source).await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_input_source_stream_payload() {
        let source = DataSource::input(IterableSource::new(vec![10u32, 20, 30]));
        assert_eq!(drain(source).await, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_input_source_single_payload() {
        let payload = ValueSource::new("only".to_string());
        let ctx = TaskContext::new("t");
        assert!(!payload.read(&ctx).await.unwrap().is_stream());
        assert_eq!(drain(DataSource::input(payload)).await, vec!["only".to_string()]);
    }

    #[tokio::test]
    async fn test_plain_value_is_single_element() {
        assert_eq!(drain(DataSource::value(42)).await, vec![42]);
    }

    #[tokio::test]
    async fn test_infinite_iterator_is_lazy() {
        let stream = DataSource::iter(0u64..).into_stream(TaskContext::new("t"));
        let first: Vec<u64> = stream.take(3).map(|r| r.unwrap()).collect().await;
        assert_eq!(first, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_failed_read_surfaces_error() {
        let mut stream = DataSource::input(FailingSource).into_stream(TaskContext::new("t:read"));
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, TriggerError::Input(_)));
        assert!(err.to_string().contains("t:read"));
        assert!(stream.next().await.is_none());
    }
}
