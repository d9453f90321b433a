use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Measures one chunk against the high-water mark.
pub type SizeFn = Arc<dyn Fn(&Value) -> i64 + Send + Sync>;

/// Consumer-side buffering policy for a stream.
///
/// `high_water_mark` is the credit the producer starts with; the consumer's
/// desired size is `high_water_mark` minus the size of everything queued.
#[derive(Clone)]
pub struct QueueingStrategy {
    pub high_water_mark: i64,
    size: Option<SizeFn>,
}

impl QueueingStrategy {
    /// Every chunk counts as 1.
    pub fn count(high_water_mark: i64) -> Self {
        Self {
            high_water_mark,
            size: None,
        }
    }

    /// Chunks are measured by `size`.
    pub fn with_size<F>(high_water_mark: i64, size: F) -> Self
    where
        F: Fn(&Value) -> i64 + Send + Sync + 'static,
    {
        Self {
            high_water_mark,
            size: Some(Arc::new(size)),
        }
    }

    /// Array chunks count their length; anything else counts as 1.
    pub fn array_length(high_water_mark: i64) -> Self {
        Self::with_size(high_water_mark, |chunk| match chunk {
            Value::Array(items) => items.len() as i64,
            _ => 1,
        })
    }

    pub fn size_of(&self, chunk: &Value) -> i64 {
        self.size.as_ref().map_or(1, |size| size(chunk))
    }
}

impl Default for QueueingStrategy {
    fn default() -> Self {
        Self::count(1)
    }
}

impl fmt::Debug for QueueingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueingStrategy")
            .field("high_water_mark", &self.high_water_mark)
            .field("size", &self.size.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
