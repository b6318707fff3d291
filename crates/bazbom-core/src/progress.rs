use async_trait::async_trait;

/// Receives per-batch completion callbacks from a vulnerability scan so a
/// caller can surface intermediate progress (§4.6 step 5) instead of a
/// single jump once the whole scan finishes.
#[async_trait]
pub trait ScanProgressSink: Send + Sync {
    async fn on_batch_complete(&self, completed: usize, total: usize);
}
