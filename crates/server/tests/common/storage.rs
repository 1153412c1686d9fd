//! Object store wrapper with switchable failures.

use async_trait::async_trait;
use bytes::Bytes;
use musicspot_storage::error::{StorageError, StorageResult};
use musicspot_storage::traits::{ObjectMeta, ObjectStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Delegates to an inner store. Once armed, `put` fails after the allowed number
/// of further writes, and `delete` fails outright.
#[allow(dead_code)]
pub struct FaultyBackend {
    inner: Arc<dyn ObjectStore>,
    /// Puts still allowed before failing, or `usize::MAX` when disarmed.
    puts_left: AtomicUsize,
    fail_deletes: AtomicBool,
}

#[allow(dead_code)]
impl FaultyBackend {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            puts_left: AtomicUsize::new(usize::MAX),
            fail_deletes: AtomicBool::new(false),
        })
    }

    /// Let `allowed` more puts through, then fail every one after.
    pub fn fail_puts_after(&self, allowed: usize) {
        self.puts_left.store(allowed, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn injected(op: &str, key: &str) -> StorageError {
        StorageError::Io(std::io::Error::other(format!("injected {op} failure: {key}")))
    }
}

#[async_trait]
impl ObjectStore for FaultyBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let allowed = self
            .puts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                usize::MAX => Some(usize::MAX),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok();
        if !allowed {
            return Err(Self::injected("put", key));
        }
        self.inner.put(key, data).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::injected("delete", key));
        }
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}
