use async_trait::async_trait;
use bytes::Bytes;
use musicspot_storage::error::{StorageError, StorageResult};
use musicspot_storage::traits::{ObjectMeta, ObjectStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Backend that delegates to an inner store but rejects every `put` after the
/// first `allowed_puts` succeed. Simulates a blob store failing mid-write.
#[allow(dead_code)]
pub struct FailingBackend {
    inner: Arc<dyn ObjectStore>,
    allowed_puts: usize,
    puts: AtomicUsize,
}

#[allow(dead_code)]
impl FailingBackend {
    pub fn new(inner: Arc<dyn ObjectStore>, allowed_puts: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            allowed_puts,
            puts: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ObjectStore for FailingBackend {
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
        if self.puts.fetch_add(1, Ordering::SeqCst) >= self.allowed_puts {
            return Err(StorageError::Io(std::io::Error::other(format!(
                "injected put failure: {key}"
            ))));
        }
        self.inner.put(key, data).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Backend that counts `get` calls. Used to observe how lazily segments are fetched.
#[allow(dead_code)]
pub struct CountingBackend {
    inner: Arc<dyn ObjectStore>,
    pub gets: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl CountingBackend {
    pub fn new(inner: Arc<dyn ObjectStore>) -> (Arc<Self>, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(Self {
            inner,
            gets: counter.clone(),
        });
        (backend, counter)
    }
}

#[async_trait]
impl ObjectStore for CountingBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner.put(key, data).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}
