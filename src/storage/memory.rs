use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{MediaStore, ObjectInfo, ObjectMeta, StorageError, StorageResult, StoredObject};

/// Map-backed store used by tests and by `storage.backend = "memory"`.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, (Bytes, String)>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
    fail_lists: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent put fail.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent delete fail, to exercise error reporting.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }
}

#[async_trait]
impl MediaStore for MemoryStore {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> StorageResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!(
                "put of {} rejected by memory store",
                key
            )));
        }
        self.objects
            .write()
            .await
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    async fn head_object(&self, key: &str) -> StorageResult<ObjectMeta> {
        let objects = self.objects.read().await;
        let (body, content_type) = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(ObjectMeta {
            size: body.len() as u64,
            content_type: Some(content_type.clone()),
        })
    }

    async fn get_object(&self, key: &str) -> StorageResult<StoredObject> {
        let objects = self.objects.read().await;
        let (body, content_type) = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(StoredObject {
            body: body.clone(),
            content_type: Some(content_type.clone()),
        })
    }

    async fn get_object_range(
        &self,
        key: &str,
        start: u64,
        end: u64,
    ) -> StorageResult<StoredObject> {
        let objects = self.objects.read().await;
        let (body, content_type) = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let size = body.len() as u64;
        if start > end || start >= size {
            return Err(StorageError::InvalidRange { start, end, size });
        }
        let end = end.min(size - 1);

        Ok(StoredObject {
            body: body.slice(start as usize..=end as usize),
            content_type: Some(content_type.clone()),
        })
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!(
                "delete of {} rejected by memory store",
                key
            )));
        }
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn list_objects(&self) -> StorageResult<Vec<ObjectInfo>> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("listing rejected by memory store".into()));
        }
        Ok(self
            .objects
            .read()
            .await
            .iter()
            .map(|(key, (body, _))| ObjectInfo {
                key: key.clone(),
                size: body.len() as u64,
            })
            .collect())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        if !self.objects.read().await.contains_key(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(format!(
            "/stream/{}?expires_in={}",
            key,
            expires_in.as_secs()
        ))
    }
}
