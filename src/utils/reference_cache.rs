use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::face::FaceEncoding;

/// A stored photo is identified by its owner and upload time, so a new upload
/// gets a new key and the old entry simply ages out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferenceKey {
    pub student_id: u64,
    pub version: i64,
}

/// Encodings of stored reference photos.
#[derive(Clone)]
pub struct ReferenceCache {
    inner: Cache<ReferenceKey, Arc<FaceEncoding>>,
}

impl ReferenceCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(Duration::from_secs(86400)) // 24h TTL
                .build(),
        }
    }

    pub async fn get(&self, key: &ReferenceKey) -> Option<Arc<FaceEncoding>> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: ReferenceKey, encoding: Arc<FaceEncoding>) {
        self.inner.insert(key, encoding).await;
    }
}
