use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{ObjectStore, ObjectStoreError};

/// Map-backed store for dev and tests. Presigned URLs are synthetic but
/// keep the key and expiry visible so handlers can be asserted against.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, (String, Vec<u8>)>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn put(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ObjectStoreError> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (content_type.to_string(), bytes));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String, ObjectStoreError> {
        Ok(format!(
            "memory://put/{key}?content-type={content_type}&expires={}",
            ttl.as_secs()
        ))
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, ObjectStoreError> {
        Ok(format!("memory://get/{key}?expires={}", ttl.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let store = InMemoryObjectStore::new();
        store
            .put("audio-1.wav", "audio/wav", vec![1, 2, 3])
            .await
            .unwrap();

        assert_eq!(store.get("audio-1.wav").await.unwrap(), vec![1, 2, 3]);

        store.delete("audio-1.wav").await.unwrap();
        assert!(matches!(
            store.get("audio-1.wav").await,
            Err(ObjectStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn presigned_urls_carry_key_and_ttl() {
        let store = InMemoryObjectStore::new();
        let url = store
            .presign_put("audio-1.wav", "audio/wav", Duration::from_secs(300))
            .await
            .unwrap();
        assert!(url.contains("audio-1.wav"));
        assert!(url.contains("expires=300"));
    }
}
