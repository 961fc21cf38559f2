use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{now_millis, GenerationKind, GenerationPatch, GenerationRecord, NewGeneration, RecordStore};
use crate::errors::GenError;

#[derive(Default)]
struct Inner {
    next_id: i64,
    records: HashMap<i64, GenerationRecord>,
}

/// Process-local record store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: RwLock<Inner>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, new: NewGeneration) -> Result<GenerationRecord, GenError> {
        let mut inner = self.inner.write().await;
        let id = inner.next_id + 1;
        let record = new.into_record(id, now_millis())?;
        inner.next_id = id;
        inner.records.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: i64) -> Result<GenerationRecord, GenError> {
        let inner = self.inner.read().await;
        inner.records.get(&id).cloned().ok_or(GenError::NotFound(id))
    }

    async fn update(&self, id: i64, patch: GenerationPatch) -> Result<GenerationRecord, GenError> {
        let mut inner = self.inner.write().await;
        let record = inner.records.get_mut(&id).ok_or(GenError::NotFound(id))?;
        record.apply(patch)?;
        Ok(record.clone())
    }

    async fn list_by_type(&self, kind: GenerationKind) -> Result<Vec<GenerationRecord>, GenError> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::tests::exercise;
    use crate::records::GenerationStatus;
    use serde_json::json;

    #[tokio::test]
    async fn lifecycle_sequence() {
        let records = exercise(&MemoryRecordStore::new()).await;
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn ids_are_assigned_monotonically() {
        let store = MemoryRecordStore::new();
        let a = store
            .create(NewGeneration::new(GenerationKind::Text, "a", json!({})))
            .await
            .unwrap();
        let b = store
            .create(NewGeneration::new(GenerationKind::Text, "b", json!({})))
            .await
            .unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = MemoryRecordStore::new();
        let new = NewGeneration {
            model: Some("gpt-4o".into()),
            user_id: Some(9),
            ..NewGeneration::new(GenerationKind::Text, "Hello", json!({"temperature": 0.8}))
        };
        let created = store.create(new).await.unwrap();
        let fetched = store.get(created.id).await.unwrap();
        assert_eq!(created, fetched);
        assert_eq!(fetched.parameters, json!({"temperature": 0.8}));
        assert_eq!(fetched.status, GenerationStatus::Pending);
    }

    #[tokio::test]
    async fn update_of_unknown_id_creates_nothing() {
        let store = MemoryRecordStore::new();
        let err = store
            .update(42, GenerationPatch::status(GenerationStatus::Processing))
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::NotFound(42)));
        assert!(store.list_by_type(GenerationKind::Text).await.unwrap().is_empty());
        assert!(matches!(store.get(42).await, Err(GenError::NotFound(42))));
    }

    #[tokio::test]
    async fn list_by_type_filters_kinds() {
        let store = MemoryRecordStore::new();
        for kind in [GenerationKind::Text, GenerationKind::Image, GenerationKind::Text] {
            store
                .create(NewGeneration::new(kind, "p", json!({})))
                .await
                .unwrap();
        }
        assert_eq!(store.list_by_type(GenerationKind::Text).await.unwrap().len(), 2);
        assert_eq!(store.list_by_type(GenerationKind::Image).await.unwrap().len(), 1);
        assert!(store.list_by_type(GenerationKind::Speech).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_update_leaves_record_intact() {
        let store = MemoryRecordStore::new();
        let created = store
            .create(NewGeneration::new(GenerationKind::Image, "p", json!({})))
            .await
            .unwrap();
        store
            .update(created.id, GenerationPatch::status(GenerationStatus::Processing))
            .await
            .unwrap();
        store
            .update(created.id, GenerationPatch::status(GenerationStatus::Failed))
            .await
            .unwrap();
        assert!(store
            .update(created.id, GenerationPatch::status(GenerationStatus::Processing))
            .await
            .is_err());
        let fetched = store.get(created.id).await.unwrap();
        assert_eq!(fetched.status, GenerationStatus::Failed);
    }
}
