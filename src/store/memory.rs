//! 进程内文档存储，单机部署和测试使用

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast, mpsc};

use super::{
    CollectionWatch, Document, DocumentSnapshot, SetOptions, SharedDocumentStore,
    split_document_path, validate_collection_path,
};
use crate::error::StoreError;

/// 变更广播容量，订阅方落后时会重新拉取完整快照
const CHANGE_CHANNEL_CAPACITY: usize = 64;

struct StoredDocument {
    seq: u64,
    fields: Document,
}

struct MemoryInner {
    docs: RwLock<HashMap<String, StoredDocument>>,
    next_seq: AtomicU64,
    changes: broadcast::Sender<String>,
}

#[derive(Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<MemoryInner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                docs: RwLock::new(HashMap::new()),
                next_seq: AtomicU64::new(1),
                changes,
            }),
        }
    }

    fn notify(&self, collection: &str) {
        // 没有订阅者时 send 会失败，忽略即可
        let _ = self.inner.changes.send(collection.to_string());
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedDocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<DocumentSnapshot>, StoreError> {
        let (_, id) = split_document_path(path)?;
        let docs = self.inner.docs.read().await;
        Ok(docs.get(path).map(|stored| DocumentSnapshot {
            id: id.to_string(),
            path: path.to_string(),
            fields: stored.fields.clone(),
        }))
    }

    async fn set(
        &self,
        path: &str,
        fields: Document,
        options: SetOptions,
    ) -> Result<(), StoreError> {
        let (collection, _) = split_document_path(path)?;
        {
            let mut docs = self.inner.docs.write().await;
            match docs.get_mut(path) {
                Some(stored) if options.merge => stored.fields.extend(fields),
                Some(stored) => stored.fields = fields,
                None => {
                    let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
                    docs.insert(path.to_string(), StoredDocument { seq, fields });
                }
            }
        }
        self.notify(collection);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let (collection, _) = split_document_path(path)?;
        let removed = self.inner.docs.write().await.remove(path).is_some();
        if removed {
            self.notify(collection);
        }
        Ok(())
    }

    async fn list_children(&self, collection: &str) -> Result<Vec<DocumentSnapshot>, StoreError> {
        validate_collection_path(collection)?;
        let docs = self.inner.docs.read().await;

        let mut children: Vec<(u64, DocumentSnapshot)> = docs
            .iter()
            .filter_map(|(path, stored)| {
                let (parent, id) = path.rsplit_once('/')?;
                (parent == collection).then(|| {
                    (
                        stored.seq,
                        DocumentSnapshot {
                            id: id.to_string(),
                            path: path.clone(),
                            fields: stored.fields.clone(),
                        },
                    )
                })
            })
            .collect();
        children.sort_by_key(|(seq, _)| *seq);

        Ok(children.into_iter().map(|(_, doc)| doc).collect())
    }

    async fn watch(&self, collection: &str) -> Result<CollectionWatch, StoreError> {
        validate_collection_path(collection)?;
        // 先订阅再拉快照，保证不会漏掉中间的变更
        let mut changes = self.inner.changes.subscribe();
        let (tx, rx) = mpsc::channel(16);
        let store = self.clone();
        let collection = collection.to_string();

        let task = tokio::spawn(async move {
            loop {
                match store.list_children(&collection).await {
                    Ok(docs) => {
                        if tx.send(docs).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => tracing::warn!("Watch on {} failed to list: {}", collection, e),
                }

                loop {
                    match changes.recv().await {
                        Ok(changed) if changed == collection => break,
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!("Watch on {} lagged by {}", collection, skipped);
                            break;
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        });

        Ok(CollectionWatch::new(rx, task))
    }
}
