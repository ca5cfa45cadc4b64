//! 共享文档存储
//!
//! 以斜杠分隔的路径寻址：文档路径段数为偶数（`users/{uid}`），
//! 集合路径段数为奇数（`users/{uid}/friends`）。跨文档没有事务保证。

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::StoreError;

pub mod keys;
pub mod memory;
pub mod redis_store;

pub use memory::MemoryDocumentStore;
pub use redis_store::RedisDocumentStore;

/// 文档字段
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    /// 文档ID（路径最后一段）
    pub id: String,
    pub path: String,
    pub fields: Document,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// true 时只覆盖给出的顶层字段，其余字段保留
    pub merge: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self { merge: true }
    }

    pub fn overwrite() -> Self {
        Self { merge: false }
    }
}

#[async_trait]
pub trait SharedDocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<DocumentSnapshot>, StoreError>;

    /// 插入或更新（upsert）
    async fn set(&self, path: &str, fields: Document, options: SetOptions)
    -> Result<(), StoreError>;

    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// 按插入顺序返回集合下的文档
    async fn list_children(&self, collection: &str) -> Result<Vec<DocumentSnapshot>, StoreError>;

    /// 订阅集合：先推送一次当前快照，之后每次变更再推送完整快照
    async fn watch(&self, collection: &str) -> Result<CollectionWatch, StoreError>;

    /// 等值查询
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<DocumentSnapshot>, StoreError> {
        let docs = self.list_children(collection).await?;
        Ok(docs
            .into_iter()
            .filter(|doc| doc.fields.get(field) == Some(value))
            .collect())
    }
}

/// 集合订阅句柄，drop 即取消订阅
pub struct CollectionWatch {
    rx: mpsc::Receiver<Vec<DocumentSnapshot>>,
    task: JoinHandle<()>,
}

impl CollectionWatch {
    pub(crate) fn new(rx: mpsc::Receiver<Vec<DocumentSnapshot>>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    /// 等待下一份快照；订阅结束时返回 None
    pub async fn next(&mut self) -> Option<Vec<DocumentSnapshot>> {
        self.rx.recv().await
    }
}

impl Drop for CollectionWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 拆分文档路径为 (父集合路径, 文档ID)
pub(crate) fn split_document_path(path: &str) -> Result<(&str, &str), StoreError> {
    let segments = path_segments(path)?;
    if segments % 2 != 0 {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    path.rsplit_once('/')
        .ok_or_else(|| StoreError::InvalidPath(path.to_string()))
}

pub(crate) fn validate_collection_path(path: &str) -> Result<(), StoreError> {
    if path_segments(path)? % 2 == 0 {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

fn path_segments(path: &str) -> Result<usize, StoreError> {
    if path.is_empty() || path.split('/').any(|segment| segment.trim().is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(path.split('/').count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_paths_need_even_segments() {
        assert_eq!(split_document_path("users/ana").unwrap(), ("users", "ana"));
        assert_eq!(
            split_document_path("users/ana/friends/luis").unwrap(),
            ("users/ana/friends", "luis")
        );
        assert!(split_document_path("users").is_err());
        assert!(split_document_path("users/ana/friends").is_err());
        assert!(split_document_path("users//friends/x").is_err());
        assert!(split_document_path("").is_err());
    }

    #[test]
    fn collection_paths_need_odd_segments() {
        assert!(validate_collection_path("users").is_ok());
        assert!(validate_collection_path("users/ana/friends").is_ok());
        assert!(validate_collection_path("users/ana").is_err());
        assert!(validate_collection_path("users/ /friends").is_err());
    }
}
