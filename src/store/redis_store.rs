use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::{AsyncCommands, Client as RedisClient};
use serde_json::Value;
use tokio::sync::mpsc;

use super::keys::{SEQUENCE_KEY, change_channel, children_key, doc_key};
use super::{
    CollectionWatch, Document, DocumentSnapshot, SetOptions, SharedDocumentStore,
    split_document_path, validate_collection_path,
};
use crate::error::StoreError;

/// Redis 文档存储
///
/// 每个文档是 `doc:{path}` 下的一个哈希，字段值为 JSON 编码，另有 `__seq`
/// 记录首次写入序号兼作存在标记。合并写只 HSET 给出的字段，由服务端保证
/// 不会覆盖并发写入的其他字段；覆盖写在同一个 MULTI 里先 DEL 再 HSET。
/// 每个集合维护一个有序集合索引，子文档按首次写入顺序返回。
#[derive(Clone)]
pub struct RedisDocumentStore {
    redis_client: Arc<RedisClient>,
}

impl RedisDocumentStore {
    pub fn new(redis_client: Arc<RedisClient>) -> Self {
        Self { redis_client }
    }
}

/// 文档哈希里的保留字段
const SEQ_FIELD: &str = "__seq";

/// 把文档字段编码成哈希字段，保留字段名会被丢弃
fn encode_fields(fields: &Document) -> Result<Vec<(String, String)>, StoreError> {
    fields
        .iter()
        .filter(|(name, _)| name.as_str() != SEQ_FIELD)
        .map(|(name, value)| Ok((name.clone(), serde_json::to_string(value)?)))
        .collect()
}

/// 空哈希表示文档不存在
fn decode_hash(
    path: &str,
    id: &str,
    hash: HashMap<String, String>,
) -> Result<Option<DocumentSnapshot>, StoreError> {
    if hash.is_empty() {
        return Ok(None);
    }

    let mut fields = Document::new();
    for (name, raw) in hash {
        if name == SEQ_FIELD {
            continue;
        }
        fields.insert(name, serde_json::from_str::<Value>(&raw)?);
    }

    Ok(Some(DocumentSnapshot {
        id: id.to_string(),
        path: path.to_string(),
        fields,
    }))
}

#[async_trait]
impl SharedDocumentStore for RedisDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<DocumentSnapshot>, StoreError> {
        let (_, id) = split_document_path(path)?;
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let hash: HashMap<String, String> = conn.hgetall(doc_key(path)).await?;
        decode_hash(path, id, hash)
    }

    async fn set(
        &self,
        path: &str,
        fields: Document,
        options: SetOptions,
    ) -> Result<(), StoreError> {
        let (collection, id) = split_document_path(path)?;
        let key = doc_key(path);
        let encoded = encode_fields(&fields)?;
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let seq: i64 = conn.incr(SEQUENCE_KEY, 1).await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        if !options.merge {
            pipe.del(&key).ignore();
        }
        pipe.hset_nx(&key, SEQ_FIELD, seq).ignore();
        if !encoded.is_empty() {
            pipe.hset_multiple(&key, &encoded).ignore();
        }
        // NX 保证已有文档保留最初的插入序号
        pipe.cmd("ZADD")
            .arg(children_key(collection))
            .arg("NX")
            .arg(seq)
            .arg(id)
            .ignore();
        pipe.publish(change_channel(collection), id).ignore();
        let _: () = pipe.query_async(&mut conn).await?;

        tracing::debug!("Stored document {}", path);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let (collection, id) = split_document_path(path)?;
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let removed: i64 = conn.del(doc_key(path)).await?;
        let _: () = conn.zrem(children_key(collection), id).await?;
        if removed > 0 {
            let _: () = conn.publish(change_channel(collection), id).await?;
        }
        Ok(())
    }

    async fn list_children(&self, collection: &str) -> Result<Vec<DocumentSnapshot>, StoreError> {
        validate_collection_path(collection)?;
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let ids: Vec<String> = conn.zrange(children_key(collection), 0, -1).await?;
        let mut children = Vec::with_capacity(ids.len());
        for id in ids {
            let path = format!("{}/{}", collection, id);
            let hash: HashMap<String, String> = conn.hgetall(doc_key(&path)).await?;
            // 索引和文档之间没有事务，文档可能刚被删除
            if let Some(doc) = decode_hash(&path, &id, hash)? {
                children.push(doc);
            }
        }

        Ok(children)
    }

    async fn watch(&self, collection: &str) -> Result<CollectionWatch, StoreError> {
        validate_collection_path(collection)?;
        let mut pubsub = self.redis_client.get_async_pubsub().await?;
        pubsub.subscribe(change_channel(collection)).await?;

        let (tx, rx) = mpsc::channel(16);
        let store = self.clone();
        let collection = collection.to_string();

        let task = tokio::spawn(async move {
            let mut messages = pubsub.on_message();
            loop {
                match store.list_children(&collection).await {
                    Ok(docs) => {
                        if tx.send(docs).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("Watch on {} failed to list: {}", collection, e),
                }

                if messages.next().await.is_none() {
                    tracing::debug!("Change subscription for {} closed", collection);
                    break;
                }
            }
        });

        Ok(CollectionWatch::new(rx, task))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merge_patch_encodes_only_given_fields() {
        let patch = match json!({"walking": false, "location": null, "__seq": 7}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let mut encoded = encode_fields(&patch).unwrap();
        encoded.sort();
        assert_eq!(
            encoded,
            vec![
                ("location".to_string(), "null".to_string()),
                ("walking".to_string(), "false".to_string()),
            ]
        );
    }

    #[test]
    fn hash_decodes_back_to_fields() {
        let hash = HashMap::from([
            (SEQ_FIELD.to_string(), "3".to_string()),
            ("username".to_string(), "\"luna\"".to_string()),
            (
                "location".to_string(),
                r#"{"latitude":40.4168,"longitude":-3.7038}"#.to_string(),
            ),
        ]);
        let doc = decode_hash("users/luna", "luna", hash).unwrap().unwrap();
        assert_eq!(doc.id, "luna");
        assert!(!doc.fields.contains_key(SEQ_FIELD));
        assert_eq!(doc.fields["username"], json!("luna"));
        assert_eq!(doc.fields["location"]["latitude"], json!(40.4168));
    }

    #[test]
    fn empty_hash_is_a_missing_document() {
        assert!(decode_hash("users/x", "x", HashMap::new()).unwrap().is_none());
    }
}
