#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use paseo::error::{LocationError, StoreError};
use paseo::identity::StaticIdentity;
use paseo::location::{LocationProvider, PermissionStatus};
use paseo::models::Coordinates;
use paseo::presence::{PresenceDeps, PresenceTracker, TrackerSettings};
use paseo::store::{
    CollectionWatch, Document, DocumentSnapshot, MemoryDocumentStore, SetOptions,
    SharedDocumentStore,
};

pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Get(String),
    Set {
        path: String,
        fields: Document,
        merge: bool,
    },
    Delete(String),
    List(String),
    Watch(String),
}

/// 记录每次调用的内存存储，可以按需让读或写失败
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryDocumentStore,
    ops: Mutex<Vec<StoreOp>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 直接写入底层存储，不记录
    pub async fn seed(&self, path: &str, value: Value) {
        self.inner
            .set(path, doc(value), SetOptions::merge())
            .await
            .unwrap();
    }

    pub async fn fields(&self, path: &str) -> Option<Document> {
        self.inner.get(path).await.unwrap().map(|snapshot| snapshot.fields)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    /// 对某个路径的写入（字段, 是否合并）
    pub fn writes_to(&self, target: &str) -> Vec<(Document, bool)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                StoreOp::Set {
                    path,
                    fields,
                    merge,
                } if path == target => Some((fields, merge)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: StoreOp) {
        self.ops.lock().unwrap().push(op);
    }

    fn check(&self, flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SharedDocumentStore for RecordingStore {
    async fn get(&self, path: &str) -> Result<Option<DocumentSnapshot>, StoreError> {
        self.record(StoreOp::Get(path.to_string()));
        self.check(&self.fail_reads)?;
        self.inner.get(path).await
    }

    async fn set(
        &self,
        path: &str,
        fields: Document,
        options: SetOptions,
    ) -> Result<(), StoreError> {
        self.record(StoreOp::Set {
            path: path.to_string(),
            fields: fields.clone(),
            merge: options.merge,
        });
        self.check(&self.fail_writes)?;
        self.inner.set(path, fields, options).await
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.record(StoreOp::Delete(path.to_string()));
        self.check(&self.fail_writes)?;
        self.inner.delete(path).await
    }

    async fn list_children(&self, collection: &str) -> Result<Vec<DocumentSnapshot>, StoreError> {
        self.record(StoreOp::List(collection.to_string()));
        self.check(&self.fail_reads)?;
        self.inner.list_children(collection).await
    }

    async fn watch(&self, collection: &str) -> Result<CollectionWatch, StoreError> {
        self.record(StoreOp::Watch(collection.to_string()));
        self.inner.watch(collection).await
    }
}

/// 可编排的定位源
pub struct ScriptedLocation {
    permission: Mutex<PermissionStatus>,
    position: Mutex<Result<Coordinates, LocationError>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl ScriptedLocation {
    pub fn granted(latitude: f64, longitude: f64) -> Arc<Self> {
        Arc::new(Self {
            permission: Mutex::new(PermissionStatus::Granted),
            position: Mutex::new(Ok(Coordinates {
                latitude,
                longitude,
            })),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn denied() -> Arc<Self> {
        let location = Self::granted(0.0, 0.0);
        location.set_permission(PermissionStatus::Denied);
        location
    }

    pub fn set_permission(&self, status: PermissionStatus) {
        *self.permission.lock().unwrap() = status;
    }

    pub fn set_position(&self, position: Result<Coordinates, LocationError>) {
        *self.position.lock().unwrap() = position;
    }

    /// 每次取位置前等待的时间
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocationProvider for ScriptedLocation {
    async fn request_permission(&self) -> PermissionStatus {
        *self.permission.lock().unwrap()
    }

    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.position.lock().unwrap().clone()
    }
}

pub async fn mount_as(
    user_id: &str,
    store: &Arc<RecordingStore>,
    location: &Arc<ScriptedLocation>,
) -> PresenceTracker {
    PresenceTracker::mount(
        PresenceDeps {
            identity: Arc::new(StaticIdentity::signed_in(user_id)),
            store: store.clone(),
            location: location.clone(),
        },
        TrackerSettings::default(),
    )
    .await
    .expect("mount")
}
