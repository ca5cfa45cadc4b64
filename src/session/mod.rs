//! 每个用户一个散步会话：把 HTTP 请求接到对应的 PresenceTracker 上

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::error::{LocationError, PresenceError};
use crate::identity::IdentityProvider;
use crate::location::{DeviceLocationFeed, PermissionStatus};
use crate::models::Coordinates;
use crate::presence::{PresenceDeps, PresenceTracker, TrackerSettings};
use crate::store::SharedDocumentStore;

/// 打开会话时设备带上的初始状态
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceHello {
    pub permission: Option<PermissionStatus>,
    pub position: Option<Coordinates>,
}

pub struct WalkSession {
    pub session_id: Uuid,
    pub tracker: PresenceTracker,
    pub feed: Arc<DeviceLocationFeed>,
    last_seen: std::sync::Mutex<Instant>,
}

impl WalkSession {
    pub fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(|p| p.into_inner()) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .elapsed()
    }

    /// 设备上报一次定位
    pub fn report_position(&self, coords: Coordinates) -> Result<(), LocationError> {
        self.feed.push_fix(coords)?;
        self.touch();
        Ok(())
    }
}

pub struct SessionRegistry {
    store: Arc<dyn SharedDocumentStore>,
    settings: TrackerSettings,
    max_fix_age: Duration,
    idle_timeout: Duration,
    sessions: Mutex<HashMap<String, Arc<WalkSession>>>,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<dyn SharedDocumentStore>,
        settings: TrackerSettings,
        max_fix_age: Duration,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            store,
            settings,
            max_fix_age,
            idle_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// 打开会话（挂载散步页面）。同一用户已有会话时先卸载旧的。
    pub async fn open(
        &self,
        identity: Arc<dyn IdentityProvider>,
        hello: DeviceHello,
    ) -> Result<Arc<WalkSession>, PresenceError> {
        let user_id = identity
            .current_user_id()
            .ok_or(PresenceError::NotAuthenticated)?;

        // 先校验设备数据，失败时旧会话保持不变
        let feed = Arc::new(DeviceLocationFeed::new(self.max_fix_age));
        if let Some(permission) = hello.permission {
            feed.set_permission(permission);
        }
        if let Some(position) = hello.position {
            feed.push_fix(position)?;
        }

        let previous = self.sessions.lock().await.remove(&user_id);
        if let Some(previous) = previous {
            tracing::info!("Replacing walk session {} for {}", previous.session_id, user_id);
            previous.tracker.unmount().await;
        }

        // 挂载时会读存储，不持有会话表的锁
        let tracker = PresenceTracker::mount(
            PresenceDeps {
                identity,
                store: Arc::clone(&self.store),
                location: feed.clone(),
            },
            self.settings,
        )
        .await?;

        let session = Arc::new(WalkSession {
            session_id: Uuid::new_v4(),
            tracker,
            feed,
            last_seen: std::sync::Mutex::new(Instant::now()),
        });

        let displaced = self
            .sessions
            .lock()
            .await
            .insert(user_id.clone(), Arc::clone(&session));
        if let Some(displaced) = displaced {
            displaced.tracker.unmount().await;
        }

        tracing::info!("Walk session {} opened for {}", session.session_id, user_id);
        Ok(session)
    }

    pub async fn get(&self, user_id: &str) -> Option<Arc<WalkSession>> {
        let session = self.sessions.lock().await.get(user_id).cloned()?;
        session.touch();
        Some(session)
    }

    /// 关闭会话（离开页面），返回是否存在
    pub async fn close(&self, user_id: &str) -> bool {
        let session = self.sessions.lock().await.remove(user_id);
        match session {
            Some(session) => {
                session.tracker.unmount().await;
                tracing::info!("Walk session {} closed for {}", session.session_id, user_id);
                true
            }
            None => false,
        }
    }

    /// 卸载空闲超时的会话，返回卸载数量
    pub async fn reap_idle(&self) -> usize {
        let idle: Vec<(String, Arc<WalkSession>)> = {
            let mut sessions = self.sessions.lock().await;
            let expired: Vec<String> = sessions
                .iter()
                .filter(|(_, session)| session.idle_for() > self.idle_timeout)
                .map(|(user_id, _)| user_id.clone())
                .collect();
            expired
                .into_iter()
                .filter_map(|user_id| sessions.remove(&user_id).map(|s| (user_id, s)))
                .collect()
        };

        for (user_id, session) in &idle {
            tracing::info!("Reaping idle walk session {} for {}", session.session_id, user_id);
            session.tracker.unmount().await;
        }
        idle.len()
    }

    pub fn spawn_reaper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period.max(Duration::from_secs(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let reaped = registry.reap_idle().await;
                if reaped > 0 {
                    tracing::debug!("Reaped {} idle walk sessions", reaped);
                }
            }
        })
    }

    /// 停机时卸载全部会话
    pub async fn close_all(&self) {
        let sessions: Vec<Arc<WalkSession>> =
            self.sessions.lock().await.drain().map(|(_, s)| s).collect();
        for session in &sessions {
            session.tracker.unmount().await;
        }
        tracing::info!("Closed {} walk sessions", sessions.len());
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentity;
    use crate::presence::TrackerState;
    use crate::store::MemoryDocumentStore;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(
            Arc::new(MemoryDocumentStore::new()),
            TrackerSettings::default(),
            Duration::from_secs(30),
            Duration::from_secs(900),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn reopening_replaces_the_session() {
        let registry = registry();
        let first = registry
            .open(Arc::new(StaticIdentity::signed_in("ana")), DeviceHello::default())
            .await
            .unwrap();
        let second = registry
            .open(Arc::new(StaticIdentity::signed_in("ana")), DeviceHello::default())
            .await
            .unwrap();

        assert_ne!(first.session_id, second.session_id);
        assert!(!first.tracker.is_mounted());
        assert!(second.tracker.is_mounted());
        assert_eq!(registry.len().await, 1);
        assert_eq!(second.tracker.state(), TrackerState::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_reopen_keeps_the_live_session() {
        let registry = registry();
        let live = registry
            .open(Arc::new(StaticIdentity::signed_in("ana")), DeviceHello::default())
            .await
            .unwrap();

        let result = registry
            .open(
                Arc::new(StaticIdentity::signed_in("ana")),
                DeviceHello {
                    permission: Some(PermissionStatus::Granted),
                    position: Some(Coordinates {
                        latitude: 200.0,
                        longitude: 0.0,
                    }),
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(PresenceError::Location(LocationError::InvalidCoordinates(..)))
        ));
        assert!(live.tracker.is_mounted());
        assert_eq!(registry.len().await, 1);
        let current = registry.get("ana").await.unwrap();
        assert_eq!(current.session_id, live.session_id);
    }

    #[tokio::test(start_paused = true)]
    async fn anonymous_callers_cannot_open() {
        let registry = registry();
        let result = registry
            .open(Arc::new(StaticIdentity::anonymous()), DeviceHello::default())
            .await;
        assert!(matches!(result, Err(PresenceError::NotAuthenticated)));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_reaped() {
        let registry = registry();
        let session = registry
            .open(Arc::new(StaticIdentity::signed_in("ana")), DeviceHello::default())
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(registry.reap_idle().await, 0);
        assert!(registry.get("ana").await.is_some());

        tokio::time::advance(Duration::from_secs(901)).await;
        assert_eq!(registry.reap_idle().await, 1);
        assert!(!session.tracker.is_mounted());
        assert!(registry.get("ana").await.is_none());
        assert!(!registry.close("ana").await);
    }
}
