use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;

use super::roster::fetch_roster;
use super::task::PeriodicTask;
use crate::config::Config;
use crate::error::PresenceError;
use crate::identity::IdentityProvider;
use crate::location::{LocationProvider, PermissionStatus};
use crate::models::{GeoPoint, PresencePatch, RosterSnapshot, UserPresenceRecord};
use crate::store::{SetOptions, SharedDocumentStore, keys};
use crate::utils::now_millis;

/// 散步开关的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackerState {
    Inactive,
    RequestingPermission,
    Active,
    /// 权限被拒。对客户端等同于 Inactive：不采样、不广播；再次打开开关会重新申请
    PermissionDenied,
}

impl TrackerState {
    pub fn is_walking(self) -> bool {
        self == TrackerState::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub sample_interval: Duration,
    pub roster_interval: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(10),
            roster_interval: Duration::from_secs(60),
        }
    }
}

impl From<&Config> for TrackerSettings {
    fn from(config: &Config) -> Self {
        Self {
            sample_interval: config.location_sample_interval(),
            roster_interval: config.roster_refresh_interval(),
        }
    }
}

/// 采样时间戳：挂载时锚定墙上时钟，之后按单调时钟推进
#[derive(Debug, Clone, Copy)]
struct SampleClock {
    anchor_millis: i64,
    anchor: Instant,
}

impl SampleClock {
    fn start() -> Self {
        Self {
            anchor_millis: now_millis(),
            anchor: Instant::now(),
        }
    }

    fn now_millis(&self) -> i64 {
        let elapsed = i64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.anchor_millis.saturating_add(elapsed)
    }
}

/// 构造时注入的外部依赖
#[derive(Clone)]
pub struct PresenceDeps {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn SharedDocumentStore>,
    pub location: Arc<dyn LocationProvider>,
}

/// 定时任务和跟踪器共享的部分
struct Shared {
    user_id: String,
    store: Arc<dyn SharedDocumentStore>,
    location: Arc<dyn LocationProvider>,
    state: watch::Sender<TrackerState>,
    own_location: watch::Sender<Option<GeoPoint>>,
    roster: watch::Sender<RosterSnapshot>,
    clock: SampleClock,
    /// 服务端记录是否可能还是 walking=true
    advertised: AtomicBool,
}

impl Shared {
    async fn publish_sample(&self) -> Result<GeoPoint, PresenceError> {
        let coords = self.location.current_position().await?;
        let point = GeoPoint::sampled(coords, self.clock.now_millis());

        self.store
            .set(
                &keys::user_doc(&self.user_id),
                PresencePatch::Walking(point).into_fields(),
                SetOptions::merge(),
            )
            .await?;

        self.advertised.store(true, Ordering::SeqCst);
        self.own_location.send_replace(Some(point));
        tracing::debug!(
            "Published location for {}: ({}, {})",
            self.user_id,
            point.latitude,
            point.longitude
        );
        Ok(point)
    }

    async fn sample_tick(&self) {
        if let Err(e) = self.publish_sample().await {
            tracing::warn!("Location sample for {} skipped: {}", self.user_id, e);
        }
    }

    async fn roster_tick(&self) {
        match fetch_roster(self.store.as_ref(), &self.user_id).await {
            Ok(snapshot) => {
                tracing::debug!(
                    "Roster for {}: {} active, {} inactive",
                    self.user_id,
                    snapshot.active.len(),
                    snapshot.inactive.len()
                );
                self.roster.send_replace(snapshot);
            }
            Err(e) => tracing::warn!("Roster refresh for {} skipped: {}", self.user_id, e),
        }
    }
}

/// 散步页面的在线状态跟踪器
///
/// 挂载期间每 `roster_interval` 刷新一次好友名单；开关打开后每
/// `sample_interval` 采样并发布一次自己的位置。离开页面（`unmount`）
/// 只停止定时任务，不会把服务端的 walking 标记改回 false。
pub struct PresenceTracker {
    shared: Arc<Shared>,
    settings: TrackerSettings,
    sampler: Mutex<Option<PeriodicTask>>,
    roster_poller: Mutex<Option<PeriodicTask>>,
    closed: AtomicBool,
}

impl PresenceTracker {
    pub async fn mount(deps: PresenceDeps, settings: TrackerSettings) -> Result<Self, PresenceError> {
        let user_id = deps
            .identity
            .current_user_id()
            .ok_or(PresenceError::NotAuthenticated)?;

        let record = match deps.store.get(&keys::user_doc(&user_id)).await {
            Ok(Some(doc)) => UserPresenceRecord::from_fields(&doc.fields),
            Ok(None) => UserPresenceRecord::default(),
            Err(e) => {
                tracing::warn!("Loading walk state for {} failed: {}", user_id, e);
                UserPresenceRecord::default()
            }
        };

        let (state, _) = watch::channel(TrackerState::Inactive);
        let (own_location, _) = watch::channel(record.location);
        let (roster, _) = watch::channel(RosterSnapshot::default());

        let shared = Arc::new(Shared {
            user_id,
            store: deps.store,
            location: deps.location,
            state,
            own_location,
            roster,
            clock: SampleClock::start(),
            advertised: AtomicBool::new(record.walking),
        });

        tracing::info!("Walk screen mounted for {}", shared.user_id);
        shared.roster_tick().await;

        let poller_shared = Arc::clone(&shared);
        let poller = PeriodicTask::spawn("roster poller", settings.roster_interval, move || {
            let shared = Arc::clone(&poller_shared);
            async move { shared.roster_tick().await }
        });

        let tracker = Self {
            shared,
            settings,
            sampler: Mutex::new(None),
            roster_poller: Mutex::new(Some(poller)),
            closed: AtomicBool::new(false),
        };

        if record.walking {
            tracing::info!("Resuming walk for {}", tracker.shared.user_id);
            if let Err(e) = tracker.enable().await {
                tracing::warn!("Could not resume walk for {}: {}", tracker.shared.user_id, e);
            }
        }

        Ok(tracker)
    }

    /// 打开开关：申请权限，成功后立即发布一次位置并开始定时采样
    pub async fn enable(&self) -> Result<(), PresenceError> {
        let mut sampler = self.sampler.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(PresenceError::SessionClosed);
        }
        if sampler.is_some() {
            return Ok(());
        }

        self.shared.state.send_replace(TrackerState::RequestingPermission);
        if self.shared.location.request_permission().await == PermissionStatus::Denied {
            self.shared.state.send_replace(TrackerState::PermissionDenied);
            tracing::info!("Location permission denied for {}", self.shared.user_id);
            return Err(PresenceError::PermissionDenied);
        }

        self.shared.state.send_replace(TrackerState::Active);
        tracing::info!("Walk started for {}", self.shared.user_id);
        self.shared.sample_tick().await;

        let sampler_shared = Arc::clone(&self.shared);
        *sampler = Some(PeriodicTask::spawn(
            "location sampler",
            self.settings.sample_interval,
            move || {
                let shared = Arc::clone(&sampler_shared);
                async move { shared.sample_tick().await }
            },
        ));
        Ok(())
    }

    /// 关闭开关：先停采样（等待进行中的一次完成），再一次性写入
    /// `{walking: false, location: null}`。没有广播过在线状态时不写。
    pub async fn disable(&self) -> Result<(), PresenceError> {
        let mut sampler = self.sampler.lock().await;
        if let Some(task) = sampler.take() {
            task.stop().await;
        }
        self.shared.state.send_replace(TrackerState::Inactive);

        if !self.shared.advertised.load(Ordering::SeqCst) {
            tracing::debug!("Walk already off for {}", self.shared.user_id);
            return Ok(());
        }

        self.shared
            .store
            .set(
                &keys::user_doc(&self.shared.user_id),
                PresencePatch::Stopped.into_fields(),
                SetOptions::merge(),
            )
            .await
            .map_err(|e| {
                tracing::warn!("Clearing walk state for {} failed: {}", self.shared.user_id, e);
                e
            })?;

        self.shared.advertised.store(false, Ordering::SeqCst);
        self.shared.own_location.send_replace(None);
        tracing::info!("Walk stopped for {}", self.shared.user_id);
        Ok(())
    }

    /// 离开页面：停止两个定时任务，返回后不会再有它们发起的读写
    pub async fn unmount(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let sampler = self.sampler.lock().await.take();
        if let Some(task) = sampler {
            task.stop().await;
        }
        let poller = self.roster_poller.lock().await.take();
        if let Some(task) = poller {
            task.stop().await;
        }
        tracing::info!("Walk screen unmounted for {}", self.shared.user_id);
    }

    pub fn user_id(&self) -> &str {
        &self.shared.user_id
    }

    pub fn state(&self) -> TrackerState {
        *self.shared.state.borrow()
    }

    pub fn own_location(&self) -> Option<GeoPoint> {
        *self.shared.own_location.borrow()
    }

    pub fn roster(&self) -> RosterSnapshot {
        self.shared.roster.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<TrackerState> {
        self.shared.state.subscribe()
    }

    pub fn subscribe_roster(&self) -> watch::Receiver<RosterSnapshot> {
        self.shared.roster.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}
