//! 设备定位

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::LocationError;
use crate::models::Coordinates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;

    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

#[derive(Debug, Default)]
struct FeedState {
    permission: Option<PermissionStatus>,
    last_fix: Option<(Coordinates, Instant)>,
}

/// 由设备上报驱动的定位源
///
/// 设备先声明系统权限弹窗的结果，之后持续推送 GPS 定位；
/// 采样时取最近一次定位，超过 `max_fix_age` 视为不可用。
#[derive(Debug)]
pub struct DeviceLocationFeed {
    max_fix_age: Duration,
    state: Mutex<FeedState>,
}

impl DeviceLocationFeed {
    pub fn new(max_fix_age: Duration) -> Self {
        Self {
            max_fix_age,
            state: Mutex::new(FeedState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_permission(&self, status: PermissionStatus) {
        self.lock().permission = Some(status);
    }

    pub fn permission(&self) -> Option<PermissionStatus> {
        self.lock().permission
    }

    pub fn push_fix(&self, coords: Coordinates) -> Result<(), LocationError> {
        let valid = coords.latitude.is_finite()
            && coords.longitude.is_finite()
            && (-90.0..=90.0).contains(&coords.latitude)
            && (-180.0..=180.0).contains(&coords.longitude);
        if !valid {
            return Err(LocationError::InvalidCoordinates(
                coords.latitude,
                coords.longitude,
            ));
        }

        self.lock().last_fix = Some((coords, Instant::now()));
        Ok(())
    }

    pub fn last_fix(&self) -> Option<Coordinates> {
        self.lock().last_fix.map(|(coords, _)| coords)
    }
}

#[async_trait]
impl LocationProvider for DeviceLocationFeed {
    async fn request_permission(&self) -> PermissionStatus {
        // 设备没有声明过权限时按拒绝处理
        self.permission().unwrap_or(PermissionStatus::Denied)
    }

    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        let state = self.lock();
        if state.permission != Some(PermissionStatus::Granted) {
            return Err(LocationError::PermissionRevoked);
        }

        match state.last_fix {
            Some((coords, at)) if at.elapsed() <= self.max_fix_age => Ok(coords),
            Some(_) => Err(LocationError::Unavailable("last fix is stale".into())),
            None => Err(LocationError::Unavailable("no fix reported yet".into())),
        }
    }
}
