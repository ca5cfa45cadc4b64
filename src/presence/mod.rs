//! 散步在线状态：自身位置采样发布 + 好友名单轮询

mod roster;
mod task;
mod tracker;

pub use roster::fetch_roster;
pub use tracker::{PresenceDeps, PresenceTracker, TrackerSettings, TrackerState};
