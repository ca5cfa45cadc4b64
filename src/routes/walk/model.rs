use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::location::PermissionStatus;
use crate::models::{Coordinates, FriendPresenceView, GeoPoint, RosterSnapshot};
use crate::models::presence::HEADLINE_INACTIVE;
use crate::presence::TrackerState;

/// 没有自身位置时地图居中的位置（马德里）
const FALLBACK_CENTER: Coordinates = Coordinates {
    latitude: 40.4168,
    longitude: -3.7038,
};
const FALLBACK_DELTA: f64 = 4.0;
const OWN_LOCATION_DELTA: f64 = 0.01;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenSessionRequest {
    pub location_permission: Option<PermissionStatus>,
    pub position: Option<Coordinates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub walking: bool,
    #[serde(default)]
    pub location_permission: Option<PermissionStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkSessionView {
    pub session_id: Uuid,
    pub state: TrackerState,
    pub walking: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClosedResponse {
    pub closed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionAccepted {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRegion {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl MapRegion {
    pub fn around(own_location: Option<GeoPoint>) -> Self {
        let (center, delta) = match own_location {
            Some(point) => (point.coordinates(), OWN_LOCATION_DELTA),
            None => (FALLBACK_CENTER, FALLBACK_DELTA),
        };
        Self {
            latitude: center.latitude,
            longitude: center.longitude,
            latitude_delta: delta,
            longitude_delta: delta,
        }
    }
}

/// 好友网格里的一格
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendCard {
    pub friend_id: String,
    pub display_name: String,
    pub short_name: String,
    pub avatar_url: String,
    pub location: Option<GeoPoint>,
    pub is_active: bool,
}

impl From<&FriendPresenceView> for FriendCard {
    fn from(view: &FriendPresenceView) -> Self {
        Self {
            friend_id: view.friend_id.clone(),
            display_name: view.display_name.clone(),
            short_name: view.short_name(),
            avatar_url: view.avatar_url.clone(),
            location: view.location,
            is_active: view.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterView {
    pub headline: &'static str,
    pub active: Vec<FriendCard>,
    pub inactive_headline: &'static str,
    pub inactive: Vec<FriendCard>,
    pub refreshed_at_millis: Option<i64>,
}

impl From<&RosterSnapshot> for RosterView {
    fn from(snapshot: &RosterSnapshot) -> Self {
        Self {
            headline: snapshot.headline(),
            active: snapshot.active.iter().map(FriendCard::from).collect(),
            inactive_headline: HEADLINE_INACTIVE,
            inactive: snapshot.inactive.iter().map(FriendCard::from).collect(),
            refreshed_at_millis: snapshot.refreshed_at_millis,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkView {
    pub session_id: Uuid,
    pub state: TrackerState,
    pub walking: bool,
    pub own_location: Option<GeoPoint>,
    pub region: MapRegion,
    pub roster: RosterView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_falls_back_to_madrid() {
        let region = MapRegion::around(None);
        assert_eq!(region.latitude, 40.4168);
        assert_eq!(region.longitude, -3.7038);
        assert_eq!(region.latitude_delta, 4.0);

        let own = GeoPoint {
            latitude: 41.38,
            longitude: 2.17,
            sampled_at_epoch_millis: 0,
        };
        let region = MapRegion::around(Some(own));
        assert_eq!(region.latitude, 41.38);
        assert_eq!(region.longitude_delta, 0.01);
    }
}
