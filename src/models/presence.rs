use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::store::{Document, DocumentSnapshot};

/// 没有用户名时的显示名
pub const DEFAULT_DISPLAY_NAME: &str = "Sin nombre";

pub const HEADLINE_ACTIVE: &str = "Tus amigos en paseo:";
pub const HEADLINE_NONE_ACTIVE: &str = "Ningún amigo está en paseo ahora mismo";
pub const HEADLINE_INACTIVE: &str = "Tus amigos desconectados:";

/// 网格里名字的最大显示长度
const SHORT_NAME_CHARS: usize = 10;

/// 用户文档字段名
pub mod fields {
    pub const WALKING: &str = "walking";
    pub const LOCATION: &str = "location";
    pub const USERNAME: &str = "username";
    pub const PHOTO_URL: &str = "photoUrl";
    pub const PROFILE_IMAGE: &str = "profileImage";
    pub const FRIEND_ID: &str = "friendId";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const AVATAR_URL: &str = "avatarUrl";
}

/// 设备定位结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// 带采样时间的位置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub sampled_at_epoch_millis: i64,
}

impl GeoPoint {
    pub fn sampled(coords: Coordinates, sampled_at_epoch_millis: i64) -> Self {
        Self {
            latitude: coords.latitude,
            longitude: coords.longitude,
            sampled_at_epoch_millis,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// 用户文档中与在线状态相关的部分
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPresenceRecord {
    pub walking: bool,
    pub location: Option<GeoPoint>,
}

impl UserPresenceRecord {
    /// 宽松解析：非布尔的 walking 视为 false，null 或无法解析的 location 视为缺失
    pub fn from_fields(doc: &Document) -> Self {
        let walking = doc
            .get(fields::WALKING)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let location = doc
            .get(fields::LOCATION)
            .filter(|value| !value.is_null())
            .and_then(|value| serde_json::from_value::<GeoPoint>(value.clone()).ok());

        Self { walking, location }
    }

    pub fn is_active(&self) -> bool {
        self.walking && self.location.is_some()
    }
}

/// 对自身用户文档的合并写
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PresencePatch {
    Walking(GeoPoint),
    /// 关闭时必须在同一次写入里清空位置
    Stopped,
}

impl PresencePatch {
    pub fn into_fields(self) -> Document {
        let mut doc = Document::new();
        match self {
            PresencePatch::Walking(point) => {
                doc.insert(fields::WALKING.into(), Value::Bool(true));
                doc.insert(
                    fields::LOCATION.into(),
                    json!({
                        "latitude": point.latitude,
                        "longitude": point.longitude,
                        "sampledAtEpochMillis": point.sampled_at_epoch_millis,
                    }),
                );
            }
            PresencePatch::Stopped => {
                doc.insert(fields::WALKING.into(), Value::Bool(false));
                doc.insert(fields::LOCATION.into(), Value::Null);
            }
        }
        doc
    }
}

/// 单向好友链接，文档ID就是好友的用户ID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendLink {
    pub friend_id: String,
    pub display_name: String,
    pub avatar_url: String,
}

impl FriendLink {
    pub fn from_snapshot(doc: &DocumentSnapshot) -> Self {
        Self {
            friend_id: doc.id.clone(),
            display_name: string_field(&doc.fields, fields::DISPLAY_NAME)
                .unwrap_or_default()
                .to_string(),
            avatar_url: string_field(&doc.fields, fields::AVATAR_URL)
                .unwrap_or_default()
                .to_string(),
        }
    }

    pub fn into_fields(self) -> Document {
        let mut doc = Document::new();
        doc.insert(fields::FRIEND_ID.into(), Value::String(self.friend_id));
        doc.insert(fields::DISPLAY_NAME.into(), Value::String(self.display_name));
        doc.insert(fields::AVATAR_URL.into(), Value::String(self.avatar_url));
        doc
    }
}

/// 每轮轮询重新计算的好友视图，不落库
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendPresenceView {
    pub friend_id: String,
    pub display_name: String,
    pub avatar_url: String,
    pub location: Option<GeoPoint>,
    pub is_active: bool,
}

impl FriendPresenceView {
    /// `user` 为 None 表示好友从未写过用户文档
    pub fn from_parts(link: &FriendLink, user: Option<&Document>) -> Self {
        let record = user.map(UserPresenceRecord::from_fields).unwrap_or_default();

        let display_name = user
            .and_then(|doc| string_field(doc, fields::USERNAME))
            .unwrap_or(DEFAULT_DISPLAY_NAME)
            .to_string();

        let avatar_url = user
            .and_then(user_avatar)
            .or_else(|| Some(link.avatar_url.as_str()).filter(|url| !url.is_empty()))
            .unwrap_or_default()
            .to_string();

        Self {
            friend_id: link.friend_id.clone(),
            display_name,
            avatar_url,
            is_active: record.is_active(),
            location: record.location,
        }
    }

    /// 网格显示用的短名字
    pub fn short_name(&self) -> String {
        if self.display_name.chars().count() > SHORT_NAME_CHARS {
            let mut short: String = self.display_name.chars().take(SHORT_NAME_CHARS).collect();
            short.push('…');
            short
        } else {
            self.display_name.clone()
        }
    }
}

/// 一轮轮询的结果：活跃 / 不活跃两组，组内保持好友链接的顺序
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSnapshot {
    pub active: Vec<FriendPresenceView>,
    pub inactive: Vec<FriendPresenceView>,
    pub refreshed_at_millis: Option<i64>,
}

impl RosterSnapshot {
    pub fn partition<I>(views: I, refreshed_at_millis: i64) -> Self
    where
        I: IntoIterator<Item = FriendPresenceView>,
    {
        let (active, inactive) = views.into_iter().partition(|view| view.is_active);
        Self {
            active,
            inactive,
            refreshed_at_millis: Some(refreshed_at_millis),
        }
    }

    pub fn headline(&self) -> &'static str {
        if self.active.is_empty() {
            HEADLINE_NONE_ACTIVE
        } else {
            HEADLINE_ACTIVE
        }
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.inactive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 用户头像：优先 photoUrl，其次 profileImage
pub fn user_avatar(doc: &Document) -> Option<&str> {
    string_field(doc, fields::PHOTO_URL).or_else(|| string_field(doc, fields::PROFILE_IMAGE))
}

/// 取非空字符串字段
pub(crate) fn string_field<'a>(doc: &'a Document, key: &str) -> Option<&'a str> {
    doc.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn link(id: &str) -> FriendLink {
        FriendLink {
            friend_id: id.to_string(),
            display_name: id.to_string(),
            avatar_url: String::new(),
        }
    }

    #[test]
    fn stopped_patch_clears_location_in_same_write() {
        let fields = PresencePatch::Stopped.into_fields();
        assert_eq!(fields.get("walking"), Some(&Value::Bool(false)));
        assert_eq!(fields.get("location"), Some(&Value::Null));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn walking_patch_carries_sample_time() {
        let point = GeoPoint::sampled(
            Coordinates {
                latitude: 40.0,
                longitude: -3.0,
            },
            1_700_000_000_000,
        );
        let fields = PresencePatch::Walking(point).into_fields();
        assert_eq!(
            fields.get("location"),
            Some(&json!({
                "latitude": 40.0,
                "longitude": -3.0,
                "sampledAtEpochMillis": 1_700_000_000_000i64
            }))
        );
        assert_eq!(UserPresenceRecord::from_fields(&fields).location, Some(point));
    }

    #[test]
    fn record_parsing_is_lenient() {
        let record = UserPresenceRecord::from_fields(&doc(json!({
            "walking": "yes",
            "location": {"latitude": "north"}
        })));
        assert_eq!(record, UserPresenceRecord::default());

        let record = UserPresenceRecord::from_fields(&doc(json!({
            "walking": true,
            "location": null
        })));
        assert!(record.walking);
        assert!(record.location.is_none());
        assert!(!record.is_active());
    }

    #[test]
    fn walking_without_location_is_inactive() {
        let view = FriendPresenceView::from_parts(
            &link("toby"),
            Some(&doc(json!({"walking": true, "username": "toby"}))),
        );
        assert!(!view.is_active);
    }

    #[test]
    fn missing_record_defaults_display_name() {
        let view = FriendPresenceView::from_parts(&link("ghost"), None);
        assert_eq!(view.display_name, DEFAULT_DISPLAY_NAME);
        assert!(!view.is_active);
        assert!(view.location.is_none());
    }

    #[test]
    fn avatar_falls_back_through_photo_fields() {
        let mut with_link_avatar = link("ana");
        with_link_avatar.avatar_url = "https://img/link.jpg".into();

        let view = FriendPresenceView::from_parts(
            &with_link_avatar,
            Some(&doc(json!({"photoUrl": "", "profileImage": "https://img/p.jpg"}))),
        );
        assert_eq!(view.avatar_url, "https://img/p.jpg");

        let view = FriendPresenceView::from_parts(&with_link_avatar, Some(&Document::new()));
        assert_eq!(view.avatar_url, "https://img/link.jpg");

        let view = FriendPresenceView::from_parts(&link("ana"), None);
        assert_eq!(view.avatar_url, "");
    }

    #[test]
    fn partition_is_complete_disjoint_and_ordered() {
        let located = json!({"latitude": 1.0, "longitude": 2.0, "sampledAtEpochMillis": 5});
        let users = vec![
            ("a", Some(doc(json!({"walking": true, "location": located})))),
            ("b", Some(doc(json!({"walking": false, "location": located})))),
            ("c", None),
            ("d", Some(doc(json!({"walking": true, "location": located})))),
            ("e", Some(doc(json!({"walking": true})))),
        ];

        let views = users
            .iter()
            .map(|(id, user)| FriendPresenceView::from_parts(&link(id), user.as_ref()));
        let snapshot = RosterSnapshot::partition(views, 42);

        let active: Vec<&str> = snapshot.active.iter().map(|v| v.friend_id.as_str()).collect();
        let inactive: Vec<&str> = snapshot.inactive.iter().map(|v| v.friend_id.as_str()).collect();
        assert_eq!(active, vec!["a", "d"]);
        assert_eq!(inactive, vec!["b", "c", "e"]);
        assert_eq!(snapshot.len(), users.len());
        assert_eq!(snapshot.headline(), HEADLINE_ACTIVE);
    }

    #[test]
    fn empty_roster_headline() {
        let snapshot = RosterSnapshot::partition(Vec::new(), 0);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.headline(), "Ningún amigo está en paseo ahora mismo");
    }

    #[test]
    fn short_name_truncates_long_names() {
        let mut view = FriendPresenceView::from_parts(&link("x"), None);
        view.display_name = "Bartolomeo el Grande".into();
        assert_eq!(view.short_name(), "Bartolomeo…");
        view.display_name = "Luna".into();
        assert_eq!(view.short_name(), "Luna");
    }
}
