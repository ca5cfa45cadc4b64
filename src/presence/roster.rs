use crate::error::StoreError;
use crate::models::{FriendLink, FriendPresenceView, RosterSnapshot};
use crate::store::{SharedDocumentStore, keys};
use crate::utils::now_millis;

/// 拉取一次好友名单并按在线状态分组
///
/// 每个好友一次顺序读取，好友多时是已知的扩展瓶颈。
/// 任何一次读取失败都让整轮失败，由调用方保留上一轮结果。
pub async fn fetch_roster(
    store: &dyn SharedDocumentStore,
    user_id: &str,
) -> Result<RosterSnapshot, StoreError> {
    let links = store
        .list_children(&keys::friends_collection(user_id))
        .await?;

    let mut views = Vec::with_capacity(links.len());
    for link_doc in &links {
        let link = FriendLink::from_snapshot(link_doc);
        let user = store.get(&keys::user_doc(&link.friend_id)).await?;
        views.push(FriendPresenceView::from_parts(
            &link,
            user.as_ref().map(|doc| &doc.fields),
        ));
    }

    Ok(RosterSnapshot::partition(views, now_millis()))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::store::{Document, MemoryDocumentStore, SetOptions};

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn roster_follows_link_order_and_includes_missing_users() {
        let store = MemoryDocumentStore::new();
        for friend in ["rex", "ghost", "kira"] {
            store
                .set(
                    &keys::friend_doc("me", friend),
                    doc(json!({"friendId": friend, "displayName": friend, "avatarUrl": ""})),
                    SetOptions::overwrite(),
                )
                .await
                .unwrap();
        }
        let walking = json!({
            "walking": true,
            "username": "kira",
            "location": {"latitude": 40.0, "longitude": -3.0, "sampledAtEpochMillis": 1}
        });
        store
            .set(&keys::user_doc("kira"), doc(walking), SetOptions::merge())
            .await
            .unwrap();
        store
            .set(
                &keys::user_doc("rex"),
                doc(json!({"walking": false, "username": "rex"})),
                SetOptions::merge(),
            )
            .await
            .unwrap();

        let roster = fetch_roster(&store, "me").await.unwrap();
        let active: Vec<&str> = roster.active.iter().map(|v| v.friend_id.as_str()).collect();
        let inactive: Vec<&str> = roster.inactive.iter().map(|v| v.friend_id.as_str()).collect();
        assert_eq!(active, vec!["kira"]);
        assert_eq!(inactive, vec!["rex", "ghost"]);
        assert_eq!(roster.inactive[1].display_name, "Sin nombre");
        assert!(roster.refreshed_at_millis.is_some());
    }

    #[tokio::test]
    async fn no_friends_gives_empty_roster() {
        let store = MemoryDocumentStore::new();
        let roster = fetch_roster(&store, "lonely").await.unwrap();
        assert!(roster.is_empty());
        assert_eq!(roster.headline(), "Ningún amigo está en paseo ahora mismo");
    }
}
