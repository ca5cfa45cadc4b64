//! 好友管理：按用户名搜索、单向添加 / 删除、订阅好友列表

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::FriendError;
use crate::models::presence::{fields, string_field, user_avatar};
use crate::models::FriendLink;
use crate::store::{CollectionWatch, DocumentSnapshot, SetOptions, SharedDocumentStore, keys};

/// 搜索结果里的用户摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: String,
    pub username: String,
    pub avatar_url: String,
}

impl UserSummary {
    fn from_snapshot(doc: &DocumentSnapshot) -> Self {
        Self {
            user_id: doc.id.clone(),
            username: string_field(&doc.fields, fields::USERNAME)
                .unwrap_or_default()
                .to_string(),
            avatar_url: user_avatar(&doc.fields).unwrap_or_default().to_string(),
        }
    }
}

/// 好友列表订阅，每次变更推送完整列表
pub struct FriendsWatch {
    inner: CollectionWatch,
}

impl FriendsWatch {
    pub async fn next(&mut self) -> Option<Vec<FriendLink>> {
        let docs = self.inner.next().await?;
        Some(docs.iter().map(FriendLink::from_snapshot).collect())
    }
}

#[derive(Clone)]
pub struct FriendsService {
    store: Arc<dyn SharedDocumentStore>,
}

impl FriendsService {
    pub fn new(store: Arc<dyn SharedDocumentStore>) -> Self {
        Self { store }
    }

    /// 按用户名精确查找，查询词会先去空格并转小写
    pub async fn search_user(&self, username: &str) -> Result<Option<UserSummary>, FriendError> {
        let needle = username.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let matches = self
            .store
            .find_by_field(
                keys::USERS_COLLECTION,
                fields::USERNAME,
                &Value::String(needle),
            )
            .await?;

        Ok(matches.first().map(UserSummary::from_snapshot))
    }

    /// 添加单向好友链接，重复添加会覆盖原链接
    pub async fn add_friend(&self, owner_id: &str, friend: &UserSummary) -> Result<FriendLink, FriendError> {
        if owner_id == friend.user_id {
            return Err(FriendError::SelfReference);
        }

        let link = FriendLink {
            friend_id: friend.user_id.clone(),
            display_name: friend.username.clone(),
            avatar_url: friend.avatar_url.clone(),
        };
        self.store
            .set(
                &keys::friend_doc(owner_id, &friend.user_id),
                link.clone().into_fields(),
                SetOptions::overwrite(),
            )
            .await?;

        tracing::info!("{} added friend {}", owner_id, friend.user_id);
        Ok(link)
    }

    pub async fn add_friend_by_username(
        &self,
        owner_id: &str,
        username: &str,
    ) -> Result<FriendLink, FriendError> {
        let friend = self
            .search_user(username)
            .await?
            .ok_or_else(|| FriendError::UserNotFound(username.trim().to_string()))?;
        self.add_friend(owner_id, &friend).await
    }

    /// 删除不存在的链接也算成功
    pub async fn remove_friend(&self, owner_id: &str, friend_id: &str) -> Result<(), FriendError> {
        self.store
            .delete(&keys::friend_doc(owner_id, friend_id))
            .await?;
        tracing::info!("{} removed friend {}", owner_id, friend_id);
        Ok(())
    }

    pub async fn list_friends(&self, owner_id: &str) -> Result<Vec<FriendLink>, FriendError> {
        let docs = self
            .store
            .list_children(&keys::friends_collection(owner_id))
            .await?;
        Ok(docs.iter().map(FriendLink::from_snapshot).collect())
    }

    pub async fn watch_friends(&self, owner_id: &str) -> Result<FriendsWatch, FriendError> {
        let inner = self
            .store
            .watch(&keys::friends_collection(owner_id))
            .await?;
        Ok(FriendsWatch { inner })
    }
}
