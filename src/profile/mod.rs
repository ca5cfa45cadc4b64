//! 用户资料读写

use std::sync::Arc;

use crate::error::ProfileError;
use crate::models::UserProfile;
use crate::store::{SetOptions, SharedDocumentStore, keys};

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn SharedDocumentStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn SharedDocumentStore>) -> Self {
        Self { store }
    }

    /// 用户文档不存在时返回空资料
    pub async fn load_profile(&self, user_id: &str) -> Result<UserProfile, ProfileError> {
        let profile = self
            .store
            .get(&keys::user_doc(user_id))
            .await?
            .map(|doc| UserProfile::from_fields(&doc.fields))
            .unwrap_or_default();
        Ok(profile)
    }

    /// 合并写入资料字段，不会碰 walking / location
    pub async fn save_profile(
        &self,
        user_id: &str,
        profile: UserProfile,
    ) -> Result<UserProfile, ProfileError> {
        let profile = UserProfile {
            username: profile.username.trim().to_string(),
            breed: profile.breed.trim().to_string(),
            age: profile.age.trim().to_string(),
            likes: profile.likes.trim().to_string(),
            quirks: profile.quirks.trim().to_string(),
            sex: profile.sex.trim().to_string(),
            profile_image: profile
                .profile_image
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
        };
        if profile.username.is_empty() {
            return Err(ProfileError::Validation("El ID usuario no puede estar vacío"));
        }

        self.store
            .set(
                &keys::user_doc(user_id),
                profile.clone().into_fields()?,
                SetOptions::merge(),
            )
            .await?;

        tracing::info!("Profile saved for {}", user_id);
        Ok(profile)
    }
}
