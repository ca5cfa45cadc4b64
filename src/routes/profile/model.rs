use serde::Serialize;

use crate::models::UserProfile;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    /// 首页标题用的名字
    pub display_name: String,
    #[serde(flatten)]
    pub profile: UserProfile,
}

impl From<UserProfile> for ProfileView {
    fn from(profile: UserProfile) -> Self {
        Self {
            display_name: profile.display_name().to_string(),
            profile,
        }
    }
}
