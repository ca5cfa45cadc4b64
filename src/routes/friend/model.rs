use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AddFriendRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchUserQuery {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRemovedResponse {
    pub friend_id: String,
}
