/// 用户文档集合
pub const USERS_COLLECTION: &str = "users";

/// 好友子集合名
const FRIENDS_SUBCOLLECTION: &str = "friends";

/// Redis 全局插入序号键
pub const SEQUENCE_KEY: &str = "doc:seq";

/// 生成用户文档路径
pub fn user_doc(user_id: &str) -> String {
    format!("{}/{}", USERS_COLLECTION, user_id)
}

/// 生成好友集合路径
pub fn friends_collection(owner_id: &str) -> String {
    format!("{}/{}/{}", USERS_COLLECTION, owner_id, FRIENDS_SUBCOLLECTION)
}

/// 生成好友链接文档路径
pub fn friend_doc(owner_id: &str, friend_id: &str) -> String {
    format!("{}/{}", friends_collection(owner_id), friend_id)
}

/// 文档哈希键
pub fn doc_key(path: &str) -> String {
    format!("doc:{}", path)
}

/// 集合子文档索引键（有序集合，分值为插入序号）
pub fn children_key(collection: &str) -> String {
    format!("children:{}", collection)
}

/// 集合变更通知频道
pub fn change_channel(collection: &str) -> String {
    format!("changes:{}", collection)
}
