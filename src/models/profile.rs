use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::store::Document;

/// 首页在用户还没起名时显示的名字
pub const NEW_USER_NAME: &str = "Usuario Nuevo";

/// 用户资料（和在线状态存在同一个用户文档里）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub username: String,
    pub breed: String,
    pub age: String,
    pub likes: String,
    pub quirks: String,
    pub sex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

impl UserProfile {
    pub fn from_fields(doc: &Document) -> Self {
        serde_json::from_value(Value::Object(doc.clone())).unwrap_or_else(|e| {
            tracing::warn!("Malformed profile fields, using defaults: {}", e);
            UserProfile::default()
        })
    }

    pub fn into_fields(self) -> Result<Document, StoreError> {
        match serde_json::to_value(self)? {
            Value::Object(doc) => Ok(doc),
            _ => Ok(Document::new()),
        }
    }

    pub fn display_name(&self) -> &str {
        let name = self.username.trim();
        if name.is_empty() { NEW_USER_NAME } else { name }
    }
}
