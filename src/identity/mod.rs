//! 当前登录用户的来源

use crate::utils::Claims;

pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// 固定身份，后台任务和测试使用
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

/// 已验证的 JWT 本身就是身份
impl IdentityProvider for Claims {
    fn current_user_id(&self) -> Option<String> {
        Some(self.sub.clone()).filter(|sub| !sub.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_with_empty_subject_are_anonymous() {
        let claims = Claims {
            sub: String::new(),
            exp: 0,
            iat: 0,
        };
        assert_eq!(claims.current_user_id(), None);
        assert_eq!(StaticIdentity::anonymous().current_user_id(), None);
        assert_eq!(
            StaticIdentity::signed_in("ana").current_user_id(),
            Some("ana".to_string())
        );
    }
}
