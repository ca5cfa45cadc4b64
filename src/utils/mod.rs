use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::result::ApiResponse;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户ID
    pub exp: i64,    // 过期时间
    pub iat: i64,    // 签发时间
}

/// 签发令牌。登录流程在外部身份服务完成，这里只负责与其共享密钥的签名格式
pub fn generate_token(
    user_id: &str,
    config: &Config,
    ttl: Duration,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = (now + ttl).timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration,
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok((token, expiration))
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// 当前时间（毫秒）
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: error_codes::SUCCESS,
        msg: "success".into(),
        resp_data: Some(data),
    })
}

pub fn error_to_api_response<T>(code: i32, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code,
        msg,
        resp_data: None,
    })
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const AUTH_FAILED: i32 = 1002;
    pub const PERMISSION_DENIED: i32 = 1003;
    pub const NOT_FOUND: i32 = 1004;
    pub const RATE_LIMIT: i32 = 1005;
    pub const NO_SESSION: i32 = 1006;
    pub const STORE_UNAVAILABLE: i32 = 5003;
    pub const INTERNAL_ERROR: i32 = 5000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let config = Config::default();
        let (token, exp) = generate_token("ana", &config, Duration::hours(1)).unwrap();
        let claims = verify_token(&token, &config).unwrap();
        assert_eq!(claims.sub, "ana");
        assert_eq!(claims.exp, exp);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let config = Config::default();
        let (token, _) = generate_token("ana", &config, Duration::hours(1)).unwrap();
        let other = Config {
            jwt_secret: "another-secret".into(),
            ..Config::default()
        };
        assert!(verify_token(&token, &other).is_err());
    }
}
