use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::AsyncCommands;

use crate::{
    config::Config,
    utils::{error_codes, error_to_api_response},
};

/// 按客户端IP的固定窗口限流，计数放在 Redis
#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(redis: Arc<redis::Client>, config: &Config) -> Self {
        Self {
            redis,
            window: config.rate_limit_window(),
            max_requests: config.rate_limit_requests,
        }
    }

    /// 返回本窗口内的请求计数
    async fn hit(&self, ip: &str) -> redis::RedisResult<u32> {
        let key = format!("rate_limit:{}", ip);
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        // INCR + EXPIRE 实现计数器，第一次请求时设置过期时间
        let count: u32 = conn.incr(&key, 1).await?;
        if count == 1 {
            let _: () = conn.expire(&key, self.window.as_secs() as i64).await?;
        }
        Ok(count)
    }

    pub async fn check_rate_limit(&self, req: Request<Body>, next: Next) -> Response {
        let remote_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());
        let ip = client_ip(req.headers(), remote_ip.as_deref());

        match self.hit(&ip).await {
            Ok(count) if count > self.max_requests => {
                tracing::info!("Rate limit exceeded for {} ({} requests)", ip, count);
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    error_to_api_response::<()>(
                        error_codes::RATE_LIMIT,
                        format!(
                            "Demasiadas solicitudes, inténtalo de nuevo en {} segundos",
                            self.window.as_secs()
                        ),
                    ),
                )
                    .into_response();
            }
            Ok(_) => {}
            // Redis 不可用时放行
            Err(e) => tracing::warn!("Rate limit check for {} skipped: {}", ip, e),
        }

        next.run(req).await
    }
}

/// 优先取代理头，其次取连接地址
pub fn client_ip(headers: &HeaderMap, remote_ip: Option<&str>) -> String {
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .filter(|ip| !ip.trim().is_empty())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip)
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}
