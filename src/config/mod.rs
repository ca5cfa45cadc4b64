use std::env;
use std::time::Duration;

/// 文档存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "redis" => StoreBackend::Redis,
            other => {
                tracing::warn!("Unknown STORE_BACKEND {:?}, falling back to redis", other);
                StoreBackend::Redis
            }
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub redis_url: String,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub store_backend: StoreBackend,
    pub location_sample_interval_ms: u64,
    pub roster_refresh_interval_ms: u64,
    pub location_max_fix_age_secs: u64,
    pub session_idle_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            redis_url: env::var("REDIS_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "::".into()),
            server_port: parse_or("SERVER_PORT", 3000),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", 100),
            store_backend: env::var("STORE_BACKEND")
                .map(|v| StoreBackend::parse(&v))
                .unwrap_or(StoreBackend::Redis),
            location_sample_interval_ms: parse_or("LOCATION_SAMPLE_INTERVAL_MS", 10_000),
            roster_refresh_interval_ms: parse_or("ROSTER_REFRESH_INTERVAL_MS", 60_000),
            location_max_fix_age_secs: parse_or("LOCATION_MAX_FIX_AGE_SECS", 30),
            session_idle_timeout_secs: parse_or("SESSION_IDLE_TIMEOUT_SECS", 900),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn location_sample_interval(&self) -> Duration {
        Duration::from_millis(self.location_sample_interval_ms)
    }

    pub fn roster_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.roster_refresh_interval_ms)
    }

    pub fn location_max_fix_age(&self) -> Duration {
        Duration::from_secs(self.location_max_fix_age_secs)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }
}

impl Default for Config {
    /// 本地开发用的默认值，密钥必须在部署时覆盖
    fn default() -> Self {
        Config {
            redis_url: "redis://127.0.0.1:6379/".into(),
            jwt_secret: "paseo-dev-secret".into(),
            server_host: "::".into(),
            server_port: 3000,
            api_base_uri: "/api".into(),
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
            store_backend: StoreBackend::Memory,
            location_sample_interval_ms: 10_000,
            roster_refresh_interval_ms: 60_000,
            location_max_fix_age_secs: 30,
            session_idle_timeout_secs: 900,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} value {:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parsing_is_lenient() {
        assert_eq!(StoreBackend::parse("memory"), StoreBackend::Memory);
        assert_eq!(StoreBackend::parse(" REDIS "), StoreBackend::Redis);
        assert_eq!(StoreBackend::parse("firestore"), StoreBackend::Redis);
    }

    #[test]
    fn default_intervals_match_walk_screen() {
        let config = Config::default();
        assert_eq!(config.location_sample_interval(), Duration::from_secs(10));
        assert_eq!(config.roster_refresh_interval(), Duration::from_secs(60));
    }
}
