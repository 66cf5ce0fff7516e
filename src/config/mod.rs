use std::env;
use std::str::FromStr;
use std::time::Duration;

/// 默认的不适宜话题关键词
pub const DEFAULT_DENYLIST: &[&str] = &[
    "hate", "violence", "illegal", "harmful", "dangerous", "porn", "sex", "drug", "weapon",
    "bomb", "terror",
];

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub telegram_bot_token: String,
    pub bot_username: String,
    pub telegram_api_base: String,
    pub google_ai_key: String,
    pub google_ai_model: String,
    pub google_ai_endpoint: String,
    pub generation_timeout_secs: u64,
    // 项目级（非用户级）API 限流
    pub api_requests_per_minute: u32,
    pub api_requests_per_day: u32,
    pub min_message_length: usize,
    pub max_message_length: usize,
    pub debounce_delay_secs: f64,
    pub database_url: Option<String>,
    pub whitelist_enabled: bool,
    pub whitelist_path: String,
    pub content_denylist: Vec<String>,
    pub cleanup_interval_hours: u64,
    pub cleanup_first_delay_secs: u64,
    pub rate_record_retention_days: i64,
    pub usage_log_retention_days: i64,
    pub admin_token: Option<String>,
    pub admin_host: String,
    pub admin_port: u16,
}

/// 读取环境变量，缺失或解析失败时使用默认值
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_denylist(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let content_denylist = match env_optional("CONTENT_DENYLIST") {
            Some(raw) => parse_denylist(&raw),
            None => DEFAULT_DENYLIST.iter().map(|k| k.to_string()).collect(),
        };

        Ok(Config {
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN")?,
            bot_username: env_optional("BOT_USERNAME").unwrap_or_else(|| "vibemessagebot".into()),
            telegram_api_base: env_optional("TELEGRAM_API_BASE")
                .unwrap_or_else(|| "https://api.telegram.org".into()),
            google_ai_key: env::var("GOOGLE_AI_API_KEY")?,
            google_ai_model: env_optional("GOOGLE_AI_MODEL")
                .unwrap_or_else(|| "gemini-2.0-flash-lite".into()),
            google_ai_endpoint: env_optional("GOOGLE_AI_ENDPOINT")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".into()),
            generation_timeout_secs: env_or("GENERATION_TIMEOUT_SECONDS", 30),
            api_requests_per_minute: env_or("API_REQUESTS_PER_MINUTE", 10),
            api_requests_per_day: env_or("API_REQUESTS_PER_DAY", 1000),
            min_message_length: env_or("MIN_MESSAGE_LENGTH", 300),
            max_message_length: env_or("MAX_MESSAGE_LENGTH", 400),
            debounce_delay_secs: env_or("DEBOUNCE_DELAY_SECONDS", 2.0),
            database_url: env_optional("DATABASE_URL"),
            whitelist_enabled: env_optional("WHITELIST_ENABLED")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            whitelist_path: env_optional("WHITELIST_PATH")
                .unwrap_or_else(|| "./data/whitelist.json".into()),
            content_denylist,
            cleanup_interval_hours: env_or("CLEANUP_INTERVAL_HOURS", 24),
            cleanup_first_delay_secs: env_or("CLEANUP_FIRST_DELAY_SECONDS", 60),
            rate_record_retention_days: env_or("RATE_RECORD_RETENTION_DAYS", 7),
            usage_log_retention_days: env_or("USAGE_LOG_RETENTION_DAYS", 90),
            admin_token: env_optional("ADMIN_TOKEN"),
            admin_host: env_optional("ADMIN_HOST").unwrap_or_else(|| "127.0.0.1".into()),
            admin_port: env_or("ADMIN_PORT", 8080),
        })
    }

    pub fn debounce_delay(&self) -> Duration {
        // 负数或 NaN 一律视为不延迟
        Duration::try_from_secs_f64(self.debounce_delay_secs).unwrap_or(Duration::ZERO)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_hours.max(1) * 3600)
    }

    pub fn cleanup_first_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_first_delay_secs)
    }

    pub fn rate_record_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.rate_record_retention_days)
    }

    pub fn usage_log_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.usage_log_retention_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denylist_is_normalised() {
        assert_eq!(
            parse_denylist(" Bomb, ,WEAPON ,drug"),
            vec!["bomb".to_string(), "weapon".to_string(), "drug".to_string()]
        );
    }

    #[test]
    fn env_or_falls_back_on_garbage() {
        unsafe { env::set_var("VIBEBOT_TEST_ENV_OR", "not-a-number") };
        assert_eq!(env_or("VIBEBOT_TEST_ENV_OR", 42u32), 42);
        unsafe { env::set_var("VIBEBOT_TEST_ENV_OR", " 7 ") };
        assert_eq!(env_or("VIBEBOT_TEST_ENV_OR", 42u32), 7);
    }
}
