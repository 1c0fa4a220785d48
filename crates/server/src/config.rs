use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub static_dir: String,
    pub jwt_secret: String,
    pub session_days: i64,
    pub admin_username: String,
    pub admin_password: String,
    pub chat_history_limit: i64,
    pub overdue_after_hours: i64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: parse_var("PORT", 3000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/parkspot.db?mode=rwc".to_string()),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "development-secret-change-in-production".to_string()),
            session_days: parse_var("SESSION_DAYS", 7),
            admin_username: env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string()),
            chat_history_limit: parse_var("CHAT_HISTORY_LIMIT", 50),
            overdue_after_hours: parse_var("OVERDUE_AFTER_HOURS", 24),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: "sqlite::memory:".to_string(),
            static_dir: "static".to_string(),
            jwt_secret: "development-secret-change-in-production".to_string(),
            session_days: 7,
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
            chat_history_limit: 50,
            overdue_after_hours: 24,
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
