use anyhow::{Context, Result};

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_POST_LENGTH: usize = 5000;
pub const MAX_COMMENT_LENGTH: usize = 2000;
pub const MAX_PHOTOS_PER_POST: usize = 10;
pub const MAX_PHOTO_URL_LENGTH: usize = 2048;

pub const SESSION_COOKIE_NAME: &str = "token";

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub token_expiration_hours: i64,
    pub allowed_origins: Vec<String>,
    pub seed_demo_data: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("NATTER_JWT_SECRET")
            .context("NATTER_JWT_SECRET environment variable not set")?;
        if jwt_secret.trim().is_empty() {
            anyhow::bail!("NATTER_JWT_SECRET must not be empty");
        }

        let value_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            bind_addr: value_or("NATTER_BIND_ADDR", "127.0.0.1:8080"),
            database_url: value_or("NATTER_DATABASE_URL", "sqlite://natter.db?mode=rwc"),
            db_max_connections: parsed_or(lookup("NATTER_DB_MAX_CONNECTIONS"), 5),
            jwt_secret,
            token_expiration_hours: token_expiration_hours(lookup("NATTER_TOKEN_EXPIRATION_HOURS")),
            allowed_origins: value_or("NATTER_ALLOWED_ORIGINS", "http://localhost:5173")
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            seed_demo_data: parsed_or(lookup("NATTER_SEED_DEMO_DATA"), false),
        })
    }
}

/// Session lifetime in hours; unset, unparsable or non-positive values fall back to 24.
pub fn token_expiration_hours(raw: Option<String>) -> i64 {
    raw.and_then(|v| v.parse::<i64>().ok())
        .filter(|hours| *hours > 0)
        .unwrap_or(24)
}

fn parsed_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.parse::<T>().ok()).unwrap_or(default)
}
