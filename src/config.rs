use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl: time::Duration,
    pub allowed_origins: Vec<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub smtp_from: String,
    pub support_to: String,
}

impl Config {
    pub fn load() -> Self {
        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set, using an insecure development secret");
            "cohabify-dev-secret".to_string()
        });

        let allowed_origins = var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://localhost:5174".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            port: try_load("PORT", "5000"),
            database_url: var("DATABASE_URL").unwrap_or_else(|_| "sqlite:cohabify.db".to_string()),
            jwt_secret,
            token_ttl: parse_expire(&var("JWT_EXPIRE").unwrap_or_else(|_| "7d".to_string())),
            allowed_origins,
            smtp_host: var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            smtp_port: try_load("SMTP_PORT", "587"),
            smtp_user: var("SMTP_USER").ok(),
            smtp_pass: var("SMTP_PASS").ok(),
            smtp_from: var("SMTP_FROM").unwrap_or_else(|_| "no-reply@cohabify.local".to_string()),
            support_to: var("SUPPORT_TO").unwrap_or_else(|_| "support@cohabify.local".to_string()),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| ())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .unwrap_or_else(|e| {
            warn!("Invalid {key} value ({e}), using default: {default}");
            default.parse().ok().expect("default must parse")
        })
}

/// Token lifetimes in the `JWT_EXPIRE` style: `7d`, `12h`, `30m`, `45s`,
/// or a bare number of seconds.
pub fn parse_expire(s: &str) -> time::Duration {
    let s = s.trim();
    let (num, unit) = match s.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((i, _)) => s.split_at(i),
        None => (s, ""),
    };

    let Ok(n) = num.parse::<i64>() else {
        warn!("Invalid JWT_EXPIRE value {s:?}, defaulting to 7 days");
        return time::Duration::days(7);
    };

    match unit {
        "d" => time::Duration::days(n),
        "h" => time::Duration::hours(n),
        "m" => time::Duration::minutes(n),
        "" | "s" => time::Duration::seconds(n),
        _ => {
            warn!("Invalid JWT_EXPIRE unit {unit:?}, defaulting to 7 days");
            time::Duration::days(7)
        }
    }
}
