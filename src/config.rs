use std::env;

/// Runtime settings assembled once in `main` and shared through `web::Data`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub access_token_expiry_secs: i64,
    pub refresh_token_secret: String,
    pub refresh_token_expiry_secs: i64,
    /// Cookies are only marked `Secure` in production.
    pub secure_cookies: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let production = env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Ok(Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .map_err(|_| "PORT must be a valid number")?,
            },
            database: DatabaseConfig {
                uri: env::var("MONGODB_URI")
                    .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
                name: env::var("DB_NAME").unwrap_or_else(|_| "blog_db".to_string()),
            },
            auth: AuthConfig {
                access_token_secret: env::var("ACCESS_TOKEN_SECRET")
                    .map_err(|_| "ACCESS_TOKEN_SECRET is required")?,
                access_token_expiry_secs: parse_duration(
                    &env::var("ACCESS_TOKEN_EXPIRY").unwrap_or_else(|_| "1d".to_string()),
                )?,
                refresh_token_secret: env::var("REFRESH_TOKEN_SECRET")
                    .map_err(|_| "REFRESH_TOKEN_SECRET is required")?,
                refresh_token_expiry_secs: parse_duration(
                    &env::var("REFRESH_TOKEN_EXPIRY").unwrap_or_else(|_| "10d".to_string()),
                )?,
                secure_cookies: production,
            },
        })
    }
}

/// Parse `"90"`, `"15m"`, `"12h"` or `"10d"` into seconds.
pub fn parse_duration(raw: &str) -> Result<i64, String> {
    let raw = raw.trim();
    let (digits, multiplier) = match raw.chars().last() {
        Some('s') => (&raw[..raw.len() - 1], 1),
        Some('m') => (&raw[..raw.len() - 1], 60),
        Some('h') => (&raw[..raw.len() - 1], 60 * 60),
        Some('d') => (&raw[..raw.len() - 1], 24 * 60 * 60),
        Some(c) if c.is_ascii_digit() => (raw, 1),
        _ => return Err(format!("Invalid duration '{}'", raw)),
    };

    let value: i64 = digits
        .parse()
        .map_err(|_| format!("Invalid duration '{}'", raw))?;
    if value <= 0 {
        return Err(format!("Duration must be positive, got '{}'", raw));
    }
    Ok(value * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_durations() {
        assert_eq!(parse_duration("90").unwrap(), 90);
        assert_eq!(parse_duration("30s").unwrap(), 30);
        assert_eq!(parse_duration("15m").unwrap(), 900);
        assert_eq!(parse_duration("2h").unwrap(), 7200);
        assert_eq!(parse_duration("1d").unwrap(), 86400);
    }

    #[test]
    fn rejects_garbage_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("d").is_err());
        assert!(parse_duration("1w").is_err());
        assert!(parse_duration("0m").is_err());
    }
}
