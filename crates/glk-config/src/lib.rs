//! Environment-driven configuration. Loaded once at process startup.

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub db_echo: bool,
}

impl AppConfig {
    /// Reads `DATABASE_URL`, `HOST`, `PORT`, and `GODLIFE_DB_ECHO` from the
    /// process environment. Call `dotenvy::from_filename(".env.local")`
    /// before this in dev if a local env file is in use.
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8080);
        let db_echo = parse_bool_ish(&std::env::var("GODLIFE_DB_ECHO").unwrap_or_default());

        Ok(AppConfig { database_url, host, port, db_echo })
    }
}

fn parse_bool_ish(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_ish_accepts_common_truthy_spellings() {
        for v in ["1", "true", "TRUE", "yes", "on"] {
            assert!(parse_bool_ish(v), "expected {v} to parse truthy");
        }
        for v in ["0", "false", "", "no"] {
            assert!(!parse_bool_ish(v), "expected {v} to parse falsy");
        }
    }
}
