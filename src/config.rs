use std::{env, path::PathBuf, str::FromStr};

use anyhow::{Context, bail};
use chrono::TimeDelta;

use crate::{catalog::Catalog, lifecycle::LifecycleTimers};

#[derive(Debug, Clone)]
pub struct ChallengeConfig {
    pub salt: String,
    pub image_dir: PathBuf,
    /// Fixed answer to the extra question on the order form, if enabled.
    pub verification_answer: Option<String>,
}

#[derive(Clone)]
pub struct AdminConfig {
    pub username: String,
    pub password_hash: String,
    pub jwt_secret: String,
    pub session_ttl: TimeDelta,
    /// When set, admin requests must carry this Host header.
    pub host: Option<String>,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub catalog: Catalog,
    pub timers: LifecycleTimers,
    pub challenge: ChallengeConfig,
    pub payment_link: String,
    pub admin: AdminConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let catalog_path = env::var("CATALOG_PATH").unwrap_or_else(|_| "catalog.json".to_string());
        let catalog = Catalog::load(catalog_path.as_ref())?;
        Self::from_lookup(|key| env::var(key).ok(), catalog)
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F, catalog: Catalog) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .with_context(|| format!("{key} must be set"))
        };

        let timers = LifecycleTimers {
            payment_timeout: seconds(&lookup, "PAYMENT_TIMEOUT_SECS", 86_400)?,
            dead_order_retention: seconds(&lookup, "DEAD_ORDER_RETENTION_SECS", 604_800)?,
            completed_order_retention: seconds(
                &lookup,
                "COMPLETED_ORDER_RETENTION_SECS",
                2_592_000,
            )?,
        };

        let challenge = ChallengeConfig {
            salt: required("CHALLENGE_SALT")?,
            image_dir: lookup("CHALLENGE_IMAGE_DIR")
                .unwrap_or_else(|| "challenge".to_string())
                .into(),
            verification_answer: lookup("VERIFICATION_ANSWER").filter(|v| !v.is_empty()),
        };

        let session_hours: i64 = parsed(&lookup, "ADMIN_SESSION_HOURS", 12)?;
        if session_hours <= 0 {
            bail!("ADMIN_SESSION_HOURS must be positive");
        }
        let admin = AdminConfig {
            username: lookup("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
            password_hash: required("ADMIN_PASSWORD_HASH")?,
            jwt_secret: required("JWT_SECRET")?,
            session_ttl: TimeDelta::hours(session_hours),
            host: lookup("ADMIN_HOST").filter(|v| !v.is_empty()),
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: lookup("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parsed(&lookup, "APP_PORT", 3000)?,
            catalog,
            timers,
            challenge,
            payment_link: required("PAYMENT_LINK")?,
            admin,
        })
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value `{raw}`")),
        None => Ok(default),
    }
}

fn seconds<F>(lookup: &F, key: &str, default: u32) -> anyhow::Result<TimeDelta>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u32 = parsed(lookup, key, default)?;
    if secs == 0 {
        bail!("{key} must be at least one second");
    }
    Ok(TimeDelta::seconds(i64::from(secs)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn catalog() -> Catalog {
        Catalog::from_json(
            r#"{ "kiwen": { "title": "Stone", "price": 100, "shipping": { "US": 1, "INTL": 2 } } }"#,
        )
        .unwrap()
    }

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/store"),
            ("CHALLENGE_SALT", "pepper"),
            ("PAYMENT_LINK", "https://pay.example/shop"),
            ("ADMIN_PASSWORD_HASH", "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"),
            ("JWT_SECRET", "secret"),
        ])
    }

    fn build(vars: HashMap<&'static str, &'static str>) -> anyhow::Result<AppConfig> {
        AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()), catalog())
    }

    #[test]
    fn defaults_apply() {
        let config = build(base()).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.timers.payment_timeout, TimeDelta::days(1));
        assert_eq!(config.timers.dead_order_retention, TimeDelta::days(7));
        assert_eq!(config.timers.completed_order_retention, TimeDelta::days(30));
        assert_eq!(config.admin.username, "admin");
        assert_eq!(config.admin.session_ttl, TimeDelta::hours(12));
        assert_eq!(config.admin.host, None);
        assert_eq!(config.challenge.image_dir, PathBuf::from("challenge"));
        assert_eq!(config.challenge.verification_answer, None);
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = base();
        vars.insert("APP_PORT", "8080");
        vars.insert("PAYMENT_TIMEOUT_SECS", "60");
        vars.insert("VERIFICATION_ANSWER", "Sonja");
        vars.insert("ADMIN_HOST", "admin.shop.test");
        let config = build(vars).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.timers.payment_timeout, TimeDelta::seconds(60));
        assert_eq!(config.challenge.verification_answer.as_deref(), Some("Sonja"));
        assert_eq!(config.admin.host.as_deref(), Some("admin.shop.test"));
    }

    #[test]
    fn missing_secrets_fail() {
        let mut vars = base();
        vars.remove("CHALLENGE_SALT");
        assert!(build(vars).is_err());

        let mut vars = base();
        vars.insert("JWT_SECRET", "");
        assert!(build(vars).is_err());
    }

    #[test]
    fn invalid_numbers_fail() {
        let mut vars = base();
        vars.insert("APP_PORT", "http");
        assert!(build(vars).is_err());

        let mut vars = base();
        vars.insert("PAYMENT_TIMEOUT_SECS", "0");
        assert!(build(vars).is_err());
    }
}
