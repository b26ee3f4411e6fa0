use std::net::SocketAddr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Process-wide settings, loaded once at startup and shared read-only.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Key material for the reversible password codec.
    pub codec_secret: String,
    pub jwt: JwtConfig,
    /// Base URL of the web frontend; recovery and confirmation links hang off it.
    pub frontend_url: String,
    pub smtp: Option<SmtpConfig>,
    pub listen_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let codec_secret = std::env::var("CODEC_SECRET")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "keygate".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "keygate-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(8 * 60),
        };
        let frontend_url = std::env::var("FRONTEND_URL")?
            .trim_end_matches('/')
            .to_string();

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|v| v.parse::<u16>().ok())
                    .unwrap_or(587),
                username: std::env::var("SMTP_USERNAME")?,
                password: std::env::var("SMTP_PASSWORD")?,
                from: std::env::var("SMTP_FROM")?,
            }),
            Err(_) => None,
        };

        let listen_addr = format!(
            "{}:{}",
            std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
        )
        .parse::<SocketAddr>()
        .context("APP_HOST/APP_PORT")?;

        Ok(Self {
            database_url,
            codec_secret,
            jwt,
            frontend_url,
            smtp,
            listen_addr,
        })
    }

    pub fn recover_password_link(&self, token: &str) -> String {
        format!("{}/auth/recuperar-senha/{}", self.frontend_url, token)
    }

    pub fn confirm_email_link(&self, code: &str) -> String {
        format!("{}/auth/validade-email/{}", self.frontend_url, code)
    }

    pub fn login_link(&self) -> String {
        format!("{}/auth/login", self.frontend_url)
    }
}
